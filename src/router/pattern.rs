//! Compiled route patterns.
//!
//! Patterns are split on `/` into segments:
//!
//! - `literal` matches the identical segment.
//! - `:name` matches one non-empty segment and captures it under `name`.
//! - `*` matches one non-empty segment and captures it positionally.
//! - `**` may only appear last; it matches the remaining segments (possibly none) and captures them,
//!   rejoined with `/`, positionally.

use super::{RouteParams, RouterError};

const SEPARATOR: char = '/';

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Named(String),
    Wildcard,
    Rest,
}

/// A route pattern validated and split into segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn compile(source: &str) -> Result<Self, RouterError> {
        let invalid = |reason| RouterError::InvalidPattern {
            pattern: source.to_owned(),
            reason,
        };

        let raw: Vec<&str> = source.split(SEPARATOR).collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<&str> = Vec::new();
        for (position, part) in raw.iter().enumerate() {
            let segment = match *part {
                "**" if position + 1 != raw.len() => {
                    return Err(invalid("`**` must be the last segment"));
                }
                "**" => Segment::Rest,
                "*" => Segment::Wildcard,
                named if named.starts_with(':') => {
                    let name = &named[1..];
                    if name.is_empty() {
                        return Err(invalid("parameter name must not be empty"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("parameter names must be unique"));
                    }
                    names.push(name);
                    Segment::Named(name.to_owned())
                }
                literal => Segment::Literal(literal.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub(crate) fn as_str(&self) -> &str { &self.source }

    /// Match `key` against the pattern, extracting parameters on success.
    pub(crate) fn matches(&self, key: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = key.split(SEPARATOR).collect();
        let mut params = RouteParams::default();
        let mut remaining = parts.iter();

        for segment in &self.segments {
            if matches!(segment, Segment::Rest) {
                let rest: Vec<&str> = remaining.by_ref().copied().collect();
                params.positional.push(rest.join("/"));
                return Some(params);
            }
            let part = *remaining.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Named(name) if !part.is_empty() => {
                    params.named.push((name.clone(), part.to_owned()));
                }
                Segment::Wildcard if !part.is_empty() => params.positional.push(part.to_owned()),
                _ => return None,
            }
        }

        remaining.next().is_none().then_some(params)
    }
}
