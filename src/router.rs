//! Routing tables mapping routing keys to handlers.
//!
//! A [`Router`] holds an ordered list of compiled patterns plus an optional
//! fallback. Lookups return the first registered pattern that matches the
//! key; the fallback only applies when no pattern does. A key that matches
//! nothing yields `None`, which the connection treats as a pass-through: the
//! payload is still acknowledged.
//!
//! The router is independent of transports and connection state so it can be
//! exercised on its own.
//!
//! # Examples
//!
//! ```
//! use qws::router::Router;
//!
//! let mut router = Router::new();
//! router.route("sensors/:id/readings", "readings").expect("valid pattern");
//! router.fallback("anything else");
//!
//! let hit = router.at("sensors/7/readings").expect("route matches");
//! assert_eq!(*hit.handler, "readings");
//! assert_eq!(hit.params.get("id"), Some("7"));
//! assert_eq!(*router.at("other").expect("fallback").handler, "anything else");
//! ```

use thiserror::Error;

mod pattern;

use pattern::Pattern;

/// Errors raised while registering routes.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouterError {
    /// The same pattern was registered twice.
    #[error("route {0:?} was already registered")]
    DuplicateRoute(String),
    /// The pattern is malformed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Rejected pattern source.
        pattern: String,
        /// Why the pattern was rejected.
        reason: &'static str,
    },
}

/// Parameters captured while matching a routing key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteParams {
    named: Vec<(String, String)>,
    positional: Vec<String>,
}

impl RouteParams {
    /// Value captured by a `:name` segment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Value captured by the `index`-th `*` or `**` segment.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// All named captures in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `true` when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.named.is_empty() && self.positional.is_empty() }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    /// The matching handler.
    pub handler: &'a H,
    /// Captured parameters.
    pub params: RouteParams,
    /// Source of the matching pattern, or `None` for the fallback.
    pub pattern: Option<&'a str>,
}

#[derive(Clone, Debug)]
struct Route<H> {
    pattern: Pattern,
    handler: H,
}

/// Ordered routing table.
#[derive(Clone, Debug)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
    fallback: Option<H>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            fallback: None,
        }
    }
}

impl<H> Router<H> {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `handler` for keys matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::InvalidPattern`] for malformed patterns and
    /// [`RouterError::DuplicateRoute`] if `pattern` is already registered.
    pub fn route(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouterError> {
        let pattern = Pattern::compile(pattern)?;
        if self.routes.iter().any(|route| route.pattern == pattern) {
            return Err(RouterError::DuplicateRoute(pattern.as_str().to_owned()));
        }
        self.routes.push(Route { pattern, handler });
        Ok(self)
    }

    /// Set the handler used when no pattern matches, replacing any previous one.
    pub fn fallback(&mut self, handler: H) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    /// Look up the handler for `key`.
    #[must_use]
    pub fn at(&self, key: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .iter()
            .find_map(|route| {
                route.pattern.matches(key).map(|params| RouteMatch {
                    handler: &route.handler,
                    params,
                    pattern: Some(route.pattern.as_str()),
                })
            })
            .or_else(|| {
                self.fallback.as_ref().map(|handler| RouteMatch {
                    handler,
                    params: RouteParams::default(),
                    pattern: None,
                })
            })
    }

    /// Number of registered patterns, excluding the fallback.
    #[must_use]
    pub fn len(&self) -> usize { self.routes.len() }

    /// Returns `true` if neither patterns nor a fallback are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.routes.is_empty() && self.fallback.is_none() }
}

#[cfg(test)]
mod tests;
