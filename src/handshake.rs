//! Query parameters exchanged when a transport is (re)opened.
//!
//! The connecting side appends its acknowledgment cursor as `idx`, together
//! with any configured extra arguments, to the URL it dials. The accepting
//! side can read them back with [`query_params`] and [`resume_index`].

use std::collections::BTreeMap;

use url::Url;

/// Query parameter carrying the connecting side's acknowledgment cursor.
pub const RESUME_PARAM: &str = "idx";

/// Build the URL for a connection attempt.
///
/// Existing query pairs are kept unless `extra_args` or `idx` override them.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
///
/// use qws::handshake::connect_url;
/// use url::Url;
///
/// let base = Url::parse("ws://localhost:3000/mypath?idx=9").expect("valid url");
/// let extra = BTreeMap::from([("token".to_owned(), "abc".to_owned())]);
/// let url = connect_url(&base, &extra, 4);
/// assert_eq!(url.as_str(), "ws://localhost:3000/mypath?token=abc&idx=4");
/// ```
#[must_use]
pub fn connect_url(base: &Url, extra_args: &BTreeMap<String, String>, idx: u64) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| key != RESUME_PARAM && !extra_args.contains_key(key))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(extra_args)
        .append_pair(RESUME_PARAM, &idx.to_string());
    url
}

/// Collect the query of `url` into a map. Later duplicates win.
#[must_use]
pub fn query_params(url: &Url) -> BTreeMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Acknowledgment cursor advertised by the connecting side, if present and numeric.
#[must_use]
pub fn resume_index(url: &Url) -> Option<u64> {
    url.query_pairs()
        .filter(|(key, _)| key == RESUME_PARAM)
        .last()
        .and_then(|(_, value)| value.parse().ok())
}
