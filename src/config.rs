//! Connection options.
//!
//! [`QwsOptions`] can be built in code with its setters or deserialised from
//! any serde format using the camel-cased keys `name`, `extraConnectArgs`,
//! `reconnect`, `reconnectNumTries` and `reconnectIntervalMillis`.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Deserializer};

/// Default connection name used in log output.
pub const DEFAULT_NAME: &str = "websocket";
/// Default number of reconnection retries.
pub const DEFAULT_RECONNECT_NUM_TRIES: u32 = 12;
/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5000);

/// Options controlling a single connection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use qws::config::QwsOptions;
///
/// let options = QwsOptions::default()
///     .name("uploader")
///     .extra_connect_arg("token", "abc")
///     .reconnect_num_tries(3)
///     .reconnect_interval(Duration::from_millis(250));
/// assert!(options.reconnect);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QwsOptions {
    /// Name attached to every log line for this connection.
    pub name: String,
    /// Extra query parameters appended to the URL on every (re)connect.
    pub extra_connect_args: BTreeMap<String, String>,
    /// Whether to reconnect after the transport is lost.
    pub reconnect: bool,
    /// Number of retries after the initial attempt before giving up.
    pub reconnect_num_tries: u32,
    /// Delay before each reconnection attempt.
    #[serde(rename = "reconnectIntervalMillis", deserialize_with = "deserialize_millis")]
    pub reconnect_interval: Duration,
}

impl Default for QwsOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            extra_connect_args: BTreeMap::new(),
            reconnect: true,
            reconnect_num_tries: DEFAULT_RECONNECT_NUM_TRIES,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }
}

impl QwsOptions {
    /// Set the connection name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an extra query parameter sent on every (re)connect.
    #[must_use]
    pub fn extra_connect_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_connect_args.insert(key.into(), value.into());
        self
    }

    /// Enable or disable reconnection.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Set the number of retries after the initial attempt.
    #[must_use]
    pub fn reconnect_num_tries(mut self, tries: u32) -> Self {
        self.reconnect_num_tries = tries;
        self
    }

    /// Set the delay before each reconnection attempt.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = QwsOptions::default();
        assert_eq!(options.name, "websocket");
        assert!(options.reconnect);
        assert_eq!(options.reconnect_num_tries, 12);
        assert_eq!(options.reconnect_interval, Duration::from_secs(5));
        assert!(options.extra_connect_args.is_empty());
    }

    #[test]
    fn deserialises_camel_case_keys() {
        let options: QwsOptions = serde_json::from_str(
            r#"{
                "name": "uploader",
                "extraConnectArgs": {"token": "abc"},
                "reconnect": false,
                "reconnectNumTries": 2,
                "reconnectIntervalMillis": 250
            }"#,
        )
        .expect("valid options");

        assert_eq!(
            options,
            QwsOptions::default()
                .name("uploader")
                .extra_connect_arg("token", "abc")
                .reconnect(false)
                .reconnect_num_tries(2)
                .reconnect_interval(Duration::from_millis(250))
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let options: QwsOptions =
            serde_json::from_str(r#"{"reconnectNumTries": 1}"#).expect("valid options");
        assert_eq!(options.name, DEFAULT_NAME);
        assert_eq!(options.reconnect_num_tries, 1);
        assert_eq!(options.reconnect_interval, DEFAULT_RECONNECT_INTERVAL);
    }
}
