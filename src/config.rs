use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend tuning. Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds allowed for establishing the control connection.
    pub timeout: u64,
    /// Use passive data connections instead of active ones.
    pub passive: bool,
    /// Ask the server for UTF-8 path names after login.
    pub utf8: bool,
    pub anonymous_user: String,
    pub anonymous_password: String,
}

impl Config {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: 10,
            passive: true,
            utf8: true,
            anonymous_user: "anonymous".to_owned(),
            anonymous_password: "anonymous@".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document() {
        let config: Config = serde_json::from_str(r#"{"timeout": 30, "passive": false}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.passive);
        assert!(config.utf8);
        assert_eq!(config.anonymous_user, "anonymous");
    }
}
