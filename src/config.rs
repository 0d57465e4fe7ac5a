use crate::error::AdsResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// --- Defaults ---

/// Max wait (ms) for `adsready` after play has been requested.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Max wait (ms) for `adstart` after `readyforpreroll`.
pub const DEFAULT_PREROLL_TIMEOUT_MS: u64 = 100;

/// Max wait (ms) for `adstart` after `contentended`.
pub const DEFAULT_POSTROLL_TIMEOUT_MS: u64 = 100;

/// Device characteristics that change how the engine treats the element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Platform {
    pub ios: bool,
    pub iphone: bool,
    pub android: bool,
    /// Major iOS version, when known (e.g. "8").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_version: Option<String>,
}

impl Platform {
    pub fn desktop() -> Self {
        Platform::default()
    }

    pub fn iphone(version: &str) -> Self {
        Platform {
            ios: true,
            iphone: true,
            android: false,
            ios_version: Some(version.to_string()),
        }
    }

    pub fn android() -> Self {
        Platform {
            android: true,
            ..Platform::default()
        }
    }

    pub fn is_ios_version(&self, major: &str) -> bool {
        self.ios && self.ios_version.as_deref() == Some(major)
    }
}

/// Per-session settings. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_preroll_timeout")]
    pub preroll_timeout: u64,
    #[serde(default = "default_postroll_timeout")]
    pub postroll_timeout: u64,
    /// Log every state transition at info level.
    #[serde(default)]
    pub debug: bool,
    /// Ads are part of the content stream rather than a separate break.
    #[serde(default)]
    pub stitched_ads: bool,
    #[serde(default)]
    pub platform: Platform,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_preroll_timeout() -> u64 {
    DEFAULT_PREROLL_TIMEOUT_MS
}

fn default_postroll_timeout() -> u64 {
    DEFAULT_POSTROLL_TIMEOUT_MS
}

impl Default for AdsConfig {
    fn default() -> Self {
        AdsConfig {
            timeout: DEFAULT_TIMEOUT_MS,
            preroll_timeout: DEFAULT_PREROLL_TIMEOUT_MS,
            postroll_timeout: DEFAULT_POSTROLL_TIMEOUT_MS,
            debug: false,
            stitched_ads: false,
            platform: Platform::default(),
        }
    }
}

impl AdsConfig {
    pub fn from_json(data: &str) -> AdsResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> AdsResult<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_timeouts() {
        let config = AdsConfig::default();
        assert_eq!(config.timeout, 5000);
        assert_eq!(config.preroll_timeout, 100);
        assert_eq!(config.postroll_timeout, 100);
        assert!(!config.debug);
        assert!(!config.stitched_ads);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config = AdsConfig::from_json("{}").unwrap();
        assert_eq!(config, AdsConfig::default());
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        let json = r#"{"timeout": 800, "prerollTimeout": 50, "stitchedAds": true,
                       "platform": {"ios": true, "iphone": true, "iosVersion": "10"}}"#;
        let config = AdsConfig::from_json(json).unwrap();
        assert_eq!(config.timeout, 800);
        assert_eq!(config.preroll_timeout, 50);
        assert_eq!(config.postroll_timeout, 100);
        assert!(config.stitched_ads);
        assert!(config.platform.iphone);
        assert!(config.platform.is_ios_version("10"));
        assert!(!config.platform.is_ios_version("8"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(AdsConfig::from_json("{\"timeout\": \"soon\"}").is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"debug\": true}}").unwrap();
        let config = AdsConfig::load(file.path()).unwrap();
        assert!(config.debug);
    }
}
