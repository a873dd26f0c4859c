// mongotool/src/config/settings.rs
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

pub const MONGODB_RESTORE_DISABLE_HOST_RESETUP: &str = "MONGODB_RESTORE_DISABLE_HOST_RESETUP";
pub const MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT: &str = "MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT";
pub const MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR: &str = "MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR";
pub const MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB: &str = "MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB";

const KNOWN_SETTINGS: &[&str] = &[
    MONGODB_RESTORE_DISABLE_HOST_RESETUP,
    MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT,
    MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR,
    MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB,
];

/// Read access to named settings.
pub trait SettingSource: Send + Sync {
    fn get_bool(&self, name: &str, default: bool) -> Result<bool>;

    /// Reads a whole number of seconds.
    fn get_duration(&self, name: &str, default: Duration) -> Result<Duration>;
}

/// Named settings from config.json, overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn from_json_map(map: &HashMap<String, serde_json::Value>) -> Result<Self> {
        let mut values = HashMap::new();
        for (name, value) in map {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => anyhow::bail!("setting {} has unsupported value {}", name, other),
            };
            values.insert(name.clone(), text);
        }
        Ok(Settings { values })
    }

    /// Only known setting names are taken from `env`.
    pub fn with_overrides<I>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in env {
            if KNOWN_SETTINGS.contains(&name.as_str()) {
                self.values.insert(name, value);
            }
        }
        self
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.trim())
    }
}

impl SettingSource for Settings {
    fn get_bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => parse_bool(value)
                .with_context(|| format!("setting {} has invalid boolean value '{}'", name, value)),
        }
    }

    fn get_duration(&self, name: &str, default: Duration) -> Result<Duration> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("setting {} must be a number of seconds, got '{}'", name, value)),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("'{}' is not a boolean", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        let map: HashMap<String, serde_json::Value> = serde_json::from_value(value).unwrap();
        Settings::from_json_map(&map).unwrap()
    }

    #[test]
    fn test_bool_defaults_when_missing() -> anyhow::Result<()> {
        let s = Settings::default();
        assert!(!s.get_bool(MONGODB_RESTORE_DISABLE_HOST_RESETUP, false)?);
        assert!(s.get_bool(MONGODB_RESTORE_DISABLE_HOST_RESETUP, true)?);
        Ok(())
    }

    #[test]
    fn test_bool_spellings() -> anyhow::Result<()> {
        for (raw, expected) in [("true", true), ("YES", true), ("1", true), ("off", false), (" False ", false)] {
            let s = settings(json!({ MONGODB_RESTORE_DISABLE_HOST_RESETUP: raw }));
            assert_eq!(s.get_bool(MONGODB_RESTORE_DISABLE_HOST_RESETUP, !expected)?, expected, "{raw}");
        }
        Ok(())
    }

    #[test]
    fn test_invalid_bool_names_the_setting() {
        let s = settings(json!({ MONGODB_RESTORE_DISABLE_HOST_RESETUP: "maybe" }));
        let err = s.get_bool(MONGODB_RESTORE_DISABLE_HOST_RESETUP, false).unwrap_err();
        assert!(err.to_string().contains(MONGODB_RESTORE_DISABLE_HOST_RESETUP));
    }

    #[test]
    fn test_durations_are_seconds() -> anyhow::Result<()> {
        let s = settings(json!({ MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT: 90 }));
        assert_eq!(
            s.get_duration(MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT, Duration::from_secs(1))?,
            Duration::from_secs(90)
        );
        assert_eq!(
            s.get_duration(MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR, Duration::from_secs(7))?,
            Duration::from_secs(7)
        );

        let s = settings(json!({ MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT: "ten" }));
        assert!(s.get_duration(MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT, Duration::ZERO).is_err());
        Ok(())
    }

    #[test]
    fn test_unknown_environment_variables_are_ignored() {
        let s = Settings::default().with_overrides(vec![
            ("AWS_SECRET_ACCESS_KEY".to_string(), "secret".to_string()),
            (MONGODB_RESTORE_DISABLE_HOST_RESETUP.to_string(), "true".to_string()),
        ]);
        assert!(s.get("AWS_SECRET_ACCESS_KEY").is_none());
        assert_eq!(s.get(MONGODB_RESTORE_DISABLE_HOST_RESETUP), Some("true"));
    }

    #[test]
    fn test_nested_json_values_are_rejected() {
        let map: HashMap<String, serde_json::Value> =
            serde_json::from_value(json!({ "X": { "nested": true } })).unwrap();
        assert!(Settings::from_json_map(&map).is_err());
    }
}
