// mongotool/src/restore/compatibility.rs
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// A mongod release, compared by release series (major.minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MongoVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl MongoVersion {
    pub fn series(&self) -> (u32, u32) {
        (self.major, self.minor)
    }
}

impl fmt::Display for MongoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?").expect("static version regex"))
}

impl FromStr for MongoVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = version_regex()
            .captures(s.trim())
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a mongod version", s))?;
        let number = |i: usize| -> anyhow::Result<Option<u32>> {
            caps.get(i)
                .map(|m| m.as_str().parse::<u32>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("'{}' is not a mongod version: {}", s, e))
        };
        Ok(MongoVersion {
            major: number(1)?.unwrap_or_default(),
            minor: number(2)?.unwrap_or_default(),
            patch: number(3)?,
        })
    }
}

impl<'de> Deserialize<'de> for MongoVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncompatibleVersions {
    #[error("backup's mongod version ({backup}) is not compatible with mongod {target}")]
    Rejected { backup: String, target: String },

    #[error("unable to parse mongod version '{0}'")]
    Unparseable(String),
}

/// One row of the compatibility table. Bounds are inclusive release series; a
/// missing bound is open.
#[derive(Debug, Clone, Deserialize)]
pub struct CompatibilityRule {
    pub backup_min: Option<MongoVersion>,
    pub backup_max: Option<MongoVersion>,
    pub target_min: Option<MongoVersion>,
    pub target_max: Option<MongoVersion>,
    pub allow: bool,
}

fn within(v: &MongoVersion, min: Option<&MongoVersion>, max: Option<&MongoVersion>) -> bool {
    min.is_none_or(|m| v.series() >= m.series()) && max.is_none_or(|m| v.series() <= m.series())
}

impl CompatibilityRule {
    fn matches(&self, backup: &MongoVersion, target: &MongoVersion) -> bool {
        within(backup, self.backup_min.as_ref(), self.backup_max.as_ref())
            && within(target, self.target_min.as_ref(), self.target_max.as_ref())
    }
}

/// Decides which backup/target version pairs can be restored together.
///
/// Rules are checked in order and the first match wins. Pairs no rule matches
/// are allowed only within one release series.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityPolicy {
    rules: Vec<CompatibilityRule>,
}

impl CompatibilityPolicy {
    pub fn new(rules: Vec<CompatibilityRule>) -> Self {
        CompatibilityPolicy { rules }
    }

    pub fn is_compatible(&self, backup: &MongoVersion, target: &MongoVersion) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.matches(backup, target))
            .map(|rule| rule.allow)
            .unwrap_or_else(|| backup.series() == target.series())
    }

    pub fn ensure_compatible(&self, backup: &str, target: &str) -> Result<(), IncompatibleVersions> {
        let backup_version: MongoVersion = backup
            .parse()
            .map_err(|_| IncompatibleVersions::Unparseable(backup.to_string()))?;
        let target_version: MongoVersion = target
            .parse()
            .map_err(|_| IncompatibleVersions::Unparseable(target.to_string()))?;

        if self.is_compatible(&backup_version, &target_version) {
            Ok(())
        } else {
            Err(IncompatibleVersions::Rejected {
                backup: backup.to_string(),
                target: target.to_string(),
            })
        }
    }
}
