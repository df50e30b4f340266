use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::secret::Secret;

/// A human-readable duration (e.g. `"500ms"`, `"5m"`, `"1h"`), deserialized
/// from and serialized to that short-unit string form rather than a bare
/// integer, so the config file reads the way an operator writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HumanDuration(pub std::time::Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<std::time::Duration> for HumanDuration {
    fn from(d: std::time::Duration) -> Self {
        HumanDuration(d)
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, unit) = if s.ends_with("ms") {
            (&s[..s.len() - 2], "ms")
        } else if s.ends_with('s') {
            (&s[..s.len() - 1], "s")
        } else if s.ends_with('m') {
            (&s[..s.len() - 1], "m")
        } else if s.ends_with('h') {
            (&s[..s.len() - 1], "h")
        } else if s.ends_with('d') {
            (&s[..s.len() - 1], "d")
        } else {
            return Err(format!("invalid duration format: {s}"));
        };

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("invalid number in duration: {s}"))?;

        let duration = match unit {
            "ms" => std::time::Duration::from_millis(num),
            "s" => std::time::Duration::from_secs(num),
            "m" => std::time::Duration::from_secs(num * 60),
            "h" => std::time::Duration::from_secs(num * 3600),
            "d" => std::time::Duration::from_secs(num * 86400),
            _ => return Err(format!("unknown duration unit: {unit}")),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        let secs = self.0.as_secs();
        if millis < 1000 {
            write!(f, "{millis}ms")
        } else if secs < 60 {
            write!(f, "{secs}s")
        } else if secs < 3600 {
            write!(f, "{}m", secs / 60)
        } else if secs < 86400 {
            write!(f, "{}h", secs / 3600)
        } else {
            write!(f, "{}d", secs / 86400)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// `server.*` -- connection details for the remote workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<Secret>,
    pub user_id: String,
}

/// `sync.*` -- periodic full-reconciliation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub local_folder: PathBuf,
    #[serde(default)]
    pub interval: HumanDuration,
    #[serde(default)]
    pub bidirectional: bool,
}

/// `watch.*` -- the local-change watcher's debounce policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "crate::defaults::default_debounce")]
    pub debounce: HumanDuration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            enabled: true,
            debounce: crate::defaults::default_debounce(),
        }
    }
}

/// The full configuration record the sync daemon core accepts, per spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDaemonConfig {
    pub server: ServerConfig,
    pub sync: SyncSettings,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default = "crate::defaults::default_ignore_patterns")]
    pub ignore: Vec<String>,
}
