use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One shell invocation as written by the shell hook.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CmdEvent {
    #[serde(rename = "type")]
    pub kind: String, // Event tag, always "cmd" today
    #[serde(with = "ts_format")]
    pub ts: DateTime<FixedOffset>, // Completion timestamp
    pub shell: String,
    pub host: String,
    pub user: String,
    pub cwd: String, // Absolute working directory
    pub cmd: String, // Raw command text
    pub exit: i32,   // Exit code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl Default for CmdEvent {
    fn default() -> Self {
        Self {
            kind: "cmd".to_string(),
            ts: DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
            shell: String::new(),
            host: String::new(),
            user: String::new(),
            cwd: String::new(),
            cmd: String::new(),
            exit: 0,
            duration_ms: None,
        }
    }
}

/// Which part of the log a selection was taken from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeKind {
    #[serde(rename = "repo")]
    Repo,
    #[serde(rename = "global")]
    Global,
    /// Decided at pick time from the current directory.
    #[default]
    #[serde(rename = "")]
    Auto,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Repo => "repo",
            ScopeKind::Global => "global",
            ScopeKind::Auto => "",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Auto => f.write_str("auto"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A user-curated snapshot of events, in the order the user asked for them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Selection {
    pub id: String,         // Derived from creation time
    pub created_at: String, // RFC 3339
    #[serde(default)]
    pub scope: ScopeKind,
    #[serde(default)]
    pub repo_root: String, // Empty when global
    pub items: Vec<CmdEvent>,
}

/// Accepts RFC 3339 as well as the `+0000` offset form that `date +%z` prints.
mod ts_format {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const HOOK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

    pub fn serialize<S>(ts: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .or_else(|_| DateTime::parse_from_str(&raw, HOOK_FORMAT))
            .map_err(|e| de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
    }
}
