//! Identifiers used across the engine
//!
//! User and event ids are caller-supplied strings and are validated on entry.
//! Session, stake and card ids are server-generated UUID v7 values.

use crate::error::{FinovaError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of caller-supplied identifiers
pub const MAX_ID_LEN: usize = 128;

fn validate_id(kind: &str, raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(FinovaError::InvalidInput(format!("{} must not be empty", kind)));
    }
    if raw.len() > MAX_ID_LEN {
        return Err(FinovaError::InvalidInput(format!(
            "{} exceeds {} bytes",
            kind, MAX_ID_LEN
        )));
    }
    if raw.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(FinovaError::InvalidInput(format!(
            "{} contains whitespace or control characters",
            kind
        )));
    }
    Ok(())
}

/// User identity key
///
/// Ordering is significant: multi-user writes acquire per-user locks in
/// ascending `UserId` order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_id("user_id", &raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique event id used for idempotence
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_id("event_id", &raw)?;
        Ok(Self(raw))
    }

    /// Server-generated id for operations that carry no caller event id
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = FinovaError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map($name)
                    .map_err(|e| FinovaError::InvalidInput(format!("invalid {}: {}", stringify!($name), e)))
            }
        }
    };
}

uuid_id!(
    /// Mining session id
    SessionId
);
uuid_id!(
    /// Staking position id
    StakePositionId
);
uuid_id!(
    /// Activated card instance id
    CardId
);

/// Guild identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(String);

impl GuildId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate_id("guild_id", &raw)?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
