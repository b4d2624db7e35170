//! Error types for the Finova reward engine
//!
//! Provides a unified error type covering the externally visible error kinds
//! plus the component errors raised by the ledger, trust scorer and XP engine.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using FinovaError
pub type Result<T> = std::result::Result<T, FinovaError>;

/// How a caller is expected to react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Detected synchronously, never retried automatically
    Validation,
    /// Safe to retry with the same event id
    Transient,
    /// Not a failure of the call: the user must complete a remediation flow
    Remediation,
    /// Everything else
    Fatal,
}

/// Unified error type for engine operations
#[derive(Debug, Error)]
pub enum FinovaError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Identity verification required before this operation")]
    IdentityVerificationRequired,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("No active mining session")]
    SessionNotActive,

    #[error("A mining session is already active")]
    SessionAlreadyActive,

    #[error("Biometric check failed")]
    BiometricFailed,

    #[error("Proof of humanity required before mining can resume")]
    HumanityProofRequired,

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Referral edge {referrer} -> {referee} would create a cycle or a second parent")]
    CycleOrDuplicateParent { referrer: String, referee: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized")]
    Unauthorized,

    // Ledger
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // Trust scorer
    #[error("Evidence rejected: {0}")]
    EvidenceRejected(String),

    // XP engine
    #[error("Unsupported activity: {activity_type} on {platform}")]
    UnsupportedActivity { platform: String, activity_type: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FinovaError {
    /// Classify the error for retry and routing decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            FinovaError::InvalidInput(_)
            | FinovaError::CycleOrDuplicateParent { .. }
            | FinovaError::EvidenceRejected(_)
            | FinovaError::UnsupportedActivity { .. }
            | FinovaError::SessionNotActive
            | FinovaError::SessionAlreadyActive
            | FinovaError::InsufficientBalance { .. } => ErrorClass::Validation,

            FinovaError::NetworkUnavailable(_)
            | FinovaError::ServiceUnavailable(_)
            | FinovaError::StorageUnavailable(_)
            | FinovaError::RateLimited { .. } => ErrorClass::Transient,

            FinovaError::HumanityProofRequired | FinovaError::IdentityVerificationRequired => {
                ErrorClass::Remediation
            }

            FinovaError::AuthenticationFailed
            | FinovaError::BiometricFailed
            | FinovaError::Unauthorized
            | FinovaError::Config(_)
            | FinovaError::Serialization(_)
            | FinovaError::Internal(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the caller may retry the call with the same event id
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Whether the error is a user state to resolve rather than a failure
    pub fn requires_remediation(&self) -> bool {
        self.class() == ErrorClass::Remediation
    }

    /// Retry hint, only present for rate limiting
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FinovaError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }

    /// Stable machine-readable kind name
    pub fn kind(&self) -> &'static str {
        match self {
            FinovaError::NetworkUnavailable(_) => "NetworkUnavailable",
            FinovaError::AuthenticationFailed => "AuthenticationFailed",
            FinovaError::IdentityVerificationRequired => "IdentityVerificationRequired",
            FinovaError::InsufficientBalance { .. } => "InsufficientBalance",
            FinovaError::SessionNotActive => "SessionNotActive",
            FinovaError::SessionAlreadyActive => "SessionAlreadyActive",
            FinovaError::BiometricFailed => "BiometricFailed",
            FinovaError::HumanityProofRequired => "HumanityProofRequired",
            FinovaError::RateLimited { .. } => "RateLimited",
            FinovaError::InvalidInput(_) => "InvalidInput",
            FinovaError::CycleOrDuplicateParent { .. } => "CycleOrDuplicateParent",
            FinovaError::ServiceUnavailable(_) => "ServiceUnavailable",
            FinovaError::Unauthorized => "Unauthorized",
            FinovaError::StorageUnavailable(_) => "StorageUnavailable",
            FinovaError::EvidenceRejected(_) => "EvidenceRejected",
            FinovaError::UnsupportedActivity { .. } => "UnsupportedActivity",
            FinovaError::Config(_) => "Config",
            FinovaError::Serialization(_) => "Serialization",
            FinovaError::Internal(_) => "Internal",
        }
    }
}

impl From<serde_json::Error> for FinovaError {
    fn from(err: serde_json::Error) -> Self {
        FinovaError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for FinovaError {
    fn from(err: std::io::Error) -> Self {
        FinovaError::StorageUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for FinovaError {
    fn from(err: anyhow::Error) -> Self {
        FinovaError::Internal(err.to_string())
    }
}
