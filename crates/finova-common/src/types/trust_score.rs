//! TrustScore - confidence that a user is a genuine human (0.0 - 1.0)
//!
//! TrustScore affects:
//! - Mining eligibility (below the humanity floor the rate is forced to zero)
//! - The security factor of the mining rate
//!
//! The aggregate is a projection of append-only evidence; individual evidence
//! is never deleted, only folded into the per-kind components below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum possible trust score
pub const MAX_SCORE: f64 = 1.0;

/// Minimum possible trust score
pub const MIN_SCORE: f64 = 0.0;

/// Starting trust score for new users
pub const DEFAULT_SCORE: f64 = 0.5;

/// Category of trust evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Behavioral,
    Biometric,
    SocialGraph,
    /// Challenge-response proof of humanity
    Captcha,
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EvidenceKind::Behavioral => "behavioral",
            EvidenceKind::Biometric => "biometric",
            EvidenceKind::SocialGraph => "social_graph",
            EvidenceKind::Captcha => "captcha",
        };
        f.write_str(name)
    }
}

/// One piece of trust evidence produced by an external collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEvidence {
    pub kind: EvidenceKind,
    /// Signed contribution in [-1, 1]; negative values are suspicion
    pub signal: f64,
    /// Observation time (Unix millis)
    pub observed_at: i64,
    /// Kind-specific attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl TrustEvidence {
    pub fn new(kind: EvidenceKind, signal: f64, observed_at: i64) -> Self {
        Self {
            kind,
            signal,
            observed_at,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// KYC risk tier reported by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Identity verification signal (verified flag + risk tier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySignal {
    pub verified: bool,
    pub risk_tier: RiskTier,
}

impl IdentitySignal {
    pub fn unverified() -> Self {
        Self {
            verified: false,
            risk_tier: RiskTier::High,
        }
    }
}

/// Aggregated evidence of a single kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindAggregate {
    /// Number of evidence items folded in
    pub count: u64,
    /// Damped signal mass
    pub net_mass: f64,
}

/// User trust score with component breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    /// Composite score in [0, 1]
    pub score: f64,

    /// Per-kind aggregates
    pub components: BTreeMap<EvidenceKind, KindAggregate>,

    /// Contribution of the identity (KYC) signal
    pub identity_contribution: f64,

    /// Latest identity signal, if any
    pub identity: Option<IdentitySignal>,

    /// Set when the score fell below the humanity floor; cleared only by a
    /// passing proof of humanity
    pub humanity_proof_required: bool,

    /// Offset granted by passing proofs so the score clears the floor
    pub proof_bonus: f64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,

    /// Version for optimistic concurrency
    pub version: u64,
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TrustScore {
    /// Create a new TrustScore at the default score
    pub fn new(now: i64) -> Self {
        Self {
            score: DEFAULT_SCORE,
            components: BTreeMap::new(),
            identity_contribution: 0.0,
            identity: None,
            humanity_proof_required: false,
            proof_bonus: 0.0,
            updated_at: now,
            version: 0,
        }
    }

    /// Total evidence items folded in
    pub fn evidence_count(&self) -> u64 {
        self.components.values().map(|c| c.count).sum()
    }

    /// Whether the identity provider has verified this user
    pub fn identity_verified(&self) -> bool {
        self.identity.map(|i| i.verified).unwrap_or(false)
    }

    /// Check if the score meets a threshold
    pub fn meets_threshold(&self, min_score: f64) -> bool {
        self.score >= min_score
    }
}

impl std::fmt::Display for TrustScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrustScore({:.3}, evidence={}, proof_required={})",
            self.score,
            self.evidence_count(),
            self.humanity_proof_required
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trust_score() {
        let score = TrustScore::new(1_000);
        assert!((score.score - DEFAULT_SCORE).abs() < f64::EPSILON);
        assert_eq!(score.evidence_count(), 0);
        assert!(!score.humanity_proof_required);
        assert!(!score.identity_verified());
    }

    #[test]
    fn test_meets_threshold() {
        let mut score = TrustScore::new(0);
        score.score = 0.8;
        assert!(score.meets_threshold(0.8));
        assert!(!score.meets_threshold(0.81));
    }

    #[test]
    fn test_evidence_kind_serde() {
        let json = serde_json::to_string(&EvidenceKind::SocialGraph).unwrap();
        assert_eq!(json, "\"social_graph\"");
    }
}
