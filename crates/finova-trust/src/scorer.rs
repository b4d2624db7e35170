//! Trust scorer
//!
//! Score = clamp(baseline + Σ weight_k × tanh(mass_k) + identity + proof_bonus, 0, 1)
//!
//! The n-th piece of evidence of one kind is damped by `damping^n` before it
//! is added to that kind's mass, so repeated evidence has diminishing returns
//! and no single kind can move the score by more than its weight.

use crate::evidence;
use finova_common::policy::TrustPolicy;
use finova_common::types::trust_score::{MAX_SCORE, MIN_SCORE};
use finova_common::{EvidenceKind, FinovaError, IdentitySignal, Result, TrustEvidence, TrustScore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Result of folding evidence into a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustUpdate {
    pub score: TrustScore,
    pub previous_score: f64,
    /// The update set the humanity-proof flag
    pub newly_flagged: bool,
    /// A passing proof cleared the flag
    pub proof_accepted: bool,
}

impl TrustUpdate {
    pub fn delta(&self) -> f64 {
        self.score.score - self.previous_score
    }
}

pub struct TrustScorer {
    policy: TrustPolicy,
}

impl TrustScorer {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Fold one piece of evidence into the user's score
    #[instrument(skip(self, current, evidence), fields(kind = %evidence.kind))]
    pub fn evaluate(
        &self,
        current: &TrustScore,
        evidence: &TrustEvidence,
        now: i64,
    ) -> Result<TrustUpdate> {
        evidence::validate(&self.policy, evidence)?;

        let mut score = current.clone();
        self.fold(&mut score, evidence);

        let proof_accepted =
            score.humanity_proof_required && evidence::is_passing_proof(&self.policy, evidence);
        if proof_accepted {
            self.accept_proof(&mut score);
        }

        Ok(self.finish(current, score, now, proof_accepted))
    }

    /// Record a proof-of-humanity challenge result
    ///
    /// A passing proof clears the humanity-proof flag and lifts the score to
    /// at least `floor + proof_lift`. A failing proof is recorded as evidence.
    #[instrument(skip(self, current, proof))]
    pub fn submit_proof(
        &self,
        current: &TrustScore,
        proof: &TrustEvidence,
        now: i64,
    ) -> Result<TrustUpdate> {
        if proof.kind != EvidenceKind::Captcha {
            return Err(FinovaError::EvidenceRejected(format!(
                "proof of humanity must be captcha evidence, got {}",
                proof.kind
            )));
        }
        evidence::validate(&self.policy, proof)?;

        let mut score = current.clone();
        self.fold(&mut score, proof);

        let proof_accepted = evidence::is_passing_proof(&self.policy, proof);
        if proof_accepted {
            self.accept_proof(&mut score);
        }

        Ok(self.finish(current, score, now, proof_accepted))
    }

    /// Apply the identity provider's verdict
    pub fn apply_identity(
        &self,
        current: &TrustScore,
        signal: IdentitySignal,
        now: i64,
    ) -> TrustUpdate {
        let mut score = current.clone();
        score.identity = Some(signal);
        score.identity_contribution = if signal.verified {
            self.policy.identity_contribution(signal.risk_tier)
        } else {
            0.0
        };
        self.finish(current, score, now, false)
    }

    /// Composite score for the current components
    pub fn composite(&self, score: &TrustScore) -> f64 {
        let raw = self.raw_composite(score);
        if raw.is_finite() {
            raw.clamp(MIN_SCORE, MAX_SCORE)
        } else {
            MIN_SCORE
        }
    }

    fn raw_composite(&self, score: &TrustScore) -> f64 {
        let evidence: f64 = score
            .components
            .iter()
            .map(|(kind, agg)| {
                let weight = self.policy.rule(*kind).map(|r| r.weight).unwrap_or(0.0);
                weight * agg.net_mass.tanh()
            })
            .sum();

        self.policy.baseline + evidence + score.identity_contribution + score.proof_bonus
    }

    fn fold(&self, score: &mut TrustScore, evidence: &TrustEvidence) {
        let agg = score.components.entry(evidence.kind).or_default();
        let damping = self.policy.same_type_damping.powi(agg.count.min(i32::MAX as u64) as i32);
        agg.net_mass += evidence.signal * damping;
        agg.count += 1;
    }

    fn accept_proof(&self, score: &mut TrustScore) {
        score.humanity_proof_required = false;
        let target = (self.policy.humanity_floor + self.policy.proof_lift).min(MAX_SCORE);
        let raw = self.raw_composite(score);
        if raw.is_finite() && raw < target {
            score.proof_bonus += target - raw;
        }
    }

    fn finish(
        &self,
        current: &TrustScore,
        mut score: TrustScore,
        now: i64,
        proof_accepted: bool,
    ) -> TrustUpdate {
        score.score = self.composite(&score);

        let was_flagged = current.humanity_proof_required;
        if score.score < self.policy.humanity_floor {
            score.humanity_proof_required = true;
        }
        let newly_flagged = score.humanity_proof_required && !was_flagged;

        score.updated_at = now;
        score.version += 1;

        if newly_flagged {
            info!(score = score.score, floor = self.policy.humanity_floor, "Humanity proof required");
        } else if proof_accepted {
            info!(score = score.score, "Humanity proof accepted");
        } else {
            debug!(previous = current.score, score = score.score, "Trust score updated");
        }

        TrustUpdate {
            score,
            previous_score: current.score,
            newly_flagged,
            proof_accepted,
        }
    }
}
