//! Structural validation of trust evidence

use finova_common::policy::TrustPolicy;
use finova_common::{EvidenceKind, FinovaError, Result, TrustEvidence};

/// Reject evidence that is malformed for its kind
pub fn validate(policy: &TrustPolicy, evidence: &TrustEvidence) -> Result<()> {
    if !evidence.signal.is_finite() || !(-1.0..=1.0).contains(&evidence.signal) {
        return Err(FinovaError::EvidenceRejected(format!(
            "{} signal {} outside [-1, 1]",
            evidence.kind, evidence.signal
        )));
    }

    let rule = policy.rule(evidence.kind).ok_or_else(|| {
        FinovaError::EvidenceRejected(format!("no rule for evidence kind {}", evidence.kind))
    })?;

    for attr in &rule.required_attributes {
        match evidence.attributes.get(attr) {
            Some(v) if !v.is_null() => {}
            _ => {
                return Err(FinovaError::EvidenceRejected(format!(
                    "{} evidence missing '{}'",
                    evidence.kind, attr
                )))
            }
        }
    }

    if evidence.kind == EvidenceKind::Captcha && passed_flag(evidence).is_none() {
        return Err(FinovaError::EvidenceRejected(
            "captcha 'passed' must be a boolean".to_string(),
        ));
    }

    Ok(())
}

fn passed_flag(evidence: &TrustEvidence) -> Option<bool> {
    evidence.attributes.get("passed").and_then(|v| v.as_bool())
}

/// Whether the evidence is a passing proof of humanity
pub fn is_passing_proof(policy: &TrustPolicy, evidence: &TrustEvidence) -> bool {
    evidence.kind == EvidenceKind::Captcha
        && passed_flag(evidence) == Some(true)
        && evidence.signal >= policy.proof_min_signal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TrustPolicy {
        TrustPolicy::default()
    }

    #[test]
    fn test_missing_attribute_rejected() {
        let evidence = TrustEvidence::new(EvidenceKind::Biometric, 0.5, 0);
        let err = validate(&policy(), &evidence).unwrap_err();
        assert!(matches!(err, FinovaError::EvidenceRejected(_)));

        let evidence = evidence.with("liveness", 0.98);
        assert!(validate(&policy(), &evidence).is_ok());
    }

    #[test]
    fn test_signal_out_of_range_rejected() {
        let evidence = TrustEvidence::new(EvidenceKind::Behavioral, 1.5, 0).with("session_pattern", "steady");
        assert!(validate(&policy(), &evidence).is_err());

        let evidence = TrustEvidence::new(EvidenceKind::Behavioral, f64::NAN, 0).with("session_pattern", "steady");
        assert!(validate(&policy(), &evidence).is_err());
    }

    #[test]
    fn test_captcha_requires_boolean_passed() {
        let evidence = TrustEvidence::new(EvidenceKind::Captcha, 1.0, 0)
            .with("challenge_id", "c-1")
            .with("passed", "yes");
        assert!(validate(&policy(), &evidence).is_err());
    }

    #[test]
    fn test_passing_proof() {
        let proof = TrustEvidence::new(EvidenceKind::Captcha, 0.9, 0)
            .with("challenge_id", "c-1")
            .with("passed", true);
        assert!(is_passing_proof(&policy(), &proof));

        let weak = TrustEvidence::new(EvidenceKind::Captcha, 0.2, 0)
            .with("challenge_id", "c-1")
            .with("passed", true);
        assert!(!is_passing_proof(&policy(), &weak));

        let failed = TrustEvidence::new(EvidenceKind::Captcha, 0.9, 0)
            .with("challenge_id", "c-1")
            .with("passed", false);
        assert!(!is_passing_proof(&policy(), &failed));
    }
}
