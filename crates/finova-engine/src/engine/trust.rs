use super::RewardEngine;
use crate::events::LedgerEvent;
use finova_common::{EventId, IdentitySignal, Result, TrustEvidence, UserId};
use finova_ledger::{AppendOutcome, LedgerEntry};
use finova_trust::TrustUpdate;
use tracing::{instrument, warn};

enum TrustInput {
    Evidence(TrustEvidence),
    Proof(TrustEvidence),
    Identity(IdentitySignal),
}

impl RewardEngine {
    /// Fold behavioral, biometric, social-graph or captcha evidence into the
    /// user's trust score
    #[instrument(skip(self, evidence), fields(user_id = %user_id, kind = %evidence.kind))]
    pub async fn submit_trust_evidence(
        &self,
        user_id: &UserId,
        evidence: TrustEvidence,
        event_id: EventId,
    ) -> Result<TrustUpdate> {
        self.record_trust(user_id, TrustInput::Evidence(evidence), event_id).await
    }

    /// Record a proof-of-humanity challenge; a passing proof clears the flag
    #[instrument(skip(self, proof), fields(user_id = %user_id))]
    pub async fn submit_humanity_proof(
        &self,
        user_id: &UserId,
        proof: TrustEvidence,
        event_id: EventId,
    ) -> Result<TrustUpdate> {
        self.record_trust(user_id, TrustInput::Proof(proof), event_id).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn apply_identity_signal(
        &self,
        user_id: &UserId,
        signal: IdentitySignal,
        event_id: EventId,
    ) -> Result<TrustUpdate> {
        self.record_trust(user_id, TrustInput::Identity(signal), event_id).await
    }

    async fn record_trust(
        &self,
        user_id: &UserId,
        input: TrustInput,
        event_id: EventId,
    ) -> Result<TrustUpdate> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed(&entry, user_id);
        }
        let now = scope.now;

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        let (update, event) = match input {
            TrustInput::Evidence(evidence) => {
                let update = self.trust.evaluate(&state.trust, &evidence, now)?;
                let event = LedgerEvent::TrustEvidenceRecorded {
                    evidence,
                    update: update.clone(),
                    proof: false,
                };
                (update, event)
            }
            TrustInput::Proof(proof) => {
                let update = self.trust.submit_proof(&state.trust, &proof, now)?;
                let event = LedgerEvent::TrustEvidenceRecorded {
                    evidence: proof,
                    update: update.clone(),
                    proof: true,
                };
                (update, event)
            }
            TrustInput::Identity(signal) => {
                let update = self.trust.apply_identity(&state.trust, signal, now);
                let event = LedgerEvent::IdentitySignalRecorded {
                    signal,
                    update: update.clone(),
                };
                (update, event)
            }
        };
        state.trust = update.score.clone();

        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed(&entry, user_id);
        }
        if update.newly_flagged {
            warn!(score = update.score.score, "User flagged, mining rate suspended");
        }
        Ok(update)
    }
}

fn replayed(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<TrustUpdate> {
    match &entry.event {
        LedgerEvent::TrustEvidenceRecorded { update, .. }
        | LedgerEvent::IdentitySignalRecorded { update, .. }
            if &entry.user_id == user_id =>
        {
            Ok(update.clone())
        }
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}
