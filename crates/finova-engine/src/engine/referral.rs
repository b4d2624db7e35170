//! Registration and referral linking

use super::{ReferralApplied, RewardEngine, UserProfile};
use crate::events::LedgerEvent;
use finova_common::{EventId, FinovaError, IdentitySignal, Result, UserId, UserState};
use finova_ledger::UserDelta;
use finova_rewards::referral::codes;
use rust_decimal::Decimal;
use tracing::{info, instrument};

impl RewardEngine {
    /// Create a user; registering an existing user returns its profile
    #[instrument(skip(self, identity), fields(user_id = %user_id))]
    pub async fn register_user(
        &self,
        user_id: UserId,
        identity: Option<IdentitySignal>,
    ) -> Result<UserProfile> {
        let _link = self.link_gate.lock().await;
        if self.slots.contains_key(&user_id) {
            return self.user_profile(&user_id);
        }
        let now = self.clock.now_ms();

        let referral_code = codes::candidates(&user_id)
            .find(|code| !self.codes.contains_key(code))
            .ok_or_else(|| {
                FinovaError::Internal(format!("no free referral code for {}", user_id))
            })?;

        let mut state = UserState::new(user_id.clone(), now);
        state.referral_code = referral_code.clone();
        if let Some(signal) = identity {
            state.trust = self.trust.apply_identity(&state.trust, signal, now).score;
        }
        state.version = 1;

        let event = LedgerEvent::UserRegistered {
            user_id: user_id.clone(),
            referral_code,
            identity,
        };
        self.append(
            EventId::generate("register"),
            &user_id,
            now,
            event,
            vec![UserDelta::state(state)],
        )
        .await?;

        info!("User registered");
        self.user_profile(&user_id)
    }

    /// Link `user_id` under the owner of `code`
    ///
    /// The referrer receives the signup bonus in RP. Self-referral, a second
    /// referrer, or an edge that would close a cycle is rejected and leaves
    /// the graph unchanged.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn apply_referral_code(&self, user_id: &UserId, code: &str) -> Result<ReferralApplied> {
        let code = codes::normalize(code);
        let referrer = self
            .codes
            .get(&code)
            .map(|owner| owner.value().clone())
            .ok_or_else(|| FinovaError::InvalidInput(format!("unknown referral code {}", code)))?;

        let _link = self.link_gate.lock().await;
        let scope = self.begin(user_id, std::slice::from_ref(&referrer)).await?;
        self.forest.read().check_edge(&referrer, user_id)?;

        let signup_bonus = self.policy.referral.signup_bonus;
        let mut draft = self.draft(&scope)?;
        draft.user(user_id)?.referrer = Some(referrer.clone());
        draft.user(&referrer)?.rp += signup_bonus;
        draft.gain(&referrer, 0, signup_bonus, Decimal::ZERO);

        let event = LedgerEvent::ReferralLinked {
            referrer: referrer.clone(),
            referee: user_id.clone(),
            code,
            signup_bonus,
        };
        self.commit(EventId::generate("referral"), user_id, event, draft)
            .await?;

        info!(%referrer, "Referral linked");
        Ok(ReferralApplied {
            referrer_id: referrer,
        })
    }
}
