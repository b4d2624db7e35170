use super::{ActivityOutcome, RewardEngine};
use crate::events::LedgerEvent;
use finova_common::{
    ActivityEvent, ActivityPayload, ActivityType, EventId, Platform, Result, RpSource, UserId,
};
use finova_ledger::{AppendOutcome, LedgerEntry};
use finova_rewards::bonus::{BonusStack, Target};
use rust_decimal::Decimal;
use tracing::{info, instrument};

impl RewardEngine {
    /// Award XP for a verified platform activity
    ///
    /// A repeated `event_id` returns the original outcome with
    /// `duplicate = true` and changes nothing.
    #[instrument(skip(self, payload), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn record_activity(
        &self,
        user_id: &UserId,
        platform: Platform,
        activity_type: ActivityType,
        payload: ActivityPayload,
        event_id: EventId,
    ) -> Result<ActivityOutcome> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed(&entry, user_id);
        }

        let scope = self.begin(user_id, &[]).await?;
        // A concurrent call with the same id may have committed while we waited
        if let Some(entry) = self.prior(&event_id) {
            return replayed(&entry, user_id);
        }
        let now = scope.now;

        let activity = ActivityEvent {
            event_id: event_id.clone(),
            user_id: user_id.clone(),
            platform,
            activity_type,
            timestamp: now,
            payload,
        };

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        let stack = BonusStack::for_user(state, &self.policy, now);
        let bonus = self.bonuses.resolve(Target::Xp, 1.0, &stack);
        let (xp_delta, progress) = self.xp.apply(&state.xp, &activity, bonus.combined_multiplier)?;

        state.xp = progress;
        state.last_active_at = now;
        state.cards.retain(|c| !bonus.consumed.contains(&c.card_id));
        draft.gain(user_id, xp_delta.awarded, 0.0, Decimal::ZERO);

        let ancestors = self.ancestors(user_id);
        let rp = self.distribute_rp(&mut draft, &ancestors, xp_delta.awarded as f64, RpSource::Xp)?;

        let event = LedgerEvent::ActivityRecorded {
            activity,
            xp: xp_delta.clone(),
            bonus,
            rp: rp.clone(),
        };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed(&entry, user_id);
        }

        self.metrics.activities_recorded.inc();
        self.metrics.xp_awarded.observe(xp_delta.awarded as f64);
        if xp_delta.leveled_up() {
            info!(level = xp_delta.level_after, total_xp = xp_delta.total_xp, "Level up");
        }

        Ok(ActivityOutcome {
            new_level: xp_delta.leveled_up().then_some(xp_delta.level_after),
            xp_delta,
            duplicate: false,
            referral_points: rp,
        })
    }
}

fn replayed(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<ActivityOutcome> {
    match &entry.event {
        LedgerEvent::ActivityRecorded { activity, xp, rp, .. } if &activity.user_id == user_id => {
            Ok(ActivityOutcome {
                xp_delta: xp.clone(),
                new_level: xp.leveled_up().then_some(xp.level_after),
                duplicate: true,
                referral_points: rp.clone(),
            })
        }
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineSettings;
    use crate::engine::RewardEngine;
    use crate::events::LedgerEvent;
    use finova_common::{
        ActivityPayload, ActivityType, EventId, FinovaError, ManualClock, Platform, UserId,
    };
    use finova_ledger::{EventLedger, MemoryStore};
    use std::sync::Arc;

    async fn engine() -> RewardEngine {
        let ledger = Arc::new(
            EventLedger::open(Arc::new(MemoryStore::<LedgerEvent>::new()))
                .await
                .unwrap(),
        );
        RewardEngine::new(EngineSettings::default(), Arc::new(ManualClock::new(0)), ledger).unwrap()
    }

    fn post() -> ActivityPayload {
        ActivityPayload::new().with("content_id", "c-1")
    }

    #[tokio::test]
    async fn test_replay_returns_original_outcome() {
        let engine = engine().await;
        let alice = UserId::new("alice").unwrap();
        engine.register_user(alice.clone(), None).await.unwrap();

        let id = EventId::new("evt-1").unwrap();
        let first = engine
            .record_activity(&alice, Platform::App, ActivityType::DailyLogin, ActivityPayload::new(), id.clone())
            .await
            .unwrap();
        let second = engine
            .record_activity(&alice, Platform::App, ActivityType::DailyLogin, ActivityPayload::new(), id)
            .await
            .unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.xp_delta, second.xp_delta);
        assert_eq!(engine.user_profile(&alice).unwrap().total_xp, first.xp_delta.awarded);
    }

    #[tokio::test]
    async fn test_event_id_owned_by_other_user() {
        let engine = engine().await;
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        engine.register_user(alice.clone(), None).await.unwrap();
        engine.register_user(bob.clone(), None).await.unwrap();

        let id = EventId::new("evt-1").unwrap();
        engine
            .record_activity(&alice, Platform::TikTok, ActivityType::OriginalPost, post(), id.clone())
            .await
            .unwrap();
        let result = engine
            .record_activity(&bob, Platform::TikTok, ActivityType::OriginalPost, post(), id)
            .await;
        assert!(matches!(result, Err(FinovaError::InvalidInput(_))));
        assert_eq!(engine.user_profile(&bob).unwrap().total_xp, 0);
    }

    #[tokio::test]
    async fn test_unsupported_activity_changes_nothing() {
        let engine = engine().await;
        let alice = UserId::new("alice").unwrap();
        engine.register_user(alice.clone(), None).await.unwrap();
        let entries = engine.ledger().len();

        let result = engine
            .record_activity(
                &alice,
                Platform::X,
                ActivityType::Story,
                ActivityPayload::new(),
                EventId::new("evt-x").unwrap(),
            )
            .await;
        assert!(matches!(result, Err(FinovaError::UnsupportedActivity { .. })));
        assert_eq!(engine.ledger().len(), entries);
    }
}
