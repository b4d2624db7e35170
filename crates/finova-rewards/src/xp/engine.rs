//! XP engine
//!
//! XP = base × platform × quality × repetition × streak × level damping × bonus,
//! clamped to the platform's remaining budget for the rolling window.

use finova_common::policy::XpPolicy;
use finova_common::{
    ActivityEvent, ActivityPayload, FinovaError, Result, XpAward, XpProgress,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Breakdown of one XP award
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpDelta {
    pub awarded: u64,
    pub base: u64,
    pub platform_multiplier: f64,
    pub quality: f64,
    pub repetition_factor: f64,
    /// Consecutive-day streak after this activity
    pub streak_days: u32,
    pub streak_multiplier: f64,
    pub level_factor: f64,
    pub bonus_multiplier: f64,
    /// Award was cut by the platform budget
    pub capped: bool,
    pub total_xp: u64,
    pub level_before: u32,
    pub level_after: u32,
}

impl XpDelta {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

pub struct XpEngine {
    policy: XpPolicy,
}

impl XpEngine {
    pub fn new(policy: XpPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &XpPolicy {
        &self.policy
    }

    /// Compute the award for an activity and the resulting progress
    ///
    /// `bonus_multiplier` is the combined XP multiplier from the bonus stack.
    #[instrument(skip(self, progress, activity), fields(
        platform = %activity.platform,
        activity_type = %activity.activity_type,
    ))]
    pub fn apply(
        &self,
        progress: &XpProgress,
        activity: &ActivityEvent,
        bonus_multiplier: f64,
    ) -> Result<(XpDelta, XpProgress)> {
        let rule = self
            .policy
            .rule(activity.platform, activity.activity_type)
            .ok_or_else(|| FinovaError::UnsupportedActivity {
                platform: activity.platform.to_string(),
                activity_type: activity.activity_type.to_string(),
            })?;

        if activity.payload.schema_version != rule.schema_version {
            return Err(FinovaError::InvalidInput(format!(
                "payload schema version {} not supported for {} {}, expected {}",
                activity.payload.schema_version,
                activity.platform,
                activity.activity_type,
                rule.schema_version
            )));
        }
        activity.payload.require(&rule.required_fields)?;

        let mut next = progress.clone();
        next.prune(activity.timestamp, self.policy.window_ms());
        let streak = &self.policy.streak;
        next.advance_streak(activity.timestamp, streak.min_gap_ms(), streak.continue_ms());
        let streak_multiplier = streak.multiplier_for(next.current_streak);

        let platform_multiplier = self.policy.platform_multiplier(activity.platform);
        let quality = self.quality_multiplier(&activity.payload);
        let repetitions = next.repetitions(activity.platform, activity.activity_type);
        let repetition_factor = self.policy.repetition_decay.powi(repetitions.min(i32::MAX as usize) as i32);
        let level_factor = self.level_factor(progress.level);
        let bonus_multiplier = if bonus_multiplier.is_finite() && bonus_multiplier > 0.0 {
            bonus_multiplier
        } else {
            1.0
        };

        let raw = rule.base_xp as f64
            * platform_multiplier
            * quality
            * repetition_factor
            * streak_multiplier
            * level_factor
            * bonus_multiplier;
        let uncapped = if raw.is_finite() && raw > 0.0 {
            raw.floor() as u64
        } else {
            0
        };

        let used = next.platform_total(activity.platform);
        let remaining = self.policy.platform_daily_cap.saturating_sub(used);
        let awarded = uncapped.min(remaining);

        next.recent.push(XpAward {
            at: activity.timestamp,
            platform: activity.platform,
            activity_type: activity.activity_type,
            xp: awarded,
        });
        next.total_xp = next.total_xp.saturating_add(awarded);
        next.level = self.policy.level_curve.level_for(next.total_xp);

        debug!(awarded, repetitions, remaining, streak = next.current_streak, "XP computed");

        let delta = XpDelta {
            awarded,
            base: rule.base_xp,
            platform_multiplier,
            quality,
            repetition_factor,
            streak_days: next.current_streak,
            streak_multiplier,
            level_factor,
            bonus_multiplier,
            capped: awarded < uncapped,
            total_xp: next.total_xp,
            level_before: progress.level,
            level_after: next.level,
        };
        Ok((delta, next))
    }

    /// Quality multiplier in [quality_min, quality_max]; missing signals count as 0.5
    pub fn quality_multiplier(&self, payload: &ActivityPayload) -> f64 {
        let w = &self.policy.quality_weights;
        let signal = |key: &str| payload.unit_value(key).unwrap_or(0.5);

        let total_weight = w.originality + w.engagement + w.brand_safety + w.human_generated;
        let score = if total_weight > 0.0 {
            (signal("originality") * w.originality
                + signal("engagement") * w.engagement
                + signal("brand_safety") * w.brand_safety
                + signal("human_generated") * w.human_generated)
                / total_weight
        } else {
            0.5
        };

        self.policy.quality_min + (self.policy.quality_max - self.policy.quality_min) * score
    }

    /// Higher levels earn less per activity
    pub fn level_factor(&self, level: u32) -> f64 {
        (-self.policy.level_damping_k * level as f64)
            .exp()
            .max(self.policy.level_damping_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finova_common::{ActivityType, EventId, Platform, UserId};

    const HOUR: i64 = 3_600_000;

    fn activity(platform: Platform, activity_type: ActivityType, at: i64, payload: ActivityPayload) -> ActivityEvent {
        ActivityEvent {
            event_id: EventId::generate("test"),
            user_id: UserId::new("alice").unwrap(),
            platform,
            activity_type,
            timestamp: at,
            payload,
        }
    }

    fn post() -> ActivityPayload {
        ActivityPayload::new().with("content_id", "p-1")
    }

    #[test]
    fn test_neutral_quality_is_midpoint() {
        let engine = XpEngine::new(XpPolicy::default());
        let q = engine.quality_multiplier(&ActivityPayload::new());
        assert!((q - 1.25).abs() < 1e-12);

        let best = ActivityPayload::new()
            .with("originality", 1.0)
            .with("engagement", 1.0)
            .with("brand_safety", 1.0)
            .with("human_generated", 1.0);
        assert!((engine.quality_multiplier(&best) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_basic_award() {
        let engine = XpEngine::new(XpPolicy::default());
        let (delta, progress) = engine
            .apply(
                &XpProgress::default(),
                &activity(Platform::YouTube, ActivityType::VideoPost, 0, post()),
                1.0,
            )
            .unwrap();

        // 150 × 1.4 × 1.25 × e^-0.01
        let expected = (150.0 * 1.4 * 1.25 * (-0.01f64).exp()).floor() as u64;
        assert_eq!(delta.awarded, expected);
        assert_eq!(progress.total_xp, expected);
        assert_eq!(progress.level, 3);
        assert!(delta.leveled_up());
    }

    #[test]
    fn test_repetition_decay_within_window() {
        let engine = XpEngine::new(XpPolicy::default());
        let payload = || ActivityPayload::new().with("target_id", "u-9");

        let (first, p1) = engine
            .apply(&XpProgress::default(), &activity(Platform::TikTok, ActivityType::Share, 0, payload()), 1.0)
            .unwrap();
        let (second, p2) = engine
            .apply(&p1, &activity(Platform::TikTok, ActivityType::Share, HOUR, payload()), 1.0)
            .unwrap();
        assert!((second.repetition_factor - 0.8).abs() < 1e-12);
        assert!(second.awarded < first.awarded);

        // Outside the window the decay resets
        let (third, _) = engine
            .apply(&p2, &activity(Platform::TikTok, ActivityType::Share, 30 * HOUR, payload()), 1.0)
            .unwrap();
        assert!((third.repetition_factor - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_platform_cap() {
        let engine = XpEngine::new(XpPolicy::default());
        let viral = || ActivityPayload::new().with("content_id", "v").with("views", 1_000_000);

        let mut progress = XpProgress::default();
        let mut total = 0;
        for i in 0..5 {
            let (delta, next) = engine
                .apply(&progress, &activity(Platform::TikTok, ActivityType::ViralContent, i, viral()), 1.0)
                .unwrap();
            total += delta.awarded;
            progress = next;
        }
        assert_eq!(total, 2_000);
        assert_eq!(progress.platform_total(Platform::TikTok), 2_000);

        // Another platform still has budget
        let (delta, _) = engine
            .apply(&progress, &activity(Platform::Instagram, ActivityType::Like, 10, ActivityPayload::new().with("target_id", "x")), 1.0)
            .unwrap();
        assert!(delta.awarded > 0);
    }

    #[test]
    fn test_unsupported_and_invalid_payload() {
        let engine = XpEngine::new(XpPolicy::default());
        let err = engine
            .apply(&XpProgress::default(), &activity(Platform::X, ActivityType::Story, 0, post()), 1.0)
            .unwrap_err();
        assert!(matches!(err, FinovaError::UnsupportedActivity { .. }));

        let err = engine
            .apply(
                &XpProgress::default(),
                &activity(Platform::Instagram, ActivityType::PhotoPost, 0, ActivityPayload::new()),
                1.0,
            )
            .unwrap_err();
        assert!(matches!(err, FinovaError::InvalidInput(_)));
    }

    #[test]
    fn test_bonus_multiplier_applied() {
        let engine = XpEngine::new(XpPolicy::default());
        let login = activity(Platform::App, ActivityType::DailyLogin, 0, ActivityPayload::new());
        let (plain, _) = engine.apply(&XpProgress::default(), &login, 1.0).unwrap();
        let (doubled, _) = engine.apply(&XpProgress::default(), &login, 2.0).unwrap();
        assert!(doubled.awarded >= plain.awarded * 2 - 1);
        assert!((doubled.bonus_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_streak_lifts_award() {
        let engine = XpEngine::new(XpPolicy::default());
        let login = |day: i64| activity(Platform::App, ActivityType::DailyLogin, day * 24 * HOUR, ActivityPayload::new());

        let mut progress = XpProgress::default();
        let mut deltas = Vec::new();
        for day in 0..7 {
            let (delta, next) = engine.apply(&progress, &login(day), 1.0).unwrap();
            deltas.push(delta);
            progress = next;
        }
        assert_eq!(deltas[0].streak_days, 1);
        assert!((deltas[5].streak_multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(deltas[6].streak_days, 7);
        assert!((deltas[6].streak_multiplier - 1.1).abs() < f64::EPSILON);
        assert!(deltas[6].awarded > deltas[5].awarded);

        // Three quiet days break it
        let (delta, progress) = engine.apply(&progress, &login(10), 1.0).unwrap();
        assert_eq!(delta.streak_days, 1);
        assert!((delta.streak_multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(progress.longest_streak, 7);
    }

    #[test]
    fn test_level_factor_floor() {
        let engine = XpEngine::new(XpPolicy::default());
        assert!((engine.level_factor(1000) - 0.1).abs() < 1e-12);
        assert!(engine.level_factor(1) > engine.level_factor(2));
    }
}
