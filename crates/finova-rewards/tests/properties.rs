use finova_common::policy::{BonusPolicy, LevelCurve, RatePolicy, ReferralPolicy};
use finova_common::{
    CardCategory, CardEffect, CardId, CardKind, CardUsage, RewardPolicy, RpSource, StackingRule,
    UserId, UserState,
};
use finova_rewards::{propagate, BonusResolver, BonusStack, RateCalculator, RateInputs, ReferralForest, Target};
use proptest::prelude::*;

fn user(i: usize) -> UserId {
    UserId::new(format!("user-{}", i)).unwrap()
}

proptest! {
    #[test]
    fn prop_forest_never_gets_a_cycle_or_second_parent(
        edges in prop::collection::vec((0usize..12, 0usize..12), 0..80)
    ) {
        let mut forest = ReferralForest::new();
        for i in 0..12 {
            forest.add_node(user(i));
        }

        for (a, b) in edges {
            let (referrer, referee) = (user(a), user(b));
            let parents_before: Vec<_> = (0..12).map(|i| forest.parent(&user(i)).cloned()).collect();
            let edges_before = forest.edge_count();

            if forest.add_edge(&referrer, &referee).is_err() {
                let parents_after: Vec<_> = (0..12).map(|i| forest.parent(&user(i)).cloned()).collect();
                prop_assert_eq!(parents_before, parents_after);
                prop_assert_eq!(edges_before, forest.edge_count());
            }

            // Walking up always terminates at a root within n steps
            for i in 0..12 {
                prop_assert!(forest.depth(&user(i)) < 12);
                prop_assert!(!forest.ancestors(&user(i), u32::MAX).contains(&user(i)));
            }
        }
    }

    #[test]
    fn prop_rp_strictly_decays_with_depth(
        delta in 1.0f64..1e6,
        mining in any::<bool>(),
        decay in 0.05f64..0.95,
    ) {
        let policy = ReferralPolicy { decay, ..ReferralPolicy::default() };
        let ancestors: Vec<UserId> = (0..10).map(user).collect();
        let source = if mining { RpSource::Mining } else { RpSource::Xp };

        let deltas = propagate(&policy, &ancestors, delta, source);
        for pair in deltas.windows(2) {
            prop_assert!(pair[1].points < pair[0].points);
            prop_assert_eq!(pair[1].depth, pair[0].depth + 1);
        }
    }

    #[test]
    fn prop_effective_rate_within_bounds(
        total_users in any::<u64>(),
        referral_bonus in prop::num::f64::ANY,
        trust_score in prop::num::f64::ANY,
        flagged in any::<bool>(),
        holdings in prop::num::f64::ANY,
        level in any::<u32>(),
    ) {
        let policy = RatePolicy::default();
        let max_rate = policy.max_rate;
        let calculator = RateCalculator::new(policy, 0.30);
        let breakdown = calculator.effective_rate(&RateInputs {
            total_users,
            referral_bonus,
            trust_score,
            humanity_proof_required: flagged,
            holdings,
            level,
        });
        prop_assert!(breakdown.rate >= 0.0 && breakdown.rate <= max_rate);
        if flagged {
            prop_assert_eq!(breakdown.rate, 0.0);
        }
    }

    #[test]
    fn prop_level_curve_monotonic(
        first in 100.0f64..1_000.0,
        growth in 1.05f64..1.5,
        xp in prop::collection::vec(0u64..10_000_000, 2..32),
    ) {
        let curve = LevelCurve::geometric(first, growth, 60);
        prop_assert!(curve.validate().is_ok());

        let mut sorted = xp;
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            prop_assert!(curve.level_for(pair[0]) <= curve.level_for(pair[1]));
        }
    }

    #[test]
    fn prop_bonus_never_exceeds_cap(
        magnitudes in prop::collection::vec((0.0f64..10.0, any::<bool>()), 0..12),
        base in 0.0f64..10.0,
        cap in 1.0f64..10.0,
    ) {
        let policy = RewardPolicy {
            bonus: BonusPolicy { global_cap: cap, ..BonusPolicy::default() },
            ..RewardPolicy::default()
        };
        let mut state = UserState::new(user(0), 0);
        for (magnitude, additive) in magnitudes {
            state.cards.push(CardEffect {
                card_id: CardId::generate(),
                kind: CardKind::DoubleMining,
                category: CardCategory::MiningBoost,
                stacking: if additive { StackingRule::Additive } else { StackingRule::Multiplicative },
                magnitude,
                usage: CardUsage::Reusable,
                activated_at: 0,
                expires_at: i64::MAX,
            });
        }

        let resolver = BonusResolver::new(policy.bonus.global_cap);
        let resolution = resolver.resolve(Target::MiningRate, base, &BonusStack::for_user(&state, &policy, 0));
        prop_assert!(resolution.final_value >= 0.0);
        prop_assert!(resolution.final_value <= base * cap + 1e-9);
    }
}
