//! Property-based tests for lifeform_core.
//!
//! The mood/curiosity update must keep curiosity bounded and be a pure function
//! of (reply, starting state) for every possible reply.

use chrono::{TimeZone, Utc};
use lifeform_core::{apply_reply, curiosity_delta, LifeformState, MOOD_CYCLE};
use proptest::prelude::*;

fn arb_state() -> impl Strategy<Value = LifeformState> {
    (0.0f64..=1.0, 0usize..5, 0i64..1000).prop_map(|(curiosity, mood, revision)| LifeformState {
        mood: MOOD_CYCLE[mood],
        curiosity,
        last_reflected_at: None,
        revision,
    })
}

/// Replies of all sizes, including unicode and whitespace-only text.
fn arb_reply() -> impl Strategy<Value = String> {
    prop_oneof![
        ".{0,40}",
        "[a-z ]{100,1200}",
        "\\PC{0,300}",
        "[ \t\n]{0,10}",
    ]
}

proptest! {
    #[test]
    fn curiosity_always_in_unit_range(state in arb_state(), reply in arb_reply()) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let next = apply_reply(&state, &reply, now);
        prop_assert!(next.curiosity >= 0.0 && next.curiosity <= 1.0);
        prop_assert!(next.curiosity.is_finite());
    }

    #[test]
    fn delta_is_bounded(reply in arb_reply()) {
        let delta = curiosity_delta(&reply);
        prop_assert!((-0.08..=0.08).contains(&delta));
    }

    #[test]
    fn update_is_deterministic(state in arb_state(), reply in arb_reply()) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let a = apply_reply(&state, &reply, now);
        let b = apply_reply(&state, &reply, now);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn repeated_replies_never_escape_bounds(
        state in arb_state(),
        replies in proptest::collection::vec(arb_reply(), 1..30),
    ) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut current = state;
        for reply in &replies {
            current = apply_reply(&current, reply, now);
            prop_assert!((0.0..=1.0).contains(&current.curiosity));
        }
    }
}
