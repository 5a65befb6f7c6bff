use proptest::prelude::*;

use voteparty_types::{RewardRule, Timestamp, PLAYER_PLACEHOLDER};

proptest! {
    /// Timestamp ordering: from_millis(a) <= from_millis(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::from_millis(a);
        let tb = Timestamp::from_millis(b);
        prop_assert_eq!(ta <= tb, a <= b);
    }

    /// A rendered command never contains the placeholder when the recipient doesn't.
    #[test]
    fn render_removes_placeholder(prefix in "[a-z ]{0,10}", name in "[a-zA-Z0-9_]{1,16}") {
        let rule = RewardRule::new(format!("{prefix}{PLAYER_PLACEHOLDER}"));
        let rendered = rule.render_for(&name);
        prop_assert!(!rendered.contains(PLAYER_PLACEHOLDER));
        prop_assert!(rendered.ends_with(&name));
    }
}
