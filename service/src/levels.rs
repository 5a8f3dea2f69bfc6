//! Bonus level computation over the seeded level table.

use crate::types::BonusLevel;

/// Highest level whose threshold the given spending has reached, if any.
///
/// Spending below every threshold maps to no level; callers keep the user's
/// current (base) level in that case.
pub fn level_for_spending(levels: &[BonusLevel], spending: f64) -> Option<&BonusLevel> {
    levels
        .iter()
        .filter(|level| level.min_spending <= spending)
        .max_by(|a, b| a.min_spending.total_cmp(&b.min_spending))
}

/// Cheapest level strictly above the given spending, if any.
pub fn next_level(levels: &[BonusLevel], spending: f64) -> Option<&BonusLevel> {
    levels
        .iter()
        .filter(|level| level.min_spending > spending)
        .min_by(|a, b| a.min_spending.total_cmp(&b.min_spending))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Vec<BonusLevel> {
        vec![
            BonusLevel {
                id: 1,
                level_name: "Silver".to_string(),
                min_spending: 1000.0,
            },
            BonusLevel {
                id: 2,
                level_name: "Gold".to_string(),
                min_spending: 5000.0,
            },
            BonusLevel {
                id: 3,
                level_name: "Platinum".to_string(),
                min_spending: 10000.0,
            },
        ]
    }

    #[test]
    fn test_spending_below_every_threshold_has_no_level() {
        let levels = seeded();
        assert!(level_for_spending(&levels, 0.0).is_none());
        assert!(level_for_spending(&levels, 999.99).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let levels = seeded();
        assert_eq!(
            level_for_spending(&levels, 1000.0).unwrap().level_name,
            "Silver"
        );
        assert_eq!(
            level_for_spending(&levels, 5000.0).unwrap().level_name,
            "Gold"
        );
    }

    #[test]
    fn test_highest_reached_level_wins() {
        let levels = seeded();
        assert_eq!(
            level_for_spending(&levels, 7500.0).unwrap().level_name,
            "Gold"
        );
        assert_eq!(
            level_for_spending(&levels, 50000.0).unwrap().level_name,
            "Platinum"
        );
    }

    #[test]
    fn test_next_level_is_cheapest_above_spending() {
        let levels = seeded();
        assert_eq!(next_level(&levels, 0.0).unwrap().level_name, "Silver");
        assert_eq!(next_level(&levels, 1200.0).unwrap().level_name, "Gold");
        assert_eq!(next_level(&levels, 5000.0).unwrap().level_name, "Platinum");
    }

    #[test]
    fn test_no_next_level_at_the_top() {
        let levels = seeded();
        assert!(next_level(&levels, 10000.0).is_none());
        assert!(next_level(&levels, 99999.0).is_none());
    }

    #[test]
    fn test_empty_level_table() {
        assert!(level_for_spending(&[], 5000.0).is_none());
        assert!(next_level(&[], 5000.0).is_none());
    }
}
