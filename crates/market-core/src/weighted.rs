//! Weighted selection with highest-probability fallback
//!
//! Candidates are walked in ascending declared-probability order (ties keep
//! their declared order) and the first whose cumulative probability reaches
//! the roll is chosen. Candidates with probability zero or less are never
//! matched by the walk. When nothing matches, because probabilities sum to
//! less than the roll, the last (highest-probability) candidate is chosen so a
//! selection always happens.

use crate::rng::SimRng;

/// Pure selection for a given roll in [0, 1). `None` only for an empty slice.
pub fn select_with_roll<T: Clone>(candidates: &[(T, f32)], roll: f64) -> Option<T> {
    if candidates.is_empty() {
        return None;
    }

    let weight = |p: f32| if p.is_finite() { p.max(0.0) } else { 0.0 };

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        weight(candidates[*a].1)
            .partial_cmp(&weight(candidates[*b].1))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut cumulative = 0.0_f64;
    for &idx in &order {
        let p = weight(candidates[idx].1);
        cumulative += p as f64;
        if p > 0.0 && cumulative >= roll {
            return Some(candidates[idx].0.clone());
        }
    }

    order.last().map(|&idx| candidates[idx].0.clone())
}

/// Draw a roll from `rng` and select
pub fn select_weighted<T: Clone>(candidates: &[(T, f32)], rng: &mut SimRng) -> Option<T> {
    if candidates.is_empty() {
        return None;
    }
    let roll = rng.unit();
    select_with_roll(candidates, roll)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Pick {
        Karen,
        Kid,
        Normal,
    }

    fn table() -> Vec<(Pick, f32)> {
        vec![(Pick::Normal, 0.8), (Pick::Karen, 0.1), (Pick::Kid, 0.1)]
    }

    #[test]
    fn test_ascending_cumulative_walk() {
        // Ascending: Karen 0.1 (cum 0.1), Kid 0.1 (cum 0.2), Normal 0.8 (cum 1.0)
        assert_eq!(select_with_roll(&table(), 0.05), Some(Pick::Karen));
        assert_eq!(select_with_roll(&table(), 0.15), Some(Pick::Kid));
        assert_eq!(select_with_roll(&table(), 0.5), Some(Pick::Normal));
    }

    #[test]
    fn test_fallback_picks_highest_probability() {
        let sparse = vec![(Pick::Karen, 0.1), (Pick::Normal, 0.3), (Pick::Kid, 0.2)];
        assert_eq!(select_with_roll(&sparse, 0.95), Some(Pick::Normal));
    }

    #[test]
    fn test_all_zero_still_selects() {
        let zeros = vec![(Pick::Karen, 0.0), (Pick::Kid, 0.0)];
        assert_eq!(select_with_roll(&zeros, 0.0), Some(Pick::Kid));
    }

    #[test]
    fn test_zero_probability_never_matched_by_walk() {
        let table = vec![(Pick::Karen, 0.0), (Pick::Normal, 1.0)];
        assert_eq!(select_with_roll(&table, 0.0), Some(Pick::Normal));
    }

    #[test]
    fn test_empty_has_no_selection() {
        let empty: Vec<(Pick, f32)> = Vec::new();
        assert_eq!(select_with_roll(&empty, 0.3), None);
    }

    #[test]
    fn test_same_rolls_same_choices() {
        let rolls = [0.01, 0.33, 0.12, 0.99, 0.18, 0.5];
        let first: Vec<_> = rolls.iter().map(|r| select_with_roll(&table(), *r)).collect();
        let second: Vec<_> = rolls.iter().map(|r| select_with_roll(&table(), *r)).collect();
        assert_eq!(first, second);

        let mut a = SimRng::seeded(1234);
        let mut b = SimRng::seeded(1234);
        for _ in 0..50 {
            assert_eq!(select_weighted(&table(), &mut a), select_weighted(&table(), &mut b));
        }
    }
}
