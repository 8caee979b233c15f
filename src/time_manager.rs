//! Time allocation. Pulled out of `uci::GoParams` into its
//! own module because the rules now depend on game phase and search score
//! volatility, not just the clock.

use crate::board::Color;
use crate::types::Score;

#[derive(Clone, Copy, Debug, Default)]
pub struct GoTime {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
}

/// Soft and hard budgets in milliseconds for one `go`. The search loop
/// checks `soft` between iterations and `hard` mid-iteration.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    pub soft_ms: u64,
    pub hard_ms: u64,
}

impl TimeBudget {
    pub fn unbounded() -> Self {
        Self { soft_ms: u64::MAX, hard_ms: u64::MAX }
    }
}

/// Phase scaling factor applied to the base allocation: engines spend more
/// of their budget in the heavier middlegame than the simpler opening or endgame.
fn phase_scale(phase_256: i32) -> f64 {
    if phase_256 >= 200 {
        0.8
    } else if phase_256 >= 80 {
        1.0
    } else {
        1.2
    }
}

/// Score scaling: a position trending worse earns more time, a comfortably
/// winning one earns less. Volatility is not a factor here; it only feeds
/// the iterative deepener's own stability tracking.
fn score_scale(score: Score) -> f64 {
    if score < -300 {
        1.4
    } else if score < -100 {
        1.15
    } else if score > 300 {
        0.7
    } else if score > 100 {
        0.85
    } else {
        1.0
    }
}

/// `volatility` is accepted for call-site symmetry with the iterative
/// deepener's stability tracking but does not affect the budget itself —
/// spec's score-scaling ladder is a pure function of score.
#[allow(clippy::too_many_arguments)]
pub fn compute_budget(
    go: &GoTime,
    side: Color,
    phase_256: i32,
    score: Score,
    _volatility: Score,
    move_overhead_ms: u64,
) -> TimeBudget {
    if go.infinite {
        return TimeBudget::unbounded();
    }
    if let Some(mt) = go.movetime {
        let ms = mt.saturating_sub(move_overhead_ms).max(10);
        return TimeBudget { soft_ms: ms, hard_ms: ms };
    }

    let (my_time, my_inc) = match side {
        Color::White => (go.wtime.unwrap_or(0), go.winc.unwrap_or(0)),
        Color::Black => (go.btime.unwrap_or(0), go.binc.unwrap_or(0)),
    };

    if my_time == 0 {
        return TimeBudget::unbounded();
    }

    let movestogo = go.movestogo.unwrap_or(40);
    let base = (my_time as f64) / (movestogo as f64 + 3.0) + 0.75 * (my_inc as f64);

    let scaled = base * phase_scale(phase_256) * score_scale(score);

    let emergency_floor = if my_time < 30 * my_inc.max(1) {
        (my_time as f64 / 40.0).max(10.0)
    } else {
        10.0
    };

    let soft = scaled.max(emergency_floor);
    let hard = (4.0 * scaled).min(my_time as f64 / 5.0).max(emergency_floor);

    let soft_ms = (soft as u64).saturating_sub(move_overhead_ms).max(10);
    let hard_ms = (hard as u64).saturating_sub(move_overhead_ms).max(soft_ms);

    TimeBudget { soft_ms, hard_ms }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_search_is_unbounded() {
        let go = GoTime { infinite: true, ..Default::default() };
        let budget = compute_budget(&go, Color::White, 256, 0, 0, 30);
        assert_eq!(budget.soft_ms, u64::MAX);
    }

    #[test]
    fn movetime_is_used_directly() {
        let go = GoTime { movetime: Some(5000), ..Default::default() };
        let budget = compute_budget(&go, Color::White, 256, 0, 0, 30);
        assert_eq!(budget.soft_ms, budget.hard_ms);
        assert!(budget.soft_ms <= 5000);
    }

    #[test]
    fn no_clock_means_unbounded() {
        let go = GoTime::default();
        let budget = compute_budget(&go, Color::White, 256, 0, 0, 30);
        assert_eq!(budget.soft_ms, u64::MAX);
    }

    #[test]
    fn losing_score_gets_more_time_than_winning() {
        let go = GoTime { wtime: Some(60_000), winc: Some(0), ..Default::default() };
        let losing = compute_budget(&go, Color::White, 150, -300, 0, 30);
        let winning = compute_budget(&go, Color::White, 150, 400, 0, 30);
        assert!(losing.soft_ms > winning.soft_ms);
    }

    #[test]
    fn hard_never_exceeds_a_fifth_of_remaining_time() {
        let go = GoTime { wtime: Some(100_000), winc: Some(0), movestogo: Some(1), ..Default::default() };
        let budget = compute_budget(&go, Color::White, 150, -500, 100, 30);
        assert!(budget.hard_ms <= 100_000 / 5);
    }

    #[test]
    fn low_time_hits_emergency_floor_not_zero() {
        let go = GoTime { wtime: Some(50), winc: Some(0), movestogo: Some(40), ..Default::default() };
        let budget = compute_budget(&go, Color::White, 150, 0, 0, 30);
        assert!(budget.soft_ms >= 10);
    }
}
