//! Competitive resolution: score and pick winners from parallel attempts.
//!
//! When competitive implementations are enabled, N agents build the same
//! component independently. This module scores their outputs and selects a
//! winner.
//!
//! Resolution policy:
//! 1. Test pass rate (primary: more passing tests wins)
//! 2. Build duration (tiebreaker: longer build favored as more thorough)
//! 3. Losing implementations stay on disk in `attempts/` as context

use std::cmp::Ordering;

use crate::domain::models::ScoredAttempt;

/// Select the best attempt. Highest pass rate wins; longest build breaks
/// ties. Returns `None` if no attempts were provided.
pub fn select_winner(attempts: &[ScoredAttempt]) -> Option<&ScoredAttempt> {
    attempts.iter().max_by(|a, b| compare(a, b))
}

/// Split attempts into (winner, losers). Attempt order is preserved among
/// the losers.
pub fn resolve<'a>(
    attempts: &'a [ScoredAttempt],
) -> Option<(&'a ScoredAttempt, Vec<&'a ScoredAttempt>)> {
    let winner = select_winner(attempts)?;
    let losers = attempts
        .iter()
        .filter(|a| a.attempt_id != winner.attempt_id)
        .collect();
    Some((winner, losers))
}

/// Human-readable summary of a competitive resolution, for the audit log.
pub fn format_resolution_summary(winner: &ScoredAttempt, losers: &[&ScoredAttempt]) -> String {
    let mut lines = vec![format!(
        "Winner: {} ({}/{} tests, {:.1}s)",
        winner.attempt_id,
        winner.test_results.passed,
        winner.test_results.total,
        winner.build_duration_seconds
    )];
    for loser in losers {
        lines.push(format!(
            "  Lost: {} ({}/{} tests, {:.1}s)",
            loser.attempt_id,
            loser.test_results.passed,
            loser.test_results.total,
            loser.build_duration_seconds
        ));
    }
    lines.join("\n")
}

fn compare(a: &ScoredAttempt, b: &ScoredAttempt) -> Ordering {
    a.pass_rate()
        .total_cmp(&b.pass_rate())
        .then(a.build_duration_seconds.total_cmp(&b.build_duration_seconds))
}
