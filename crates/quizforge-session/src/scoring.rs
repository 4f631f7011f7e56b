//! Points and rankings.

use std::time::Duration;

use quizforge_protocol::LeaderboardEntry;

/// Points for a correct answer given at the very start of a question.
pub const MAX_POINTS: u32 = 1000;

/// Points for a correct answer given at or after the time limit.
pub const BASE_POINTS: u32 = 500;

/// Points earned by one answer.
///
/// A wrong answer earns nothing. A right one earns [`BASE_POINTS`] plus a
/// speed bonus that falls linearly from 500 at `elapsed == 0` to 0 at
/// `elapsed >= limit`, rounded half up:
///
/// ```text
/// points = round(500 + 500 * max(0, limit - elapsed) / limit)
/// ```
///
/// Time is measured in whole milliseconds. A zero `limit` has no bonus
/// window, so every right answer earns [`BASE_POINTS`].
pub fn points_for(correct: bool, elapsed: Duration, limit: Duration) -> u32 {
    if !correct {
        return 0;
    }
    let limit_ms = limit.as_millis();
    if limit_ms == 0 {
        return BASE_POINTS;
    }
    let remaining_ms = limit_ms.saturating_sub(elapsed.as_millis());
    let bonus_span = u128::from(MAX_POINTS - BASE_POINTS);
    // round(bonus_span * remaining / limit) == (2 * bonus_span * remaining + limit) / (2 * limit)
    let bonus = (2 * bonus_span * remaining_ms + limit_ms) / (2 * limit_ms);
    BASE_POINTS + bonus as u32
}

/// Ranks `(name, score)` pairs by descending score.
///
/// The sort is stable: players on equal scores keep the order they were
/// given in (join order, for sessions).
pub fn rank<'a>(
    scores: impl IntoIterator<Item = (&'a str, u32)>,
) -> Vec<LeaderboardEntry> {
    let mut board: Vec<LeaderboardEntry> = scores
        .into_iter()
        .map(|(name, score)| LeaderboardEntry {
            name: name.to_string(),
            score,
        })
        .collect();
    board.sort_by(|a, b| b.score.cmp(&a.score));
    board
}
