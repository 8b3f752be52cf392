// src/engine/leaderboard.rs

use std::cmp::Ordering;

use serde::Serialize;
use uuid::Uuid;

use crate::engine::scoring::ScoreEntry;

/// A participant and every score entry recorded for them in one session.
#[derive(Debug, Clone)]
pub struct ParticipantEntries {
    pub participant_id: Uuid,
    pub display_name: String,
    pub entries: Vec<ScoreEntry>,
}

/// One ranked line of a session leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub participant_id: Uuid,
    pub display_name: String,
    pub total_points: u64,
    /// Correct answers divided by answered questions, 0.0 when nothing was answered.
    pub accuracy: f64,
    pub correct_count: u32,
    pub answered_count: u32,
}

impl LeaderboardRow {
    fn from_entries(participant: ParticipantEntries) -> Self {
        let total_points = participant
            .entries
            .iter()
            .map(|e| u64::from(e.points))
            .sum();
        let answered_count = participant.entries.iter().filter(|e| e.answered).count() as u32;
        let correct_count = participant.entries.iter().filter(|e| e.is_correct).count() as u32;
        let accuracy = if answered_count > 0 {
            f64::from(correct_count) / f64::from(answered_count)
        } else {
            0.0
        };

        Self {
            rank: 0,
            participant_id: participant.participant_id,
            display_name: participant.display_name,
            total_points,
            accuracy,
            correct_count,
            answered_count,
        }
    }

    fn ties_with(&self, other: &Self) -> bool {
        self.total_points == other.total_points && self.accuracy == other.accuracy
    }
}

/// Leaderboard order: points desc, accuracy desc, participant id asc.
fn leaderboard_order(a: &LeaderboardRow, b: &LeaderboardRow) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| b.accuracy.total_cmp(&a.accuracy))
        .then_with(|| a.participant_id.cmp(&b.participant_id))
}

/// Assigns competition ranks ("1, 1, 3") to rows already in leaderboard order.
fn assign_ranks(rows: &mut [LeaderboardRow]) {
    for i in 0..rows.len() {
        let rank = if i > 0 && rows[i].ties_with(&rows[i - 1]) {
            rows[i - 1].rank
        } else {
            i as u32 + 1
        };
        rows[i].rank = rank;
    }
}

/// Aggregates each participant's entries and ranks the results.
///
/// The output depends only on the set of participants, never on the order
/// they are supplied in.
pub fn build_leaderboard<I>(participants: I) -> Vec<LeaderboardRow>
where
    I: IntoIterator<Item = ParticipantEntries>,
{
    let mut rows: Vec<LeaderboardRow> = participants
        .into_iter()
        .map(LeaderboardRow::from_entries)
        .collect();

    rows.sort_by(leaderboard_order);
    assign_ranks(&mut rows);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn entry(participant: u128, points: u32, is_correct: bool, answered: bool) -> ScoreEntry {
        ScoreEntry {
            participant_id: id(participant),
            question_id: Uuid::new_v4(),
            points,
            is_correct,
            answered,
        }
    }

    fn participant(n: u128, entries: Vec<ScoreEntry>) -> ParticipantEntries {
        ParticipantEntries {
            participant_id: id(n),
            display_name: format!("player-{}", n),
            entries,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(build_leaderboard(Vec::new()).is_empty());
    }

    #[test]
    fn test_aggregates_points_and_accuracy() {
        let rows = build_leaderboard(vec![participant(
            1,
            vec![
                entry(1, 900, true, true),
                entry(1, 0, false, true),
                entry(1, 0, false, false),
            ],
        )]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_points, 900);
        assert_eq!(rows[0].answered_count, 2);
        assert_eq!(rows[0].correct_count, 1);
        assert_eq!(rows[0].accuracy, 0.5);
        assert_eq!(rows[0].rank, 1);
    }

    #[test]
    fn test_no_answers_means_zero_accuracy() {
        let rows = build_leaderboard(vec![participant(7, vec![entry(7, 0, false, false)])]);
        assert_eq!(rows[0].accuracy, 0.0);
        assert_eq!(rows[0].answered_count, 0);
    }

    #[test]
    fn test_accuracy_breaks_point_ties() {
        let rows = build_leaderboard(vec![
            // 1000 points, one of two correct
            participant(1, vec![entry(1, 1000, true, true), entry(1, 0, false, true)]),
            // 1000 points, one of one correct
            participant(2, vec![entry(2, 1000, true, true)]),
        ]);

        assert_eq!(rows[0].participant_id, id(2));
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].participant_id, id(1));
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn test_competition_ranking() {
        let rows = build_leaderboard(vec![
            participant(3, vec![entry(3, 850, true, true)]),
            participant(1, vec![entry(1, 850, true, true)]),
            participant(2, vec![entry(2, 700, true, true)]),
            participant(4, vec![entry(4, 990, true, true)]),
        ]);

        let ranks: Vec<(Uuid, u32)> = rows.iter().map(|r| (r.participant_id, r.rank)).collect();
        assert_eq!(
            ranks,
            vec![(id(4), 1), (id(1), 2), (id(3), 2), (id(2), 4)]
        );
    }

    #[test]
    fn test_stable_under_reordering() {
        let make = || {
            vec![
                participant(5, vec![entry(5, 800, true, true)]),
                participant(2, vec![entry(2, 800, true, true)]),
                participant(9, vec![entry(9, 0, false, true)]),
                participant(1, vec![]),
                participant(4, vec![entry(4, 760, true, true), entry(4, 0, false, true)]),
            ]
        };

        let forward = build_leaderboard(make());
        let mut reversed_input = make();
        reversed_input.reverse();
        let reversed = build_leaderboard(reversed_input);
        let mut rotated_input = make();
        rotated_input.rotate_left(2);
        let rotated = build_leaderboard(rotated_input);

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
        assert_eq!(forward, build_leaderboard(make()));
    }

    #[test]
    fn test_participants_without_entries_tie_at_bottom() {
        let rows = build_leaderboard(vec![
            participant(2, vec![]),
            participant(1, vec![]),
            participant(3, vec![entry(3, 720, true, true)]),
        ]);

        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].participant_id, id(1));
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[2].participant_id, id(2));
        assert_eq!(rows[2].rank, 2);
    }
}
