use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::Value;

use crate::store::WriteBatch;

use super::domain::{EntrantId, EntrantStatus, EventId};
use super::paths;

/// Source of uniform random permutations for lottery and backfill draws.
pub struct Shuffler {
    rng: Mutex<StdRng>,
}

impl Shuffler {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic draws for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Shuffle `pool` and take the first `seats` as invited; everyone else is uninvited.
    pub fn split(&self, mut pool: Vec<EntrantId>, seats: usize) -> DrawOutcome {
        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pool.shuffle(&mut *rng);
        }
        let selected = seats.min(pool.len());
        let uninvited = pool.split_off(selected);
        DrawOutcome {
            invited: pool,
            uninvited,
        }
    }
}

impl Default for Shuffler {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Entrants moved out of `WAITING` by a single draw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrawOutcome {
    pub invited: Vec<EntrantId>,
    pub uninvited: Vec<EntrantId>,
}

impl DrawOutcome {
    pub fn total(&self) -> usize {
        self.invited.len() + self.uninvited.len()
    }

    /// Moves every drawn entrant from `WAITING` into its new bucket.
    pub(crate) fn write_moves(&self, event_id: &EventId, batch: &mut WriteBatch) {
        let moves = self
            .invited
            .iter()
            .map(|id| (id, EntrantStatus::Invited))
            .chain(self.uninvited.iter().map(|id| (id, EntrantStatus::Uninvited)));
        for (entrant_id, status) in moves {
            batch.delete(paths::bucket_entry(event_id, EntrantStatus::Waiting, entrant_id));
            batch.set(paths::bucket_entry(event_id, status, entrant_id), Value::Bool(true));
        }
    }
}

/// Why a draw made no changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyWaitingList,
    AtCapacity { seats_taken: usize, capacity: u32 },
}

/// Result of a lottery or replacement draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum DrawResult {
    Applied(DrawOutcome),
    Skipped(SkipReason),
}

impl DrawResult {
    pub fn outcome(&self) -> Option<&DrawOutcome> {
        match self {
            DrawResult::Applied(outcome) => Some(outcome),
            DrawResult::Skipped(_) => None,
        }
    }

    pub fn invited(&self) -> &[EntrantId] {
        match self.outcome() {
            Some(outcome) => &outcome.invited,
            None => &[],
        }
    }

    pub fn uninvited(&self) -> &[EntrantId] {
        match self.outcome() {
            Some(outcome) => &outcome.uninvited,
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pool(size: usize) -> Vec<EntrantId> {
        (0..size).map(|n| EntrantId(format!("u{n}"))).collect()
    }

    #[test]
    fn split_partitions_the_pool() {
        let shuffler = Shuffler::seeded(7);
        let outcome = shuffler.split(pool(10), 4);
        assert_eq!(outcome.invited.len(), 4);
        assert_eq!(outcome.uninvited.len(), 6);

        let merged: BTreeSet<_> = outcome
            .invited
            .iter()
            .chain(outcome.uninvited.iter())
            .cloned()
            .collect();
        assert_eq!(merged, pool(10).into_iter().collect());
    }

    #[test]
    fn split_with_more_seats_than_entrants_invites_everyone() {
        let outcome = Shuffler::seeded(1).split(pool(3), 10);
        assert_eq!(outcome.invited.len(), 3);
        assert!(outcome.uninvited.is_empty());
    }

    #[test]
    fn seeded_shuffles_are_reproducible() {
        let a = Shuffler::seeded(99).split(pool(20), 5);
        let b = Shuffler::seeded(99).split(pool(20), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn every_entrant_can_win_a_single_seat() {
        let shuffler = Shuffler::seeded(2024);
        let mut winners = BTreeSet::new();
        for _ in 0..200 {
            let outcome = shuffler.split(pool(4), 1);
            winners.insert(outcome.invited[0].clone());
        }
        assert_eq!(winners.len(), 4);
    }

    #[test]
    fn write_moves_clears_waiting_entries() {
        let event = EventId("e1".to_string());
        let outcome = DrawOutcome {
            invited: vec![EntrantId("a".to_string())],
            uninvited: vec![EntrantId("b".to_string())],
        };
        let mut batch = WriteBatch::new();
        outcome.write_moves(&event, &mut batch);

        let rendered: Vec<(String, Option<Value>)> = batch
            .ops()
            .iter()
            .map(|op| (op.path.to_string(), op.value.clone()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("/WaitingList/e1/WAITING/a".to_string(), None),
                ("/WaitingList/e1/INVITED/a".to_string(), Some(Value::Bool(true))),
                ("/WaitingList/e1/WAITING/b".to_string(), None),
                ("/WaitingList/e1/UNINVITED/b".to_string(), Some(Value::Bool(true))),
            ]
        );
    }
}
