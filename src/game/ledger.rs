//! Vote ledger: one pending vote per player per voting window
//!
//! A vote is fresh while its `cast_at` is later than the last executed
//! move. The window therefore closes exactly when a tick executes, not on
//! a wall-clock boundary.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{GameStore, StoreError, VoteRecord};

use super::types::{Direction, GameId, PlayerId, Timestamp};

/// What to do with a second vote in the same window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// Keep the first vote, ignore later ones
    #[default]
    FirstWins,
    /// Replace the pending vote with the new direction
    LatestWins,
}

impl FromStr for VotePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_wins" => Ok(VotePolicy::FirstWins),
            "latest_wins" => Ok(VotePolicy::LatestWins),
            other => Err(format!("unknown vote policy {other:?}")),
        }
    }
}

/// Result of recording a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded,
    /// A fresh vote already exists and was left untouched
    AlreadyVoted,
    Replaced { previous: Direction },
}

pub struct VoteLedger {
    store: Arc<dyn GameStore>,
    policy: VotePolicy,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn GameStore>, policy: VotePolicy) -> Self {
        Self { store, policy }
    }

    /// Record `direction` for `player` in the window opened at `last_move_at`
    pub async fn record_vote(
        &self,
        game: GameId,
        player: PlayerId,
        direction: Direction,
        cast_at: Timestamp,
        last_move_at: Timestamp,
    ) -> Result<VoteOutcome, StoreError> {
        let outcome = match self.policy {
            VotePolicy::FirstWins => {
                if self.is_fresh(game, player, last_move_at).await? {
                    return Ok(VoteOutcome::AlreadyVoted);
                }
                VoteOutcome::Recorded
            }
            VotePolicy::LatestWins => {
                match self
                    .store
                    .retract_fresh_vote(game, player, last_move_at)
                    .await?
                {
                    Some(previous) => VoteOutcome::Replaced { previous },
                    None => VoteOutcome::Recorded,
                }
            }
        };

        self.store
            .record_vote(game, player, direction, cast_at)
            .await?;
        Ok(outcome)
    }

    /// Votes cast in `(last_move_at, now]`
    pub async fn fresh_votes(
        &self,
        game: GameId,
        now: Timestamp,
        last_move_at: Timestamp,
    ) -> Result<Vec<VoteRecord>, StoreError> {
        let mut votes = self.store.list_fresh_votes(game, last_move_at).await?;
        votes.retain(|v| v.cast_at <= now);
        Ok(votes)
    }

    pub async fn is_fresh(
        &self,
        game: GameId,
        player: PlayerId,
        last_move_at: Timestamp,
    ) -> Result<bool, StoreError> {
        self.store.has_fresh_vote(game, player, last_move_at).await
    }
}
