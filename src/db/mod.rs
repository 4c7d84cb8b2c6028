pub mod store;

use anyhow::Result;
use async_trait::async_trait;

use crate::feed::models::EventStatus;
use crate::polls::models::{
    GamePoll, GamePrediction, NewPoll, NewUser, PollClosure, Settlement, Side, User,
};

pub use store::Store;

/// Durable state the poll core needs. Every failure here is structural and
/// propagates to the caller.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// Credit (or administratively debit) a user's balance. Returns the
    /// updated user, or `None` when there is no such user.
    async fn add_points(&self, user_id: i64, delta: i64) -> Result<Option<User>>;

    /// Insert unless a poll for the same `game_id` exists; returns the stored
    /// poll and whether this call created it.
    async fn insert_poll(&self, poll: &NewPoll) -> Result<(GamePoll, bool)>;

    async fn get_poll(&self, id: i64) -> Result<Option<GamePoll>>;

    async fn find_poll_by_game_id(&self, game_id: &str) -> Result<Option<GamePoll>>;

    /// Case-insensitive team names + sport, active polls only.
    async fn find_active_poll_by_teams(&self, home: &str, away: &str, sport: &str) -> Result<Option<GamePoll>>;

    async fn list_active_polls(&self) -> Result<Vec<GamePoll>>;

    /// Mirror status/scores onto an active poll. No-op on closed polls.
    async fn update_poll_progress(
        &self,
        poll_id: i64,
        status: EventStatus,
        home_score: u32,
        away_score: u32,
    ) -> Result<()>;

    /// Atomically deactivate the poll and settle its predictions.
    /// `None` when the poll was already closed: the caller lost the race.
    async fn close_poll(&self, poll_id: i64, closure: &PollClosure) -> Result<Option<Settlement>>;

    /// `None` when (user, poll) already has a prediction.
    async fn insert_prediction(&self, user_id: i64, poll_id: i64, side: Side) -> Result<Option<GamePrediction>>;

    async fn find_prediction(&self, user_id: i64, poll_id: i64) -> Result<Option<GamePrediction>>;

    async fn predictions_for_poll(&self, poll_id: i64) -> Result<Vec<GamePrediction>>;

    async fn predictions_for_user(&self, user_id: i64) -> Result<Vec<GamePrediction>>;
}
