use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::db::Storage;
use crate::feed::models::EventStatus;
use crate::polls::models::{
    CloseReason, GamePoll, GamePrediction, NewPoll, NewUser, PollClosure, Settlement, Side, User,
};

const IN_MEMORY: &str = ":memory:";

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    external_id: String,
    username: String,
    favorite_teams: String,
    favorite_players: String,
    points: i64,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            external_id: self.external_id,
            username: self.username,
            favorite_teams: serde_json::from_str(&self.favorite_teams)
                .context("Corrupt favorite_teams column")?,
            favorite_players: serde_json::from_str(&self.favorite_players)
                .context("Corrupt favorite_players column")?,
            points: self.points,
        })
    }
}

#[derive(Debug, FromRow)]
struct PollRow {
    id: i64,
    game_id: String,
    home_team: String,
    away_team: String,
    sport: String,
    league: String,
    game_date: Option<DateTime<Utc>>,
    status: String,
    home_score: Option<i64>,
    away_score: Option<i64>,
    winner: Option<String>,
    is_active: bool,
    close_reason: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PollRow {
    fn into_poll(self) -> Result<GamePoll> {
        Ok(GamePoll {
            id: self.id,
            game_id: self.game_id,
            home_team: self.home_team,
            away_team: self.away_team,
            sport: self.sport,
            league: self.league,
            game_date: self.game_date,
            status: EventStatus::from_str(&self.status)?,
            home_score: self.home_score.map(score_from_db),
            away_score: self.away_score.map(score_from_db),
            winner: self.winner.as_deref().map(Side::from_str).transpose()?,
            is_active: self.is_active,
            close_reason: self.close_reason.as_deref().map(CloseReason::from_str).transpose()?,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PredictionRow {
    id: i64,
    user_id: i64,
    game_poll_id: i64,
    predicted_winner: String,
    is_correct: Option<bool>,
    points_earned: i64,
    created_at: DateTime<Utc>,
}

impl PredictionRow {
    fn into_prediction(self) -> Result<GamePrediction> {
        Ok(GamePrediction {
            id: self.id,
            user_id: self.user_id,
            game_poll_id: self.game_poll_id,
            predicted_winner: Side::from_str(&self.predicted_winner)?,
            is_correct: self.is_correct,
            points_earned: self.points_earned,
            created_at: self.created_at,
        })
    }
}

fn score_from_db(score: i64) -> u32 {
    score.clamp(0, u32::MAX as i64) as u32
}

const POLL_COLUMNS: &str = "id, game_id, home_team, away_team, sport, league, game_date, status, \
     home_score, away_score, winner, is_active, close_reason, created_at, expires_at";

const PREDICTION_COLUMNS: &str =
    "id, user_id, game_poll_id, predicted_winner, is_correct, points_earned, created_at";

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Each connection to :memory: is its own database.
        let max_connections = if database_path == IN_MEMORY { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple statements in one call)
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    async fn prediction_by_id(&self, id: i64) -> Result<Option<GamePrediction>> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM game_predictions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load prediction")?;

        row.map(PredictionRow::into_prediction).transpose()
    }
}

#[async_trait]
impl Storage for Store {
    // --- Users ---

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (external_id, username, favorite_teams, favorite_players, points, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&user.external_id)
        .bind(&user.username)
        .bind(serde_json::to_string(&user.favorite_teams)?)
        .bind(serde_json::to_string(&user.favorite_players)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        let id = result.last_insert_rowid();
        self.get_user(id)
            .await?
            .with_context(|| format!("User {id} missing right after insert"))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, username, favorite_teams, favorite_players, points FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load user")?;

        row.map(UserRow::into_user).transpose()
    }

    async fn add_points(&self, user_id: i64, delta: i64) -> Result<Option<User>> {
        let result = sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(delta)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update points")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(user_id).await
    }

    // --- Polls ---

    async fn insert_poll(&self, poll: &NewPoll) -> Result<(GamePoll, bool)> {
        let result = sqlx::query(
            "INSERT INTO game_polls (game_id, home_team, away_team, sport, league, game_date, status, home_score, away_score, is_active, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
             ON CONFLICT (game_id) DO NOTHING",
        )
        .bind(&poll.game_id)
        .bind(&poll.home_team)
        .bind(&poll.away_team)
        .bind(&poll.sport)
        .bind(&poll.league)
        .bind(poll.game_date)
        .bind(poll.status.as_str())
        .bind(poll.home_score)
        .bind(poll.away_score)
        .bind(Utc::now())
        .bind(poll.expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert poll")?;

        let created = result.rows_affected() > 0;
        let stored = self
            .find_poll_by_game_id(&poll.game_id)
            .await?
            .with_context(|| format!("Poll for game {} missing after insert", poll.game_id))?;

        Ok((stored, created))
    }

    async fn get_poll(&self, id: i64) -> Result<Option<GamePoll>> {
        let row = sqlx::query_as::<_, PollRow>(&format!("SELECT {POLL_COLUMNS} FROM game_polls WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load poll")?;

        row.map(PollRow::into_poll).transpose()
    }

    async fn find_poll_by_game_id(&self, game_id: &str) -> Result<Option<GamePoll>> {
        let row = sqlx::query_as::<_, PollRow>(&format!(
            "SELECT {POLL_COLUMNS} FROM game_polls WHERE game_id = ?"
        ))
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up poll by game id")?;

        row.map(PollRow::into_poll).transpose()
    }

    async fn find_active_poll_by_teams(&self, home: &str, away: &str, sport: &str) -> Result<Option<GamePoll>> {
        let row = sqlx::query_as::<_, PollRow>(&format!(
            "SELECT {POLL_COLUMNS} FROM game_polls
             WHERE lower(home_team) = lower(?) AND lower(away_team) = lower(?) AND lower(sport) = lower(?)
               AND is_active = 1
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(home)
        .bind(away)
        .bind(sport)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up poll by teams")?;

        row.map(PollRow::into_poll).transpose()
    }

    async fn list_active_polls(&self) -> Result<Vec<GamePoll>> {
        let rows = sqlx::query_as::<_, PollRow>(&format!(
            "SELECT {POLL_COLUMNS} FROM game_polls WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active polls")?;

        rows.into_iter().map(PollRow::into_poll).collect()
    }

    async fn update_poll_progress(
        &self,
        poll_id: i64,
        status: EventStatus,
        home_score: u32,
        away_score: u32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE game_polls SET status = ?, home_score = ?, away_score = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(status.as_str())
        .bind(home_score)
        .bind(away_score)
        .bind(poll_id)
        .execute(&self.pool)
        .await
        .context("Failed to update poll progress")?;
        Ok(())
    }

    async fn close_poll(&self, poll_id: i64, closure: &PollClosure) -> Result<Option<Settlement>> {
        let mut tx = self.pool.begin().await.context("Failed to begin settlement")?;

        // The is_active guard is the exactly-once gate: only one closer wins.
        let closed = sqlx::query(
            "UPDATE game_polls
             SET is_active = 0, status = ?, home_score = ?, away_score = ?, winner = ?, close_reason = ?, closed_at = ?
             WHERE id = ? AND is_active = 1",
        )
        .bind(closure.status.as_str())
        .bind(closure.home_score)
        .bind(closure.away_score)
        .bind(closure.winner.map(|w| w.as_str()))
        .bind(closure.reason.as_str())
        .bind(Utc::now())
        .bind(poll_id)
        .execute(&mut *tx)
        .await
        .context("Failed to close poll")?;

        if closed.rows_affected() == 0 {
            tx.rollback().await.context("Failed to roll back settlement")?;
            return Ok(None);
        }

        let mut settlement = Settlement {
            poll_id,
            winner: closure.winner,
            correct: 0,
            incorrect: 0,
            points_awarded: 0,
        };

        if let Some(winner) = closure.winner {
            let side = winner.as_str();

            sqlx::query(
                "UPDATE game_predictions
                 SET is_correct = (predicted_winner = ?),
                     points_earned = CASE WHEN predicted_winner = ? THEN ? ELSE 0 END
                 WHERE game_poll_id = ?",
            )
            .bind(side)
            .bind(side)
            .bind(closure.reward_points)
            .bind(poll_id)
            .execute(&mut *tx)
            .await
            .context("Failed to mark predictions")?;

            let credited = sqlx::query(
                "UPDATE users SET points = points + ?
                 WHERE id IN (SELECT user_id FROM game_predictions WHERE game_poll_id = ? AND predicted_winner = ?)",
            )
            .bind(closure.reward_points)
            .bind(poll_id)
            .bind(side)
            .execute(&mut *tx)
            .await
            .context("Failed to credit points")?
            .rows_affected();

            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM game_predictions WHERE game_poll_id = ?")
                .bind(poll_id)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to count predictions")?;

            settlement.correct = credited;
            settlement.incorrect = (total.max(0) as u64).saturating_sub(credited);
            settlement.points_awarded = credited as i64 * closure.reward_points;
        }

        tx.commit().await.context("Failed to commit settlement")?;
        Ok(Some(settlement))
    }

    // --- Predictions ---

    async fn insert_prediction(&self, user_id: i64, poll_id: i64, side: Side) -> Result<Option<GamePrediction>> {
        let result = sqlx::query(
            "INSERT INTO game_predictions (user_id, game_poll_id, predicted_winner, points_earned, created_at)
             VALUES (?, ?, ?, 0, ?)
             ON CONFLICT (user_id, game_poll_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(poll_id)
        .bind(side.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to insert prediction")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.prediction_by_id(result.last_insert_rowid()).await
    }

    async fn find_prediction(&self, user_id: i64, poll_id: i64) -> Result<Option<GamePrediction>> {
        let row = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM game_predictions WHERE user_id = ? AND game_poll_id = ?"
        ))
        .bind(user_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up prediction")?;

        row.map(PredictionRow::into_prediction).transpose()
    }

    async fn predictions_for_poll(&self, poll_id: i64) -> Result<Vec<GamePrediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM game_predictions WHERE game_poll_id = ? ORDER BY id"
        ))
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list predictions for poll")?;

        rows.into_iter().map(PredictionRow::into_prediction).collect()
    }

    async fn predictions_for_user(&self, user_id: i64) -> Result<Vec<GamePrediction>> {
        let rows = sqlx::query_as::<_, PredictionRow>(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM game_predictions WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list predictions for user")?;

        rows.into_iter().map(PredictionRow::into_prediction).collect()
    }
}
