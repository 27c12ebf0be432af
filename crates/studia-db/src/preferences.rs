//! User preferences repository implementation.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{
    DifficultyLevel, Error, PreferencesRepository, Result, SummaryLength, UserPreferences,
};

/// PostgreSQL implementation of PreferencesRepository.
#[derive(Clone)]
pub struct PgPreferencesRepository {
    pool: Pool<Postgres>,
}

impl PgPreferencesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferencesRepository for PgPreferencesRepository {
    async fn get(&self, user_id: Uuid) -> Result<UserPreferences> {
        let row = sqlx::query(
            "SELECT user_id, quiz_difficulty, summary_length, daily_goal,
                    reminder_enabled, theme, updated_at
             FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => {
                let quiz_difficulty: String = row.get("quiz_difficulty");
                let summary_length: String = row.get("summary_length");
                Ok(UserPreferences {
                    user_id: row.get("user_id"),
                    quiz_difficulty: DifficultyLevel::from_str(&quiz_difficulty)?,
                    summary_length: SummaryLength::from_str(&summary_length)?,
                    daily_goal: row.get("daily_goal"),
                    reminder_enabled: row.get("reminder_enabled"),
                    theme: row.get("theme"),
                    updated_at: row.get("updated_at"),
                })
            }
            // Users without a stored row see the defaults.
            None => Ok(UserPreferences::default_for(user_id)),
        }
    }

    async fn upsert(&self, prefs: &UserPreferences) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_preferences
                 (user_id, quiz_difficulty, summary_length, daily_goal,
                  reminder_enabled, theme, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             ON CONFLICT (user_id) DO UPDATE SET
                 quiz_difficulty = EXCLUDED.quiz_difficulty,
                 summary_length = EXCLUDED.summary_length,
                 daily_goal = EXCLUDED.daily_goal,
                 reminder_enabled = EXCLUDED.reminder_enabled,
                 theme = EXCLUDED.theme,
                 updated_at = now()",
        )
        .bind(prefs.user_id)
        .bind(prefs.quiz_difficulty.to_string())
        .bind(prefs.summary_length.to_string())
        .bind(prefs.daily_goal)
        .bind(prefs.reminder_enabled)
        .bind(&prefs.theme)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
