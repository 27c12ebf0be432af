//! User repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{CreateUserRequest, Error, Result, User, UserRepository};

use crate::map_unique_violation;

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        study_streak: row.get("study_streak"),
        total_study_time: row.get("total_study_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, req: CreateUserRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO users (id, username, email, full_name)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.full_name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "username or email already taken"))?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query(
            "SELECT id, username, email, full_name, study_streak,
                    total_study_time, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::UserNotFound(id))?;

        Ok(user_from_row(&row))
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn set_streak(&self, id: Uuid, streak: i32) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET study_streak = $1, updated_at = now() WHERE id = $2")
                .bind(streak)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(id));
        }
        Ok(())
    }

    async fn add_study_time(&self, id: Uuid, minutes: i32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users
             SET total_study_time = total_study_time + $1, updated_at = now()
             WHERE id = $2",
        )
        .bind(minutes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(id));
        }
        Ok(())
    }
}
