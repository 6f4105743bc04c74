//! Credential Store
//!
//! Storage abstraction for user records. `PgUserStore` is the production
//! backend; `MemoryStore` backs service-level tests without a database.
//! Emails are canonicalized before every lookup and before storage, and
//! uniqueness is enforced case-insensitively.

use crate::error::AuthError;
use crate::models::{canonical_email, NewUser, User, UserRole, UserStatus};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage contract for credential records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up by canonical email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// Look up by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Create a new record; fails with `DuplicateEmail` on a
    /// case-insensitive collision
    async fn create(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Persist a mutated record; fails with `UserNotFound` if the record
    /// vanished concurrently
    async fn save(&self, user: &User) -> Result<(), AuthError>;
}

// ============================================
// Postgres implementation
// ============================================

/// Postgres-backed credential store
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist
    pub async fn migrate(&self) -> Result<(), AuthError> {
        tracing::info!("Running credential store migrations");

        sqlx::query(
            r#"
            DO $$ BEGIN
                CREATE TYPE user_role AS ENUM ('user', 'admin');
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            DO $$ BEGIN
                CREATE TYPE user_status AS ENUM ('active', 'inactive', 'suspended');
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                role user_role NOT NULL DEFAULT 'user',
                status user_status NOT NULL DEFAULT 'active',
                first_name VARCHAR(100),
                last_name VARCHAR(100),
                university VARCHAR(200),
                graduation_year INTEGER,
                phone VARCHAR(30),
                linkedin_url VARCHAR(500),
                refresh_tokens TEXT[] NOT NULL DEFAULT '{}',
                login_attempts INTEGER NOT NULL DEFAULT 0,
                lock_until TIMESTAMPTZ,
                last_login TIMESTAMPTZ,
                password_reset_token TEXT,
                password_reset_expires TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Case-insensitive uniqueness, independent of what callers stored.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users (lower(email));",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Credential store migrations completed");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE lower(email) = $1")
            .bind(canonical_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                email, password_hash,
                first_name, last_name, university, graduation_year, phone, linkedin_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(canonical_email(&new_user.email))
        .bind(&new_user.password_hash)
        .bind(&new_user.profile.first_name)
        .bind(&new_user.profile.last_name)
        .bind(&new_user.profile.university)
        .bind(new_user.profile.graduation_year)
        .bind(&new_user.profile.phone)
        .bind(&new_user.profile.linkedin_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                role = $3,
                status = $4,
                refresh_tokens = $5,
                login_attempts = $6,
                lock_until = $7,
                last_login = $8,
                password_reset_token = $9,
                password_reset_expires = $10,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.status)
        .bind(&user.refresh_tokens)
        .bind(user.login_attempts)
        .bind(user.lock_until)
        .bind(user.last_login)
        .bind(&user.password_reset_token)
        .bind(user.password_reset_expires)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }
}

// ============================================
// In-memory implementation
// ============================================

/// In-memory credential store for tests
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let wanted = canonical_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| canonical_email(&u.email) == wanted)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let email = canonical_email(&new_user.email);
        let mut users = self.users.write().await;

        if users.values().any(|u| canonical_email(&u.email) == email) {
            return Err(AuthError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: new_user.password_hash,
            role: UserRole::User,
            status: UserStatus::Active,
            first_name: new_user.profile.first_name,
            last_name: new_user.profile.last_name,
            university: new_user.profile.university,
            graduation_year: new_user.profile.graduation_year,
            phone: new_user.profile.phone,
            linkedin_url: new_user.profile.linkedin_url,
            refresh_tokens: Vec::new(),
            login_attempts: 0,
            lock_until: None,
            last_login: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        };

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(slot) => {
                let mut updated = user.clone();
                updated.updated_at = Utc::now();
                *slot = updated;
                Ok(())
            }
            None => Err(AuthError::UserNotFound),
        }
    }
}
