//! PostgreSQL storage implementation.
//!
//! A debit locks the user row with `SELECT ... FOR UPDATE`, checks the
//! balance it read, then decrements and inserts the ledger row in the same
//! transaction. The row lock serializes concurrent debits for the same user,
//! so the balance reported on rejection is the one the check saw.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use tally_core::{
    CreditTransaction, Subscription, SubscriptionStatus, TransactionType, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::Store;

/// Default connection pool size.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with the default pool size.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_user_id(value: i64) -> Result<UserId> {
    UserId::new(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: decode_user_id(row.try_get("id")?)?,
        email: row.try_get("email")?,
        credits: row.try_get("credits")?,
        stripe_customer_id: row.try_get("stripe_customer_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CreditTransaction> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("transaction_type")?;
    Ok(CreditTransaction {
        id: id
            .parse()
            .map_err(|e: tally_core::IdError| StoreError::Serialization(e.to_string()))?,
        user_id: decode_user_id(row.try_get("user_id")?)?,
        amount: row.try_get("amount")?,
        transaction_type: TransactionType::parse(&kind)
            .ok_or_else(|| StoreError::Serialization(format!("unknown transaction type: {kind}")))?,
        balance_after: row.try_get("balance_after")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn subscription_from_row(row: &PgRow) -> Result<Subscription> {
    let status: String = row.try_get("status")?;
    Ok(Subscription {
        user_id: decode_user_id(row.try_get("user_id")?)?,
        status: SubscriptionStatus::parse(&status),
        current_period_end: row.try_get::<DateTime<Utc>, _>("current_period_end")?,
        stripe_subscription_id: row.try_get("stripe_subscription_id")?,
        stripe_price_id: row.try_get("stripe_price_id")?,
        last_event_at: row.try_get("last_event_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl PgStore {
    async fn insert_transaction(
        conn: &mut sqlx::PgConnection,
        tx: &CreditTransaction,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO credit_transactions \
             (id, user_id, amount, transaction_type, balance_after, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(tx.id.to_string())
        .bind(tx.user_id.get())
        .bind(tx.amount)
        .bind(tx.transaction_type.as_str())
        .bind(tx.balance_after)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, credits, stripe_customer_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(user.id.get())
        .bind(&user.email)
        .bind(user.credits)
        .bind(&user.stripe_customer_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_user_with_grant(
        &self,
        user: &User,
        grant: i64,
        description: &str,
    ) -> Result<Option<User>> {
        let mut user = user.clone();
        user.credits = user
            .credits
            .checked_add(grant)
            .ok_or(StoreError::BalanceOverflow)?;

        let mut db_tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (id, email, credits, stripe_customer_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(user.id.get())
        .bind(&user.email)
        .bind(user.credits)
        .bind(&user.stripe_customer_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *db_tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            db_tx.rollback().await?;
            return Ok(None);
        }

        if grant > 0 {
            let record = CreditTransaction::credit(
                user.id,
                grant,
                TransactionType::Grant,
                user.credits,
                description.to_string(),
            );
            Self::insert_transaction(&mut *db_tx, &record).await?;
        }
        db_tx.commit().await?;

        Ok(Some(user))
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        sqlx::query(
            "SELECT id, email, credits, stripe_customer_id, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(user_from_row)
        .transpose()
    }

    async fn find_user_by_stripe_customer(&self, customer_id: &str) -> Result<Option<UserId>> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        id.map(decode_user_id).transpose()
    }

    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
    ) -> Result<CreditTransaction> {
        let mut db_tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id.get())
                .fetch_optional(&mut *db_tx)
                .await?;

        let Some(current) = current else {
            db_tx.rollback().await?;
            return Err(StoreError::NotFound);
        };
        if current < amount {
            db_tx.rollback().await?;
            return Err(StoreError::InsufficientCredits {
                balance: current,
                required: amount,
            });
        }

        let balance: i64 = sqlx::query_scalar(
            "UPDATE users SET credits = credits - $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING credits",
        )
        .bind(user_id.get())
        .bind(amount)
        .fetch_one(&mut *db_tx)
        .await?;

        let record = CreditTransaction::debit(user_id, amount, balance, description.to_string());
        Self::insert_transaction(&mut *db_tx, &record).await?;
        db_tx.commit().await?;

        tracing::debug!(user_id = %user_id, amount, balance, "Conditional debit committed");
        Ok(record)
    }

    async fn add_credits(
        &self,
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> Result<CreditTransaction> {
        let mut db_tx = self.pool.begin().await?;

        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING credits",
        )
        .bind(user_id.get())
        .bind(amount)
        .fetch_optional(&mut *db_tx)
        .await?;

        let balance = balance.ok_or(StoreError::NotFound)?;
        let record = CreditTransaction::credit(
            user_id,
            amount,
            transaction_type,
            balance,
            description.to_string(),
        );
        Self::insert_transaction(&mut *db_tx, &record).await?;
        db_tx.commit().await?;

        Ok(record)
    }

    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        // ULID text sorts chronologically.
        let rows = sqlx::query(
            "SELECT id, user_id, amount, transaction_type, balance_after, description, created_at \
             FROM credit_transactions WHERE user_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id.get())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn get_subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        sqlx::query(
            "SELECT user_id, status, current_period_end, stripe_subscription_id, \
                    stripe_price_id, last_event_at, updated_at \
             FROM subscriptions WHERE user_id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(subscription_from_row)
        .transpose()
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO subscriptions \
             (user_id, status, current_period_end, stripe_subscription_id, \
              stripe_price_id, last_event_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
                status = EXCLUDED.status, \
                current_period_end = EXCLUDED.current_period_end, \
                stripe_subscription_id = EXCLUDED.stripe_subscription_id, \
                stripe_price_id = EXCLUDED.stripe_price_id, \
                last_event_at = EXCLUDED.last_event_at, \
                updated_at = EXCLUDED.updated_at \
             WHERE subscriptions.last_event_at <= EXCLUDED.last_event_at",
        )
        .bind(subscription.user_id.get())
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end)
        .bind(&subscription.stripe_subscription_id)
        .bind(&subscription.stripe_price_id)
        .bind(subscription.last_event_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
