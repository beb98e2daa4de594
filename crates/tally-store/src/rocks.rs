//! `RocksDB` storage implementation.
//!
//! `RocksDB` has no conditional update, so balance and subscription writes take
//! `write_lock` around their read-modify-write and commit through a single
//! `WriteBatch`. Readers never take the lock.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use tally_core::{CreditTransaction, Subscription, TransactionType, User, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cbor<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn read_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_cbor(cf::USERS, &keys::user_key(user_id))
    }

    fn read_subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        self.get_cbor(cf::SUBSCRIPTIONS, &keys::user_key(user_id))
    }

    /// Insert a user, plus a `grant` ledger row when `grant` is positive.
    fn insert_user(&self, user: &User, grant: i64, description: &str) -> Result<Option<User>> {
        let _guard = self.lock()?;
        if self.read_user(user.id)?.is_some() {
            return Ok(None);
        }

        let mut user = user.clone();
        user.credits = user
            .credits
            .checked_add(grant)
            .ok_or(StoreError::BalanceOverflow)?;

        let cf_users = self.cf(cf::USERS)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(user.id), Self::serialize(&user)?);
        if let Some(customer_id) = &user.stripe_customer_id {
            let cf_customers = self.cf(cf::STRIPE_CUSTOMERS)?;
            batch.put_cf(
                &cf_customers,
                keys::customer_key(customer_id),
                keys::user_key(user.id),
            );
        }
        if grant > 0 {
            let tx = CreditTransaction::credit(
                user.id,
                grant,
                TransactionType::Grant,
                user.credits,
                description.to_string(),
            );
            self.put_transaction(&mut batch, &tx)?;
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Some(user))
    }

    fn put_transaction(&self, batch: &mut WriteBatch, tx: &CreditTransaction) -> Result<()> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        batch.put_cf(&cf_tx, keys::transaction_key(&tx.id), Self::serialize(tx)?);
        batch.put_cf(&cf_tx_by_user, keys::user_transaction_key(tx.user_id, &tx.id), b"");
        Ok(())
    }

    /// Apply `delta` to a balance under the write lock.
    ///
    /// `build` receives the new balance and returns the ledger row.
    fn apply_delta(
        &self,
        user_id: UserId,
        delta: i64,
        build: impl FnOnce(i64) -> CreditTransaction,
    ) -> Result<CreditTransaction> {
        let _guard = self.lock()?;

        let mut user = self.read_user(user_id)?.ok_or(StoreError::NotFound)?;
        let balance = user
            .credits
            .checked_add(delta)
            .ok_or(StoreError::BalanceOverflow)?;
        if balance < 0 {
            return Err(StoreError::InsufficientCredits {
                balance: user.credits,
                required: delta.saturating_neg(),
            });
        }

        user.credits = balance;
        user.updated_at = chrono::Utc::now();
        let tx = build(balance);

        let cf_users = self.cf(cf::USERS)?;

        // Write atomically
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(user_id), Self::serialize(&user)?);
        self.put_transaction(&mut batch, &tx)?;

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(tx)
    }

    fn scan_transactions(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_key(user_id);

        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));

        // ULIDs are time-ordered, so forward order is oldest first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }

        let mut transactions = Vec::new();
        for key in all_keys.iter().rev().skip(offset).take(limit) {
            let tx_id = keys::transaction_id_from_user_key(key)?;
            if let Some(tx) = self.get_cbor(cf::TRANSACTIONS, &keys::transaction_key(&tx_id))? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn write_subscription(&self, subscription: &Subscription) -> Result<bool> {
        let _guard = self.lock()?;

        if let Some(existing) = self.read_subscription(subscription.user_id)? {
            if !existing.accepts_event_at(subscription.last_event_at) {
                return Ok(false);
            }
        }

        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        self.db
            .put_cf(
                &cf_subs,
                keys::user_key(subscription.user_id),
                Self::serialize(subscription)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }
}

#[async_trait]
impl Store for RocksStore {
    async fn create_user(&self, user: &User) -> Result<bool> {
        Ok(self.insert_user(user, 0, "")?.is_some())
    }

    async fn create_user_with_grant(
        &self,
        user: &User,
        grant: i64,
        description: &str,
    ) -> Result<Option<User>> {
        self.insert_user(user, grant, description)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.read_user(user_id)
    }

    async fn find_user_by_stripe_customer(&self, customer_id: &str) -> Result<Option<UserId>> {
        let cf = self.cf(cf::STRIPE_CUSTOMERS)?;
        self.db
            .get_cf(&cf, keys::customer_key(customer_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| keys::decode_user_key(&data))
            .transpose()
    }

    async fn debit_credits(
        &self,
        user_id: UserId,
        amount: i64,
        description: &str,
    ) -> Result<CreditTransaction> {
        let delta = amount.checked_neg().ok_or(StoreError::BalanceOverflow)?;
        self.apply_delta(user_id, delta, |balance| {
            CreditTransaction::debit(user_id, amount, balance, description.to_string())
        })
    }

    async fn add_credits(
        &self,
        user_id: UserId,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> Result<CreditTransaction> {
        self.apply_delta(user_id, amount, |balance| {
            CreditTransaction::credit(
                user_id,
                amount,
                transaction_type,
                balance,
                description.to_string(),
            )
        })
    }

    async fn list_transactions_by_user(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        self.scan_transactions(user_id, limit, offset)
    }

    async fn get_subscription(&self, user_id: UserId) -> Result<Option<Subscription>> {
        self.read_subscription(user_id)
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<bool> {
        self.write_subscription(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tally_core::SubscriptionStatus;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn user_id(n: i64) -> UserId {
        UserId::new(n).unwrap()
    }

    #[tokio::test]
    async fn user_roundtrip_and_customer_index() {
        let (store, _dir) = create_test_store();
        let user = User::new(user_id(5), 40).with_stripe_customer("cus_5");

        assert!(store.create_user(&user).await.unwrap());
        assert!(!store.create_user(&user).await.unwrap());

        let stored = store.get_user(user_id(5)).await.unwrap().unwrap();
        assert_eq!(stored.credits, 40);
        assert_eq!(
            store.find_user_by_stripe_customer("cus_5").await.unwrap(),
            Some(user_id(5))
        );
    }

    #[tokio::test]
    async fn debit_and_history() {
        let (store, _dir) = create_test_store();
        store.create_user(&User::new(user_id(1), 10)).await.unwrap();

        let tx = store.debit_credits(user_id(1), 10, "all of it").await.unwrap();
        assert_eq!(tx.balance_after, 0);

        let err = store.debit_credits(user_id(1), 1, "overdraft").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits {
                balance: 0,
                required: 1
            }
        ));

        std::thread::sleep(std::time::Duration::from_millis(2)); // Ensure different ULIDs
        store
            .add_credits(user_id(1), 25, TransactionType::TopUp, "top up")
            .await
            .unwrap();

        let txs = store
            .list_transactions_by_user(user_id(1), 10, 0)
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "top up");
        assert_eq!(txs[1].description, "all of it");
    }

    #[tokio::test]
    async fn add_credits_overflow_writes_nothing() {
        let (store, _dir) = create_test_store();
        store.create_user(&User::new(user_id(1), 1)).await.unwrap();

        let err = store
            .add_credits(user_id(1), i64::MAX, TransactionType::TopUp, "too much")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BalanceOverflow));

        let user = store.get_user(user_id(1)).await.unwrap().unwrap();
        assert_eq!(user.credits, 1);
        assert!(store
            .list_transactions_by_user(user_id(1), 10, 0)
            .await
            .unwrap()
            .is_empty());

        let tx = store.debit_credits(user_id(1), 1, "after").await.unwrap();
        assert_eq!(tx.balance_after, 0);
    }

    #[tokio::test]
    async fn create_user_with_grant_is_one_write() {
        let (store, _dir) = create_test_store();
        let user = User::new(user_id(6), 0).with_stripe_customer("cus_6");

        let created = store
            .create_user_with_grant(&user, 20, "Signup credits")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.credits, 20);
        assert!(store
            .create_user_with_grant(&user, 20, "Signup credits")
            .await
            .unwrap()
            .is_none());

        let txs = store
            .list_transactions_by_user(user_id(6), 10, 0)
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].transaction_type, TransactionType::Grant);
        assert_eq!(txs[0].balance_after, 20);
        assert_eq!(
            store.find_user_by_stripe_customer("cus_6").await.unwrap(),
            Some(user_id(6))
        );

        let err = store
            .create_user_with_grant(&User::new(user_id(7), 1), i64::MAX, "Signup credits")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BalanceOverflow));
        assert!(store.get_user(user_id(7)).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_overdraw() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        store.create_user(&User::new(user_id(2), 50)).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.debit_credits(user_id(2), 3, "race").await })
            })
            .collect();

        let successes = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();

        assert_eq!(successes, 16);
        let user = store.get_user(user_id(2)).await.unwrap().unwrap();
        assert_eq!(user.credits, 2);
    }

    #[tokio::test]
    async fn subscription_staleness() {
        let (store, _dir) = create_test_store();
        let now = Utc::now();
        let current = Subscription {
            user_id: user_id(3),
            status: SubscriptionStatus::Active,
            current_period_end: now + Duration::days(30),
            stripe_subscription_id: "sub_3".into(),
            stripe_price_id: Some("price_pro".into()),
            last_event_at: now,
            updated_at: now,
        };
        assert!(store.upsert_subscription(&current).await.unwrap());

        let stale = Subscription {
            status: SubscriptionStatus::Incomplete,
            last_event_at: now - Duration::seconds(30),
            ..current.clone()
        };
        assert!(!store.upsert_subscription(&stale).await.unwrap());
        assert_eq!(
            store.get_subscription(user_id(3)).await.unwrap(),
            Some(current)
        );
    }
}
