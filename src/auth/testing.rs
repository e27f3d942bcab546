//! In-memory doubles for the store and cache, with switches for failure
//! injection.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        cache::{AccountCache, CacheError},
        jwt::JwtKeys,
        repo::{AccountRepository, StoreError},
        repo_types::{Account, AccountChanges, NewAccount},
        services::AccountService,
    },
    config::JwtConfig,
};

pub const TEST_SECRET: &str = "test-secret";

pub fn test_keys() -> JwtKeys {
    JwtKeys::new(&JwtConfig {
        secret: TEST_SECRET.into(),
        ttl_minutes: 60,
    })
}

pub fn service_with(
    repo: MemoryAccountRepository,
    cache: MemoryAccountCache,
) -> (AccountService, Arc<MemoryAccountRepository>, Arc<MemoryAccountCache>) {
    let repo = Arc::new(repo);
    let cache = Arc::new(cache);
    let service = AccountService::new(
        repo.clone(),
        cache.clone(),
        test_keys(),
        3600,
        Duration::from_secs(5),
    );
    (service, repo, cache)
}

fn set_if_present(target: &mut String, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        *target = v.to_string();
    }
}

fn set_opt_if_present(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        *target = Some(v.to_string());
    }
}

/// Mirrors the Postgres repository: unique email, coalescing updates, and
/// no password hash except from `find_by_email`.
#[derive(Default)]
pub struct MemoryAccountRepository {
    rows: Mutex<HashMap<Uuid, Account>>,
    pub conflict_on_create: AtomicBool,
    /// Milliseconds to sleep before every call.
    pub delay: AtomicU64,
    pub find_by_email_calls: AtomicUsize,
    pub get_by_id_calls: AtomicUsize,
}

impl MemoryAccountRepository {
    async fn pause(&self) {
        let ms = self.delay.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn without_password(account: &Account) -> Account {
        let mut copy = account.clone();
        copy.password.clear();
        copy
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn stored_password(&self, email: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .map(|a| a.password.clone())
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, new: &NewAccount) -> Result<Account, StoreError> {
        self.pause().await;
        if self.conflict_on_create.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|a| a.email == new.email) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let account = Account {
            account_id: Uuid::new_v4(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            email: new.email.clone(),
            password: new.password.clone(),
            role: if new.role.is_empty() { "user".into() } else { new.role.clone() },
            about: new.about.clone(),
            phone_number: new.phone_number.clone(),
            address: new.address.clone(),
            city: new.city.clone(),
            gender: new.gender.clone(),
            postcode: new.postcode,
            birthday: new.birthday,
            created_at: now,
            updated_at: now,
            login_date: now,
        };
        rows.insert(account.account_id, account.clone());
        Ok(Self::without_password(&account))
    }

    async fn update_by_id(&self, id: Uuid, c: &AccountChanges) -> Result<Account, StoreError> {
        self.pause().await;
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = c.email.as_deref().filter(|e| !e.is_empty()) {
            if rows.values().any(|a| a.email == email && a.account_id != id) {
                return Err(StoreError::Conflict);
            }
        }
        let account = rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        set_if_present(&mut account.first_name, &c.first_name);
        set_if_present(&mut account.last_name, &c.last_name);
        set_if_present(&mut account.email, &c.email);
        set_if_present(&mut account.role, &c.role);
        set_opt_if_present(&mut account.about, &c.about);
        set_opt_if_present(&mut account.phone_number, &c.phone_number);
        set_opt_if_present(&mut account.address, &c.address);
        set_opt_if_present(&mut account.city, &c.city);
        set_opt_if_present(&mut account.gender, &c.gender);
        if let Some(code) = c.postcode.filter(|code| *code != 0) {
            account.postcode = Some(code);
        }
        if c.birthday.is_some() {
            account.birthday = c.birthday;
        }
        account.updated_at = OffsetDateTime::now_utc();
        Ok(Self::without_password(account))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        self.pause().await;
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .map(Self::without_password)
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_by_email_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }
}

/// Stores serialized JSON like the Redis cache does. TTLs are recorded, not
/// enforced.
#[derive(Default)]
pub struct MemoryAccountCache {
    entries: Mutex<HashMap<String, String>>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_ping: AtomicBool,
    pub last_ttl: AtomicU64,
    calls: AtomicUsize,
}

fn unavailable() -> CacheError {
    CacheError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

impl MemoryAccountCache {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountCache for MemoryAccountCache {
    async fn get_by_id(&self, key: &str) -> Result<Option<Account>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        match self.raw(key) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, ttl_seconds: u64, account: &Account) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let json = serde_json::to_string(account)?;
        self.last_ttl.store(ttl_seconds, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(key.to_string(), json);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}
