use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cache::{account_key, AccountCache, CacheError},
        dto::{AccountPayload, AccountWithToken, LoginRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password, PasswordError},
        repo::{AccountRepository, StoreError},
        repo_types::Account,
        validation::{normalize_email, prepare_create, prepare_update, validate_login},
    },
    error::AppError,
};

/// Account lifecycle, credential checks and cache-aside reads.
///
/// The store is authoritative. Mutations go to the store first and then
/// delete the cache entry; they never write a value into the cache. Only
/// `get_by_id` populates the cache, and only with a sanitized record.
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    cache: Arc<dyn AccountCache>,
    keys: JwtKeys,
    cache_ttl_seconds: u64,
    op_timeout: Duration,
    // Accounts whose cache invalidation failed, with the time of the failure.
    // Reads skip the cache for them until the entry is overwritten or deleted,
    // or until one cache TTL has passed and Redis has expired it anyway.
    stale: Mutex<HashMap<Uuid, Instant>>,
}

impl AccountService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        cache: Arc<dyn AccountCache>,
        keys: JwtKeys,
        cache_ttl_seconds: u64,
        op_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            keys,
            cache_ttl_seconds,
            op_timeout,
            stale: Mutex::new(HashMap::new()),
        }
    }

    async fn store<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::NotFound)) => Err(AppError::NotFound { op }),
            Ok(Err(StoreError::Conflict)) => Err(AppError::Conflict { op }),
            Ok(Err(e)) => Err(AppError::internal(op, e)),
            Err(_) => {
                warn!(op, "store call timed out");
                Err(AppError::Canceled { op })
            }
        }
    }

    async fn cached<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, call)
            .await
            .unwrap_or(Err(CacheError::Timeout))
    }

    fn stale_window(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    fn is_stale(&self, id: Uuid) -> bool {
        let window = self.stale_window();
        self.stale
            .lock()
            .map(|s| s.get(&id).is_some_and(|at| at.elapsed() < window))
            .unwrap_or(true)
    }

    fn mark_stale(&self, id: Uuid, stale: bool) {
        let window = self.stale_window();
        if let Ok(mut set) = self.stale.lock() {
            if stale {
                set.retain(|_, at| at.elapsed() < window);
                set.insert(id, Instant::now());
            } else {
                set.remove(&id);
            }
        }
    }

    /// Best effort: a failure is logged and remembered, never returned.
    async fn invalidate(&self, op: &'static str, id: Uuid) {
        match self.cached(self.cache.delete(&account_key(id))).await {
            Ok(()) => self.mark_stale(id, false),
            Err(e) => {
                warn!(op, account_id = %id, error = %e, "cache invalidation failed");
                self.mark_stale(id, true);
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn register(&self, payload: AccountPayload) -> Result<AccountWithToken, AppError> {
        const OP: &str = "account.register";

        // Fast path only; the unique constraint on email decides.
        if let Some(email) = payload.email.as_deref().map(normalize_email) {
            if !email.is_empty() {
                match self.store(OP, self.repo.find_by_email(&email)).await {
                    Ok(Some(_)) => {
                        warn!("email already registered");
                        return Err(AppError::Conflict { op: OP });
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "email pre-check failed; relying on constraint"),
                }
            }
        }

        let mut new_account =
            prepare_create(payload).map_err(|violations| AppError::Validation { op: OP, violations })?;

        let plain = std::mem::take(&mut new_account.password);
        new_account.password = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(|e| AppError::internal(OP, e))?
            .map_err(|e| AppError::internal(OP, e))?;

        let mut account = self.store(OP, self.repo.create(&new_account)).await?;
        account.sanitize();

        let token = self
            .keys
            .issue(account.account_id, &account.email)
            .map_err(|e| AppError::internal(OP, e))?;

        info!(account_id = %account.account_id, "account registered");
        Ok(AccountWithToken {
            user: account,
            token,
        })
    }

    /// Unknown email and wrong password both yield `Unauthorized`. Always
    /// reads the store so the current hash is used.
    #[instrument(skip_all)]
    pub async fn login(&self, mut req: LoginRequest) -> Result<AccountWithToken, AppError> {
        const OP: &str = "account.login";

        validate_login(&mut req).map_err(|violations| AppError::Validation { op: OP, violations })?;

        let Some(mut account) = self.store(OP, self.repo.find_by_email(&req.email)).await? else {
            warn!("login failed");
            return Err(AppError::Unauthorized { op: OP });
        };

        let hash = std::mem::take(&mut account.password);
        let plain = req.password;
        let verified = tokio::task::spawn_blocking(move || verify_password(&hash, &plain))
            .await
            .map_err(|e| AppError::internal(OP, e))?;
        match verified {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                warn!("login failed");
                return Err(AppError::Unauthorized { op: OP });
            }
            Err(e) => return Err(AppError::internal(OP, e)),
        }
        account.sanitize();

        let token = self
            .keys
            .issue(account.account_id, &account.email)
            .map_err(|e| AppError::internal(OP, e))?;

        info!(account_id = %account.account_id, "account logged in");
        Ok(AccountWithToken {
            user: account,
            token,
        })
    }

    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: Uuid, payload: AccountPayload) -> Result<Account, AppError> {
        const OP: &str = "account.update";

        let changes =
            prepare_update(payload).map_err(|violations| AppError::Validation { op: OP, violations })?;

        let mut account = self.store(OP, self.repo.update_by_id(id, &changes)).await?;
        account.sanitize();

        self.invalidate(OP, id).await;
        info!("account updated");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        const OP: &str = "account.delete";

        self.store(OP, self.repo.delete_by_id(id)).await?;

        self.invalidate(OP, id).await;
        info!("account deleted");
        Ok(())
    }

    /// Cache-aside read. Cache failures degrade to a miss.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Account, AppError> {
        const OP: &str = "account.get_by_id";
        let key = account_key(id);

        if !self.is_stale(id) {
            match self.cached(self.cache.get_by_id(&key)).await {
                Ok(Some(account)) => {
                    debug!("account cache hit");
                    return Ok(account);
                }
                Ok(None) => debug!("account cache miss"),
                Err(e) => warn!(error = %e, "account cache read failed"),
            }
        }

        let mut account = match self.store(OP, self.repo.get_by_id(id)).await {
            Err(e @ AppError::NotFound { .. }) => {
                // A leftover entry for a deleted account; retry the delete so
                // the id can leave the stale set.
                if self.is_stale(id) {
                    self.invalidate(OP, id).await;
                }
                return Err(e);
            }
            other => other?,
        };
        account.sanitize();

        match self
            .cached(self.cache.set(&key, self.cache_ttl_seconds, &account))
            .await
        {
            Ok(()) => self.mark_stale(id, false),
            Err(e) => warn!(error = %e, "account cache write failed"),
        }
        Ok(account)
    }
}
