use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{Account, AccountChanges, NewAccount};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("email already exists")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
            other => StoreError::Database(other),
        }
    }
}

/// Durable account storage. Each method is a single atomic statement.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &NewAccount) -> Result<Account, StoreError>;
    async fn update_by_id(&self, id: Uuid, changes: &AccountChanges) -> Result<Account, StoreError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError>;
    /// The only lookup that returns the password hash.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    /// Email uniqueness is enforced by the `accounts_email_key` constraint.
    async fn create(&self, account: &NewAccount) -> Result<Account, StoreError> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (first_name, last_name, email, password, role, about,
                                  phone_number, address, city, gender, postcode, birthday)
            VALUES ($1, $2, $3, $4, COALESCE(NULLIF($5, ''), 'user'), $6, $7, $8, $9, $10, $11, $12)
            RETURNING account_id, first_name, last_name, email, role, about, phone_number,
                      address, city, gender, postcode, birthday, created_at, updated_at, login_date
            "#,
        )
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.password)
        .bind(&account.role)
        .bind(&account.about)
        .bind(&account.phone_number)
        .bind(&account.address)
        .bind(&account.city)
        .bind(&account.gender)
        .bind(account.postcode)
        .bind(account.birthday)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn update_by_id(&self, id: Uuid, changes: &AccountChanges) -> Result<Account, StoreError> {
        let updated = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
               SET first_name   = COALESCE(NULLIF($1, ''), first_name),
                   last_name    = COALESCE(NULLIF($2, ''), last_name),
                   email        = COALESCE(NULLIF($3, ''), email),
                   role         = COALESCE(NULLIF($4, ''), role),
                   about        = COALESCE(NULLIF($5, ''), about),
                   phone_number = COALESCE(NULLIF($6, ''), phone_number),
                   address      = COALESCE(NULLIF($7, ''), address),
                   city         = COALESCE(NULLIF($8, ''), city),
                   gender       = COALESCE(NULLIF($9, ''), gender),
                   postcode     = COALESCE(NULLIF($10, 0), postcode),
                   birthday     = COALESCE($11, birthday),
                   updated_at   = now()
             WHERE account_id = $12
            RETURNING account_id, first_name, last_name, email, role, about, phone_number,
                      address, city, gender, postcode, birthday, created_at, updated_at, login_date
            "#,
        )
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.role)
        .bind(&changes.about)
        .bind(&changes.phone_number)
        .bind(&changes.address)
        .bind(&changes.city)
        .bind(&changes.gender)
        .bind(changes.postcode)
        .bind(changes.birthday)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        updated.ok_or(StoreError::NotFound)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, first_name, last_name, email, role, about, phone_number,
                   address, city, gender, postcode, birthday, created_at, updated_at, login_date
              FROM accounts
             WHERE account_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        account.ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, first_name, last_name, email, password, role, about, phone_number,
                   address, city, gender, postcode, birthday, created_at, updated_at, login_date
              FROM accounts
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }
}
