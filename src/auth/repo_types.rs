use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(birthday_format, Date, "[year]-[month]-[day]");

pub const DEFAULT_ROLE: &str = "user";

/// Account record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Argon2 hash; only populated by `find_by_email`. Never serialized, so it
    /// can reach neither a response body nor a cache entry.
    #[serde(skip_serializing, default)]
    #[sqlx(default)]
    pub password: String,
    pub role: String,
    pub about: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub postcode: Option<i32>,
    #[serde(with = "birthday_format::option", default)]
    pub birthday: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub login_date: OffsetDateTime,
}

impl Account {
    /// Blank the password hash before the record leaves the service.
    pub fn sanitize(&mut self) {
        self.password.clear();
    }

    #[cfg(test)]
    pub fn is_sanitized(&self) -> bool {
        self.password.is_empty()
    }
}

/// Validated input for `AccountRepository::create`. `password` holds the
/// plaintext after validation and is replaced by its hash before the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub about: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub postcode: Option<i32>,
    pub birthday: Option<Date>,
}

/// Partial update. `None`, an empty string or a zero postcode leave the
/// stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub about: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub postcode: Option<i32>,
    pub birthday: Option<Date>,
}
