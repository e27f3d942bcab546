use serde::{Deserialize, Serialize};

use crate::auth::repo_types::Account;

/// Request body for register and update. Every field is optional on the wire;
/// `validation` decides what each operation requires.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub about: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub postcode: Option<i32>,
    /// `YYYY-MM-DD`
    pub birthday: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AccountWithToken {
    pub user: Account,
    pub token: String,
}
