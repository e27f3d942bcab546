use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload bound to one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: Uuid,      // account ID
    pub email: String, // account email at issuance
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
}
