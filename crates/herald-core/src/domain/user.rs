use serde::{Deserialize, Serialize};

/// The submitting user, carried inside job payloads so workers never need a
/// user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserDescriptor {
    pub user_id: u64,
    pub user_name: String,
    pub email: String,
}

impl UserDescriptor {
    pub fn new(user_id: u64, user_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            email: email.into(),
        }
    }
}
