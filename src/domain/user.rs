// src/domain/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability of a user record to say whether it is backed by the account
/// that shares watched state on the remote "my list" service.
///
/// All users answering `true` share one remote list, so a watched change
/// made by any of them fans out to all of them locally.
pub trait RemoteIdentity {
    fn is_remote_shared_account(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub remote_shared_account: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_admin: false,
            remote_shared_account: false,
            created_at: Utc::now(),
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn shared_remote_account(mut self) -> Self {
        self.remote_shared_account = true;
        self
    }
}

impl RemoteIdentity for User {
    fn is_remote_shared_account(&self) -> bool {
        self.remote_shared_account
    }
}
