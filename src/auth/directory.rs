use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AuthError, User, UserDirectory};

/// User directory keyed by email.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the user with the same email.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.email.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(email).cloned())
    }
}
