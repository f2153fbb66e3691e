use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::models::User;

/// Roles a user account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can write reviews.
    #[default]
    User,
    /// Can publish a bootcamp and its courses.
    Publisher,
    /// Full administrative access, bypasses ownership checks.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Publisher => write!(f, "publisher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Roles a user may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::User | Role::Publisher)
    }
}

/// The identity of the caller of a protected route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Id of the user document.
    pub user_id: String,
    /// User email address.
    pub email: String,
    /// The user's role.
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}
