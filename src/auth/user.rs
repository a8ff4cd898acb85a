use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

use super::{Permission, Role};

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        let role = user.role.parse().unwrap_or_else(|err| {
            tracing::warn!(user_id = user.id, error = %err, "Falling back to member role");
            Role::Member
        });

        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
            created_at: user.created_at,
        }
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            let message = match permission {
                Permission::ManageCatalog => "Admin access required",
                _ => "Permission denied",
            };
            Err(AppError::Authorization(message.to_string()))
        }
    }
}
