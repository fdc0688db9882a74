use chrono::{NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;

use crate::error::AppError;

use super::{Permission, Role};

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub phone: String,
}

/// Account row joined with its profile.
#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Option<String>,
    pub phone: Option<String>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let role = match user.role.as_deref() {
            Some(role) => role.parse()?,
            None => Role::default(),
        };

        Ok(Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role,
            phone: user.phone.unwrap_or_default(),
        })
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "{} ({}) lacks {}",
                self.username,
                self.role.as_str(),
                permission.codename()
            )))
        }
    }

    pub fn permission_codenames(&self) -> Vec<String> {
        let mut codenames: Vec<String> = self
            .role
            .permissions()
            .iter()
            .map(Permission::codename)
            .collect();
        codenames.sort();
        codenames
    }
}

/// The ids a session has selected as its working context. Each one is
/// independent in storage; `context::resolve_active_context` gives them
/// meaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub active_school_id: Option<i64>,
    pub active_school_year_id: Option<i64>,
    pub active_classroom_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub context: SessionContext,
}

#[derive(sqlx::FromRow)]
pub struct DbUserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: NaiveDateTime,
    pub active_school_id: Option<i64>,
    pub active_school_year_id: Option<i64>,
    pub active_classroom_id: Option<i64>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            token: session.token,
            created_at: session
                .created_at
                .unwrap_or_else(|| Utc::now().naive_utc()),
            expires_at: session.expires_at,
            context: SessionContext {
                active_school_id: session.active_school_id,
                active_school_year_id: session.active_school_year_id,
                active_classroom_id: session.active_classroom_id,
            },
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
