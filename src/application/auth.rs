//! Sign-in and session tokens for back-office users.

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AuthSettings;
use crate::domain::{Caller, Role, User};
use crate::storage::{self, Repository, is_unique_violation};

use super::AppError;

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

#[derive(Clone)]
pub struct AuthService {
    repo: Repository,
    jwt_secret: String,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

/// JWT claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    role: Role,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

impl AuthService {
    pub fn new(repo: Repository, settings: &AuthSettings) -> Self {
        Self {
            repo,
            jwt_secret: settings.jwt_secret.clone(),
            token_ttl: Duration::hours(settings.token_ttl_hours),
            bcrypt_cost: settings.bcrypt_cost,
        }
    }

    /// Check a username and password and issue a session token.
    /// Unknown users and wrong passwords fail the same way.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AppError> {
        let mut conn = self.repo.acquire().await?;
        let Some(user) = storage::users::find_by_username(&mut conn, username.trim()).await? else {
            tracing::warn!(username, "login for unknown user");
            return Err(AppError::AuthenticationFailed);
        };

        let valid = verify(password, &user.password_hash)
            .map_err(|e| anyhow::anyhow!("Password verification failed: {e}"))?;
        if !valid {
            tracing::warn!(username, "login with wrong password");
            return Err(AppError::AuthenticationFailed);
        }

        let (token, expires_at) = self.issue_token(&user)?;
        tracing::info!(user_id = user.id, username = %user.username, "user logged in");

        Ok(LoginResult {
            token,
            user,
            expires_at,
        })
    }

    /// Resolve a session token to the caller it was issued for.
    pub fn validate_token(&self, token: &str) -> Result<Caller, AppError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AppError::AuthenticationFailed
        })?;

        let user_id = data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthenticationFailed)?;

        Ok(Caller {
            user_id,
            username: data.claims.username,
            role: data.claims.role,
        })
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let username = new_user.username.trim();
        if username.is_empty() {
            return Err(AppError::validation("Username is required"));
        }
        if new_user.password.is_empty() {
            return Err(AppError::validation("Password is required"));
        }

        let password_hash = hash(&new_user.password, self.bcrypt_cost)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {e}"))?;

        let mut user = User {
            id: 0,
            username: username.to_string(),
            password_hash,
            role: new_user.role,
            full_name: new_user.full_name.trim().to_string(),
            created_at: Utc::now(),
        };

        let mut conn = self.repo.acquire().await?;
        match storage::users::insert(&mut conn, &mut user).await {
            Ok(()) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::UsernameTaken(user.username));
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, username: &str) -> Result<User, AppError> {
        let mut conn = self.repo.acquire().await?;
        storage::users::find_by_username(&mut conn, username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// The stored account behind a validated token.
    pub async fn current_user(&self, caller: &Caller) -> Result<User, AppError> {
        let user = self.get_user(&caller.username).await?;
        if user.id != caller.user_id {
            return Err(AppError::UserNotFound(caller.username.clone()));
        }
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(storage::users::list(&mut conn).await?)
    }

    /// Create the first administrator on an empty database. Returns `None`
    /// when users already exist.
    pub async fn bootstrap_admin(&self, password: &str) -> Result<Option<User>, AppError> {
        let existing = {
            let mut conn = self.repo.acquire().await?;
            storage::users::count(&mut conn).await?
        };
        if existing > 0 {
            return Ok(None);
        }

        let admin = self
            .create_user(NewUser {
                username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
                password: password.to_string(),
                full_name: "System Administrator".to_string(),
                role: Role::Admin,
            })
            .await?;
        Ok(Some(admin))
    }

    fn issue_token(&self, user: &User) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow::anyhow!("Token generation failed: {e}"))?;

        Ok((token, expires_at))
    }
}

/// Capability check used by transports before role-restricted operations.
pub fn require_role(caller: &Caller, role: Role) -> Result<(), AppError> {
    if caller.has_role(role) {
        Ok(())
    } else {
        tracing::warn!(username = %caller.username, required = %role, "forbidden");
        Err(AppError::Forbidden { required: role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> Caller {
        Caller {
            user_id: 7,
            username: "sam".into(),
            role,
        }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&caller(Role::Admin), Role::Admin).is_ok());
        assert!(matches!(
            require_role(&caller(Role::Manager), Role::Admin),
            Err(AppError::Forbidden { required: Role::Admin })
        ));
    }
}
