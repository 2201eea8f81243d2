//! User directory and the current-session marker.
//!
//! Passwords are stored as Argon2 PHC strings. The directory is seeded with
//! protected administrators the first time it is read so a fresh install can
//! always be logged into.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use coopledger_common::{Error, Result};
use coopledger_storage::{DocumentKey, DocumentStore, DocumentStoreExt};

/// Id of the seeded general administrator.
pub const DEFAULT_ADMIN_ID: &str = "admin-0";

/// Administrators created on first use as `(id, username, name)`. None can be deleted.
const SEEDED_ADMINS: [(&str, &str, &str); 2] = [
    (DEFAULT_ADMIN_ID, "admin", "Administrador Geral"),
    ("admin-tiago", "tiago", "Tiago"),
];
const SEEDED_PASSWORD: &str = "123";

/// Whether `user_id` belongs to a seeded administrator.
pub fn is_protected(user_id: &str) -> bool {
    SEEDED_ADMINS.iter().any(|(id, _, _)| *id == user_id)
}

/// What a user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Manages users and the remote configuration.
    Admin,
    /// Records daily production.
    User,
}

/// A person allowed to use the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: UserRole,
    password_hash: String,
}

impl User {
    /// Check a candidate password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash for {} is unreadable: {}", self.username, e);
                false
            }
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Replace the password.
    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = hash_password(password)?;
        Ok(())
    }
}

/// Fields supplied when registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub password: String,
    pub role: UserRole,
}

/// Persisted current-session marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionMarker {
    user_id: String,
    started_at: DateTime<Utc>,
}

fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::InvalidInput(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::InvalidInput(format!("Password hashing failed: {}", e)))
}

fn seeded_users() -> Result<Vec<User>> {
    SEEDED_ADMINS
        .iter()
        .map(|(id, username, name)| {
            Ok(User {
                id: id.to_string(),
                username: username.to_string(),
                name: name.to_string(),
                role: UserRole::Admin,
                password_hash: hash_password(SEEDED_PASSWORD)?,
            })
        })
        .collect()
}

/// User directory and session marker over a document backend.
pub struct UserDirectory {
    documents: Arc<dyn DocumentStore>,
    write_lock: Mutex<()>,
}

impl UserDirectory {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            write_lock: Mutex::new(()),
        }
    }

    /// All users, seeding the default administrators on first use.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        if let Some(users) = self
            .documents
            .read_json::<Vec<User>>(DocumentKey::Users)
            .await?
        {
            return Ok(users);
        }

        let _guard = self.write_lock.lock().await;
        self.load_or_seed().await
    }

    /// Register a new user.
    ///
    /// # Errors
    /// - `InvalidInput` if the username or password is empty, or the
    ///   username is already taken
    pub async fn add_user(&self, new_user: NewUser) -> Result<User> {
        let username = new_user.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::InvalidInput("Username cannot be empty".to_string()));
        }
        let password_hash = hash_password(&new_user.password)?;

        let _guard = self.write_lock.lock().await;
        let mut users = self.load_or_seed().await?;
        if users.iter().any(|u| u.username.eq_ignore_ascii_case(&username)) {
            return Err(Error::InvalidInput(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let user = User {
            id: Uuid::new_v4().simple().to_string(),
            username,
            name: new_user.name.trim().to_string(),
            role: new_user.role,
            password_hash,
        };
        users.push(user.clone());
        self.documents.write_json(DocumentKey::Users, &users).await?;
        info!("Added user {}", user.username);
        Ok(user)
    }

    /// Insert or replace a user, matched by id.
    pub async fn save_user(&self, user: User) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.load_or_seed().await?;

        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
        self.documents.write_json(DocumentKey::Users, &users).await
    }

    /// Remove a user.
    ///
    /// # Returns
    /// - `true` if a user was removed, `false` if the id was absent
    ///
    /// # Errors
    /// - `NotPermitted` for a seeded administrator
    pub async fn delete_user(&self, user_id: &str) -> Result<bool> {
        if is_protected(user_id) {
            return Err(Error::NotPermitted(format!(
                "Administrator {} cannot be removed",
                user_id
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut users = self.load_or_seed().await?;
        let before = users.len();
        users.retain(|u| u.id != user_id);
        if users.len() == before {
            return Ok(false);
        }

        self.documents.write_json(DocumentKey::Users, &users).await?;
        info!("Removed user {}", user_id);
        Ok(true)
    }

    /// Find a user by username (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.list_users().await?;
        Ok(users
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username.trim())))
    }

    /// Check credentials.
    ///
    /// # Errors
    /// - `Authentication` if the user is unknown or the password is wrong
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        match self.find_by_username(username).await? {
            Some(user) if user.verify_password(password) => Ok(user),
            _ => Err(Error::Authentication(
                "Unknown username or wrong password".to_string(),
            )),
        }
    }

    /// Authenticate and record the user as the current session.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self.authenticate(username, password).await?;
        let marker = SessionMarker {
            user_id: user.id.clone(),
            started_at: Utc::now(),
        };
        self.documents
            .write_json(DocumentKey::Session, &marker)
            .await?;
        info!("{} logged in", user.username);
        Ok(user)
    }

    /// The logged-in user, if any.
    ///
    /// A session pointing at a user that no longer exists resolves to `None`.
    pub async fn current_user(&self) -> Result<Option<User>> {
        let Some(marker) = self
            .documents
            .read_json::<SessionMarker>(DocumentKey::Session)
            .await?
        else {
            return Ok(None);
        };

        let users = self.list_users().await?;
        Ok(users.into_iter().find(|u| u.id == marker.user_id))
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<()> {
        self.documents.remove(DocumentKey::Session).await
    }

    /// Read the directory, writing the seed if it was never created.
    /// Callers hold `write_lock`.
    async fn load_or_seed(&self) -> Result<Vec<User>> {
        if let Some(users) = self
            .documents
            .read_json::<Vec<User>>(DocumentKey::Users)
            .await?
        {
            return Ok(users);
        }

        let users = seeded_users()?;
        self.documents.write_json(DocumentKey::Users, &users).await?;
        info!("Seeded user directory with {} administrators", users.len());
        Ok(users)
    }
}
