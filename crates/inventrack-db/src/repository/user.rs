//! # User Repository
//!
//! Accounts, password changes and credential checks. Deleting a user leaves
//! their historical movements untouched (linked by id and name snapshot only).

use tracing::{debug, info};

use inventrack_core::validation::{validate_new_user, validate_user_update};
use inventrack_core::{CoreError, NewUser, Role, User, UserUpdate};

use super::{generate_id, non_blank, CountRow};
use crate::engine::Database;
use crate::error::{DbError, DbResult, ServiceResult};
use crate::params;
use crate::password::{hash_password_task, verify_password_task};

const USER_COLUMNS: &str = "id, username, password_hash, name, role";

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

fn username_conflict(err: DbError, username: &str) -> DbError {
    match err {
        DbError::UniqueViolation { .. } => DbError::duplicate("username", username),
        other => other,
    }
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    /// All users, admins first, then by name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        self.db
            .query_all(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY role ASC, name ASC"),
                params![],
            )
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        self.db
            .query_one(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                params![id],
            )
            .await
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        self.db
            .query_one(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"),
                params![username],
            )
            .await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let row: Option<CountRow> = self
            .db
            .query_one("SELECT COUNT(*) AS count FROM users", params![])
            .await?;
        Ok(row.map(|r| r.count).unwrap_or(0))
    }

    /// Creates an account. Unknown roles become staff.
    ///
    /// ## Errors
    /// - Validation: missing fields, password shorter than 6 characters
    /// - `DbError::UniqueViolation`: username taken
    pub async fn create(&self, new: NewUser) -> ServiceResult<User> {
        validate_new_user(&new)?;

        let username = new.username.trim().to_string();
        if self.get_by_username(&username).await?.is_some() {
            return Err(DbError::duplicate("username", username).into());
        }

        let user = User {
            id: generate_id(),
            username,
            password_hash: hash_password_task(&new.password).await?,
            name: new.name.trim().to_string(),
            role: Role::from_input(new.role.as_deref()),
        };

        self.db
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
                params![
                    &user.id,
                    &user.username,
                    &user.password_hash,
                    &user.name,
                    user.role.as_str()
                ],
            )
            .await
            .map_err(|e| username_conflict(e, &user.username))?;

        info!(username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Applies a partial update; a new password is re-hashed.
    pub async fn update(&self, id: &str, update: UserUpdate) -> ServiceResult<User> {
        validate_user_update(&update)?;

        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(id.to_string()))?;

        let username = non_blank(update.username.as_deref()).unwrap_or(existing.username.clone());
        if username != existing.username {
            if let Some(other) = self.get_by_username(&username).await? {
                if other.id != id {
                    return Err(DbError::duplicate("username", username).into());
                }
            }
        }

        let password_hash = match update.password.as_deref() {
            Some(password) => hash_password_task(password).await?,
            None => existing.password_hash,
        };

        let user = User {
            id: existing.id,
            username,
            password_hash,
            name: non_blank(update.name.as_deref()).unwrap_or(existing.name),
            role: update.role.unwrap_or(existing.role),
        };

        debug!(id = %id, "Updating user");

        self.db
            .execute(
                "UPDATE users SET username = ?, password_hash = ?, name = ?, role = ? WHERE id = ?",
                params![
                    &user.username,
                    &user.password_hash,
                    &user.name,
                    user.role.as_str(),
                    id
                ],
            )
            .await
            .map_err(|e| username_conflict(e, &user.username))?;

        Ok(user)
    }

    /// Deletes an account. Users cannot delete themselves.
    pub async fn delete(&self, id: &str, acting_user_id: &str) -> ServiceResult<()> {
        if self.get_by_id(id).await?.is_none() {
            return Err(CoreError::UserNotFound(id.to_string()).into());
        }
        if id == acting_user_id {
            return Err(CoreError::SelfDeletion.into());
        }

        self.db
            .execute("DELETE FROM users WHERE id = ?", params![id])
            .await?;

        info!(id = %id, "User deleted");
        Ok(())
    }

    /// Returns the user when `password` matches, `None` otherwise.
    ///
    /// Unknown usernames and wrong passwords are indistinguishable.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(user) = self.get_by_username(username.trim()).await? else {
            return Ok(None);
        };

        let valid = verify_password_task(password, &user.password_hash).await?;
        Ok(valid.then_some(user))
    }
}
