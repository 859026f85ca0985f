//! # User Repository
//!
//! Account creation and credential checks. Passwords are stored as bcrypt
//! digests; hashing runs on the blocking pool.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::error::RepositoryError;
use crate::models::user::{self, Entity as User};

static USER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{2,32}$").expect("valid user name pattern"));

/// Signup payload after deserialization
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
    hash_cost: u32,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower the bcrypt cost, for tests.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn create(&self, new: NewUser) -> Result<user::Model, RepositoryError> {
        validate_name(&new.name)?;
        let email = normalize_email(&new.email)?;
        if new.password.is_empty() {
            return Err(RepositoryError::validation_error("password cannot be empty"));
        }

        let cost = self.hash_cost;
        let password = new.password;
        let digest = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?
            .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?;

        let active = user::ActiveModel {
            name: Set(new.name),
            email: Set(email),
            password_digest: Set(digest),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        active
            .insert(&*self.db)
            .await
            .map_err(|e| RepositoryError::database_error(e, "user"))
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, RepositoryError> {
        Ok(User::find_by_id(id).one(&*self.db).await?)
    }

    /// Look up by user name, or by email ignoring case.
    pub async fn find_by_login(&self, login: &str) -> Result<Option<user::Model>, RepositoryError> {
        let login = login.trim();
        let found = User::find()
            .filter(
                Condition::any()
                    .add(user::Column::Name.eq(login))
                    .add(user::Column::Email.eq(login.to_lowercase())),
            )
            .one(&*self.db)
            .await?;
        Ok(found)
    }

    /// The active user matching `login` and `password`, if any.
    pub async fn verify_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<user::Model>, RepositoryError> {
        let Some(user) = self.find_by_login(login).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let password = password.to_string();
        let digest = user.password_digest.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest))
            .await
            .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?
            .unwrap_or(false);

        Ok(matches.then_some(user))
    }
}

fn validate_name(name: &str) -> Result<(), RepositoryError> {
    if USER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(RepositoryError::validation_error(
            "name must be 2-32 characters of letters, digits, '_' or '-'",
        ))
    }
}

fn normalize_email(email: &str) -> Result<String, RepositoryError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(RepositoryError::validation_error("email address is invalid")),
    }
}
