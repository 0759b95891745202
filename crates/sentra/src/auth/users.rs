//! In-memory user store.
//!
//! Process-local storage for registered users. Credentials are Argon2id
//! hashes; plaintext passwords never leave the registration/login handlers.

use crate::auth::password;
use crate::models::error::GatewayError;
use crate::models::principal::{Principal, Role};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
            permissions: vec![],
        }
    }
}

pub struct UserStore {
    // Keyed by lowercase username.
    users: RwLock<HashMap<String, User>>,
    argon: Argon2<'static>,
}

impl UserStore {
    pub fn new(argon: Argon2<'static>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            argon,
        }
    }

    /// Seeds the store with an administrator account so the admin surface is
    /// reachable on a fresh process. The password comes from
    /// `ADMIN_PASSWORD`; the development fallback is logged loudly.
    pub fn seed_admin(&self) -> Result<(), GatewayError> {
        let admin_password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| {
            warn!("ADMIN_PASSWORD not set, seeding admin with the development default");
            "ChangeMe!2024".to_string()
        });
        self.insert_user(
            "admin",
            "admin@localhost",
            &admin_password,
            vec![Role::Admin],
        )?;
        Ok(())
    }

    /// Registers a new user with the `user` role.
    ///
    /// Fails with a conflict when the username or email is already taken.
    /// The caller is responsible for schema validation; this only guards
    /// uniqueness and performs the hash.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        plaintext: &str,
    ) -> Result<User, GatewayError> {
        self.insert_user(username, email, plaintext, vec![Role::User])
    }

    fn insert_user(
        &self,
        username: &str,
        email: &str,
        plaintext: &str,
        roles: Vec<Role>,
    ) -> Result<User, GatewayError> {
        // Hash outside the lock; Argon2 is deliberately slow.
        let password_hash =
            password::hash_password(&self.argon, plaintext).map_err(GatewayError::internal)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            roles,
            created_at: Utc::now(),
        };

        let mut users = self.users.write().unwrap();
        if users.contains_key(&username.to_lowercase()) {
            return Err(GatewayError::Conflict {
                message: "Username already taken".to_string(),
            });
        }
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email))
        {
            return Err(GatewayError::Conflict {
                message: "Email already registered".to_string(),
            });
        }
        users.insert(username.to_lowercase(), user.clone());
        Ok(user)
    }

    pub fn find(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .unwrap()
            .get(&username.to_lowercase())
            .cloned()
    }

    /// Verifies a username/password pair against the stored hash.
    pub fn verify_credentials(&self, username: &str, plaintext: &str) -> Option<User> {
        let user = self.find(username)?;
        if password::verify_password(&self.argon, plaintext, &user.password_hash) {
            Some(user)
        } else {
            None
        }
    }

    pub fn count(&self) -> usize {
        self.users.read().unwrap().len()
    }
}
