use crate::eid::Eid;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// What the API returns. Never carries credential material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCreate {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
}

pub trait UserStore: Send + Sync {
    fn create(&self, create: UserCreate) -> anyhow::Result<User>;
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>>;
    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    fn total(&self) -> anyhow::Result<usize>;
}

/// JSON-file user store: the whole list lives in memory, every mutation is
/// persisted atomically via temp-file-and-rename.
#[derive(Debug, Clone, Default)]
pub struct BackendJson {
    list: Arc<RwLock<Vec<User>>>,
    path: PathBuf,
}

impl BackendJson {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let users: Vec<User> = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("creating new user database at {}", path.display());
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };

        let store = BackendJson {
            list: Arc::new(RwLock::new(users)),
            path: path.to_path_buf(),
        };
        store.save()?;

        Ok(store)
    }

    fn save(&self) -> anyhow::Result<()> {
        let users = self.list.read().unwrap();

        let tmp_path = self.path.with_extension("json-tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&*users)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl UserStore for BackendJson {
    fn create(&self, create: UserCreate) -> anyhow::Result<User> {
        let email = create.email.to_lowercase();

        {
            let users = self.list.read().unwrap();
            if users.iter().any(|u| u.email == email) {
                bail!("email already registered: {email}");
            }
            if users.iter().any(|u| u.username == create.username) {
                bail!("username already taken: {}", create.username);
            }
        }

        let user = User {
            id: Eid::new().to_string(),
            email,
            username: create.username,
            password_hash: create.password_hash,
            salt: create.salt,
            role: create.role,
            created_at: Utc::now(),
        };

        self.list.write().unwrap().push(user.clone());
        self.save()?;

        Ok(user)
    }

    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>> {
        let users = self.list.read().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let email = email.to_lowercase();
        let users = self.list.read().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.list.read().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    fn total(&self) -> anyhow::Result<usize> {
        Ok(self.list.read().unwrap().len())
    }
}
