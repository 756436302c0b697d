use crate::core_accounting::account::UserAccount;
use crate::core_accounting::error::AccountError;
use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default, rename = "user")]
    users: Vec<UserAccount>,
}

/// All user accounts, loaded from a TOML file at startup and written back
/// after credit or statistics changes. Shared by every session.
pub struct AccountRegistry {
    users: Mutex<HashMap<String, UserAccount>>,
    path: Option<PathBuf>,
}

impl AccountRegistry {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file {}", path))?;
        let parsed: UsersFile = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse users file {}", path))?;
        let mut users = HashMap::new();
        for account in parsed.users {
            users.insert(account.username.clone(), account);
        }
        info!("Loaded {} user accounts from {}", users.len(), path);
        Ok(AccountRegistry {
            users: Mutex::new(users),
            path: Some(PathBuf::from(path)),
        })
    }

    #[cfg(test)]
    pub fn in_memory(accounts: Vec<UserAccount>) -> Self {
        let mut users = HashMap::new();
        for account in accounts {
            users.insert(account.username.clone(), account);
        }
        AccountRegistry {
            users: Mutex::new(users),
            path: None,
        }
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), AccountError> {
        let users = self.users.lock().unwrap();
        let account = users
            .get(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        match bcrypt::verify(password, &account.password_hash) {
            Ok(true) => Ok(()),
            _ => Err(AccountError::BadPassword(username.to_string())),
        }
    }

    pub fn exists(&self, username: &str) -> bool {
        self.users.lock().unwrap().contains_key(username)
    }

    pub fn get(&self, username: &str) -> Option<UserAccount> {
        self.users.lock().unwrap().get(username).cloned()
    }

    pub fn check_download_credit(&self, username: &str, size: u64) -> Result<(), AccountError> {
        let users = self.users.lock().unwrap();
        let account = users
            .get(username)
            .ok_or_else(|| AccountError::UnknownUser(username.to_string()))?;
        if account.lacks_credit_for(size) {
            Err(AccountError::InsufficientCredit)
        } else {
            Ok(())
        }
    }

    /// Charges a completed download against the account and commits.
    pub fn apply_download(&self, username: &str, bytes: u64) {
        {
            let mut users = self.users.lock().unwrap();
            if let Some(account) = users.get_mut(username) {
                if account.ratio != 0.0 {
                    account.credits = account.credits.saturating_sub(bytes);
                }
                account.downloaded_bytes += bytes;
                account.downloads += 1;
            }
        }
        self.persist();
    }

    /// Credits a clean upload to the account and commits. Never called for
    /// uploads the reconciler rejected.
    pub fn apply_upload(&self, username: &str, bytes: u64) {
        {
            let mut users = self.users.lock().unwrap();
            if let Some(account) = users.get_mut(username) {
                account.credits += account.earned_credit(bytes);
                account.uploaded_bytes += bytes;
                account.uploads += 1;
            }
        }
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let snapshot = UsersFile {
            users: {
                let users = self.users.lock().unwrap();
                let mut list: Vec<UserAccount> = users.values().cloned().collect();
                list.sort_by(|a, b| a.username.cmp(&b.username));
                list
            },
        };
        match toml::to_string_pretty(&snapshot) {
            Ok(serialized) => {
                if let Err(e) = std::fs::write(path, serialized) {
                    warn!("Failed to write users file {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize users file: {}", e),
        }
    }
}
