use serde::{Deserialize, Serialize};

fn default_ratio() -> f64 {
    3.0
}

fn default_group() -> String {
    String::from("users")
}

/// One user record as stored in the users file.
///
/// `ratio` is the credit multiplier for uploads; a ratio of 0 means the
/// account is exempt from credit checks entirely. Credits are bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    /// bcrypt hash of the password.
    pub password_hash: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default)]
    pub credits: u64,
    #[serde(default)]
    pub uploaded_bytes: u64,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default)]
    pub uploads: u64,
    #[serde(default)]
    pub downloads: u64,
}

impl UserAccount {
    /// True when the account's credit balance cannot cover a download of
    /// the given size. Ratio-exempt accounts always pass.
    pub fn lacks_credit_for(&self, size: u64) -> bool {
        self.ratio != 0.0 && self.credits < size
    }

    pub fn earned_credit(&self, uploaded: u64) -> u64 {
        (uploaded as f64 * self.ratio) as u64
    }
}
