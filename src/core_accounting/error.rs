use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Invalid password for {0}")]
    BadPassword(String),

    #[error("Not enough credits")]
    InsufficientCredit,
}

impl AccountError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            AccountError::UnknownUser(_) | AccountError::BadPassword(_) => {
                "530 Login incorrect.".to_string()
            }
            AccountError::InsufficientCredit => "550 Not enough credits.".to_string(),
        }
    }
}
