pub mod account;
pub mod error;
pub mod registry;

pub use account::UserAccount;
pub use error::AccountError;
pub use registry::AccountRegistry;
