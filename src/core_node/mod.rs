pub mod error;
pub mod monitor;
pub mod node;
pub mod proto;
pub mod registry;
pub mod selector;
#[cfg(test)]
pub mod testutil;

pub use error::NodeError;
pub use node::NodeHandle;
pub use registry::NodeRegistry;
pub use selector::NodeSelector;
