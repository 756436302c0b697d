pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod reconciler;
pub mod sfv;
#[cfg(test)]
mod test_transfer;

pub use error::TransferError;
pub use orchestrator::{TransferCommand, TransferOrchestrator};
pub use outcome::TransferOutcome;
pub use reconciler::{ReconcileReport, Reconciler};
pub use sfv::SfvManifest;
