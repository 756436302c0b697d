pub mod error;
pub mod negotiator;
pub mod port_pool;
#[cfg(test)]
mod test_channel;

pub use error::ChannelError;
pub use negotiator::{
    ActiveAdvice, ChannelState, NegotiatedChannel, PreSelection, PretGrant, PretRequest,
    ReprType, TransferDirection,
};
pub use port_pool::PassivePortPool;
