pub mod network;
pub mod stream;
