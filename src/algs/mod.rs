//! Message passing and the collective building blocks of a transfer.

pub mod collective;
pub mod communicator;
pub mod wire;

pub use collective::{all_gather, exchange_counts, exchange_records};
