//! Verification predicates run between two open endpoints.

pub mod rs485;
pub mod transfer;

pub use rs485::verify_rs485;
pub use transfer::{
    verify_exchange, verify_transfer, TransferCheck, DEFAULT_POLL_INTERVAL,
    DEFAULT_TRANSFER_TIMEOUT,
};
