//! Database initialization and transaction helpers

pub mod init;
pub mod tx;

pub use init::*;
pub use tx::*;
