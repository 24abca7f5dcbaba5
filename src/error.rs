//! Error types surfaced by the oracle's public API.
//!
//! Probe failures are deliberately *not* represented here: the poll worker
//! converts them into pair-table removals, never into an error a caller
//! can observe (see the oracle's error handling design).
//!
//! `ResolutionFailed` exists so a `Resolver` implementation has somewhere
//! to put "DNS gave nothing back", but it never reaches an `Oracle` caller:
//! `get_addr_pairs` catches it and returns an empty sequence instead, since
//! "no addresses" is not an exceptional outcome.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("DNS resolution failed for {target}")]
    ResolutionFailed { target: String },

    #[error("host inventory unavailable: {0}")]
    InventoryUnavailable(#[from] std::io::Error),

    #[error("oracle already shut down")]
    AlreadyShutDown,
}
