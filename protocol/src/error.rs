//! # Error Taxonomy
//!
//! Each module defines its own `thiserror` enum with the detail a caller
//! needs to debug a rejection. All of them collapse onto one of these kinds,
//! which is what hosts branch on.

use serde::{Deserialize, Serialize};

/// Coarse classification of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Caller lacks the required role (owner, voter, accredited beneficiary).
    Unauthorized,
    /// Operation attempted outside its lifecycle window.
    InvalidState,
    /// Malformed input: zero address, zero value, bad tier schedule, etc.
    InvalidArgument,
    /// The sale's hard cap is already fully consumed.
    CapacityExhausted,
    /// Caller already voted for this exact pending proposal.
    DuplicateVote,
    /// Checked arithmetic failed.
    Arithmetic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::InvalidState => write!(f, "InvalidState"),
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::CapacityExhausted => write!(f, "CapacityExhausted"),
            ErrorKind::DuplicateVote => write!(f, "DuplicateVote"),
            ErrorKind::Arithmetic => write!(f, "Arithmetic"),
        }
    }
}
