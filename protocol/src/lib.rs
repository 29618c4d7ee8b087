// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Minerva Protocol: Shared Primitives
//!
//! Everything the sale and governance contracts need to agree on, and
//! nothing they don't:
//!
//! - **address**: 20-byte account identifiers with hex encoding.
//! - **context**: who is calling and when. One clock, one truth.
//! - **math**: checked `u128` arithmetic. Money does not wrap.
//! - **error**: the error taxonomy every contract error maps onto.
//! - **config**: decimals, default prices, percentages, voter floor.
//! - **ledger**: the narrow administrative surface of the token ledger,
//!   plus an in-memory reference ledger.
//! - **escrow**: the fund sink sale proceeds land in, plus an in-memory
//!   multi-signature wallet.
//! - **logging**: `tracing` subscriber setup for hosts and test harnesses.
//!
//! ## Design Philosophy
//!
//! 1. Facades are traits. The contracts never know which ledger they talk to.
//! 2. Every fallible operation returns a typed error with a [`error::ErrorKind`].
//! 3. If it touches money, it has tests.

pub mod address;
pub mod config;
pub mod context;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod logging;
pub mod math;

pub use address::Address;
pub use context::{CallContext, Clock, ManualClock, SystemClock};
pub use error::ErrorKind;
