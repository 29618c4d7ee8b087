//! # Minerva Sale Contracts
//!
//! Contract logic for the Minerva token sale and its governance:
//!
//! - **Crowdsale**: a time-boxed sale priced in USD cents with tiered
//!   discounts, a hard cap with proportional refunds, accreditation and
//!   blocking of beneficiaries, and a one-shot team/bounty allocation.
//! - **Consensus**: a voter committee that rewrites the token ledger's
//!   administrative settings (owner, bank, voting address, tax rate,
//!   partners) and its own membership by strict-majority vote.
//! - **Deployment**: the sale, the committee, the ledger and the escrow
//!   wallet wired together behind one lock, with a shared clock.
//!
//! ## Design Principles
//!
//! 1. All monetary operations use checked arithmetic from
//!    `minerva_protocol::math`. Money does not wrap.
//! 2. An operation either applies every effect or none. Plans are computed
//!    against immutable state and committed only after the one fallible
//!    external call has succeeded.
//! 3. Every privileged operation checks the caller first.
//! 4. Every public type is serializable (serde) for snapshots and receipts.

pub mod consensus;
pub mod crowdsale;
pub mod deployment;
