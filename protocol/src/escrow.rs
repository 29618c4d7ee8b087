//! # Escrow Facade
//!
//! Sale proceeds are forwarded to an escrow wallet the moment they are
//! accepted. From the sale's point of view the escrow is a sink: nothing
//! comes back, and a deposit fails only if the balance would overflow. Releasing funds is governed by the
//! wallet's own K-of-N confirmation scheme, which lives outside this crate.
//!
//! [`MultiSigWallet`] is the reference sink: it validates its owner set and
//! confirmation requirement at creation and records every deposit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::error::ErrorKind;

/// Errors raised by wallet configuration and deposits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// The wallet has no owners.
    #[error("wallet requires at least one owner")]
    NoOwners,

    /// An owner appears twice or is the zero address.
    #[error("invalid owner: {0}")]
    InvalidOwner(Address),

    /// `required` is zero or larger than the owner count.
    #[error("invalid requirement: {required} of {owners} confirmations")]
    InvalidRequirement {
        /// Confirmations requested.
        required: usize,
        /// Number of owners.
        owners: usize,
    },

    /// A deposit would overflow the wallet balance.
    #[error("balance overflow: depositing {amount}")]
    BalanceOverflow {
        /// Amount the caller tried to deposit.
        amount: u128,
    },
}

impl EscrowError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::BalanceOverflow { .. } => ErrorKind::Arithmetic,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// A fund sink for sale proceeds.
pub trait Escrow {
    /// Address of the escrow contract.
    fn address(&self) -> Address;

    /// Value currently held.
    fn balance(&self) -> u128;

    /// Accepts `amount` base units of value from `from` at time `at`.
    fn deposit(
        &mut self,
        from: &Address,
        amount: u128,
        at: DateTime<Utc>,
    ) -> Result<(), EscrowError>;
}

/// One recorded deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Who sent the value.
    pub from: Address,
    /// Base units received.
    pub amount: u128,
    /// When the deposit was recorded.
    pub received_at: DateTime<Utc>,
}

/// Multi-signature wallet used as the sale's escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSigWallet {
    address: Address,
    owners: Vec<Address>,
    required: usize,
    balance: u128,
    deposits: Vec<Deposit>,
}

impl MultiSigWallet {
    /// Creates a wallet at `address` requiring `required` of `owners` to
    /// confirm a withdrawal.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NoOwners`] for an empty owner list,
    /// [`EscrowError::InvalidOwner`] for a zero or duplicate owner, and
    /// [`EscrowError::InvalidRequirement`] unless `1 <= required <= owners`.
    pub fn new(
        address: Address,
        owners: Vec<Address>,
        required: usize,
    ) -> Result<Self, EscrowError> {
        if owners.is_empty() {
            return Err(EscrowError::NoOwners);
        }
        for (i, owner) in owners.iter().enumerate() {
            if owner.is_zero() || owners[..i].contains(owner) {
                return Err(EscrowError::InvalidOwner(*owner));
            }
        }
        if required == 0 || required > owners.len() {
            return Err(EscrowError::InvalidRequirement {
                required,
                owners: owners.len(),
            });
        }

        Ok(Self {
            address,
            owners,
            required,
            balance: 0,
            deposits: Vec::new(),
        })
    }

    /// Wallet owners.
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Confirmations needed to release funds.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Total value held.
    pub fn balance(&self) -> u128 {
        self.balance
    }

    /// Every deposit, oldest first.
    pub fn deposits(&self) -> &[Deposit] {
        &self.deposits
    }
}

impl Escrow for MultiSigWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn balance(&self) -> u128 {
        self.balance
    }

    fn deposit(
        &mut self,
        from: &Address,
        amount: u128,
        at: DateTime<Utc>,
    ) -> Result<(), EscrowError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow { amount })?;
        self.deposits.push(Deposit {
            from: *from,
            amount,
            received_at: at,
        });
        Ok(())
    }
}
