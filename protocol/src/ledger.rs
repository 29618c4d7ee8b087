//! # Token Ledger Facade
//!
//! The sale mints through the ledger and governance rewrites its
//! administrative fields; neither owns it. [`Ledger`] is the narrow surface
//! both depend on, and [`TokenLedger`] is an in-memory implementation of
//! exactly that surface.
//!
//! ## Authorization Model
//!
//! - **Administrative mutators** (`set_owner`, `set_bank_address`,
//!   `set_voting_address`, `set_tax_rate`, `register_partner`) accept the
//!   current owner or the current voting address.
//! - **Minting** accepts only the configured minter (the sale contract).
//!   The owner may rotate the minter.
//! - **Supply tracking**: total supply and balances are updated together;
//!   overflow is checked before anything is written.
//!
//! Transfers, taxes on transfer and partner payouts are the real ledger's
//! business and are not modelled here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::config::MAX_PERCENT;
use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller is neither the owner nor the voting address.
    #[error("unauthorized: {caller} may not administer this ledger")]
    Unauthorized {
        /// Address that attempted the call.
        caller: Address,
    },

    /// The caller is not the configured minter.
    #[error("unauthorized: {caller} is not the minter")]
    UnauthorizedMint {
        /// Address that attempted the mint.
        caller: Address,
    },

    /// The zero address was supplied where a real account is required.
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),

    /// A percentage parameter exceeded 100.
    #[error("{field} must be at most 100%, got {value}")]
    PercentOutOfRange {
        /// Which parameter was out of range.
        field: &'static str,
        /// The rejected value.
        value: u8,
    },

    /// Minting would overflow the supply or a balance.
    #[error("supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow {
        /// Amount the caller tried to mint.
        amount: u128,
    },
}

impl LedgerError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized { .. } | LedgerError::UnauthorizedMint { .. } => {
                ErrorKind::Unauthorized
            }
            LedgerError::ZeroAddress(_) | LedgerError::PercentOutOfRange { .. } => {
                ErrorKind::InvalidArgument
            }
            LedgerError::SupplyOverflow { .. } => ErrorKind::Arithmetic,
        }
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Administrative surface of the token ledger.
///
/// Every mutator takes the calling address so the ledger can enforce its
/// own authorization; callers never get to skip that check.
pub trait Ledger {
    /// Address of the ledger contract.
    fn address(&self) -> Address;

    /// Replaces the owner.
    fn set_owner(&mut self, caller: &Address, owner: Address) -> Result<(), LedgerError>;

    /// Replaces the bank address (where taxes accrue).
    fn set_bank_address(&mut self, caller: &Address, bank: Address) -> Result<(), LedgerError>;

    /// Replaces the voting address.
    fn set_voting_address(&mut self, caller: &Address, voting: Address)
        -> Result<(), LedgerError>;

    /// Sets the transfer tax rate, in percent.
    fn set_tax_rate(&mut self, caller: &Address, percent: u8) -> Result<(), LedgerError>;

    /// Registers (or re-registers) a partner with an allocation percentage.
    fn register_partner(
        &mut self,
        caller: &Address,
        partner: Address,
        allocation_percent: u8,
    ) -> Result<(), LedgerError>;

    /// Creates `amount` new base units in `beneficiary`'s balance.
    fn mint(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Applies several mints as one: either every `(beneficiary, amount)`
    /// lands or none does.
    fn mint_all(&mut self, caller: &Address, mints: &[(Address, u128)])
        -> Result<(), LedgerError>;

    /// Balance of `address`, zero if unknown.
    fn balance_of(&self, address: &Address) -> u128;

    /// Whether `address` is a registered partner.
    fn is_partner(&self, address: &Address) -> bool;
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

/// In-memory ledger implementing the administrative facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    address: Address,
    owner: Address,
    minter: Address,
    bank_address: Address,
    voting_address: Address,
    tax_rate: u8,
    total_supply: u128,
    balances: HashMap<Address, u128>,
    partners: HashMap<Address, u8>,
}

impl TokenLedger {
    /// Creates an empty ledger at `address`, administered by `owner`, with
    /// `minter` allowed to create supply.
    pub fn new(address: Address, owner: Address, minter: Address) -> Self {
        Self {
            address,
            owner,
            minter,
            bank_address: Address::ZERO,
            voting_address: Address::ZERO,
            tax_rate: 0,
            total_supply: 0,
            balances: HashMap::new(),
            partners: HashMap::new(),
        }
    }

    fn ensure_admin(&self, caller: &Address) -> Result<(), LedgerError> {
        let is_voting = !self.voting_address.is_zero() && *caller == self.voting_address;
        if *caller == self.owner || is_voting {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller: *caller })
        }
    }

    fn ensure_percent(field: &'static str, value: u8) -> Result<(), LedgerError> {
        if value > MAX_PERCENT {
            return Err(LedgerError::PercentOutOfRange { field, value });
        }
        Ok(())
    }

    /// Rotates the minter. Owner only.
    pub fn set_minter(&mut self, caller: &Address, minter: Address) -> Result<(), LedgerError> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        if minter.is_zero() {
            return Err(LedgerError::ZeroAddress("minter"));
        }
        self.minter = minter;
        Ok(())
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Current minter.
    pub fn minter(&self) -> Address {
        self.minter
    }

    /// Current bank address.
    pub fn bank_address(&self) -> Address {
        self.bank_address
    }

    /// Current voting address.
    pub fn voting_address(&self) -> Address {
        self.voting_address
    }

    /// Current tax rate in percent.
    pub fn tax_rate(&self) -> u8 {
        self.tax_rate
    }

    /// Allocation of a registered partner.
    pub fn partner_allocation(&self, partner: &Address) -> Option<u8> {
        self.partners.get(partner).copied()
    }

    /// Total minted supply in base units.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }
}

impl Ledger for TokenLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn set_owner(&mut self, caller: &Address, owner: Address) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if owner.is_zero() {
            return Err(LedgerError::ZeroAddress("owner"));
        }
        self.owner = owner;
        Ok(())
    }

    fn set_bank_address(&mut self, caller: &Address, bank: Address) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if bank.is_zero() {
            return Err(LedgerError::ZeroAddress("bank"));
        }
        self.bank_address = bank;
        Ok(())
    }

    fn set_voting_address(
        &mut self,
        caller: &Address,
        voting: Address,
    ) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if voting.is_zero() {
            return Err(LedgerError::ZeroAddress("voting"));
        }
        self.voting_address = voting;
        Ok(())
    }

    fn set_tax_rate(&mut self, caller: &Address, percent: u8) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        Self::ensure_percent("tax rate", percent)?;
        self.tax_rate = percent;
        Ok(())
    }

    fn register_partner(
        &mut self,
        caller: &Address,
        partner: Address,
        allocation_percent: u8,
    ) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if partner.is_zero() {
            return Err(LedgerError::ZeroAddress("partner"));
        }
        Self::ensure_percent("partner allocation", allocation_percent)?;
        self.partners.insert(partner, allocation_percent);
        Ok(())
    }

    fn mint(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.mint_all(caller, &[(*beneficiary, amount)])
    }

    fn mint_all(
        &mut self,
        caller: &Address,
        mints: &[(Address, u128)],
    ) -> Result<(), LedgerError> {
        if *caller != self.minter {
            return Err(LedgerError::UnauthorizedMint { caller: *caller });
        }

        // Stage every sum before writing any.
        let mut new_supply = self.total_supply;
        let mut staged: HashMap<Address, u128> = HashMap::new();
        for &(beneficiary, amount) in mints {
            if beneficiary.is_zero() {
                return Err(LedgerError::ZeroAddress("beneficiary"));
            }
            new_supply = new_supply
                .checked_add(amount)
                .ok_or(LedgerError::SupplyOverflow { amount })?;
            let current = staged
                .get(&beneficiary)
                .copied()
                .unwrap_or_else(|| self.balance_of(&beneficiary));
            let new_balance = current
                .checked_add(amount)
                .ok_or(LedgerError::SupplyOverflow { amount })?;
            staged.insert(beneficiary, new_balance);
        }

        self.total_supply = new_supply;
        self.balances.extend(staged);
        Ok(())
    }

    fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn is_partner(&self, address: &Address) -> bool {
        self.partners.contains_key(address)
    }
}
