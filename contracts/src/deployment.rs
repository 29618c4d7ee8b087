//! # Deployment
//!
//! One sale, one committee, one token ledger and one escrow wallet, wired
//! together and shared behind a single lock.
//!
//! Every mutating call takes the write lock, snapshots `(caller, now)` from
//! the deployment's clock and runs to completion before the lock is
//! released, so state transitions are strictly serialized. Queries take the
//! read lock and see a consistent view. Handles are cheap to clone and can
//! be moved across threads and tasks.
//!
//! Wiring performed at construction:
//!
//! - the ledger is owned by the consensus address and mints only for the
//!   sale address;
//! - the escrow wallet lives at the sale's configured wallet address;
//! - the sale is bound to the ledger, and optional conversion rate and
//!   discount tiers are applied on behalf of the sale owner.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use minerva_protocol::escrow::{EscrowError, MultiSigWallet};
use minerva_protocol::ledger::{Ledger, LedgerError, TokenLedger};
use minerva_protocol::{Address, CallContext, Clock, ErrorKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::consensus::{Action, Consensus, ConsensusError, PendingProposal, VoteOutcome};
use crate::crowdsale::{
    ContributionReceipt, Crowdsale, DisbursementReceipt, DiscountTier, SaleConfig, SaleError,
    SalePhase, SaleTotals, TierState,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Any error surfaced by a deployment call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sale(#[from] SaleError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Two components were configured at the same address.
    #[error("address {0} is assigned to more than one component")]
    AddressCollision(Address),
}

impl DeploymentError {
    /// Taxonomy kind of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeploymentError::Sale(e) => e.kind(),
            DeploymentError::Consensus(e) => e.kind(),
            DeploymentError::Escrow(e) => e.kind(),
            DeploymentError::Ledger(e) => e.kind(),
            DeploymentError::AddressCollision(_) => ErrorKind::InvalidArgument,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything needed to stand up a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Address of the sale contract.
    pub sale_address: Address,
    /// Address of the consensus contract.
    pub consensus_address: Address,
    /// Address of the token ledger.
    pub token_address: Address,
    /// Sale parameters. `sale.wallet` is where the escrow lives.
    pub sale: SaleConfig,
    /// Initial voter roster.
    pub voters: Vec<Address>,
    /// Owners of the escrow wallet.
    pub wallet_owners: Vec<Address>,
    /// Confirmations the escrow wallet requires.
    pub wallet_required: usize,
    /// Initial conversion rate in USD cents per unit, if known up front.
    #[serde(default)]
    pub conversion_rate: Option<u128>,
    /// Discount tiers; empty means base price only.
    #[serde(default)]
    pub discount_tiers: Vec<DiscountTier>,
}

impl DeploymentConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse deployment config")
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployment config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    fn check_addresses(&self) -> Result<(), DeploymentError> {
        let assigned = [
            self.sale_address,
            self.consensus_address,
            self.token_address,
            self.sale.wallet,
        ];
        for (i, address) in assigned.iter().enumerate() {
            if assigned[..i].contains(address) {
                return Err(DeploymentError::AddressCollision(*address));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The contracts of one deployment.
#[derive(Debug, Clone)]
pub struct DeploymentState {
    /// The crowdsale; sole minter on `ledger`.
    pub sale: Crowdsale,
    /// The voter committee; owner of `ledger`.
    pub consensus: Consensus,
    /// The token ledger.
    pub ledger: TokenLedger,
    /// Escrow receiving sale proceeds.
    pub wallet: MultiSigWallet,
}

/// A consistent, serializable view of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    /// Clock time the snapshot was taken at.
    pub taken_at: DateTime<Utc>,
    /// Sale phase at `taken_at`.
    pub phase: SalePhase,
    /// Past the end time or at the cap.
    pub has_ended: bool,
    pub paused: bool,
    /// Running sale totals.
    pub totals: SaleTotals,
    pub hard_cap_usd_cents: u128,
    /// USD cents per whole value unit.
    pub conversion_rate: u128,
    pub token_price_cents: u128,
    /// Tier the next contribution starts in, if any.
    pub active_tier: Option<TierState>,
    pub team_tokens_disbursed: bool,
    /// Total minted on the ledger.
    pub token_supply: u128,
    pub ledger_owner: Address,
    pub bank_address: Address,
    pub voting_address: Address,
    /// Ledger tax rate in percent.
    pub tax_rate: u8,
    /// Value held by the escrow wallet.
    pub escrow_balance: u128,
    /// Registered voters in address order.
    pub voters: Vec<Address>,
    /// Votes needed to execute at the current roster size.
    pub threshold: usize,
    /// Proposals still below threshold.
    pub pending: Vec<PendingProposal>,
}

/// Shared handle to a deployment.
#[derive(Clone)]
pub struct Deployment {
    state: Arc<RwLock<DeploymentState>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl Deployment {
    /// Builds and wires a deployment from `config`.
    ///
    /// Must run before the sale starts, since binding the ledger and
    /// setting tiers are pre-sale operations.
    pub fn new(config: DeploymentConfig, clock: Arc<dyn Clock>) -> Result<Self, DeploymentError> {
        config.check_addresses()?;

        let mut sale = Crowdsale::new(config.sale_address, config.sale.clone())?;
        let mut consensus = Consensus::new(config.consensus_address, config.voters.clone())?;
        let ledger = TokenLedger::new(
            config.token_address,
            config.consensus_address,
            config.sale_address,
        );
        let wallet = MultiSigWallet::new(
            config.sale.wallet,
            config.wallet_owners.clone(),
            config.wallet_required,
        )?;

        consensus.set_token(&ledger)?;

        let ctx = CallContext::from_clock(config.sale.owner, clock.as_ref());
        sale.set_token(&ctx, &ledger)?;
        if let Some(rate) = config.conversion_rate {
            sale.set_conversion_rate(&ctx, rate)?;
        }
        if !config.discount_tiers.is_empty() {
            sale.set_discount_tiers(&ctx, config.discount_tiers.clone())?;
        }

        info!(
            sale = %config.sale_address,
            consensus = %config.consensus_address,
            token = %config.token_address,
            wallet = %config.sale.wallet,
            voters = consensus.total_voters(),
            "deployment wired"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(DeploymentState {
                sale,
                consensus,
                ledger,
                wallet,
            })),
            clock,
        })
    }

    /// Runs `f` under the write lock with a fresh call context, logging
    /// rejections.
    fn mutate<R, E>(
        &self,
        operation: &'static str,
        caller: Address,
        f: impl FnOnce(&mut DeploymentState, &CallContext) -> Result<R, E>,
    ) -> Result<R, DeploymentError>
    where
        DeploymentError: From<E>,
    {
        let mut state = self.state.write();
        let ctx = CallContext::from_clock(caller, self.clock.as_ref());
        f(&mut *state, &ctx).map_err(|e| {
            let e = DeploymentError::from(e);
            warn!(operation, %caller, kind = %e.kind(), error = %e, "call rejected");
            e
        })
    }

    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&DeploymentState) -> R) -> R {
        f(&*self.state.read())
    }

    // -- sale ----------------------------------------------------------------

    /// See [`Crowdsale::contribute`].
    pub fn contribute(
        &self,
        caller: Address,
        beneficiary: Address,
        value: u128,
    ) -> Result<ContributionReceipt, DeploymentError> {
        self.mutate("contribute", caller, |s, ctx| {
            s.sale
                .contribute(ctx, beneficiary, value, &mut s.ledger, &mut s.wallet)
        })
    }

    /// See [`Crowdsale::receive`].
    pub fn receive(&self, caller: Address, value: u128) -> Result<ContributionReceipt, DeploymentError> {
        self.mutate("receive", caller, |s, ctx| {
            s.sale.receive(ctx, value, &mut s.ledger, &mut s.wallet)
        })
    }

    /// See [`Crowdsale::disburse_team_tokens`].
    pub fn disburse_team_tokens(
        &self,
        caller: Address,
    ) -> Result<DisbursementReceipt, DeploymentError> {
        self.mutate("disburse_team_tokens", caller, |s, ctx| {
            s.sale.disburse_team_tokens(ctx, &mut s.ledger)
        })
    }

    /// See [`Crowdsale::configure_window`].
    pub fn configure_window(
        &self,
        caller: Address,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), DeploymentError> {
        self.mutate("configure_window", caller, |s, ctx| {
            s.sale.configure_window(ctx, start, end)
        })
    }

    /// See [`Crowdsale::set_conversion_rate`].
    pub fn set_conversion_rate(&self, caller: Address, rate: u128) -> Result<(), DeploymentError> {
        self.mutate("set_conversion_rate", caller, |s, ctx| {
            s.sale.set_conversion_rate(ctx, rate)
        })
    }

    /// See [`Crowdsale::set_token_price`].
    pub fn set_token_price(&self, caller: Address, cents: u128) -> Result<(), DeploymentError> {
        self.mutate("set_token_price", caller, |s, ctx| {
            s.sale.set_token_price(ctx, cents)
        })
    }

    /// See [`Crowdsale::set_discount_tiers`].
    pub fn set_discount_tiers(
        &self,
        caller: Address,
        tiers: Vec<DiscountTier>,
    ) -> Result<(), DeploymentError> {
        self.mutate("set_discount_tiers", caller, |s, ctx| {
            s.sale.set_discount_tiers(ctx, tiers)
        })
    }

    /// See [`Crowdsale::set_accredited`].
    pub fn set_accredited(
        &self,
        caller: Address,
        address: Address,
        accredited: bool,
    ) -> Result<(), DeploymentError> {
        self.mutate("set_accredited", caller, |s, ctx| {
            s.sale.set_accredited(ctx, address, accredited)
        })
    }

    /// See [`Crowdsale::set_blocked`].
    pub fn set_blocked(&self, caller: Address, address: Address) -> Result<(), DeploymentError> {
        self.mutate("set_blocked", caller, |s, ctx| {
            s.sale.set_blocked(ctx, address)
        })
    }

    /// See [`Crowdsale::pause`].
    pub fn pause(&self, caller: Address, paused: bool) -> Result<(), DeploymentError> {
        self.mutate("pause", caller, |s, ctx| s.sale.pause(ctx, paused))
    }

    // -- governance ----------------------------------------------------------

    /// See [`Consensus::cast_vote`].
    pub fn cast_vote(&self, caller: Address, action: Action) -> Result<VoteOutcome, DeploymentError> {
        self.mutate("cast_vote", caller, |s, ctx| {
            s.consensus.cast_vote(ctx, action, &mut s.ledger)
        })
    }

    // -- queries -------------------------------------------------------------

    /// Token balance of `address`.
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.read(|s| s.ledger.balance_of(address))
    }

    /// Consistent view of every component.
    pub fn snapshot(&self) -> DeploymentSnapshot {
        let state = self.state.read();
        let now = self.clock.now();
        let sale = &state.sale;
        DeploymentSnapshot {
            taken_at: now,
            phase: sale.phase(now),
            has_ended: sale.has_ended(now),
            paused: sale.is_paused(),
            totals: sale.totals(),
            hard_cap_usd_cents: sale.cap(),
            conversion_rate: sale.conversion_rate(),
            token_price_cents: sale.token_price_cents(),
            active_tier: sale.active_tier().copied(),
            team_tokens_disbursed: sale.team_tokens_disbursed(),
            token_supply: state.ledger.total_supply(),
            ledger_owner: state.ledger.owner(),
            bank_address: state.ledger.bank_address(),
            voting_address: state.ledger.voting_address(),
            tax_rate: state.ledger.tax_rate(),
            escrow_balance: state.wallet.balance(),
            voters: state.consensus.voters(),
            threshold: state.consensus.threshold(),
            pending: state.consensus.pending(),
        }
    }
}
