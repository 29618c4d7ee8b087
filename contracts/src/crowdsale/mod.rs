//! # Crowdsale Contract
//!
//! A time-boxed token sale priced in USD cents with tiered discounts and a
//! hard cap. The lifecycle is:
//!
//! 1. **Pending**: before `start`. The owner binds the token ledger, sets
//!    the window, base price and discount tiers, and accredits buyers.
//! 2. **Open**: `start <= now < end`. Accredited beneficiaries receive
//!    tokens for value contributed; proceeds go straight to the escrow
//!    wallet. The owner may pause and unpause, and keeps the conversion rate
//!    current.
//! 3. **Closed**: `now >= end`. Contributions are rejected; the owner
//!    mints the team and bounty allocation exactly once.
//!
//! The sale is also considered ended once the hard cap is reached. The
//! contribution that reaches it is accepted only up to the remaining
//! headroom, and the unused part of the value is reported back as a refund.
//!
//! ## Atomicity
//!
//! A contribution is first *planned* against an immutable view of the sale
//! ([`Crowdsale::plan_contribution`]): every check, every conversion and the
//! full tier walk happen there, including the checked sums the commit will
//! write. Applying the plan checks the escrow's headroom, mints (the only
//! effect left that can fail), then deposits, then commits state. A rejection at any point leaves the
//! sale, the ledger and the escrow exactly as they were.

mod accreditation;
mod pricing;

pub use accreditation::AccreditationRegistry;
pub use pricing::{DiscountSchedule, DiscountTier, PriceSegment, TierAllocation, TierState};

use chrono::{DateTime, Utc};
use minerva_protocol::config::{
    DEFAULT_BOUNTY_PERCENT, DEFAULT_TEAM_PERCENT, DEFAULT_TOKEN_PRICE_CENTS, MAX_PERCENT,
    VALUE_UNIT,
};
use minerva_protocol::escrow::{Escrow, EscrowError};
use minerva_protocol::ledger::{Ledger, LedgerError};
use minerva_protocol::math::{self, MathError};
use minerva_protocol::{Address, CallContext, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during sale operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleError {
    /// The caller is not the sale owner.
    #[error("unauthorized: {caller} is not the sale owner")]
    Unauthorized {
        /// Address that attempted the operation.
        caller: Address,
    },

    /// The beneficiary has not been accredited.
    #[error("beneficiary {0} is not accredited")]
    NotAccredited(Address),

    /// The beneficiary has been blocked.
    #[error("beneficiary {0} is blocked")]
    Blocked(Address),

    /// The sale is not in a phase that allows this operation.
    #[error("invalid state: sale is {current}, expected {expected}")]
    InvalidState {
        /// Current phase.
        current: SalePhase,
        /// Phase(s) required for the attempted operation.
        expected: &'static str,
    },

    /// Contributions are paused.
    #[error("sale is paused")]
    Paused,

    /// No token ledger has been bound to the sale.
    #[error("no token ledger bound to the sale")]
    TokenNotSet,

    /// The conversion rate has never been set.
    #[error("conversion rate not set")]
    ConversionRateUnset,

    /// Team and bounty tokens were already minted.
    #[error("team tokens already disbursed")]
    AlreadyDisbursed,

    /// Configured tiers ran out before the accepted amount was priced.
    #[error("discount tiers exhausted with {unallocated} cents unallocated")]
    TiersExhausted {
        /// USD cents left unpriced.
        unallocated: u128,
    },

    /// The hard cap has already been reached.
    #[error("hard cap of {cap} cents reached")]
    CapReached {
        /// The hard cap in USD cents.
        cap: u128,
    },

    /// Zero value contributed.
    #[error("contribution value must be positive")]
    ZeroValue,

    /// The value is worth less than one USD cent at the current rate.
    #[error("contribution of {value} is worth less than one cent")]
    ContributionTooSmall {
        /// The contributed value in base units.
        value: u128,
    },

    /// A zero address where a real account is required.
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),

    /// The address belongs to the sale's own infrastructure.
    #[error("{0} cannot be accredited")]
    IneligibleAddress(Address),

    /// `start` is not strictly before `end`.
    #[error("invalid window: start {start} must be before end {end}")]
    InvalidWindow {
        /// Proposed start.
        start: DateTime<Utc>,
        /// Proposed end.
        end: DateTime<Utc>,
    },

    /// A rate, price or percentage is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The discount schedule is malformed.
    #[error("invalid discount tiers: {0}")]
    InvalidTiers(String),

    /// The ledger passed in is not the one bound to the sale.
    #[error("ledger mismatch: sale is bound to {expected}, got {actual}")]
    LedgerMismatch {
        /// Bound ledger.
        expected: Address,
        /// Ledger passed to the call.
        actual: Address,
    },

    /// The escrow passed in is not the sale's wallet.
    #[error("escrow mismatch: proceeds go to {expected}, got {actual}")]
    EscrowMismatch {
        /// Configured wallet.
        expected: Address,
        /// Escrow passed to the call.
        actual: Address,
    },

    /// Checked arithmetic failed.
    #[error(transparent)]
    Math(#[from] MathError),

    /// The ledger rejected a mint.
    #[error("ledger rejected mint: {0}")]
    Ledger(#[from] LedgerError),

    /// The escrow refused the deposit.
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowError),
}

impl SaleError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SaleError::Unauthorized { .. }
            | SaleError::NotAccredited(_)
            | SaleError::Blocked(_) => ErrorKind::Unauthorized,
            SaleError::InvalidState { .. }
            | SaleError::Paused
            | SaleError::TokenNotSet
            | SaleError::ConversionRateUnset
            | SaleError::AlreadyDisbursed
            | SaleError::TiersExhausted { .. } => ErrorKind::InvalidState,
            SaleError::CapReached { .. } => ErrorKind::CapacityExhausted,
            SaleError::ZeroValue
            | SaleError::ContributionTooSmall { .. }
            | SaleError::ZeroAddress(_)
            | SaleError::IneligibleAddress(_)
            | SaleError::InvalidWindow { .. }
            | SaleError::InvalidParameter(_)
            | SaleError::InvalidTiers(_)
            | SaleError::LedgerMismatch { .. }
            | SaleError::EscrowMismatch { .. } => ErrorKind::InvalidArgument,
            SaleError::Math(e) => e.kind(),
            SaleError::Ledger(e) => e.kind(),
            SaleError::Escrow(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Time-based phase of the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    /// Before `start`.
    Pending,
    /// Between `start` (inclusive) and `end` (exclusive).
    Open,
    /// At or after `end`.
    Closed,
}

impl std::fmt::Display for SalePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SalePhase::Pending => write!(f, "Pending"),
            SalePhase::Open => write!(f, "Open"),
            SalePhase::Closed => write!(f, "Closed"),
        }
    }
}

/// The sale's start and end instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    /// First instant contributions are accepted.
    pub start: DateTime<Utc>,
    /// First instant contributions are rejected again.
    pub end: DateTime<Utc>,
}

impl SaleWindow {
    /// Builds a window, requiring `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SaleError> {
        if start >= end {
            return Err(SaleError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Phase of the window at `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> SalePhase {
        if now < self.start {
            SalePhase::Pending
        } else if now < self.end {
            SalePhase::Open
        } else {
            SalePhase::Closed
        }
    }
}

fn default_team_percent() -> u8 {
    DEFAULT_TEAM_PERCENT
}

fn default_bounty_percent() -> u8 {
    DEFAULT_BOUNTY_PERCENT
}

fn default_token_price_cents() -> u128 {
    DEFAULT_TOKEN_PRICE_CENTS
}

fn default_value_unit() -> u128 {
    VALUE_UNIT
}

/// Parameters fixed when the sale is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Administrator of the sale.
    pub owner: Address,
    /// Sale opens at this instant.
    pub start: DateTime<Utc>,
    /// Sale closes at this instant.
    pub end: DateTime<Utc>,
    /// Maximum USD cents the sale accepts.
    pub hard_cap_usd_cents: u128,
    /// Escrow wallet receiving proceeds.
    pub wallet: Address,
    /// Receives the team allocation after the sale.
    pub team_wallet: Address,
    /// Receives the bounty allocation after the sale.
    pub bounty_wallet: Address,
    /// Team allocation as a percentage of tokens sold.
    #[serde(default = "default_team_percent")]
    pub team_percent: u8,
    /// Bounty allocation as a percentage of tokens sold.
    #[serde(default = "default_bounty_percent")]
    pub bounty_percent: u8,
    /// Base price of one whole token in USD cents.
    #[serde(default = "default_token_price_cents")]
    pub token_price_cents: u128,
    /// Base units in one whole unit of contributed value.
    #[serde(default = "default_value_unit")]
    pub value_unit: u128,
}

impl SaleConfig {
    /// Checks every field for consistency.
    pub fn validate(&self) -> Result<(), SaleError> {
        SaleWindow::new(self.start, self.end)?;
        if self.owner.is_zero() {
            return Err(SaleError::ZeroAddress("owner"));
        }
        if self.wallet.is_zero() {
            return Err(SaleError::ZeroAddress("wallet"));
        }
        if self.team_wallet.is_zero() {
            return Err(SaleError::ZeroAddress("team wallet"));
        }
        if self.bounty_wallet.is_zero() {
            return Err(SaleError::ZeroAddress("bounty wallet"));
        }
        if self.hard_cap_usd_cents == 0 {
            return Err(SaleError::InvalidParameter("hard cap must be positive".into()));
        }
        if u16::from(self.team_percent) + u16::from(self.bounty_percent) > u16::from(MAX_PERCENT)
        {
            return Err(SaleError::InvalidParameter(format!(
                "team {}% + bounty {}% exceeds 100%",
                self.team_percent, self.bounty_percent
            )));
        }
        if self.token_price_cents == 0 {
            return Err(SaleError::InvalidParameter("token price must be positive".into()));
        }
        if self.value_unit == 0 {
            return Err(SaleError::InvalidParameter("value unit must be positive".into()));
        }
        Ok(())
    }
}

/// Cumulative sale totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    /// USD cents accepted.
    pub usd_raised: u128,
    /// Value base units accepted (refunds excluded).
    pub value_raised: u128,
    /// Token base units minted to contributors.
    pub tokens_raised: u128,
}

/// One side effect of a committed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Tokens minted on the ledger.
    Mint {
        /// Recipient of the tokens.
        beneficiary: Address,
        /// Token base units.
        amount: u128,
    },
    /// Value forwarded to the escrow.
    Deposit {
        /// Escrow address.
        escrow: Address,
        /// Value base units.
        amount: u128,
    },
    /// Value handed back to the sender because the cap was hit.
    Refund {
        /// Original sender.
        to: Address,
        /// Value base units.
        amount: u128,
    },
}

/// A fully priced contribution that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionPlan {
    /// Address that sent the value.
    pub contributor: Address,
    /// Address receiving the tokens.
    pub beneficiary: Address,
    /// Value sent, in base units.
    pub value: u128,
    /// Value kept by the sale.
    pub accepted_value: u128,
    /// Value returned to the contributor.
    pub refunded_value: u128,
    /// USD cents the full value was worth.
    pub requested_usd_cents: u128,
    /// USD cents actually accepted.
    pub accepted_usd_cents: u128,
    /// Tier walk result.
    pub allocation: TierAllocation,
    /// Totals after the plan is applied.
    pub totals_after: SaleTotals,
}

/// Outcome of a successful contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    /// Unique identifier of this contribution.
    pub receipt_id: String,
    /// Address that sent the value.
    pub contributor: Address,
    /// Address that received the tokens.
    pub beneficiary: Address,
    /// Value kept by the sale.
    pub accepted_value: u128,
    /// Value returned to the contributor.
    pub refunded_value: u128,
    /// USD cents the full value was worth.
    pub requested_usd_cents: u128,
    /// USD cents accepted.
    pub accepted_usd_cents: u128,
    /// Token base units minted.
    pub tokens: u128,
    /// Per-tier pricing breakdown.
    pub segments: Vec<PriceSegment>,
    /// Side effects, in the order they were applied.
    pub effects: Vec<Effect>,
    /// When the contribution was processed.
    pub processed_at: DateTime<Utc>,
}

/// Outcome of the post-sale team allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementReceipt {
    /// Team wallet.
    pub team_wallet: Address,
    /// Token base units minted to the team wallet.
    pub team_tokens: u128,
    /// Bounty wallet.
    pub bounty_wallet: Address,
    /// Token base units minted to the bounty wallet.
    pub bounty_tokens: u128,
}

// ---------------------------------------------------------------------------
// Crowdsale
// ---------------------------------------------------------------------------

/// The sale contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crowdsale {
    address: Address,
    owner: Address,
    token: Option<Address>,
    wallet: Address,
    team_wallet: Address,
    bounty_wallet: Address,
    team_percent: u8,
    bounty_percent: u8,
    window: SaleWindow,
    hard_cap_usd_cents: u128,
    usd_cents_per_unit: u128,
    token_price_cents: u128,
    value_unit: u128,
    schedule: DiscountSchedule,
    accreditation: AccreditationRegistry,
    paused: bool,
    totals: SaleTotals,
    team_tokens_disbursed: bool,
}

impl Crowdsale {
    /// Deploys a sale at `address`.
    ///
    /// The sale starts with no ledger bound, no conversion rate, no tiers
    /// and nobody accredited.
    ///
    /// # Errors
    ///
    /// Any [`SaleConfig::validate`] failure, or a zero `address`.
    pub fn new(address: Address, config: SaleConfig) -> Result<Self, SaleError> {
        if address.is_zero() {
            return Err(SaleError::ZeroAddress("sale"));
        }
        config.validate()?;

        Ok(Self {
            address,
            owner: config.owner,
            token: None,
            wallet: config.wallet,
            team_wallet: config.team_wallet,
            bounty_wallet: config.bounty_wallet,
            team_percent: config.team_percent,
            bounty_percent: config.bounty_percent,
            window: SaleWindow::new(config.start, config.end)?,
            hard_cap_usd_cents: config.hard_cap_usd_cents,
            usd_cents_per_unit: 0,
            token_price_cents: config.token_price_cents,
            value_unit: config.value_unit,
            schedule: DiscountSchedule::default(),
            accreditation: AccreditationRegistry::new(),
            paused: false,
            totals: SaleTotals::default(),
            team_tokens_disbursed: false,
        })
    }

    fn ensure_owner(&self, ctx: &CallContext) -> Result<(), SaleError> {
        if ctx.caller != self.owner {
            return Err(SaleError::Unauthorized { caller: ctx.caller });
        }
        Ok(())
    }

    fn ensure_pending(&self, ctx: &CallContext) -> Result<(), SaleError> {
        let current = self.window.phase(ctx.now);
        if current != SalePhase::Pending {
            return Err(SaleError::InvalidState {
                current,
                expected: "Pending",
            });
        }
        Ok(())
    }

    fn ensure_bound_ledger<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<(), SaleError> {
        let expected = self.token.ok_or(SaleError::TokenNotSet)?;
        let actual = ledger.address();
        if actual != expected {
            return Err(SaleError::LedgerMismatch { expected, actual });
        }
        Ok(())
    }

    // -- administration ----------------------------------------------------

    /// Replaces the sale window. Owner only, before the current start.
    pub fn configure_window(
        &mut self,
        ctx: &CallContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        self.ensure_pending(ctx)?;
        self.window = SaleWindow::new(start, end)?;
        info!(%start, %end, "sale window updated");
        Ok(())
    }

    /// Sets how many USD cents one whole unit of value is worth. Owner
    /// only, allowed at any time; applies to every later contribution.
    pub fn set_conversion_rate(
        &mut self,
        ctx: &CallContext,
        usd_cents_per_unit: u128,
    ) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        if usd_cents_per_unit == 0 {
            return Err(SaleError::InvalidParameter(
                "conversion rate must be positive".into(),
            ));
        }
        self.usd_cents_per_unit = usd_cents_per_unit;
        info!(usd_cents_per_unit, "conversion rate updated");
        Ok(())
    }

    /// Sets the undiscounted token price in USD cents. Owner only, pre-sale.
    pub fn set_token_price(&mut self, ctx: &CallContext, cents: u128) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        self.ensure_pending(ctx)?;
        if cents == 0 {
            return Err(SaleError::InvalidParameter("token price must be positive".into()));
        }
        self.token_price_cents = cents;
        info!(cents, "token price updated");
        Ok(())
    }

    /// Binds the token ledger the sale mints through. Owner only, pre-sale.
    ///
    /// Taking the ledger itself, rather than a bare address, guarantees the
    /// bound address is a live ledger contract.
    pub fn set_token<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &L,
    ) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        self.ensure_pending(ctx)?;
        let token = ledger.address();
        if token.is_zero() {
            return Err(SaleError::ZeroAddress("token"));
        }
        self.token = Some(token);
        info!(%token, "token ledger bound");
        Ok(())
    }

    /// Replaces the discount schedule. Owner only, pre-sale.
    pub fn set_discount_tiers(
        &mut self,
        ctx: &CallContext,
        tiers: Vec<DiscountTier>,
    ) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        self.ensure_pending(ctx)?;
        let count = tiers.len();
        self.schedule = DiscountSchedule::new(tiers, self.hard_cap_usd_cents)?;
        info!(tiers = count, "discount schedule configured");
        Ok(())
    }

    /// Grants or revokes accreditation. Owner only.
    ///
    /// The zero address, the sale itself, its token ledger and its wallets
    /// can never be accredited.
    pub fn set_accredited(
        &mut self,
        ctx: &CallContext,
        address: Address,
        accredited: bool,
    ) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        if address.is_zero() {
            return Err(SaleError::ZeroAddress("beneficiary"));
        }
        if self.is_infrastructure(&address) {
            return Err(SaleError::IneligibleAddress(address));
        }
        self.accreditation.set_accredited(address, accredited);
        debug!(%address, accredited, "accreditation updated");
        Ok(())
    }

    /// Blocks an address from receiving tokens. Owner only; irreversible.
    pub fn set_blocked(&mut self, ctx: &CallContext, address: Address) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        if address.is_zero() {
            return Err(SaleError::ZeroAddress("beneficiary"));
        }
        self.accreditation.block(address);
        info!(%address, "beneficiary blocked");
        Ok(())
    }

    /// Pauses or resumes contributions. Owner only, once the sale has started.
    pub fn pause(&mut self, ctx: &CallContext, paused: bool) -> Result<(), SaleError> {
        self.ensure_owner(ctx)?;
        let current = self.window.phase(ctx.now);
        if current == SalePhase::Pending {
            return Err(SaleError::InvalidState {
                current,
                expected: "Open or Closed",
            });
        }
        self.paused = paused;
        info!(paused, "pause flag updated");
        Ok(())
    }

    fn is_infrastructure(&self, address: &Address) -> bool {
        *address == self.address
            || Some(*address) == self.token
            || *address == self.wallet
            || *address == self.team_wallet
            || *address == self.bounty_wallet
    }

    // -- contributions -----------------------------------------------------

    /// Prices a contribution without changing anything.
    ///
    /// Performs every check [`contribute`](Self::contribute) performs except
    /// the ledger/escrow identity checks, in this order: paused, phase, zero
    /// value, beneficiary eligibility, hard cap, binding and rate.
    pub fn plan_contribution(
        &self,
        ctx: &CallContext,
        beneficiary: Address,
        value: u128,
    ) -> Result<ContributionPlan, SaleError> {
        if self.paused {
            return Err(SaleError::Paused);
        }
        let current = self.window.phase(ctx.now);
        if current != SalePhase::Open {
            return Err(SaleError::InvalidState {
                current,
                expected: "Open",
            });
        }
        if value == 0 {
            return Err(SaleError::ZeroValue);
        }
        if self.accreditation.is_blocked(&beneficiary) {
            return Err(SaleError::Blocked(beneficiary));
        }
        if !self.accreditation.may_receive(&beneficiary) {
            return Err(SaleError::NotAccredited(beneficiary));
        }
        if self.cap_reached() {
            return Err(SaleError::CapReached {
                cap: self.hard_cap_usd_cents,
            });
        }
        if self.token.is_none() {
            return Err(SaleError::TokenNotSet);
        }
        if self.usd_cents_per_unit == 0 {
            return Err(SaleError::ConversionRateUnset);
        }

        let requested_usd = math::mul_div(value, self.usd_cents_per_unit, self.value_unit)?;
        if requested_usd == 0 {
            return Err(SaleError::ContributionTooSmall { value });
        }

        let headroom = math::sub(self.hard_cap_usd_cents, self.totals.usd_raised)?;
        let accepted_usd = requested_usd.min(headroom);
        let accepted_value = if accepted_usd == requested_usd {
            value
        } else {
            math::mul_div(value, accepted_usd, requested_usd)?
        };
        let refunded_value = math::sub(value, accepted_value)?;

        let allocation = self.schedule.allocate(accepted_usd, self.token_price_cents)?;

        let totals_after = SaleTotals {
            usd_raised: math::add(self.totals.usd_raised, accepted_usd)?,
            value_raised: math::add(self.totals.value_raised, accepted_value)?,
            tokens_raised: math::add(self.totals.tokens_raised, allocation.tokens)?,
        };

        Ok(ContributionPlan {
            contributor: ctx.caller,
            beneficiary,
            value,
            accepted_value,
            refunded_value,
            requested_usd_cents: requested_usd,
            accepted_usd_cents: accepted_usd,
            allocation,
            totals_after,
        })
    }

    /// Buys tokens for `beneficiary` with `value` sent by `ctx.caller`.
    ///
    /// On success the beneficiary holds the minted tokens, the escrow holds
    /// the accepted value, and the receipt reports any refund the host must
    /// hand back to the caller.
    ///
    /// # Errors
    ///
    /// - [`SaleError::Paused`], [`SaleError::InvalidState`] outside the window.
    /// - [`SaleError::ZeroValue`], [`SaleError::ContributionTooSmall`].
    /// - [`SaleError::Blocked`], [`SaleError::NotAccredited`] for the beneficiary.
    /// - [`SaleError::CapReached`] once the hard cap is consumed.
    /// - [`SaleError::LedgerMismatch`] / [`SaleError::EscrowMismatch`] when
    ///   handed the wrong collaborators; [`SaleError::Ledger`] if the mint
    ///   is refused.
    /// - [`SaleError::Math`] if the escrow balance would overflow.
    pub fn contribute<L, E>(
        &mut self,
        ctx: &CallContext,
        beneficiary: Address,
        value: u128,
        ledger: &mut L,
        escrow: &mut E,
    ) -> Result<ContributionReceipt, SaleError>
    where
        L: Ledger + ?Sized,
        E: Escrow + ?Sized,
    {
        let plan = self.plan_contribution(ctx, beneficiary, value)?;
        self.ensure_bound_ledger(&*ledger)?;
        if escrow.address() != self.wallet {
            return Err(SaleError::EscrowMismatch {
                expected: self.wallet,
                actual: escrow.address(),
            });
        }

        // The deposit cannot fail once this headroom check passes.
        math::add(escrow.balance(), plan.accepted_value)?;

        let tokens = plan.allocation.tokens;
        ledger.mint(&self.address, &plan.beneficiary, tokens)?;
        escrow.deposit(&plan.contributor, plan.accepted_value, ctx.now)?;

        let cursor_before = self.schedule.cursor();
        self.schedule.apply(&plan.allocation);
        self.totals = plan.totals_after;
        if self.schedule.cursor() != cursor_before {
            debug!(
                from = cursor_before,
                to = self.schedule.cursor(),
                "discount tier advanced"
            );
        }

        let mut effects = vec![
            Effect::Mint {
                beneficiary: plan.beneficiary,
                amount: tokens,
            },
            Effect::Deposit {
                escrow: self.wallet,
                amount: plan.accepted_value,
            },
        ];
        if plan.refunded_value > 0 {
            effects.push(Effect::Refund {
                to: plan.contributor,
                amount: plan.refunded_value,
            });
        }

        info!(
            beneficiary = %plan.beneficiary,
            accepted_usd_cents = plan.accepted_usd_cents,
            tokens,
            refunded = plan.refunded_value,
            usd_raised = self.totals.usd_raised,
            "contribution accepted"
        );

        Ok(ContributionReceipt {
            receipt_id: Uuid::new_v4().to_string(),
            contributor: plan.contributor,
            beneficiary: plan.beneficiary,
            accepted_value: plan.accepted_value,
            refunded_value: plan.refunded_value,
            requested_usd_cents: plan.requested_usd_cents,
            accepted_usd_cents: plan.accepted_usd_cents,
            tokens,
            segments: plan.allocation.segments,
            effects,
            processed_at: ctx.now,
        })
    }

    /// Default receive path: value sent straight to the sale buys tokens
    /// for the sender.
    pub fn receive<L, E>(
        &mut self,
        ctx: &CallContext,
        value: u128,
        ledger: &mut L,
        escrow: &mut E,
    ) -> Result<ContributionReceipt, SaleError>
    where
        L: Ledger + ?Sized,
        E: Escrow + ?Sized,
    {
        self.contribute(ctx, ctx.caller, value, ledger, escrow)
    }

    /// Mints the team and bounty allocation. Owner only, once, after `end`.
    ///
    /// Each allocation is a percentage of tokens sold. Both shares are
    /// minted in one all-or-nothing ledger call; when both wallets are the
    /// same address a single mint covers both.
    pub fn disburse_team_tokens<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
    ) -> Result<DisbursementReceipt, SaleError> {
        self.ensure_owner(ctx)?;
        let current = self.window.phase(ctx.now);
        if current != SalePhase::Closed {
            return Err(SaleError::InvalidState {
                current,
                expected: "Closed",
            });
        }
        if self.team_tokens_disbursed {
            return Err(SaleError::AlreadyDisbursed);
        }
        self.ensure_bound_ledger(&*ledger)?;

        let team_tokens = math::percent_of(self.totals.tokens_raised, self.team_percent)?;
        let bounty_tokens = math::percent_of(self.totals.tokens_raised, self.bounty_percent)?;

        if self.team_wallet == self.bounty_wallet {
            let combined = math::add(team_tokens, bounty_tokens)?;
            ledger.mint(&self.address, &self.team_wallet, combined)?;
        } else {
            ledger.mint_all(
                &self.address,
                &[
                    (self.team_wallet, team_tokens),
                    (self.bounty_wallet, bounty_tokens),
                ],
            )?;
        }
        self.team_tokens_disbursed = true;

        info!(
            team_wallet = %self.team_wallet,
            team_tokens,
            bounty_wallet = %self.bounty_wallet,
            bounty_tokens,
            "team tokens disbursed"
        );

        Ok(DisbursementReceipt {
            team_wallet: self.team_wallet,
            team_tokens,
            bounty_wallet: self.bounty_wallet,
            bounty_tokens,
        })
    }

    // -- queries -----------------------------------------------------------

    /// Hard cap in USD cents.
    pub fn cap(&self) -> u128 {
        self.hard_cap_usd_cents
    }

    fn cap_reached(&self) -> bool {
        self.totals.usd_raised >= self.hard_cap_usd_cents
    }

    /// `true` once `end` has passed or the cap is reached.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.window.phase(now) == SalePhase::Closed || self.cap_reached()
    }

    /// Phase of the sale window at `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> SalePhase {
        self.window.phase(now)
    }

    /// Token base units minted to contributors.
    pub fn tokens_raised(&self) -> u128 {
        self.totals.tokens_raised
    }

    /// USD cents accepted.
    pub fn usd_raised(&self) -> u128 {
        self.totals.usd_raised
    }

    /// Value base units accepted.
    pub fn value_raised(&self) -> u128 {
        self.totals.value_raised
    }

    /// All cumulative totals.
    pub fn totals(&self) -> SaleTotals {
        self.totals
    }

    /// Current window.
    pub fn window(&self) -> SaleWindow {
        self.window
    }

    /// USD cents per whole unit of value; zero until set.
    pub fn conversion_rate(&self) -> u128 {
        self.usd_cents_per_unit
    }

    /// Undiscounted token price in USD cents.
    pub fn token_price_cents(&self) -> u128 {
        self.token_price_cents
    }

    /// Whether contributions are paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether `address` carries the accredited flag.
    pub fn is_accredited(&self, address: &Address) -> bool {
        self.accreditation.is_accredited(address)
    }

    /// Whether `address` is blocked.
    pub fn is_blocked(&self, address: &Address) -> bool {
        self.accreditation.is_blocked(address)
    }

    /// The discount schedule and its cursor.
    pub fn schedule(&self) -> &DiscountSchedule {
        &self.schedule
    }

    /// The tier the next contribution starts in.
    pub fn active_tier(&self) -> Option<&TierState> {
        self.schedule.active()
    }

    /// Whether the team allocation has been minted.
    pub fn team_tokens_disbursed(&self) -> bool {
        self.team_tokens_disbursed
    }

    /// Bound ledger address, if any.
    pub fn token(&self) -> Option<Address> {
        self.token
    }

    /// Sale owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Address of the sale contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Escrow receiving proceeds.
    pub fn wallet(&self) -> Address {
        self.wallet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use minerva_protocol::config::TOKEN_UNIT;
    use minerva_protocol::escrow::MultiSigWallet;
    use minerva_protocol::ledger::TokenLedger;

    const SALE: Address = Address::repeat_byte(0x5a);
    const TOKEN: Address = Address::repeat_byte(0x70);
    const WALLET: Address = Address::repeat_byte(0x77);
    const OWNER: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const BOB: Address = Address::repeat_byte(0xb0);

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn config() -> SaleConfig {
        SaleConfig {
            owner: OWNER,
            start: t0() + Duration::hours(1),
            end: t0() + Duration::hours(10),
            hard_cap_usd_cents: 650_000,
            wallet: WALLET,
            team_wallet: WALLET,
            bounty_wallet: WALLET,
            team_percent: DEFAULT_TEAM_PERCENT,
            bounty_percent: DEFAULT_BOUNTY_PERCENT,
            token_price_cents: 20,
            value_unit: VALUE_UNIT,
        }
    }

    fn owner_pre() -> CallContext {
        CallContext::at(OWNER, t0())
    }

    fn during(caller: Address) -> CallContext {
        CallContext::at(caller, t0() + Duration::hours(2))
    }

    fn after(caller: Address) -> CallContext {
        CallContext::at(caller, t0() + Duration::hours(11))
    }

    struct Fixture {
        sale: Crowdsale,
        ledger: TokenLedger,
        escrow: MultiSigWallet,
    }

    fn fixture() -> Fixture {
        let mut sale = Crowdsale::new(SALE, config()).unwrap();
        let ledger = TokenLedger::new(TOKEN, OWNER, SALE);
        let escrow = MultiSigWallet::new(WALLET, vec![OWNER, BOB], 2).unwrap();
        sale.set_token(&owner_pre(), &ledger).unwrap();
        sale.set_conversion_rate(&owner_pre(), 100_000).unwrap();
        sale.set_discount_tiers(
            &owner_pre(),
            vec![
                DiscountTier::new(40, 100_000),
                DiscountTier::new(30, 300_000),
                DiscountTier::new(20, 400_000),
            ],
        )
        .unwrap();
        sale.set_accredited(&owner_pre(), ALICE, true).unwrap();
        Fixture {
            sale,
            ledger,
            escrow,
        }
    }

    #[test]
    fn new_sale_starts_empty() {
        let sale = Crowdsale::new(SALE, config()).unwrap();
        assert_eq!(sale.cap(), 650_000);
        assert_eq!(sale.usd_raised(), 0);
        assert_eq!(sale.tokens_raised(), 0);
        assert!(sale.token().is_none());
        assert!(!sale.has_ended(t0()));
        assert_eq!(sale.phase(t0()), SalePhase::Pending);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut c = config();
        c.end = c.start;
        assert!(matches!(
            Crowdsale::new(SALE, c),
            Err(SaleError::InvalidWindow { .. })
        ));

        let mut c = config();
        c.team_percent = 90;
        assert_eq!(
            Crowdsale::new(SALE, c).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        assert!(Crowdsale::new(Address::ZERO, config()).is_err());
    }

    #[test]
    fn contribution_within_first_tier() {
        let mut f = fixture();
        let r = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();
        assert_eq!(r.accepted_usd_cents, 100_000);
        assert_eq!(r.refunded_value, 0);
        assert_eq!(r.tokens, pricing::tokens_for(100_000, 20, 40).unwrap());
        assert_eq!(f.ledger.balance_of(&ALICE), r.tokens);
        assert_eq!(f.escrow.balance(), VALUE_UNIT);
        assert_eq!(f.sale.usd_raised(), 100_000);
        assert_eq!(f.sale.active_tier().unwrap().tier.discount_percent, 30);
        assert_eq!(r.effects.len(), 2);
    }

    #[test]
    fn contribution_spanning_tiers_sums_segments() {
        let mut f = fixture();
        let r = f
            .sale
            .contribute(
                &during(ALICE),
                ALICE,
                3 * VALUE_UNIT / 2,
                &mut f.ledger,
                &mut f.escrow,
            )
            .unwrap();
        assert_eq!(r.segments.len(), 2);
        let expected = pricing::tokens_for(100_000, 20, 40).unwrap()
            + pricing::tokens_for(50_000, 20, 30).unwrap();
        assert_eq!(r.tokens, expected);
    }

    #[test]
    fn rejections_leave_state_untouched() {
        let mut f = fixture();
        let before = f.sale.totals();

        let early = CallContext::at(ALICE, t0());
        let err = f
            .sale
            .contribute(&early, ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = f
            .sale
            .contribute(&during(BOB), BOB, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::NotAccredited(BOB));

        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, 0, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::ZeroValue);

        assert_eq!(f.sale.totals(), before);
        assert_eq!(f.ledger.total_supply(), 0);
        assert_eq!(f.escrow.balance(), 0);
    }

    #[test]
    fn blocked_beneficiary_rejected_even_if_accredited() {
        let mut f = fixture();
        f.sale.set_blocked(&during(OWNER), ALICE).unwrap();
        let err = f
            .sale
            .contribute(&during(BOB), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::Blocked(ALICE));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn refused_mint_rolls_back_everything() {
        let mut f = fixture();
        // A ledger at the bound address whose minter is someone else.
        let mut foreign = TokenLedger::new(TOKEN, OWNER, BOB);
        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut foreign, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(f.escrow.balance(), 0);
        assert_eq!(f.sale.usd_raised(), 0);
        assert_eq!(f.sale.schedule().cursor(), 0);
    }

    #[test]
    fn full_escrow_rejects_before_minting() {
        let mut f = fixture();
        f.escrow.deposit(&BOB, u128::MAX, t0()).unwrap();
        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::Math(MathError::Overflow));
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        assert_eq!(f.ledger.total_supply(), 0);
        assert_eq!(f.escrow.deposits().len(), 1);
        assert_eq!(f.sale.usd_raised(), 0);
    }

    #[test]
    fn contribution_deposit_is_stamped_with_call_time() {
        let mut f = fixture();
        let ctx = during(ALICE);
        f.sale
            .contribute(&ctx, ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();
        assert_eq!(f.escrow.deposits()[0].received_at, ctx.now);
    }

    #[test]
    fn wrong_collaborators_rejected() {
        let mut f = fixture();
        let mut other_ledger = TokenLedger::new(Address::repeat_byte(0x71), OWNER, SALE);
        let err = f
            .sale
            .contribute(
                &during(ALICE),
                ALICE,
                VALUE_UNIT,
                &mut other_ledger,
                &mut f.escrow,
            )
            .unwrap_err();
        assert!(matches!(err, SaleError::LedgerMismatch { .. }));

        let mut other_wallet =
            MultiSigWallet::new(Address::repeat_byte(0x78), vec![OWNER], 1).unwrap();
        let err = f
            .sale
            .contribute(
                &during(ALICE),
                ALICE,
                VALUE_UNIT,
                &mut f.ledger,
                &mut other_wallet,
            )
            .unwrap_err();
        assert!(matches!(err, SaleError::EscrowMismatch { .. }));
    }

    #[test]
    fn cap_clamp_refunds_proportionally() {
        let mut f = fixture();
        // $6,000 of the $6,500 cap.
        f.sale
            .contribute(
                &during(ALICE),
                ALICE,
                6 * VALUE_UNIT,
                &mut f.ledger,
                &mut f.escrow,
            )
            .unwrap();
        let r = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();
        assert_eq!(r.requested_usd_cents, 100_000);
        assert_eq!(r.accepted_usd_cents, 50_000);
        assert_eq!(r.accepted_value, VALUE_UNIT / 2);
        assert_eq!(r.refunded_value, VALUE_UNIT / 2);
        assert!(r.effects.contains(&Effect::Refund {
            to: ALICE,
            amount: VALUE_UNIT / 2
        }));
        assert_eq!(f.sale.usd_raised(), f.sale.cap());
        assert!(f.sale.has_ended(during(ALICE).now));

        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExhausted);
    }

    #[test]
    fn pause_blocks_contributions() {
        let mut f = fixture();
        assert!(f.sale.pause(&owner_pre(), true).is_err());
        f.sale.pause(&during(OWNER), true).unwrap();
        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::Paused);
        f.sale.pause(&during(OWNER), false).unwrap();
        f.sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();
    }

    #[test]
    fn pre_sale_configuration_locked_once_started() {
        let mut f = fixture();
        let ctx = during(OWNER);
        assert!(f.sale.configure_window(&ctx, t0(), t0() + Duration::hours(20)).is_err());
        assert!(f.sale.set_discount_tiers(&ctx, vec![]).is_err());
        assert!(f.sale.set_token_price(&ctx, 10).is_err());
        assert!(f.sale.set_token(&ctx, &f.ledger).is_err());
        // The conversion rate stays adjustable.
        f.sale.set_conversion_rate(&ctx, 110_251).unwrap();
        assert_eq!(f.sale.conversion_rate(), 110_251);
    }

    #[test]
    fn admin_operations_are_owner_only() {
        let mut f = fixture();
        let ctx = CallContext::at(BOB, t0());
        assert_eq!(
            f.sale.set_conversion_rate(&ctx, 1).unwrap_err(),
            SaleError::Unauthorized { caller: BOB }
        );
        assert!(f.sale.set_accredited(&ctx, BOB, true).is_err());
        assert!(f.sale.set_blocked(&ctx, ALICE).is_err());
        assert!(f.sale.disburse_team_tokens(&after(BOB), &mut f.ledger).is_err());
    }

    #[test]
    fn infrastructure_cannot_be_accredited() {
        let mut f = fixture();
        for addr in [SALE, TOKEN, WALLET] {
            assert_eq!(
                f.sale.set_accredited(&owner_pre(), addr, true).unwrap_err(),
                SaleError::IneligibleAddress(addr)
            );
        }
        assert!(f
            .sale
            .set_accredited(&owner_pre(), Address::ZERO, true)
            .is_err());
    }

    #[test]
    fn zero_conversion_rate_rejected() {
        let mut f = fixture();
        assert_eq!(
            f.sale.set_conversion_rate(&owner_pre(), 0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn unset_conversion_rate_blocks_contributions() {
        let mut sale = Crowdsale::new(SALE, config()).unwrap();
        let mut ledger = TokenLedger::new(TOKEN, OWNER, SALE);
        let mut escrow = MultiSigWallet::new(WALLET, vec![OWNER], 1).unwrap();
        sale.set_token(&owner_pre(), &ledger).unwrap();
        sale.set_accredited(&owner_pre(), ALICE, true).unwrap();
        let err = sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut ledger, &mut escrow)
            .unwrap_err();
        assert_eq!(err, SaleError::ConversionRateUnset);
    }

    #[test]
    fn dust_contribution_rejected() {
        let mut f = fixture();
        // 100_000 cents per 1e18 base units: anything under 1e13 is < 1 cent.
        let err = f
            .sale
            .contribute(&during(ALICE), ALICE, 1_000, &mut f.ledger, &mut f.escrow)
            .unwrap_err();
        assert!(matches!(err, SaleError::ContributionTooSmall { .. }));
    }

    #[test]
    fn receive_buys_for_sender() {
        let mut f = fixture();
        let r = f
            .sale
            .receive(&during(ALICE), VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();
        assert_eq!(r.beneficiary, ALICE);
        assert_eq!(r.contributor, ALICE);
    }

    #[test]
    fn disbursement_is_one_shot_and_post_sale() {
        let mut f = fixture();
        f.sale
            .contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut f.ledger, &mut f.escrow)
            .unwrap();

        let err = f
            .sale
            .disburse_team_tokens(&during(OWNER), &mut f.ledger)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let r = f
            .sale
            .disburse_team_tokens(&after(OWNER), &mut f.ledger)
            .unwrap();
        let sold = f.sale.tokens_raised();
        assert_eq!(r.team_tokens, sold * 30 / 100);
        assert_eq!(r.bounty_tokens, sold * 15 / 100);
        assert_eq!(f.ledger.balance_of(&WALLET), r.team_tokens + r.bounty_tokens);
        assert!(f.sale.team_tokens_disbursed());

        let err = f
            .sale
            .disburse_team_tokens(&after(OWNER), &mut f.ledger)
            .unwrap_err();
        assert_eq!(err, SaleError::AlreadyDisbursed);
        assert_eq!(f.ledger.balance_of(&WALLET), r.team_tokens + r.bounty_tokens);
    }

    #[test]
    fn separate_team_and_bounty_wallets() {
        let team = Address::repeat_byte(0x7e);
        let bounty = Address::repeat_byte(0x7b);
        let mut c = config();
        c.team_wallet = team;
        c.bounty_wallet = bounty;
        let mut sale = Crowdsale::new(SALE, c).unwrap();
        let mut ledger = TokenLedger::new(TOKEN, OWNER, SALE);
        let mut escrow = MultiSigWallet::new(WALLET, vec![OWNER], 1).unwrap();
        sale.set_token(&owner_pre(), &ledger).unwrap();
        sale.set_conversion_rate(&owner_pre(), 2_000).unwrap();
        sale.set_accredited(&owner_pre(), ALICE, true).unwrap();
        // $20 at $0.20 = 100 tokens, no tiers.
        sale.contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut ledger, &mut escrow)
            .unwrap();
        assert_eq!(sale.tokens_raised(), 100 * TOKEN_UNIT);

        sale.disburse_team_tokens(&after(OWNER), &mut ledger).unwrap();
        assert_eq!(ledger.balance_of(&team), 30 * TOKEN_UNIT);
        assert_eq!(ledger.balance_of(&bounty), 15 * TOKEN_UNIT);
    }

    #[test]
    fn split_disbursement_mints_nothing_when_one_share_overflows() {
        let team = Address::repeat_byte(0x7e);
        let bounty = Address::repeat_byte(0x7b);
        let mut c = config();
        c.team_wallet = team;
        c.bounty_wallet = bounty;
        let mut sale = Crowdsale::new(SALE, c).unwrap();
        let mut ledger = TokenLedger::new(TOKEN, OWNER, SALE);
        let mut escrow = MultiSigWallet::new(WALLET, vec![OWNER], 1).unwrap();
        sale.set_token(&owner_pre(), &ledger).unwrap();
        sale.set_conversion_rate(&owner_pre(), 2_000).unwrap();
        sale.set_accredited(&owner_pre(), ALICE, true).unwrap();
        sale.contribute(&during(ALICE), ALICE, VALUE_UNIT, &mut ledger, &mut escrow)
            .unwrap();

        // Outside supply leaves room for the team share only.
        ledger.set_minter(&OWNER, OWNER).unwrap();
        let outside = u128::MAX - ledger.total_supply() - 30 * TOKEN_UNIT;
        ledger.mint(&OWNER, &BOB, outside).unwrap();
        ledger.set_minter(&OWNER, SALE).unwrap();

        let err = sale
            .disburse_team_tokens(&after(OWNER), &mut ledger)
            .unwrap_err();
        assert_eq!(
            err,
            SaleError::Ledger(LedgerError::SupplyOverflow {
                amount: 15 * TOKEN_UNIT
            })
        );
        assert_eq!(ledger.balance_of(&team), 0);
        assert_eq!(ledger.balance_of(&bounty), 0);
        assert_eq!(ledger.total_supply(), u128::MAX - 30 * TOKEN_UNIT);
        assert!(!sale.team_tokens_disbursed());
    }

    #[test]
    fn window_can_move_before_start() {
        let mut f = fixture();
        let start = t0() + Duration::hours(3);
        let end = t0() + Duration::hours(5);
        f.sale.configure_window(&owner_pre(), start, end).unwrap();
        assert_eq!(f.sale.window().start, start);
        assert!(matches!(
            f.sale.configure_window(&owner_pre(), end, start),
            Err(SaleError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn has_ended_after_end_time() {
        let f = fixture();
        assert!(!f.sale.has_ended(during(ALICE).now));
        assert!(f.sale.has_ended(after(ALICE).now));
    }
}
