//! # Sale Constants
//!
//! Every magic number of the sale lives here. The defaults reproduce the
//! original Minerva deployment: an 18-decimal token priced at $0.20, funded
//! in an 18-decimal native currency, with 30% of sold tokens reserved for
//! the team and 15% for bounties.

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Decimal places of the sold token.
pub const TOKEN_DECIMALS: u32 = 18;

/// Base units in one whole token.
pub const TOKEN_UNIT: u128 = 10u128.pow(TOKEN_DECIMALS);

/// Decimal places of the contributed currency.
pub const VALUE_DECIMALS: u32 = 18;

/// Base units in one whole unit of contributed value.
pub const VALUE_UNIT: u128 = 10u128.pow(VALUE_DECIMALS);

// ---------------------------------------------------------------------------
// Pricing & Allocation
// ---------------------------------------------------------------------------

/// Base price of one whole token in USD cents ($0.20).
pub const DEFAULT_TOKEN_PRICE_CENTS: u128 = 20;

/// Share of sold tokens minted to the team wallet after the sale.
pub const DEFAULT_TEAM_PERCENT: u8 = 30;

/// Share of sold tokens minted to the bounty wallet after the sale.
pub const DEFAULT_BOUNTY_PERCENT: u8 = 15;

/// Upper bound for any percentage parameter (tax, discount, allocation).
pub const MAX_PERCENT: u8 = 100;

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// The voter registry never shrinks below this.
pub const MIN_VOTERS: usize = 2;

/// Votes needed to pass a proposal with `voters` registered voters:
/// a strict majority, `floor(n / 2) + 1`.
pub fn majority_threshold(voters: usize) -> usize {
    voters / 2 + 1
}
