//! # Discount Tier Pricing
//!
//! The sale sells tokens at a base price in USD cents, discounted by tier.
//! Tiers are an ordered list of `(discount %, capacity in USD cents)`. The
//! first tier is consumed until its capacity is used up, then the second,
//! and so on; a single contribution may finish one tier and spill into the
//! next. A persisted cursor remembers the active tier so a contribution
//! never rescans tiers that are already full.
//!
//! Pricing of one segment:
//!
//! ```text
//! tokens = segment_usd * TOKEN_UNIT * 100 / (base_price * (100 - discount))
//! ```
//!
//! which is `segment_usd / effective_price` scaled to token base units, with
//! a single floor at the end. Segments are priced independently and summed;
//! there is never a blended rate.

use minerva_protocol::config::{MAX_PERCENT, TOKEN_UNIT};
use minerva_protocol::math::{self, MathError};
use serde::{Deserialize, Serialize};

use super::SaleError;

/// One configured pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Percentage off the base price, `1..=99`.
    pub discount_percent: u8,
    /// USD cents this tier can absorb before the next tier takes over.
    pub capacity_usd_cents: u128,
}

impl DiscountTier {
    /// Convenience constructor.
    pub fn new(discount_percent: u8, capacity_usd_cents: u128) -> Self {
        Self {
            discount_percent,
            capacity_usd_cents,
        }
    }
}

/// A tier plus how much of it has been sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierState {
    /// The configured tier.
    pub tier: DiscountTier,
    /// USD cents already consumed from this tier.
    pub consumed_usd_cents: u128,
}

impl TierState {
    /// USD cents still available in this tier.
    pub fn remaining(&self) -> u128 {
        self.tier
            .capacity_usd_cents
            .saturating_sub(self.consumed_usd_cents)
    }
}

/// A slice of one contribution priced at a single rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSegment {
    /// Index of the tier this segment drew from; `None` at base price.
    pub tier_index: Option<usize>,
    /// Discount applied to this segment.
    pub discount_percent: u8,
    /// USD cents priced in this segment.
    pub usd_cents: u128,
    /// Token base units bought by this segment.
    pub tokens: u128,
}

/// The priced allocation of one contribution, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAllocation {
    /// Segments in the order they were consumed.
    pub segments: Vec<PriceSegment>,
    /// Sum of segment tokens.
    pub tokens: u128,
    /// Cursor after this allocation is applied.
    pub next_cursor: usize,
}

/// Ordered discount tiers and the cursor into them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSchedule {
    tiers: Vec<TierState>,
    cursor: usize,
}

impl DiscountSchedule {
    /// Builds a schedule, validating that discounts are in `1..=99` and
    /// strictly decreasing, every capacity is positive, and (for a non-empty
    /// schedule) total capacity covers `hard_cap_usd_cents`.
    ///
    /// An empty schedule prices everything at the base price.
    pub fn new(tiers: Vec<DiscountTier>, hard_cap_usd_cents: u128) -> Result<Self, SaleError> {
        let mut total: u128 = 0;
        for (i, tier) in tiers.iter().enumerate() {
            if tier.discount_percent == 0 || tier.discount_percent >= MAX_PERCENT {
                return Err(SaleError::InvalidTiers(format!(
                    "tier {i}: discount {}% must be between 1 and 99",
                    tier.discount_percent
                )));
            }
            if tier.capacity_usd_cents == 0 {
                return Err(SaleError::InvalidTiers(format!(
                    "tier {i}: capacity must be positive"
                )));
            }
            if i > 0 && tier.discount_percent >= tiers[i - 1].discount_percent {
                return Err(SaleError::InvalidTiers(format!(
                    "tier {i}: discount {}% must be below the previous {}%",
                    tier.discount_percent,
                    tiers[i - 1].discount_percent
                )));
            }
            total = math::add(total, tier.capacity_usd_cents)?;
        }

        if !tiers.is_empty() && total < hard_cap_usd_cents {
            return Err(SaleError::InvalidTiers(format!(
                "tiers cover {total} cents but the hard cap is {hard_cap_usd_cents}"
            )));
        }

        Ok(Self {
            tiers: tiers
                .into_iter()
                .map(|tier| TierState {
                    tier,
                    consumed_usd_cents: 0,
                })
                .collect(),
            cursor: 0,
        })
    }

    /// All tiers with their consumption.
    pub fn tiers(&self) -> &[TierState] {
        &self.tiers
    }

    /// Index of the active tier. Equal to `tiers().len()` once all are full.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The active tier, if any capacity remains.
    pub fn active(&self) -> Option<&TierState> {
        self.tiers.get(self.cursor)
    }

    /// Prices `usd_cents` against the schedule without changing it.
    ///
    /// Walks forward from the cursor, filling each tier's remaining capacity
    /// before moving to the next. With no tiers configured the whole amount
    /// is one base-price segment.
    ///
    /// # Errors
    ///
    /// [`SaleError::TiersExhausted`] if configured tiers run out before the
    /// amount is fully allocated; arithmetic errors on overflow.
    pub fn allocate(
        &self,
        usd_cents: u128,
        base_price_cents: u128,
    ) -> Result<TierAllocation, SaleError> {
        let mut segments = Vec::new();
        let mut remaining = usd_cents;
        let mut cursor = self.cursor;
        let mut tokens: u128 = 0;

        if self.tiers.is_empty() {
            let bought = tokens_for(usd_cents, base_price_cents, 0)?;
            return Ok(TierAllocation {
                segments: vec![PriceSegment {
                    tier_index: None,
                    discount_percent: 0,
                    usd_cents,
                    tokens: bought,
                }],
                tokens: bought,
                next_cursor: 0,
            });
        }

        while remaining > 0 {
            let state = self
                .tiers
                .get(cursor)
                .ok_or(SaleError::TiersExhausted { unallocated: remaining })?;

            let headroom = state.remaining();
            if headroom == 0 {
                cursor += 1;
                continue;
            }

            let take = remaining.min(headroom);
            let discount = state.tier.discount_percent;
            let bought = tokens_for(take, base_price_cents, discount)?;
            segments.push(PriceSegment {
                tier_index: Some(cursor),
                discount_percent: discount,
                usd_cents: take,
                tokens: bought,
            });
            tokens = math::add(tokens, bought)?;
            remaining = math::sub(remaining, take)?;

            if take == headroom {
                cursor += 1;
            }
        }

        Ok(TierAllocation {
            segments,
            tokens,
            next_cursor: cursor,
        })
    }

    /// Commits an allocation produced by [`allocate`](Self::allocate) on
    /// this same, unchanged schedule.
    pub(crate) fn apply(&mut self, allocation: &TierAllocation) {
        for segment in &allocation.segments {
            if let Some(index) = segment.tier_index {
                if let Some(state) = self.tiers.get_mut(index) {
                    // Bounded by capacity: allocate never takes more than remaining().
                    state.consumed_usd_cents += segment.usd_cents;
                }
            }
        }
        if !self.tiers.is_empty() {
            self.cursor = allocation.next_cursor;
        }
    }
}

/// Token base units bought by `usd_cents` at `base_price_cents` less
/// `discount_percent`.
pub fn tokens_for(
    usd_cents: u128,
    base_price_cents: u128,
    discount_percent: u8,
) -> Result<u128, MathError> {
    let numerator = math::mul(math::mul(usd_cents, TOKEN_UNIT)?, 100)?;
    let denominator = math::mul(
        base_price_cents,
        u128::from(MAX_PERCENT.saturating_sub(discount_percent)),
    )?;
    math::div(numerator, denominator)
}
