//! # Voter Consensus
//!
//! A committee of registered voters that governs the token ledger's
//! administrative settings and its own membership.
//!
//! Every change is a proposal keyed by its concrete [`Action`]. A voter's
//! vote is recorded against that action; once distinct votes reach a strict
//! majority of the *current* roster (`n / 2 + 1`) the action executes in the
//! same call and every pending proposal of the same kind is cleared.
//!
//! ```text
//! NoProposal ──vote──▶ PartialVotes(k of n) ──vote reaches n/2+1──▶ Executed
//! ```
//!
//! The committee governs exactly one token ledger, bound once with
//! [`Consensus::set_token`]. Ledger actions cast against any other ledger
//! are rejected before a vote is recorded.
//!
//! Proposals never expire and cannot be cancelled. A voter who is removed
//! has their outstanding votes withdrawn. When the ledger rejects an
//! execution, the triggering vote fails and is not recorded.

pub mod proposal;

pub use proposal::{Action, ActionKind, PendingProposal, ProposalBook};

use std::collections::BTreeSet;

use minerva_protocol::config::{majority_threshold, MAX_PERCENT, MIN_VOTERS};
use minerva_protocol::ledger::{Ledger, LedgerError};
use minerva_protocol::{Address, CallContext, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by governance operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// The caller is not a registered voter.
    #[error("unauthorized: {caller} is not a registered voter")]
    NotAVoter {
        /// Address that attempted to vote.
        caller: Address,
    },

    /// The voter already supports this exact action.
    #[error("{voter} already voted for {action}")]
    DuplicateVote {
        /// The voter.
        voter: Address,
        /// The action voted on.
        action: Action,
    },

    /// The candidate is already a voter.
    #[error("{0} is already a registered voter")]
    AlreadyRegistered(Address),

    /// The removal target is not a voter.
    #[error("{0} is not a registered voter")]
    NotRegistered(Address),

    /// Removing a voter would drop the roster below the minimum.
    #[error("cannot remove a voter: roster is at the minimum of {min}")]
    AtVoterFloor {
        /// Minimum roster size.
        min: usize,
    },

    /// Fewer initial voters than the minimum.
    #[error("at least {min} voters required, got {got}")]
    NotEnoughVoters {
        /// Minimum roster size.
        min: usize,
        /// Voters supplied.
        got: usize,
    },

    /// An initial voter appears twice.
    #[error("duplicate voter {0}")]
    DuplicateVoter(Address),

    /// A zero address where a real account is required.
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),

    /// A percentage payload above 100.
    #[error("{field} must be at most 100%, got {value}")]
    PercentOutOfRange {
        /// Which payload was out of range.
        field: &'static str,
        /// The rejected value.
        value: u8,
    },

    /// A ledger action was voted on before a token ledger was bound.
    #[error("token ledger not set")]
    TokenNotSet,

    /// The committee is already bound to a token ledger.
    #[error("token ledger already bound to {0}")]
    TokenAlreadySet(Address),

    /// The ledger passed in is not the one the committee governs.
    #[error("ledger mismatch: committee governs {expected}, got {actual}")]
    LedgerMismatch {
        /// Bound ledger.
        expected: Address,
        /// Ledger passed to the call.
        actual: Address,
    },

    /// The ledger refused to execute the action.
    #[error("ledger rejected execution: {0}")]
    Ledger(#[from] LedgerError),
}

impl ConsensusError {
    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsensusError::NotAVoter { .. } => ErrorKind::Unauthorized,
            ConsensusError::DuplicateVote { .. } => ErrorKind::DuplicateVote,
            ConsensusError::AlreadyRegistered(_)
            | ConsensusError::NotRegistered(_)
            | ConsensusError::AtVoterFloor { .. }
            | ConsensusError::TokenNotSet
            | ConsensusError::TokenAlreadySet(_) => ErrorKind::InvalidState,
            ConsensusError::NotEnoughVoters { .. }
            | ConsensusError::DuplicateVoter(_)
            | ConsensusError::ZeroAddress(_)
            | ConsensusError::PercentOutOfRange { .. }
            | ConsensusError::LedgerMismatch { .. } => ErrorKind::InvalidArgument,
            ConsensusError::Ledger(e) => e.kind(),
        }
    }
}

/// What a successful vote did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// The vote was recorded; the action is still below threshold.
    Pending {
        /// Distinct votes now recorded.
        votes: usize,
        /// Votes needed at the current roster size.
        threshold: usize,
    },
    /// The vote reached threshold and the action was executed.
    Executed(Action),
}

/// The governance contract.
#[derive(Debug, Clone)]
pub struct Consensus {
    address: Address,
    token: Option<Address>,
    voters: BTreeSet<Address>,
    proposals: ProposalBook,
}

impl Consensus {
    /// Deploys a committee at `address` with the given initial voters.
    ///
    /// # Errors
    ///
    /// [`ConsensusError::NotEnoughVoters`] below the two-voter floor,
    /// [`ConsensusError::DuplicateVoter`] or [`ConsensusError::ZeroAddress`]
    /// for a malformed roster.
    pub fn new(address: Address, voters: Vec<Address>) -> Result<Self, ConsensusError> {
        if address.is_zero() {
            return Err(ConsensusError::ZeroAddress("consensus"));
        }
        if voters.len() < MIN_VOTERS {
            return Err(ConsensusError::NotEnoughVoters {
                min: MIN_VOTERS,
                got: voters.len(),
            });
        }
        let mut roster = BTreeSet::new();
        for voter in voters {
            if voter.is_zero() {
                return Err(ConsensusError::ZeroAddress("voter"));
            }
            if !roster.insert(voter) {
                return Err(ConsensusError::DuplicateVoter(voter));
            }
        }

        Ok(Self {
            address,
            token: None,
            voters: roster,
            proposals: ProposalBook::new(),
        })
    }

    /// Binds the token ledger the committee governs. Allowed once.
    ///
    /// # Errors
    ///
    /// [`ConsensusError::TokenAlreadySet`] on a second call,
    /// [`ConsensusError::ZeroAddress`] for a ledger at the zero address.
    pub fn set_token<L: Ledger + ?Sized>(&mut self, ledger: &L) -> Result<(), ConsensusError> {
        if let Some(bound) = self.token {
            return Err(ConsensusError::TokenAlreadySet(bound));
        }
        let token = ledger.address();
        if token.is_zero() {
            return Err(ConsensusError::ZeroAddress("token"));
        }
        self.token = Some(token);
        info!(%token, "token ledger bound");
        Ok(())
    }

    /// Casts `ctx.caller`'s vote for `action`, executing it if the vote
    /// reaches threshold.
    ///
    /// Ledger actions are executed with the consensus address as caller.
    ///
    /// # Errors
    ///
    /// - [`ConsensusError::NotAVoter`] if the caller is not registered.
    /// - A precondition error if the action is invalid for the current
    ///   roster or payload.
    /// - [`ConsensusError::TokenNotSet`] or [`ConsensusError::LedgerMismatch`]
    ///   for a ledger action without the bound ledger.
    /// - [`ConsensusError::DuplicateVote`] for a repeated vote.
    /// - [`ConsensusError::Ledger`] if execution is rejected; the vote is
    ///   then not recorded.
    pub fn cast_vote<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        action: Action,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        let voter = ctx.caller;
        if !self.voters.contains(&voter) {
            return Err(ConsensusError::NotAVoter { caller: voter });
        }
        self.check_preconditions(&action)?;
        if action.targets_ledger() {
            self.ensure_bound_ledger(ledger)?;
        }
        if self.proposals.has_voted(&action, &voter) {
            return Err(ConsensusError::DuplicateVote { voter, action });
        }

        let votes = self.proposals.votes_for(&action) + 1;
        let threshold = self.threshold();
        if votes < threshold {
            self.proposals.record(action, voter);
            debug!(%voter, %action, votes, threshold, "vote recorded");
            return Ok(VoteOutcome::Pending { votes, threshold });
        }

        self.execute(action, ledger)?;
        let cleared = self.proposals.clear_kind(action.kind());
        info!(%voter, %action, votes, cleared, "proposal executed");
        Ok(VoteOutcome::Executed(action))
    }

    fn ensure_bound_ledger<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<(), ConsensusError> {
        let expected = self.token.ok_or(ConsensusError::TokenNotSet)?;
        let actual = ledger.address();
        if actual != expected {
            return Err(ConsensusError::LedgerMismatch { expected, actual });
        }
        Ok(())
    }

    fn check_preconditions(&self, action: &Action) -> Result<(), ConsensusError> {
        match *action {
            Action::AddVoter(candidate) => {
                if candidate.is_zero() {
                    return Err(ConsensusError::ZeroAddress("voter"));
                }
                if self.voters.contains(&candidate) {
                    return Err(ConsensusError::AlreadyRegistered(candidate));
                }
            }
            Action::RemoveVoter(target) => {
                if !self.voters.contains(&target) {
                    return Err(ConsensusError::NotRegistered(target));
                }
                if self.voters.len() <= MIN_VOTERS {
                    return Err(ConsensusError::AtVoterFloor { min: MIN_VOTERS });
                }
            }
            Action::SetOwner(addr) if addr.is_zero() => {
                return Err(ConsensusError::ZeroAddress("owner"))
            }
            Action::SetBank(addr) if addr.is_zero() => {
                return Err(ConsensusError::ZeroAddress("bank"))
            }
            Action::SetBooth(addr) if addr.is_zero() => {
                return Err(ConsensusError::ZeroAddress("voting"))
            }
            Action::SetTax(percent) if percent > MAX_PERCENT => {
                return Err(ConsensusError::PercentOutOfRange {
                    field: "tax rate",
                    value: percent,
                })
            }
            Action::SetPartner {
                partner,
                allocation_percent,
            } => {
                if partner.is_zero() {
                    return Err(ConsensusError::ZeroAddress("partner"));
                }
                if allocation_percent > MAX_PERCENT {
                    return Err(ConsensusError::PercentOutOfRange {
                        field: "partner allocation",
                        value: allocation_percent,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn execute<L: Ledger + ?Sized>(
        &mut self,
        action: Action,
        ledger: &mut L,
    ) -> Result<(), ConsensusError> {
        let me = self.address;
        match action {
            Action::AddVoter(candidate) => {
                self.voters.insert(candidate);
            }
            Action::RemoveVoter(target) => {
                self.voters.remove(&target);
                self.proposals.withdraw_voter(&target);
            }
            Action::SetOwner(owner) => ledger.set_owner(&me, owner)?,
            Action::SetBank(bank) => ledger.set_bank_address(&me, bank)?,
            Action::SetBooth(booth) => ledger.set_voting_address(&me, booth)?,
            Action::SetTax(percent) => ledger.set_tax_rate(&me, percent)?,
            Action::SetPartner {
                partner,
                allocation_percent,
            } => ledger.register_partner(&me, partner, allocation_percent)?,
        }
        Ok(())
    }

    // -- named votes -------------------------------------------------------

    /// Votes to register `candidate` as a voter.
    pub fn vote_voter<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        candidate: Address,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::AddVoter(candidate), ledger)
    }

    /// Votes to unregister `target`.
    pub fn vote_remove_voter<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        target: Address,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::RemoveVoter(target), ledger)
    }

    /// Votes to transfer ledger ownership to `owner`.
    pub fn vote_owner<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        owner: Address,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::SetOwner(owner), ledger)
    }

    /// Votes to set the ledger's bank address.
    pub fn vote_bank<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        bank: Address,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::SetBank(bank), ledger)
    }

    /// Votes to set the ledger's voting address.
    pub fn vote_booth<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        booth: Address,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::SetBooth(booth), ledger)
    }

    /// Votes to set the ledger's tax rate.
    pub fn vote_tax<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        percent: u8,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(ctx, Action::SetTax(percent), ledger)
    }

    /// Votes to register a ledger partner.
    pub fn vote_partner<L: Ledger + ?Sized>(
        &mut self,
        ctx: &CallContext,
        partner: Address,
        allocation_percent: u8,
        ledger: &mut L,
    ) -> Result<VoteOutcome, ConsensusError> {
        self.cast_vote(
            ctx,
            Action::SetPartner {
                partner,
                allocation_percent,
            },
            ledger,
        )
    }

    // -- queries -----------------------------------------------------------

    /// Address of the consensus contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The governed token ledger, once bound.
    pub fn token(&self) -> Option<Address> {
        self.token
    }

    /// Number of registered voters.
    pub fn total_voters(&self) -> usize {
        self.voters.len()
    }

    /// Whether `address` is a registered voter.
    pub fn is_voter(&self, address: &Address) -> bool {
        self.voters.contains(address)
    }

    /// Registered voters in address order.
    pub fn voters(&self) -> Vec<Address> {
        self.voters.iter().copied().collect()
    }

    /// Votes needed to execute at the current roster size.
    pub fn threshold(&self) -> usize {
        majority_threshold(self.voters.len())
    }

    /// Distinct votes recorded for `action`.
    pub fn votes_for(&self, action: &Action) -> usize {
        self.proposals.votes_for(action)
    }

    /// Proposals still below threshold, ordered by action.
    pub fn pending(&self) -> Vec<PendingProposal> {
        self.proposals.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use minerva_protocol::ledger::TokenLedger;

    const CONSENSUS: Address = Address::repeat_byte(0xc0);
    const TOKEN: Address = Address::repeat_byte(0x70);
    const SALE: Address = Address::repeat_byte(0x5a);
    const V1: Address = Address::repeat_byte(0x01);
    const V2: Address = Address::repeat_byte(0x02);
    const V3: Address = Address::repeat_byte(0x03);
    const X: Address = Address::repeat_byte(0x0f);

    fn setup() -> (Consensus, TokenLedger) {
        let mut consensus = Consensus::new(CONSENSUS, vec![V1, V2, V3]).unwrap();
        let ledger = TokenLedger::new(TOKEN, CONSENSUS, SALE);
        consensus.set_token(&ledger).unwrap();
        (consensus, ledger)
    }

    fn as_voter(v: Address) -> CallContext {
        CallContext::at(v, Utc::now())
    }

    #[test]
    fn construction_validates_roster() {
        assert!(matches!(
            Consensus::new(CONSENSUS, vec![V1]),
            Err(ConsensusError::NotEnoughVoters { min: 2, got: 1 })
        ));
        assert_eq!(
            Consensus::new(CONSENSUS, vec![V1, V1]).unwrap_err(),
            ConsensusError::DuplicateVoter(V1)
        );
        assert!(Consensus::new(CONSENSUS, vec![V1, Address::ZERO]).is_err());
    }

    #[test]
    fn threshold_is_strict_majority() {
        let (c, _) = setup();
        assert_eq!(c.threshold(), 2);
        let c4 = Consensus::new(CONSENSUS, vec![V1, V2, V3, X]).unwrap();
        assert_eq!(c4.threshold(), 3);
    }

    #[test]
    fn first_vote_pends_second_executes() {
        let (mut c, mut l) = setup();
        let out = c.vote_tax(&as_voter(V1), 25, &mut l).unwrap();
        assert_eq!(
            out,
            VoteOutcome::Pending {
                votes: 1,
                threshold: 2
            }
        );
        assert_eq!(l.tax_rate(), 0);

        let out = c.vote_tax(&as_voter(V2), 25, &mut l).unwrap();
        assert_eq!(out, VoteOutcome::Executed(Action::SetTax(25)));
        assert_eq!(l.tax_rate(), 25);
        assert!(c.pending().is_empty());
    }

    #[test]
    fn non_voter_rejected() {
        let (mut c, mut l) = setup();
        let err = c.vote_voter(&as_voter(X), X, &mut l).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn duplicate_vote_rejected() {
        let (mut c, mut l) = setup();
        c.vote_bank(&as_voter(V1), X, &mut l).unwrap();
        let err = c.vote_bank(&as_voter(V1), X, &mut l).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateVote);
        assert_eq!(c.votes_for(&Action::SetBank(X)), 1);
    }

    #[test]
    fn execution_clears_same_kind_proposals() {
        let (mut c, mut l) = setup();
        c.vote_tax(&as_voter(V3), 10, &mut l).unwrap();
        c.vote_bank(&as_voter(V3), X, &mut l).unwrap();
        c.vote_tax(&as_voter(V1), 20, &mut l).unwrap();
        c.vote_tax(&as_voter(V2), 20, &mut l).unwrap();
        assert_eq!(c.votes_for(&Action::SetTax(10)), 0);
        assert_eq!(c.votes_for(&Action::SetBank(X)), 1);
    }

    #[test]
    fn removal_withdraws_votes() {
        let mut c = Consensus::new(CONSENSUS, vec![V1, V2, V3, X]).unwrap();
        let mut l = TokenLedger::new(TOKEN, CONSENSUS, SALE);
        c.set_token(&l).unwrap();
        c.vote_bank(&as_voter(X), V1, &mut l).unwrap();
        c.vote_remove_voter(&as_voter(V1), X, &mut l).unwrap();
        c.vote_remove_voter(&as_voter(V2), X, &mut l).unwrap();
        let out = c.vote_remove_voter(&as_voter(V3), X, &mut l).unwrap();
        assert_eq!(out, VoteOutcome::Executed(Action::RemoveVoter(X)));
        assert!(!c.is_voter(&X));
        assert_eq!(c.votes_for(&Action::SetBank(V1)), 0);
    }

    #[test]
    fn roster_floor_enforced() {
        let mut c = Consensus::new(CONSENSUS, vec![V1, V2]).unwrap();
        let mut l = TokenLedger::new(TOKEN, CONSENSUS, SALE);
        let err = c.vote_remove_voter(&as_voter(V1), V2, &mut l).unwrap_err();
        assert_eq!(err, ConsensusError::AtVoterFloor { min: 2 });
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn invalid_payloads_rejected() {
        let (mut c, mut l) = setup();
        assert_eq!(
            c.vote_tax(&as_voter(V1), 101, &mut l).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(c.vote_partner(&as_voter(V1), X, 150, &mut l).is_err());
        assert!(c.vote_owner(&as_voter(V1), Address::ZERO, &mut l).is_err());
        assert!(c.vote_voter(&as_voter(V1), V2, &mut l).is_err());
        assert!(c.vote_remove_voter(&as_voter(V1), X, &mut l).is_err());
        assert!(c.pending().is_empty());
    }

    #[test]
    fn ledger_rejection_discards_vote() {
        let (mut c, mut l) = setup();
        l.set_owner(&CONSENSUS, X).unwrap();

        c.vote_bank(&as_voter(V1), V3, &mut l).unwrap();
        let err = c.vote_bank(&as_voter(V2), V3, &mut l).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(c.votes_for(&Action::SetBank(V3)), 1);
        assert_eq!(l.bank_address(), Address::ZERO);
    }

    #[test]
    fn token_binds_once() {
        let (mut c, l) = setup();
        assert_eq!(c.token(), Some(TOKEN));
        assert_eq!(
            c.set_token(&l).unwrap_err(),
            ConsensusError::TokenAlreadySet(TOKEN)
        );

        let mut fresh = Consensus::new(CONSENSUS, vec![V1, V2]).unwrap();
        let zero = TokenLedger::new(Address::ZERO, CONSENSUS, SALE);
        assert_eq!(
            fresh.set_token(&zero).unwrap_err(),
            ConsensusError::ZeroAddress("token")
        );
    }

    #[test]
    fn ledger_actions_need_a_bound_token() {
        let mut c = Consensus::new(CONSENSUS, vec![V1, V2, V3]).unwrap();
        let mut l = TokenLedger::new(TOKEN, CONSENSUS, SALE);
        let err = c.vote_tax(&as_voter(V1), 5, &mut l).unwrap_err();
        assert_eq!(err, ConsensusError::TokenNotSet);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(c.pending().is_empty());

        // Roster changes never touch the ledger.
        c.vote_voter(&as_voter(V1), X, &mut l).unwrap();
        c.vote_voter(&as_voter(V2), X, &mut l).unwrap();
        assert!(c.is_voter(&X));
    }

    #[test]
    fn foreign_ledger_is_not_governed() {
        let (mut c, mut bound) = setup();
        let other_addr = Address::repeat_byte(0x71);
        let mut other = TokenLedger::new(other_addr, CONSENSUS, SALE);

        c.vote_owner(&as_voter(V1), X, &mut bound).unwrap();
        let err = c.vote_owner(&as_voter(V2), X, &mut other).unwrap_err();
        assert_eq!(
            err,
            ConsensusError::LedgerMismatch {
                expected: TOKEN,
                actual: other_addr
            }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(other.owner(), CONSENSUS);
        assert_eq!(bound.owner(), CONSENSUS);
        assert_eq!(c.votes_for(&Action::SetOwner(X)), 1);
    }
}
