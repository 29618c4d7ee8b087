//! Governance actions and the book of pending proposals.

use std::collections::{BTreeMap, BTreeSet};

use minerva_protocol::Address;
use serde::{Deserialize, Serialize};

/// Category of a governance action. Executing one action clears every
/// pending proposal of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    AddVoter,
    RemoveVoter,
    SetOwner,
    SetBank,
    SetBooth,
    SetTax,
    SetPartner,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::AddVoter => "AddVoter",
            ActionKind::RemoveVoter => "RemoveVoter",
            ActionKind::SetOwner => "SetOwner",
            ActionKind::SetBank => "SetBank",
            ActionKind::SetBooth => "SetBooth",
            ActionKind::SetTax => "SetTax",
            ActionKind::SetPartner => "SetPartner",
        };
        f.write_str(name)
    }
}

/// A concrete governance action: a kind plus its payload.
///
/// Two votes count toward the same proposal only if their actions are
/// equal, payload included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Register a new voter.
    AddVoter(Address),
    /// Unregister an existing voter.
    RemoveVoter(Address),
    /// Transfer ownership of the token ledger.
    SetOwner(Address),
    /// Set the ledger's bank address.
    SetBank(Address),
    /// Set the ledger's voting address.
    SetBooth(Address),
    /// Set the ledger's tax rate in percent.
    SetTax(u8),
    /// Register a partner on the ledger.
    SetPartner {
        /// Partner address.
        partner: Address,
        /// Allocation in percent.
        allocation_percent: u8,
    },
}

impl Action {
    /// The action's kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::AddVoter(_) => ActionKind::AddVoter,
            Action::RemoveVoter(_) => ActionKind::RemoveVoter,
            Action::SetOwner(_) => ActionKind::SetOwner,
            Action::SetBank(_) => ActionKind::SetBank,
            Action::SetBooth(_) => ActionKind::SetBooth,
            Action::SetTax(_) => ActionKind::SetTax,
            Action::SetPartner { .. } => ActionKind::SetPartner,
        }
    }

    /// Whether executing the action writes to the bound token ledger.
    pub fn targets_ledger(&self) -> bool {
        !matches!(self, Action::AddVoter(_) | Action::RemoveVoter(_))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::AddVoter(a)
            | Action::RemoveVoter(a)
            | Action::SetOwner(a)
            | Action::SetBank(a)
            | Action::SetBooth(a) => write!(f, "{}({a})", self.kind()),
            Action::SetTax(percent) => write!(f, "SetTax({percent}%)"),
            Action::SetPartner {
                partner,
                allocation_percent,
            } => write!(f, "SetPartner({partner}, {allocation_percent}%)"),
        }
    }
}

/// A pending proposal as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProposal {
    /// The proposed action.
    pub action: Action,
    /// Voters in favour so far, in address order.
    pub voters: Vec<Address>,
}

/// Votes cast for every action that has not executed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalBook {
    pending: BTreeMap<Action, BTreeSet<Address>>,
}

impl ProposalBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct votes recorded for `action`.
    pub fn votes_for(&self, action: &Action) -> usize {
        self.pending.get(action).map_or(0, BTreeSet::len)
    }

    /// Whether `voter` already supports `action`.
    pub fn has_voted(&self, action: &Action, voter: &Address) -> bool {
        self.pending
            .get(action)
            .is_some_and(|voters| voters.contains(voter))
    }

    /// Records a vote and returns the new count.
    pub fn record(&mut self, action: Action, voter: Address) -> usize {
        let voters = self.pending.entry(action).or_default();
        voters.insert(voter);
        voters.len()
    }

    /// Drops every pending proposal of `kind`; returns how many were dropped.
    pub fn clear_kind(&mut self, kind: ActionKind) -> usize {
        let before = self.pending.len();
        self.pending.retain(|action, _| action.kind() != kind);
        before - self.pending.len()
    }

    /// Withdraws `voter`'s votes from every proposal.
    pub fn withdraw_voter(&mut self, voter: &Address) {
        self.pending.retain(|_, voters| {
            voters.remove(voter);
            !voters.is_empty()
        });
    }

    /// All pending proposals, ordered by action.
    pub fn pending(&self) -> Vec<PendingProposal> {
        self.pending
            .iter()
            .map(|(action, voters)| PendingProposal {
                action: *action,
                voters: voters.iter().copied().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: Address = Address::repeat_byte(0x01);
    const V2: Address = Address::repeat_byte(0x02);
    const X: Address = Address::repeat_byte(0x0f);

    #[test]
    fn votes_are_per_payload() {
        let mut book = ProposalBook::new();
        book.record(Action::SetTax(10), V1);
        book.record(Action::SetTax(20), V2);
        assert_eq!(book.votes_for(&Action::SetTax(10)), 1);
        assert_eq!(book.votes_for(&Action::SetTax(20)), 1);
        assert!(book.has_voted(&Action::SetTax(10), &V1));
        assert!(!book.has_voted(&Action::SetTax(10), &V2));
    }

    #[test]
    fn repeated_vote_counts_once() {
        let mut book = ProposalBook::new();
        assert_eq!(book.record(Action::AddVoter(X), V1), 1);
        assert_eq!(book.record(Action::AddVoter(X), V1), 1);
    }

    #[test]
    fn clear_kind_drops_siblings_only() {
        let mut book = ProposalBook::new();
        book.record(Action::SetTax(10), V1);
        book.record(Action::SetTax(20), V1);
        book.record(Action::SetBank(X), V1);
        assert_eq!(book.clear_kind(ActionKind::SetTax), 2);
        assert_eq!(book.pending().len(), 1);
        assert_eq!(book.votes_for(&Action::SetBank(X)), 1);
    }

    #[test]
    fn withdraw_removes_empty_proposals() {
        let mut book = ProposalBook::new();
        book.record(Action::SetOwner(X), V1);
        book.record(Action::SetOwner(X), V2);
        book.record(Action::SetBooth(X), V1);
        book.withdraw_voter(&V1);
        assert_eq!(book.votes_for(&Action::SetOwner(X)), 1);
        assert_eq!(book.votes_for(&Action::SetBooth(X)), 0);
        assert_eq!(book.pending().len(), 1);
    }

    #[test]
    fn display_includes_payload() {
        assert_eq!(Action::SetTax(50).to_string(), "SetTax(50%)");
        assert!(Action::AddVoter(X).to_string().starts_with("AddVoter(0x0f0f"));
    }
}
