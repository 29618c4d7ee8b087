//! Accredited and blocked beneficiaries.
//!
//! Blocking wins over accreditation, and a blocked address stays blocked
//! even if it is later re-accredited.

use std::collections::BTreeSet;

use minerva_protocol::Address;
use serde::{Deserialize, Serialize};

/// Who may receive sale tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccreditationRegistry {
    accredited: BTreeSet<Address>,
    blocked: BTreeSet<Address>,
}

impl AccreditationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `address` accredited (or not).
    pub fn set_accredited(&mut self, address: Address, accredited: bool) {
        if accredited {
            self.accredited.insert(address);
        } else {
            self.accredited.remove(&address);
        }
    }

    /// Blocks `address` permanently.
    pub fn block(&mut self, address: Address) {
        self.blocked.insert(address);
    }

    /// Whether `address` carries the accredited flag, regardless of blocking.
    pub fn is_accredited(&self, address: &Address) -> bool {
        self.accredited.contains(address)
    }

    /// Whether `address` is blocked.
    pub fn is_blocked(&self, address: &Address) -> bool {
        self.blocked.contains(address)
    }

    /// Accredited and not blocked.
    pub fn may_receive(&self, address: &Address) -> bool {
        !self.is_blocked(address) && self.is_accredited(address)
    }
}
