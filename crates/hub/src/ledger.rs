//! Token ledger abstraction.
//!
//! The hub never moves tokens itself; it instructs a ledger. The trait is
//! deliberately a sink/source with no way to call back into the hub, and
//! every mutator invokes it as its last step, so a transfer can never
//! observe or interleave with a half-updated hub.

use photon_types::Address;
use std::collections::HashMap;

/// A non-reentrant token transfer sink/source.
///
/// Implementations must not call back into hub mutators during a
/// transfer.
pub trait TokenLedger {
    /// Pull `amount` from `from` into hub custody.
    ///
    /// Returns false if the payer's balance is insufficient; the calling
    /// transaction aborts.
    fn transfer_in(&mut self, from: Address, amount: u128) -> bool;

    /// Push `amount` from hub custody to `to`.
    fn transfer_out(&mut self, to: Address, amount: u128);
}

/// A simple in-memory ledger for tests and local hosts.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    balances: HashMap<Address, u128>,
    custody: u128,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits a free balance, for test setup.
    pub fn mint(&mut self, to: Address, amount: u128) {
        *self.balances.entry(to).or_default() += amount;
    }

    /// Returns the free balance of an address.
    pub fn balance_of(&self, addr: Address) -> u128 {
        self.balances.get(&addr).copied().unwrap_or(0)
    }

    /// Returns the total amount held in hub custody.
    pub fn custody(&self) -> u128 {
        self.custody
    }
}

impl TokenLedger for InMemoryLedger {
    fn transfer_in(&mut self, from: Address, amount: u128) -> bool {
        let balance = self.balances.entry(from).or_default();
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        self.custody += amount;
        true
    }

    fn transfer_out(&mut self, to: Address, amount: u128) {
        self.custody = self.custody.saturating_sub(amount);
        *self.balances.entry(to).or_default() += amount;
    }
}
