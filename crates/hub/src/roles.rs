//! External role table.
//!
//! Capabilities are typed fields assigned once at hub construction; every
//! externally-triggered mutator checks its caller against exactly one of
//! them. Internal capabilities (stake locking, reward registration, round
//! sequencing) are `pub(crate)` method positions and never appear here.

use crate::{HubError, HubResult};
use photon_types::Address;
use serde::{Deserialize, Serialize};

/// Addresses holding the hub's external capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    /// May register agents, approve developers, change global config, and
    /// manage gov endpoints.
    pub admin: Address,
    /// May call the round turn.
    pub round_trigger: Address,
    /// May prune timed-out bets.
    pub pruner: Address,
    /// May finalize stream data.
    pub executor: Address,
    /// Delivers endpoint callbacks (chain init acknowledgements).
    pub endpoint: Address,
}

impl Roles {
    /// Checks the admin capability.
    pub fn ensure_admin(&self, caller: Address) -> HubResult<()> {
        if caller != self.admin {
            return Err(HubError::IsNotAdmin(caller));
        }
        Ok(())
    }

    /// Checks the round-trigger capability.
    pub fn ensure_round_trigger(&self, caller: Address) -> HubResult<()> {
        if caller != self.round_trigger {
            return Err(HubError::IsNotRoundTrigger(caller));
        }
        Ok(())
    }

    /// Checks the pruner capability.
    pub fn ensure_pruner(&self, caller: Address) -> HubResult<()> {
        if caller != self.pruner {
            return Err(HubError::IsNotPruner(caller));
        }
        Ok(())
    }

    /// Checks the stream-executor capability.
    pub fn ensure_executor(&self, caller: Address) -> HubResult<()> {
        if caller != self.executor {
            return Err(HubError::CallerIsNotSpotter(caller));
        }
        Ok(())
    }

    /// Checks the endpoint capability.
    pub fn ensure_endpoint(&self, caller: Address) -> HubResult<()> {
        if caller != self.endpoint {
            return Err(HubError::IsNotEndpoint(caller));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> Roles {
        Roles {
            admin: Address::new([1; 20]),
            round_trigger: Address::new([2; 20]),
            pruner: Address::new([3; 20]),
            executor: Address::new([4; 20]),
            endpoint: Address::new([5; 20]),
        }
    }

    #[test]
    fn test_role_checks() {
        let r = roles();
        assert!(r.ensure_admin(Address::new([1; 20])).is_ok());
        assert!(matches!(
            r.ensure_admin(Address::new([9; 20])),
            Err(HubError::IsNotAdmin(_))
        ));
        assert!(r.ensure_round_trigger(Address::new([2; 20])).is_ok());
        assert!(r.ensure_pruner(Address::new([3; 20])).is_ok());
        assert!(r.ensure_executor(Address::new([4; 20])).is_ok());
        assert!(r.ensure_endpoint(Address::new([5; 20])).is_ok());
    }
}
