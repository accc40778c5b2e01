//! Registry invariant violations and how they are reported.

use tracing::error;

use super::registry::EntityKind;
use crate::server::Hook;

/// Internal consistency failure between the core and the bridge.
///
/// None of these can be caused by a bus client. Each one means the core and
/// the registry disagree about which entities exist.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Creation announced for an entity that already has a proxy
    #[error("{kind} {index} already has a proxy")]
    DuplicateProxy {
        /// Entity kind
        kind: EntityKind,
        /// Core index
        index: u32,
    },

    /// Removal announced for an entity without a proxy
    #[error("{kind} {index} has no proxy")]
    MissingProxy {
        /// Entity kind
        kind: EntityKind,
        /// Core index
        index: u32,
    },

    /// Event reached no live subscriber, so a hook fired after teardown
    #[error("{hook:?} fired after its subscriber was torn down")]
    OrphanEvent {
        /// Hook the event was fired on
        hook: Hook,
    },

    /// Releasing a subscription the hook table no longer knew about
    #[error("{hook:?} subscription was already released")]
    StaleSubscription {
        /// Hook of the stale slot
        hook: Hook,
    },
}

/// Log a violation and stop debug builds.
pub(crate) fn report(violation: &InvariantViolation) {
    error!(error = %violation, "bridge invariant violated");
    debug_assert!(false, "bridge invariant violated: {violation}");
}
