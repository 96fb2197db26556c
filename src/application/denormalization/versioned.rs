// Version guard shared by denormalizers of versioned projections.
//
// A projection stores the version of the last event it applied. Live delivery only moves it
// forward; a redispatch applies regardless, so replaying history repairs a projection.

use crate::application::dispatcher::denormalizer::DispatchContext;

/// Event version that bypasses the guard.
pub const IGNORED_VERSION: i64 = -1;

/// What a denormalizer does with an event whose projection row does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingProjectionBehavior {
    #[default]
    Create,
    Ignore,
}

impl MissingProjectionBehavior {
    pub fn creates(&self) -> bool {
        matches!(self, Self::Create)
    }
}

pub fn should_apply(
    stored_version: Option<i64>,
    event_version: i64,
    context: &DispatchContext,
) -> bool {
    match stored_version {
        None => true,
        Some(_) if event_version == IGNORED_VERSION || context.is_redispatch => true,
        Some(stored) => event_version > stored,
    }
}

/// Version to store after applying `event_version`.
pub fn next_version(stored_version: Option<i64>, event_version: i64) -> i64 {
    stored_version.map_or(event_version, |stored| stored.max(event_version))
}
