// Shared builders and stub collaborators for the unit tests of this crate.

pub mod commit_logs;
pub mod denormalizers;
pub mod events;
