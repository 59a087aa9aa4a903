//! Scheduling core: recurrence expansion, occurrence overrides,
//! series splits and the volunteer ledger.
//!
//! Entry points for the surrounding application:
//! [`materialize::materialize`], [`materialize::occurrence`],
//! [`edit::apply`], and the ledger functions in [`shift`].

pub mod edit;
pub mod error;
pub mod materialize;
pub mod recurrence;
pub mod shift;

mod resolve;
