//! The optimization wizard: an Elm-style state machine.
//!
//! [`model`] holds the state ([`model::WizardModel`]), the event vocabulary
//! ([`model::WizardMsg`]) and the side-effect vocabulary
//! ([`model::WizardCmd`]). [`update`] is the single pure transition
//! function. Side effects are executed elsewhere (see
//! [`crate::session`]); nothing in this module touches the filesystem,
//! the clock, or the terminal.

pub mod model;
pub mod update;
