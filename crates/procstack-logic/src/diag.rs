//! Diagnostic taxonomy and logged-fallback reporting.
//!
//! Nothing in this crate is allowed to take down the host: a modeling
//! error must never terminate the simulation that owns the assembly.
//! Every failure therefore degrades to a visible, recoverable state —
//! the operation logs what went wrong, substitutes a fallback, and the
//! slot stays usable. This module is the side channel those fallbacks
//! report through.
//!
//! Four categories:
//! - [`ModelError::Configuration`] — malformed/missing required field;
//!   a built-in default is used instead.
//! - [`ModelError::Lookup`] — a name is absent from a candidate, layout
//!   or texture set; first-available or default is used instead.
//! - [`ModelError::Geometry`] — a sub-model asset failed to clone; that
//!   sub-model is skipped, the rest of the tree still builds.
//! - [`ModelError::Programmer`] — a required resolver/delegate was never
//!   supplied; the operation no-ops.

use thiserror::Error;

/// A recoverable modeling error. Carried by the diagnostic side channel,
/// never propagated to the host as a hard failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// Malformed or missing config field; a default was substituted.
    #[error("configuration: {0}")]
    Configuration(String),
    /// Name not found in a candidate/layout/texture set; fell back.
    #[error("lookup: {0}")]
    Lookup(String),
    /// A sub-model asset failed to clone; it was skipped.
    #[error("geometry: {0}")]
    Geometry(String),
    /// A required resolver or delegate is missing; operation no-oped.
    #[error("programmer: {0}")]
    Programmer(String),
}

/// Log an error at the level its category warrants.
///
/// Programmer errors are `error!` because they indicate wiring bugs the
/// integrator must fix; everything else is expected runtime degradation
/// and logs at `warn!`.
pub fn report(err: &ModelError) {
    match err {
        ModelError::Programmer(_) => log::error!("{err}"),
        _ => log::warn!("{err}"),
    }
}

/// Report a configuration error and return the fallback value.
pub fn config_fallback<T>(message: String, fallback: T) -> T {
    report(&ModelError::Configuration(message));
    fallback
}

/// Report a lookup error and return the fallback value.
pub fn lookup_fallback<T>(message: String, fallback: T) -> T {
    report(&ModelError::Lookup(message));
    fallback
}
