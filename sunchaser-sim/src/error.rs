//! Error taxonomy for the simulation core.
//!
//! Only two things are allowed to fail loudly: malformed configuration at
//! load time, and a driving command that violates its documented bounds.
//! Missing weather samples are absorbed locally as zero, and race-ending
//! conditions (battery depletion, disqualification) are state flags on the
//! race, never errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed or missing route, car profile, or strategy data. Fatal at
    /// load time, no recovery.
    #[error("configuration error: {0}")]
    Config(String),

    /// A driving command outside its documented bounds. The offending tick
    /// is rejected before any state mutation.
    #[error("command contract violation: {0}")]
    Contract(String),
}

impl SimError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
