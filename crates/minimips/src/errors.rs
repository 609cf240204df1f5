//! Front-end error type.

use std::io;

use generator_core::{ErrorPhase, GenerationError};
use thiserror::Error;

/// Failure while building a demo template or writing its listing.
#[derive(Debug, Error)]
pub enum FrontEndError {
    /// No demo template has this name.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    /// Template construction or expansion failed.
    #[error("{phase} error: {source}")]
    Generation {
        /// Where the engine stopped.
        phase: &'static str,
        /// Engine error.
        #[source]
        source: GenerationError,
    },
    /// Writing the listing failed.
    #[error("failed to write listing: {0}")]
    Io(#[from] io::Error),
}

impl From<GenerationError> for FrontEndError {
    fn from(source: GenerationError) -> Self {
        let phase = match source.phase() {
            ErrorPhase::Construction => "construction",
            ErrorPhase::Expansion => "expansion",
        };
        Self::Generation { phase, source }
    }
}
