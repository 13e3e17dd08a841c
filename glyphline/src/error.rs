//! Error types for the normalizer, the inference channel and the pipeline
//! that combines them.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// The pixel buffer does not describe a `side x side` square.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} pixels for a {side}x{side} grid, got {actual}")]
pub struct ShapeError {
    pub side: usize,
    pub expected: usize,
    pub actual: usize,
}

/// Failures of the inference process or of the pipes connecting us to it.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to launch inference engine {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("inference engine exited during startup ({0})")]
    ExitedDuringStartup(ExitStatus),

    #[error("inference engine did not acknowledge startup within {0:?}")]
    NoAcknowledgement(Duration),

    #[error("inference engine process has died")]
    ProcessDied,

    #[error("inference engine closed its output stream")]
    StreamClosed,

    #[error("inference engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("inference engine pipe error: {0}")]
    Io(#[from] io::Error),

    #[error("inference round trip was aborted: {0}")]
    Aborted(String),
}

impl ChannelError {
    /// True for failures raised while bringing the engine up.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ChannelError::Spawn { .. }
                | ChannelError::ExitedDuringStartup(_)
                | ChannelError::NoAcknowledgement(_)
        )
    }
}

/// Anything that can go wrong between raw pixels and a label.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl Error {
    /// Text shown to the person drawing. Causes are logged, not displayed.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Channel(ChannelError::ProcessDied) => "Server Died",
            _ => "Error",
        }
    }
}
