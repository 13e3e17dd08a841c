use std::path::PathBuf;
use std::time::Duration;

/// Program launched when no engine path is configured.
pub const DEFAULT_ENGINE_PROGRAM: &str = "inference_engine";

/// Configuration for the `InferenceChannel`.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Executable of the inference engine.
    pub program: PathBuf,
    /// Extra arguments. The production engine takes none.
    pub args: Vec<String>,
    /// How long to wait after launch before checking the process is still alive.
    pub startup_grace: Duration,
    /// Upper bound on waiting for the startup acknowledgement line once the
    /// grace period has elapsed.
    pub startup_timeout: Duration,
    /// Bounded wait for each response. `None` blocks until the engine answers.
    /// On expiry the channel is marked dead and the engine is killed.
    pub request_timeout: Option<Duration>,
}

impl ChannelConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENGINE_PROGRAM),
            args: Vec::new(),
            startup_grace: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}
