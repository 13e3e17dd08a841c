// THEORY:
// The `pipeline` module is the top-level API of the crate. It composes the two
// halves of the system into one call: raw pixels from the drawing surface go in,
// the engine's label comes out. Shape validation and normalization happen
// before the channel is touched, so a malformed request never reaches the
// engine.

use crate::config::ChannelConfig;
use crate::core_modules::channel::{InferenceChannel, Label, ProcessState};
use crate::core_modules::framing::{Framing, LineFraming};
use crate::core_modules::normalizer::normalizer::{normalize_pixels, CANVAS_SIDE};
use crate::error::{ChannelError, Error};

/// Normalizes raw canvases and classifies them through an `InferenceChannel`.
pub struct RecognitionPipeline<F: Framing = LineFraming> {
    channel: InferenceChannel<F>,
    side: usize,
}

impl RecognitionPipeline<LineFraming> {
    /// Launches the engine described by `config` for 28x28 canvases.
    pub async fn launch(config: ChannelConfig) -> Result<Self, ChannelError> {
        Ok(Self::new(InferenceChannel::spawn(config).await?))
    }
}

impl<F: Framing> RecognitionPipeline<F> {
    pub fn new(channel: InferenceChannel<F>) -> Self {
        Self::with_side(channel, CANVAS_SIDE)
    }

    pub fn with_side(channel: InferenceChannel<F>, side: usize) -> Self {
        Self { channel, side }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn state(&self) -> ProcessState {
        self.channel.state()
    }

    /// Validates, normalizes and classifies one canvas.
    pub async fn recognize(&self, raw_pixels: Vec<f32>) -> Result<Label, Error> {
        let grid = normalize_pixels(raw_pixels, self.side)?;
        Ok(self.channel.predict(&grid).await?)
    }

    /// Like [`recognize`](Self::recognize), but always yields display text.
    /// Failures are logged and replaced by their user-facing message.
    pub async fn recognize_text(&self, raw_pixels: Vec<f32>) -> String {
        match self.recognize(raw_pixels).await {
            Ok(label) => label.trim().to_string(),
            Err(e) => {
                log::error!("prediction failed: {e}");
                e.user_message().to_string()
            }
        }
    }

    pub async fn shutdown(self) -> Result<(), ChannelError> {
        self.channel.shutdown().await.map(|_| ())
    }
}
