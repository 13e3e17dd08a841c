// THEORY:
// This file is the main entry point for the `glyphline` library crate.
// It exposes two things to the outside world: the pure normalization transform
// that turns a hand-drawn glyph into the canonical 28x28 centered layout, and
// the `InferenceChannel` that owns the external inference process and speaks
// its one-line-in, one-line-out protocol.
//
// The `RecognitionPipeline` in `pipeline` glues the two together and is the
// interface the HTTP front end (`glyphline_server`) consumes. The internal
// modules (`core_modules`) stay usable on their own so the normalizer can be
// tested without a process and the channel without an image.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::ChannelConfig;
pub use core_modules::channel::{InferenceChannel, Label, ProcessState};
pub use core_modules::framing::{Framing, LineFraming};
pub use core_modules::grid::{BoundingBox, PixelGrid};
pub use core_modules::normalizer::normalizer::{normalize, normalize_pixels};
pub use error::{ChannelError, Error, ShapeError};
pub use pipeline::RecognitionPipeline;
