// THEORY:
// `Framing` is the seam between the `InferenceChannel` and the bytes on the
// wire. The channel only knows how to push an encoded request down stdin and how
// to keep feeding stdout bytes into a buffer until a complete response frame
// can be cut out of it. What a frame looks like is the framing's business.
//
// The engine we ship against speaks `LineFraming`: one request per line of
// space-separated, three-decimal intensities, one response per line. Newlines are
// the only delimiter, so a response that spans lines or is cut off by EOF cannot
// be framed correctly. A length-prefixed framing can replace it without
// touching the normalizer or the HTTP layer.

use std::num::ParseFloatError;

use crate::core_modules::grid::PixelGrid;

/// Turns grids into request frames and cuts response frames out of a byte buffer.
pub trait Framing: Send + Sync + 'static {
    fn encode_request(&self, grid: &PixelGrid) -> Vec<u8>;

    /// Removes one complete frame from the front of `buffer`, or returns `None`
    /// when more bytes are needed.
    fn decode_response(&self, buffer: &mut Vec<u8>) -> Option<String>;
}

/// Newline-delimited text frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFraming;

impl Framing for LineFraming {
    fn encode_request(&self, grid: &PixelGrid) -> Vec<u8> {
        let mut line = format_request_line(grid.pixels());
        line.push('\n');
        line.into_bytes()
    }

    fn decode_response(&self, buffer: &mut Vec<u8>) -> Option<String> {
        let newline = buffer.iter().position(|&b| b == b'\n')?;
        let mut frame: Vec<u8> = buffer.drain(..=newline).collect();
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
        Some(String::from_utf8_lossy(&frame).into_owned())
    }
}

/// `v1 v2 ... vn`, each value with exactly three decimals, no trailing newline.
pub fn format_request_line(values: &[f32]) -> String {
    let mut line = String::with_capacity(values.len() * 6);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&format!("{value:.3}"));
    }
    line
}

/// Inverse of [`format_request_line`]; tolerates repeated whitespace.
pub fn parse_request_line(line: &str) -> Result<Vec<f32>, ParseFloatError> {
    line.split_whitespace().map(str::parse::<f32>).collect()
}
