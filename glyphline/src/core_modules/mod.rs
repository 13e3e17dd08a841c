pub mod channel;
pub mod drain;
pub mod framing;
pub mod grid;
pub mod normalizer;
