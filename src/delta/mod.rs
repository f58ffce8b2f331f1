//! Git-style binary delta encoding/decoding, used by the delta-extraction phase to score
//! rename/copy similarity between a deleted path's old blob and an added path's new blob.

pub mod decode;
pub mod encode;
pub mod errors;
pub mod utils;

pub use encode::DeltaDiff;
