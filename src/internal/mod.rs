//! Internal building blocks: the path-keyed tree index, the object model, and zlib framing.

pub mod index;
pub mod object;
pub mod zlib;
