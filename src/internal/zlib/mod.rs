//! zlib framing for Git's loose-object format: `<type> <size>\0<content>`, deflate-compressed.

pub mod stream;
