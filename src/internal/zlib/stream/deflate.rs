//! Zlib-compresses a loose object's framed bytes (`<type> <size>\0<content>`) for writing to
//! the object database. Symmetric counterpart to [`super::inflate::ReadBoxed`].

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::errors::GitError;
use crate::internal::object::types::ObjectType;

/// Frame raw object content with its git header and zlib-compress it, ready to write as a
/// loose object file.
pub fn compress_object(obj_type: ObjectType, content: &[u8]) -> Result<Vec<u8>, GitError> {
    let mut framed = Vec::with_capacity(content.len() + 32);
    framed.extend(obj_type.to_bytes());
    framed.push(b' ');
    framed.extend(content.len().to_string().as_bytes());
    framed.push(0);
    framed.extend(content);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&framed)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::zlib::stream::inflate::ReadBoxed;
    use std::io::{BufReader, Read};

    #[test]
    fn round_trips_through_inflate() {
        let content = b"tree deadbeef\nparent cafebabe\n\ncommit message\n";
        let compressed = compress_object(ObjectType::Commit, content).unwrap();

        let reader = BufReader::new(std::io::Cursor::new(compressed));
        let mut inflater = ReadBoxed::new(reader, ObjectType::Commit, content.len());
        let mut out = Vec::new();
        inflater.read_to_end(&mut out).unwrap();
        assert_eq!(out, content);
    }
}
