//! Git commit signatures (`author`/`committer` lines): `<name> <<email>> <timestamp> <offset>`.

use std::fmt::Display;
use std::str::FromStr;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// Distinguishes an `author` line from a `committer` line; both share the same wire format.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Decode, Encode)]
pub enum SignatureType {
    Author,
    Committer,
}

impl Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SignatureType::Author => write!(f, "author"),
            SignatureType::Committer => write!(f, "committer"),
        }
    }
}

impl FromStr for SignatureType {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(SignatureType::Author),
            "committer" => Ok(SignatureType::Committer),
            _ => Err(GitError::InvalidSignatureType(s.to_string())),
        }
    }
}

/// A single author/committer record, in the order git writes commit object lines.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Decode, Encode)]
pub struct Signature {
    pub signature_type: SignatureType,
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Offset from UTC in minutes, e.g. `+0800` is `480`.
    pub offset_minutes: i32,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} <{}> {} {}",
            self.signature_type,
            self.name,
            self.email,
            self.timestamp,
            format_offset(self.offset_minutes)
        )
    }
}

impl Signature {
    pub fn new(
        signature_type: SignatureType,
        name: String,
        email: String,
        timestamp: i64,
        offset_minutes: i32,
    ) -> Self {
        Signature {
            signature_type,
            name,
            email,
            timestamp,
            offset_minutes,
        }
    }

    /// Parses a single signature line, e.g. `author Jane Doe <jane@example.com> 1700000000 +0800`.
    pub fn from_data(data: Vec<u8>) -> Result<Self, GitError> {
        let text = String::from_utf8(data)
            .map_err(|e| GitError::ConversionError(e.to_string()))?;
        let mut parts = text.splitn(2, ' ');
        let kind = parts
            .next()
            .ok_or_else(|| GitError::InvalidSignatureType("empty signature line".to_string()))?;
        let signature_type = SignatureType::from_str(kind)?;
        let rest = parts
            .next()
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?;

        let email_start = rest
            .find('<')
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?;
        let email_end = rest
            .find('>')
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?;
        let name = rest[..email_start].trim().to_string();
        let email = rest[email_start + 1..email_end].to_string();

        let tail = rest[email_end + 1..].trim();
        let mut tail_parts = tail.split_whitespace();
        let timestamp: i64 = tail_parts
            .next()
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?
            .parse()
            .map_err(|_| GitError::InvalidSignatureType(text.clone()))?;
        let offset_str = tail_parts
            .next()
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?;
        let offset_minutes = parse_offset(offset_str)
            .ok_or_else(|| GitError::InvalidSignatureType(text.clone()))?;

        Ok(Signature {
            signature_type,
            name,
            email,
            timestamp,
            offset_minutes,
        })
    }

    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.to_string().into_bytes())
    }
}

fn format_offset(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
}

fn parse_offset(s: &str) -> Option<i32> {
    if s.len() != 5 {
        return None;
    }
    let sign = match &s[0..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = s[1..3].parse().ok()?;
    let minutes: i32 = s[3..5].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// A bare author/committer identity, independent of timestamp — what callers pass into the
/// stacking executor when stamping new commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_author_line() {
        let line = b"author Jane Doe <jane@example.com> 1700000000 +0800".to_vec();
        let sig = Signature::from_data(line.clone()).unwrap();
        assert_eq!(sig.signature_type, SignatureType::Author);
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.com");
        assert_eq!(sig.timestamp, 1700000000);
        assert_eq!(sig.offset_minutes, 480);
        assert_eq!(sig.to_data().unwrap(), line);
    }

    #[test]
    fn roundtrips_negative_offset() {
        let line = b"committer Bot <bot@example.com> 1 -0530".to_vec();
        let sig = Signature::from_data(line.clone()).unwrap();
        assert_eq!(sig.offset_minutes, -(5 * 60 + 30));
        assert_eq!(sig.to_data().unwrap(), line);
    }

    #[test]
    fn rejects_unknown_type() {
        let line = b"tagger Jane <jane@example.com> 1 +0000".to_vec();
        assert!(Signature::from_data(line).is_err());
    }
}
