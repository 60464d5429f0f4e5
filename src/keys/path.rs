//! BIP32-style derivation paths.
//!
//! A path is an immutable sequence of 32-bit child numbers. The hardened
//! marker is carried in the top bit of each stored value and exposed as a
//! boolean through the accessors. Parsing accepts the standard `a/b'/c`
//! grammar with decimal or `0x`-prefixed hex segments and an optional
//! leading `m` as the very first token only.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Errors from path parsing and navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid derivation path: {0}")]
    Parse(String),

    #[error("index {index} out of range for path of depth {depth}")]
    IndexOutOfRange { index: usize, depth: usize },
}

/// An immutable hierarchical derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath {
    segments: Vec<u32>,
}

impl DerivationPath {
    /// Top bit of a child number marks hardened derivation.
    pub const HARDENED_BIT: u32 = 0x8000_0000;

    /// The empty (root) path.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a path from raw child numbers (hardened bit included).
    pub fn new(segments: Vec<u32>) -> Self {
        Self { segments }
    }

    /// Parse a path string such as `44'/0'/0'/0/12` or `m/0x2c'/0`.
    ///
    /// A leading `m` is permitted only as the very first token. An empty
    /// segment or an unrecognized character is a [`PathError::Parse`].
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() || input == "m" {
            return Ok(Self::root());
        }

        let rest = input.strip_prefix("m/").unwrap_or(input);
        let mut segments = Vec::new();
        for (position, token) in rest.split('/').enumerate() {
            segments.push(parse_segment(token, position)?);
        }
        Ok(Self { segments })
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Raw child number (hardened bit included) at `index`.
    pub fn child_num_at(&self, index: usize) -> Result<u32, PathError> {
        self.segments
            .get(index)
            .copied()
            .ok_or(PathError::IndexOutOfRange {
                index,
                depth: self.segments.len(),
            })
    }

    /// Unhardened value at `index` (hardened bit stripped).
    pub fn value_at(&self, index: usize) -> Result<u32, PathError> {
        Ok(self.child_num_at(index)? & !Self::HARDENED_BIT)
    }

    pub fn is_hardened(&self, index: usize) -> Result<bool, PathError> {
        Ok(self.child_num_at(index)? & Self::HARDENED_BIT != 0)
    }

    /// Raw child number of the deepest segment.
    pub fn last_child_num(&self) -> Result<u32, PathError> {
        match self.segments.last() {
            Some(last) => Ok(*last),
            None => Err(PathError::IndexOutOfRange {
                index: 0,
                depth: 0,
            }),
        }
    }

    /// Path with the deepest segment removed. The root path has no parent.
    pub fn parent(&self) -> Result<Self, PathError> {
        if self.segments.is_empty() {
            return Err(PathError::IndexOutOfRange {
                index: 0,
                depth: 0,
            });
        }
        Ok(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Child path extended by one raw child number.
    pub fn child(&self, child_num: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(child_num);
        Self { segments }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().copied()
    }

    /// Render the path, optionally prefixed with the master marker `m`.
    ///
    /// Hex-parsed segments normalize to decimal; hardened segments keep
    /// their trailing apostrophe.
    pub fn to_string_with_master(&self, leading_master: bool) -> String {
        let mut out = String::new();
        if leading_master {
            out.push('m');
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if leading_master || i > 0 {
                out.push('/');
            }
            let value = segment & !Self::HARDENED_BIT;
            out.push_str(&value.to_string());
            if segment & Self::HARDENED_BIT != 0 {
                out.push('\'');
            }
        }
        out
    }
}

fn parse_segment(token: &str, position: usize) -> Result<u32, PathError> {
    if token == "m" {
        return Err(PathError::Parse(format!(
            "master marker only permitted as the first token, found at position {position}"
        )));
    }

    let (body, hardened) = match token.strip_suffix('\'') {
        Some(body) => (body, true),
        None => (token, false),
    };
    if body.is_empty() {
        return Err(PathError::Parse(format!(
            "empty segment at position {position}"
        )));
    }

    let value = if let Some(hex_body) = body.strip_prefix("0x") {
        u32::from_str_radix(hex_body, 16).map_err(|_| {
            PathError::Parse(format!("invalid hex segment \"{token}\" at position {position}"))
        })?
    } else if body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse::<u32>().map_err(|_| {
            PathError::Parse(format!("segment \"{token}\" overflows 32 bits at position {position}"))
        })?
    } else {
        return Err(PathError::Parse(format!(
            "unrecognized character in segment \"{token}\" at position {position}"
        )));
    };

    Ok(if hardened {
        value | DerivationPath::HARDENED_BIT
    } else {
        value
    })
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with_master(false))
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, PathError> {
        Self::parse(s)
    }
}

impl From<Vec<u32>> for DerivationPath {
    fn from(segments: Vec<u32>) -> Self {
        Self { segments }
    }
}

impl Add for &DerivationPath {
    type Output = DerivationPath;

    fn add(self, rhs: &DerivationPath) -> DerivationPath {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(&rhs.segments);
        DerivationPath { segments }
    }
}
