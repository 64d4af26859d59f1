use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FILES: u8 = 8;
pub const RANKS: u8 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid square `{0}`, expected a1..h8")]
pub struct InvalidSquareError(pub String);

/// One board square in algebraic notation. `file` and `rank` are zero based,
/// so `a1` is `(0, 0)` and `h8` is `(7, 7)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Result<Self, InvalidSquareError> {
        if file >= FILES || rank >= RANKS {
            return Err(InvalidSquareError(format!("file={file} rank={rank}")));
        }
        Ok(Self { file, rank })
    }

    /// Index with `a1 = 0`, `b1 = 1`, ..., `h8 = 63`.
    pub fn from_index(index: u8) -> Result<Self, InvalidSquareError> {
        if index >= FILES * RANKS {
            return Err(InvalidSquareError(format!("index {index}")));
        }
        Ok(Self {
            file: index % FILES,
            rank: index / FILES,
        })
    }

    pub fn index(self) -> usize {
        (self.rank * FILES + self.file) as usize
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    /// Row counted from the top of a board drawn with white at the bottom.
    pub fn row_from_top(self) -> u8 {
        RANKS - 1 - self.rank
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0..FILES * RANKS).map(|i| Square {
            file: i % FILES,
            rank: i / FILES,
        })
    }
}

impl FromStr for Square {
    type Err = InvalidSquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(InvalidSquareError(s.to_string()));
        }
        let (f, r) = (bytes[0].to_ascii_lowercase(), bytes[1]);
        if !(b'a'..=b'h').contains(&f) || !(b'1'..=b'8').contains(&r) {
            return Err(InvalidSquareError(s.to_string()));
        }
        Ok(Self {
            file: f - b'a',
            rank: r - b'1',
        })
    }
}

impl TryFrom<String> for Square {
    type Error = InvalidSquareError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Square> for String {
    fn from(sq: Square) -> Self {
        sq.to_string()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}
