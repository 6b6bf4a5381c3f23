//! Coordinate-notation moves (`e2e4`, `e7e8q`).
//!
//! Only the notation is checked here; legality is the server's business.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Board square, file `a..=h` and rank `1..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Create a square from 0-based file and rank indices.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    pub fn file(&self) -> u8 {
        self.file
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidMove(s.to_string());
        match s.as_bytes() {
            [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => {
                Square::new(file - b'a', rank - b'1').ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

/// Piece a pawn may promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromotionPiece {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionPiece {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(PromotionPiece::Queen),
            'r' => Some(PromotionPiece::Rook),
            'b' => Some(PromotionPiece::Bishop),
            'n' => Some(PromotionPiece::Knight),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            PromotionPiece::Queen => 'q',
            PromotionPiece::Rook => 'r',
            PromotionPiece::Bishop => 'b',
            PromotionPiece::Knight => 'n',
        }
    }
}

/// A move as source square, destination square and optional promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChessMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PromotionPiece>,
}

impl ChessMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: PromotionPiece) -> Self {
        self.promotion = Some(piece);
        self
    }
}

impl fmt::Display for ChessMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for ChessMove {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidMove(s.to_string());
        let trimmed = s.trim();
        if !trimmed.is_ascii() || !(4..=5).contains(&trimmed.len()) {
            return Err(invalid());
        }

        let lower = trimmed.to_ascii_lowercase();
        let from: Square = lower[0..2].parse().map_err(|_| invalid())?;
        let to: Square = lower[2..4].parse().map_err(|_| invalid())?;
        if from == to {
            return Err(invalid());
        }

        let promotion = match lower[4..].chars().next() {
            Some(c) => Some(PromotionPiece::from_char(c).ok_or_else(invalid)?),
            None => None,
        };

        Ok(ChessMove {
            from,
            to,
            promotion,
        })
    }
}

impl TryFrom<String> for ChessMove {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChessMove> for String {
    fn from(value: ChessMove) -> Self {
        value.to_string()
    }
}
