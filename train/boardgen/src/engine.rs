//! Chess rules collaborators: the engine that owns the game and the policy
//! that picks moves for it.
//!
//! A [`RulesEngine`] mutates its position in place and cannot be shared:
//! every episode drives its own instance.

use anyhow::anyhow;
use log::trace;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role,
    fen::Fen,
    uci::UciMove,
    zobrist::{Zobrist64, ZobristHash},
};

use overlay::Square;

use crate::board::{BoardState, Kind, Piece, Side};

pub trait RulesEngine {
    type Move: Clone;

    fn current_state(&self) -> BoardState;
    fn legal_moves(&self) -> Vec<Self::Move>;
    fn apply(&mut self, mv: &Self::Move);
    fn is_over(&self) -> bool;
    fn to_notation(&self, mv: &Self::Move) -> String;
    /// Origin and destination, or `None` for moves without an origin.
    fn squares_of(&self, mv: &Self::Move) -> Option<(Square, Square)>;
}

pub trait MovePolicy {
    fn choose<M: Clone>(&mut self, moves: &[M]) -> Option<M>;
}

/// Uniformly random move choice, reproducible from its seed.
pub struct RandomPolicy {
    rng: SmallRng,
}

impl RandomPolicy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl MovePolicy for RandomPolicy {
    fn choose<M: Clone>(&mut self, moves: &[M]) -> Option<M> {
        if moves.is_empty() {
            return None;
        }
        Some(moves[self.rng.random_range(0..moves.len())].clone())
    }
}

/// Halfmoves without a capture or pawn move that end the game outright.
pub const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
/// Occurrences of one position that end the game outright.
pub const FIVEFOLD: usize = 5;

/// Standard chess backed by `shakmaty`.
///
/// Besides mate, stalemate and insufficient material, the game also ends
/// under the seventy-five-move rule and on fivefold repetition.
pub struct ShakmatyEngine {
    pos: Chess,
    last_move: Option<(Square, Square)>,
    /// Position keys seen since the last capture or pawn move, current included.
    history: Vec<u64>,
}

impl Default for ShakmatyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ShakmatyEngine {
    pub fn new() -> Self {
        Self::with_position(Chess::default())
    }

    fn with_position(pos: Chess) -> Self {
        let history = vec![position_key(&pos)];
        Self {
            pos,
            last_move: None,
            history,
        }
    }

    fn repetitions(&self) -> usize {
        let current = position_key(&self.pos);
        self.history.iter().filter(|&&k| k == current).count()
    }

    pub fn from_fen(fen: &str) -> anyhow::Result<Self> {
        let fen = Fen::from_ascii(fen.as_bytes()).map_err(|e| anyhow!("invalid FEN `{fen}`: {e}"))?;
        let pos: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| anyhow!("illegal position: {e}"))?;
        Ok(Self::with_position(pos))
    }
}

fn position_key(pos: &Chess) -> u64 {
    pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

fn convert_square(sq: shakmaty::Square) -> Square {
    // shakmaty squares are a1 = 0 .. h8 = 63, same as ours.
    Square::from_index(sq as u8).unwrap_or_else(|_| unreachable!("shakmaty square out of range"))
}

fn convert_piece(piece: shakmaty::Piece) -> Piece {
    let side = match piece.color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    };
    let kind = match piece.role {
        Role::Pawn => Kind::Pawn,
        Role::Knight => Kind::Knight,
        Role::Bishop => Kind::Bishop,
        Role::Rook => Kind::Rook,
        Role::Queen => Kind::Queen,
        Role::King => Kind::King,
    };
    Piece { side, kind }
}

impl RulesEngine for ShakmatyEngine {
    type Move = Move;

    fn current_state(&self) -> BoardState {
        let board = self.pos.board();
        let mut state = BoardState::empty();
        for sq in board.occupied() {
            state.set(convert_square(sq), board.piece_at(sq).map(convert_piece));
        }
        state.last_move = self.last_move;
        state
    }

    fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    fn apply(&mut self, mv: &Move) {
        trace!("play {}", self.to_notation(mv));
        self.last_move = self.squares_of(mv);
        if mv.is_zeroing() {
            self.history.clear();
        }
        self.pos.play_unchecked(mv);
        self.history.push(position_key(&self.pos));
    }

    fn is_over(&self) -> bool {
        self.pos.is_game_over()
            || self.pos.halfmoves() >= SEVENTY_FIVE_MOVE_PLIES
            || self.repetitions() >= FIVEFOLD
    }

    fn to_notation(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    fn squares_of(&self, mv: &Move) -> Option<(Square, Square)> {
        // Castling is king-takes-rook internally; the UCI form has the king's real target.
        match mv.to_uci(CastlingMode::Standard) {
            UciMove::Normal { from, to, .. } => Some((convert_square(from), convert_square(to))),
            UciMove::Put { .. } | UciMove::Null => None,
        }
    }
}
