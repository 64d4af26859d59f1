use overlay::Square;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    White,
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub side: Side,
    pub kind: Kind,
}

/// Piece placement as the renderer sees it, indexed `a1 = 0 .. h8 = 63`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardState {
    squares: [Option<Piece>; 64],
    pub last_move: Option<(Square, Square)>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoardState {
    pub fn empty() -> Self {
        Self {
            squares: [None; 64],
            last_move: None,
        }
    }

    pub fn get(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        self.squares[square.index()] = piece;
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.get(sq).map(|p| (sq, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_by_square() {
        let mut b = BoardState::empty();
        let e4: Square = "e4".parse().unwrap();
        let queen = Piece {
            side: Side::Black,
            kind: Kind::Queen,
        };
        b.set(e4, Some(queen));
        assert_eq!(b.get(e4), Some(queen));
        assert_eq!(b.pieces().collect::<Vec<_>>(), vec![(e4, queen)]);
        b.set(e4, None);
        assert_eq!(b.pieces().count(), 0);
    }
}
