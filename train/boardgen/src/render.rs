use std::fmt::Write as _;

use thiserror::Error;

use overlay::Square;

use crate::{
    board::{BoardState, Kind, Side},
    config::{BoardStyle, Colour},
};

/// Square edge in SVG user units; the whole board is 8x this.
pub const SQUARE_UNITS: u32 = 45;
pub const BOARD_UNITS: u32 = SQUARE_UNITS * 8;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("svg rejected: {0}")]
    Svg(String),
    #[error("cannot allocate a {0}x{0} pixmap")]
    Pixmap(u32),
    #[error("coordinate labels need a .ttf/.otf font in {0}")]
    NoFont(String),
    #[error("render scratch file: {0}")]
    Io(#[from] std::io::Error),
}

/// Scalable board picture, an SVG document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorImage(pub String);

pub trait BoardRenderer {
    fn render(&self, state: &BoardState, style: &BoardStyle) -> Result<VectorImage, RenderError>;
}

/// Flat SVG board: white at the bottom, no coordinates, one silhouette per piece.
#[derive(Clone, Copy, Debug, Default)]
pub struct SvgBoardRenderer;

// Piece outlines in a 45x45 cell.
fn piece_path(kind: Kind) -> &'static str {
    match kind {
        Kind::Pawn => {
            "M22.5 9a5 5 0 0 0-3 9c-2.5 1.5-4 4-4 7 0 2 1 3.5 2.5 4.5-3 1-7.5 5.5-7.5 \
             11.5h24c0-6-4.5-10.5-7.5-11.5 1.5-1 2.5-2.5 2.5-4.5 0-3-1.5-5.5-4-7a5 5 0 0 0-3-9z"
        }
        Kind::Knight => {
            "M22 10c10.5 1 16.5 8 16 29H15c0-9 10-6.5 8-21M24 18c.4 2.9-5.5 7.4-8 9-3 2-2.8 \
             4.3-5 4-1-1 1.4-3 0-3-1 0 .2 1.2-1 2-1 0-4 1-4-4 0-2 6-12 6-12s1.9-1.9 2-3.5\
             c-.7-1-.5-2-.5-3 1-1 3 2.5 3 2.5h2s.8-2 2.5-3c1 0 1 3 1 3z"
        }
        Kind::Bishop => {
            "M9 36c3.4-1 10.1.4 13.5-2 3.4 2.4 10.1 1 13.5 2 0 0 1.6.5 3 2-.7 1-1.6 1-3 .5\
             -3.4-1-10.1.5-13.5-1-3.4 1.5-10.1 0-13.5 1-1.4.5-2.3.5-3-.5 1.4-2 3-2 3-2z\
             M15 32c2.5 2.5 12.5 2.5 15 0 .5-1.5 0-2 0-2 0-2.5-2.5-4-2.5-4 5.5-1.5 6-11.5\
             -5-15.5-11 4-10.5 14-5 15.5 0 0-2.5 1.5-2.5 4 0 0-.5.5 0 2z\
             M25 8a2.5 2.5 0 1 1-5 0 2.5 2.5 0 1 1 5 0z"
        }
        Kind::Rook => {
            "M9 39h27v-3H9zM12 36v-4h21v4zM11 14V9h4v2h5V9h5v2h5V9h4v5M34 14l-3 3H14l-3-3\
             M31 17v12.5H14V17M31 29.5l1.5 2.5h-20l1.5-2.5M11 14h23"
        }
        Kind::Queen => {
            "M9 26c8.5-1.5 21-1.5 27 0l2.5-12.5L31 25l-.3-14.1-5.2 13.6-3-14.5-3 14.5\
             -5.2-13.6L14 25 6.5 13.5 9 26zM9 26c0 2 1.5 2 2.5 4 1 1.5 1 1 .5 3.5-1.5 1-1.5 \
             2.5-1.5 2.5-1.5 1.5.5 2.5.5 2.5 6.5 1 16.5 1 23 0 0 0 1.5-1 0-2.5 0 0 .5-1.5\
             -1-2.5-.5-2.5-.5-2 .5-3.5 1-2 2.5-2 2.5-4-8.5-1.5-18.5-1.5-27 0z"
        }
        Kind::King => {
            "M22.5 11.63V6M20 8h5M22.5 25s4.5-7.5 3-10.5c0 0-1-2.5-3-2.5s-3 2.5-3 2.5\
             c-1.5 3 3 10.5 3 10.5M12.5 37c5.5 3.5 14.5 3.5 20 0v-7s9-4.5 6-10.5c-4-6.5\
             -13.5-3.5-16 4V27v-3.5c-2.5-7.5-12-10.5-16-4-3 6 6 10.5 6 10.5v7"
        }
    }
}

fn square_fill(style: &BoardStyle, state: &BoardState, square: Square) -> Colour {
    let is_light = (square.file() + square.rank()) % 2 == 1;
    let base = if is_light { style.light } else { style.dark };
    match state.last_move {
        Some((from, to)) if style.highlight_last_move && (square == from || square == to) => {
            blend(base, style.highlight)
        }
        _ => base,
    }
}

fn blend(a: Colour, b: Colour) -> Colour {
    let mut out = [0u8; 3];
    for (i, c) in out.iter_mut().enumerate() {
        *c = ((a.0[i] as u16 + b.0[i] as u16) / 2) as u8;
    }
    Colour(out)
}

impl BoardRenderer for SvgBoardRenderer {
    fn render(&self, state: &BoardState, style: &BoardStyle) -> Result<VectorImage, RenderError> {
        let mut svg = String::with_capacity(16 << 10);
        // Writing into a String cannot fail.
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{BOARD_UNITS}" height="{BOARD_UNITS}" viewBox="0 0 {BOARD_UNITS} {BOARD_UNITS}" shape-rendering="crispEdges">"#
        );

        for square in Square::all() {
            let x = square.file() as u32 * SQUARE_UNITS;
            let y = square.row_from_top() as u32 * SQUARE_UNITS;
            let _ = write!(
                svg,
                r#"<rect class="square {square}" x="{x}" y="{y}" width="{SQUARE_UNITS}" height="{SQUARE_UNITS}" fill="{}"/>"#,
                square_fill(style, state, square)
            );
        }

        for (square, piece) in state.pieces() {
            let x = square.file() as u32 * SQUARE_UNITS;
            let y = square.row_from_top() as u32 * SQUARE_UNITS;
            let (fill, stroke) = match piece.side {
                Side::White => ("#ffffff", "#000000"),
                Side::Black => ("#000000", "#ffffff"),
            };
            let _ = write!(
                svg,
                r#"<path class="piece" transform="translate({x},{y})" d="{}" fill="{fill}" stroke="{stroke}" stroke-width="1.5" stroke-linejoin="round" shape-rendering="geometricPrecision"/>"#,
                piece_path(piece.kind)
            );
        }

        svg.push_str("</svg>");
        Ok(VectorImage(svg))
    }
}
