use serde::{Deserialize, Serialize};

/// One manifest entry, in move order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub move_number: usize,
    pub uci: String,
    pub from_square: String,
    pub to_square: String,
    pub from_coords: [u32; 2],
    pub to_coords: [u32; 2],
    pub image: String,
}
