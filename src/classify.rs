//! Orientation classification.
//!
//! Maps the orientation tag reported for a file, plus its raw pixel size,
//! to the way the picture is framed and whether its pixels are stored
//! sideways.

/// Tag used when the metadata carries no orientation at all.
pub const UNKNOWN_ORIENTATION: &str = "unknown";

/// Landscape or portrait framing, after accounting for physical rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Position {
    Horizontal,
    Vertical,
}

/// Quarter turn needed to bring the pixels upright.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    None,
    ClockwiseQuarter,
    CounterClockwiseQuarter,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Classification {
    pub position: Position,
    /// Raw pixels are stored sideways.
    pub rotated: bool,
    /// Correcting turn; `Rotation::None` unless `rotated`.
    pub rotation: Rotation,
}

impl Classification {
    fn upright(position: Position) -> Self {
        Self {
            position,
            rotated: false,
            rotation: Rotation::None,
        }
    }

    fn sideways(rotation: Rotation) -> Self {
        Self {
            position: Position::Vertical,
            rotated: true,
            rotation,
        }
    }
}

/// Classify a picture from its orientation tag and raw dimensions.
///
/// Only the two sideways tags mark a picture as rotated. Any other known
/// tag is trusted as already upright and horizontal; raw geometry is
/// consulted only when the tag is missing, and a square counts as
/// horizontal.
pub fn classify(orientation: &str, raw_width: u32, raw_height: u32) -> Classification {
    match orientation {
        "lower-left" => Classification::sideways(Rotation::CounterClockwiseQuarter),
        "upper-right" => Classification::sideways(Rotation::ClockwiseQuarter),
        UNKNOWN_ORIENTATION if raw_height <= raw_width => {
            Classification::upright(Position::Horizontal)
        }
        UNKNOWN_ORIENTATION => Classification::upright(Position::Vertical),
        _ => Classification::upright(Position::Horizontal),
    }
}
