use serde::*;

/// A pixel-resolution map position.
///
/// Coordinates are non-negative and bounded by the map size (at most
/// 256 tiles of 32 pixels per axis), so the packed representation fits
/// both axes into a single `u32`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Position {
    x: i32,
    y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    #[inline]
    pub fn x(self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(self) -> i32 {
        self.y
    }

    #[inline]
    pub fn packed_repr(self) -> u32 {
        ((self.x as u32) << 16) | (self.y as u32 & 0xFFFF)
    }

    #[inline]
    pub fn from_packed(packed: u32) -> Self {
        Position {
            x: (packed >> 16) as i32,
            y: (packed & 0xFFFF) as i32,
        }
    }

    /// Euclidean distance to another position, truncated to whole pixels.
    pub fn distance_to(self, other: Self) -> i32 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt() as i32
    }

    /// The tile containing this position.
    pub fn tile(self) -> TilePosition {
        TilePosition {
            x: self.x / 32,
            y: self.y / 32,
        }
    }
}

impl Serialize for Position {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.packed_repr().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(Position::from_packed)
    }
}

/// A tile-resolution map position (one tile = 32 pixels).
///
/// Resource nodes are keyed by their initial tile in the persistence
/// format, which stays stable across sessions while unit identities do not.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub fn new(x: i32, y: i32) -> Self {
        TilePosition { x, y }
    }

    /// The pixel position of this tile's top-left corner.
    pub fn to_position(self) -> Position {
        Position::new(self.x * 32, self.y * 32)
    }
}

/// A quantized kinematic sample: where an agent was and how fast it was
/// moving, with velocity components scaled by 100 and truncated.
///
/// The derived ordering (position, then vx, then vy) is the total order
/// used for deterministic storage and lookup of learned signatures.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PositionAndVelocity {
    pub position: Position,
    pub velocity_x: i32,
    pub velocity_y: i32,
}

impl PositionAndVelocity {
    pub fn new(position: Position, velocity_x: i32, velocity_y: i32) -> Self {
        PositionAndVelocity {
            position,
            velocity_x,
            velocity_y,
        }
    }

    /// Quantize a raw velocity vector at the given position.
    pub fn quantize(position: Position, velocity: (f64, f64)) -> Self {
        PositionAndVelocity {
            position,
            velocity_x: (velocity.0 * 100.0) as i32,
            velocity_y: (velocity.1 * 100.0) as i32,
        }
    }
}
