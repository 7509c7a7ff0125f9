use serde::{Deserialize, Serialize};

/// The addressable layouts a container can have.
///
/// Named `G<columns>x<rows>` after the usual SBS convention, so `G12x8` is the
/// 96-position layout with rows A-H and columns 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryKind {
    /// A single vessel with no positions of its own.
    Tube,
    G12x8,
    G24x16,
    G6x4,
    G8x1,
    G12x1,
}

impl GeometryKind {
    pub fn rows(&self) -> u16 {
        match self {
            GeometryKind::Tube => 0,
            GeometryKind::G12x8 => 8,
            GeometryKind::G24x16 => 16,
            GeometryKind::G6x4 => 4,
            GeometryKind::G8x1 | GeometryKind::G12x1 => 1,
        }
    }

    pub fn columns(&self) -> u16 {
        match self {
            GeometryKind::Tube => 0,
            GeometryKind::G12x8 | GeometryKind::G12x1 => 12,
            GeometryKind::G24x16 => 24,
            GeometryKind::G6x4 => 6,
            GeometryKind::G8x1 => 8,
        }
    }

    pub fn capacity(&self) -> usize {
        self.rows() as usize * self.columns() as usize
    }
}

/// Named position mappings used for whole-container transfers.
///
/// The `P384_96Tip*` sections describe how a 96-tip head picks up one interleaved
/// quadrant of a 384-well plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SbsSection {
    All96,
    All384,
    All24,
    #[serde(rename = "P384_96TIP_1A")]
    P384_96Tip1A,
    #[serde(rename = "P384_96TIP_1B")]
    P384_96Tip1B,
    #[serde(rename = "P384_96TIP_2A")]
    P384_96Tip2A,
    #[serde(rename = "P384_96TIP_2B")]
    P384_96Tip2B,
}

impl SbsSection {
    /// The layout this section addresses positions in.
    pub fn geometry(&self) -> GeometryKind {
        match self {
            SbsSection::All96 => GeometryKind::G12x8,
            SbsSection::All24 => GeometryKind::G6x4,
            SbsSection::All384
            | SbsSection::P384_96Tip1A
            | SbsSection::P384_96Tip1B
            | SbsSection::P384_96Tip2A
            | SbsSection::P384_96Tip2B => GeometryKind::G24x16,
        }
    }

    /// Row and column offset of an interleaved quadrant, `None` for full sections.
    pub fn quadrant_offset(&self) -> Option<(u16, u16)> {
        match self {
            SbsSection::P384_96Tip1A => Some((0, 0)),
            SbsSection::P384_96Tip1B => Some((0, 1)),
            SbsSection::P384_96Tip2A => Some((1, 0)),
            SbsSection::P384_96Tip2B => Some((1, 1)),
            _ => None,
        }
    }
}
