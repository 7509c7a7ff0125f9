//! Fixed addressable layouts for containers.
//!
//! Positions are ordered row-major everywhere: `A01, A02, ... A12, B01, ...`. Section
//! transfers, report rows and digests all rely on that order being stable.

use crate::error::{LabError, Result};
use labtrack_schemas::geometry::{GeometryKind, SbsSection};
use serde::{Deserialize, Serialize};
use std::fmt;

const ROW_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A named position within a container, e.g. `A01`.
///
/// Zero-based internally; ordering is row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VesselPosition {
    row: u16,
    column: u16,
}

impl VesselPosition {
    pub fn new(row: u16, column: u16) -> Self {
        Self { row, column }
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    pub fn column(&self) -> u16 {
        self.column
    }

    /// Parses names such as `A01`, `a1` or `P24`.
    pub fn parse(name: &str) -> Option<VesselPosition> {
        let name = name.trim();
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let row = ROW_LETTERS.iter().position(|&l| l as char == letter)? as u16;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let column: u16 = digits.parse().ok()?;
        if column == 0 {
            return None;
        }
        Some(VesselPosition::new(row, column - 1))
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VesselPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = ROW_LETTERS
            .get(self.row as usize)
            .map(|&l| l as char)
            .unwrap_or('?');
        write!(f, "{}{:02}", letter, self.column + 1)
    }
}

/// Immutable layout descriptor: row and column counts plus the row-major position list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VesselGeometry {
    kind: GeometryKind,
    rows: u16,
    columns: u16,
    positions: Vec<VesselPosition>,
}

impl VesselGeometry {
    pub fn of(kind: GeometryKind) -> Self {
        let rows = kind.rows();
        let columns = kind.columns();
        let positions = (0..rows)
            .flat_map(|row| (0..columns).map(move |column| VesselPosition::new(row, column)))
            .collect();
        Self {
            kind,
            rows,
            columns,
            positions,
        }
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn row_count(&self) -> u16 {
        self.rows
    }

    pub fn column_count(&self) -> u16 {
        self.columns
    }

    pub fn positions(&self) -> &[VesselPosition] {
        &self.positions
    }

    pub fn contains(&self, position: &VesselPosition) -> bool {
        position.row < self.rows && position.column < self.columns
    }

    /// Row-major index of a position, `None` when it lies outside the layout.
    pub fn index_of(&self, position: &VesselPosition) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        Some(position.row as usize * self.columns as usize + position.column as usize)
    }

    pub fn position_at(&self, row: u16, column: u16) -> Option<VesselPosition> {
        let candidate = VesselPosition::new(row, column);
        self.index_of(&candidate).map(|i| self.positions[i])
    }

    pub fn position_at_index(&self, index: usize) -> Option<VesselPosition> {
        self.positions.get(index).copied()
    }

    /// Parses a position name and checks it against this layout.
    pub fn parse_position(&self, container: &str, name: &str) -> Result<VesselPosition> {
        VesselPosition::parse(name)
            .filter(|p| self.contains(p))
            .ok_or_else(|| LabError::PositionOutOfGeometry {
                container: container.to_string(),
                position: name.to_string(),
                geometry: format!("{:?}", self.kind),
            })
    }

    /// Orthogonally adjacent positions that exist in this layout.
    pub fn adjacent(&self, position: &VesselPosition) -> Vec<VesselPosition> {
        let (row, column) = (position.row as i32, position.column as i32);
        [(-1, 0), (0, -1), (0, 1), (1, 0)]
            .iter()
            .filter_map(|(dr, dc)| {
                let (r, c) = (row + dr, column + dc);
                if r < 0 || c < 0 {
                    return None;
                }
                self.position_at(r as u16, c as u16)
            })
            .collect()
    }
}

/// Ordered positions covered by a section.
///
/// Index `i` of a source section pairs with index `i` of the target section.
pub fn section_positions(section: SbsSection) -> Vec<VesselPosition> {
    let geometry = VesselGeometry::of(section.geometry());
    match section.quadrant_offset() {
        None => geometry.positions().to_vec(),
        Some((row_offset, column_offset)) => {
            let rows = geometry.row_count() / 2;
            let columns = geometry.column_count() / 2;
            (0..rows)
                .flat_map(|row| {
                    (0..columns).map(move |column| {
                        VesselPosition::new(row * 2 + row_offset, column * 2 + column_offset)
                    })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_KINDS: [GeometryKind; 6] = [
        GeometryKind::Tube,
        GeometryKind::G12x8,
        GeometryKind::G24x16,
        GeometryKind::G6x4,
        GeometryKind::G8x1,
        GeometryKind::G12x1,
    ];

    #[test]
    fn position_count_matches_rows_times_columns() {
        for kind in ALL_KINDS {
            let geometry = VesselGeometry::of(kind);
            assert_eq!(
                geometry.row_count() as usize * geometry.column_count() as usize,
                geometry.positions().len(),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn row_major_index_round_trips() {
        for kind in ALL_KINDS {
            let geometry = VesselGeometry::of(kind);
            for row in 0..geometry.row_count() {
                for column in 0..geometry.column_count() {
                    let index = row as usize * geometry.column_count() as usize + column as usize;
                    let position = geometry.positions()[index];
                    assert_eq!((position.row(), position.column()), (row, column));
                    assert_eq!(geometry.index_of(&position), Some(index));
                    assert_eq!(geometry.position_at(row, column), Some(position));
                }
            }
        }
    }

    #[test]
    fn names_parse_and_render() {
        let h12 = VesselPosition::parse("h12").unwrap();
        assert_eq!(h12, VesselPosition::new(7, 11));
        assert_eq!(h12.to_string(), "H12");
        assert_eq!(VesselPosition::parse("A1"), Some(VesselPosition::new(0, 0)));
        assert_eq!(VesselPosition::parse("A00"), None);
        assert_eq!(VesselPosition::parse("1A"), None);
        assert_eq!(VesselPosition::parse(""), None);
    }

    #[test]
    fn positions_outside_the_layout_are_rejected() {
        let geometry = VesselGeometry::of(GeometryKind::G12x8);
        assert!(geometry.parse_position("P1", "I01").is_err());
        assert!(geometry.parse_position("P1", "A13").is_err());
        assert_eq!(geometry.index_of(&VesselPosition::new(8, 0)), None);
        assert!(VesselGeometry::of(GeometryKind::Tube).positions().is_empty());
    }

    #[test]
    fn corner_has_two_neighbours() {
        let geometry = VesselGeometry::of(GeometryKind::G12x8);
        let a01 = VesselPosition::new(0, 0);
        let names: Vec<String> = geometry.adjacent(&a01).iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["A02", "B01"]);
        assert_eq!(geometry.adjacent(&VesselPosition::new(3, 5)).len(), 4);
    }

    #[test]
    fn quadrant_sections_interleave() {
        let one_a = section_positions(SbsSection::P384_96Tip1A);
        let two_b = section_positions(SbsSection::P384_96Tip2B);
        assert_eq!(one_a.len(), 96);
        assert_eq!(one_a[0].name(), "A01");
        assert_eq!(one_a[1].name(), "A03");
        assert_eq!(one_a[12].name(), "C01");
        assert_eq!(two_b[0].name(), "B02");
        assert_eq!(two_b[95].name(), "P24");
        assert_eq!(section_positions(SbsSection::All96).len(), 96);
    }
}
