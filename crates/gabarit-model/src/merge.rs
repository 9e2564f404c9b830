use crate::{A1ParseError, CellRef};

/// A rectangular merged cell region.
///
/// Only the anchor (top-left) cell of a merged region may be written; every
/// other member cell is a read-only placeholder at the container level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRegion {
    pub start: CellRef,
    pub end: CellRef,
}

impl MergedRegion {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self {
            start: CellRef::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellRef::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Parse a `ref` attribute value like `A1:C3`. A single-cell ref (`B2`)
    /// is accepted and treated as a degenerate region.
    pub fn from_ref(r: &str) -> Result<Self, A1ParseError> {
        match r.split_once(':') {
            Some((a, b)) => Ok(Self::new(CellRef::from_a1(a)?, CellRef::from_a1(b)?)),
            None => {
                let cell = CellRef::from_a1(r)?;
                Ok(Self::new(cell, cell))
            }
        }
    }

    pub fn anchor(&self) -> CellRef {
        self.start
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }
}

/// All merged regions of one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedRegions {
    regions: Vec<MergedRegion>,
}

impl MergedRegions {
    pub fn new(regions: Vec<MergedRegion>) -> Self {
        Self { regions }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedRegion> {
        self.regions.iter()
    }

    pub fn push(&mut self, region: MergedRegion) {
        self.regions.push(region);
    }

    /// `true` when `cell` belongs to a merged region but is not its anchor,
    /// i.e. writing it directly would corrupt the merge.
    pub fn is_shadowed(&self, cell: CellRef) -> bool {
        self.regions
            .iter()
            .any(|r| r.contains(cell) && r.anchor() != cell)
    }
}
