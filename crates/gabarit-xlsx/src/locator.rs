//! Tabular region locator for merch sheets.
//!
//! Merch templates differ in how many banner and header rows precede the
//! product table, so the first writable row is found heuristically. Four
//! strategies are tried in order and the first success wins; the locator
//! never mutates the grid and always yields exactly one anchor.

use crate::sheet::SheetGrid;

/// Size column headers that identify the last header row of the table.
pub const SIZE_HEADERS: [&str; 5] = ["XS", "S", "M", "L", "XL"];

/// Minimum distinct size-header hits for a row to count as the header row.
pub const MIN_SIZE_MATCHES: usize = 3;

/// 0-based fallback anchor when no header structure is recognized.
pub const DEFAULT_ANCHOR_ROW: u32 = 5;

/// Columns inspected by the scans.
const SCAN_COL_LIMIT: u32 = 14;

/// Rows scanned past the grid extent, for templates whose headers sit
/// below the last populated row the reader saw.
const SCAN_ROW_SLACK: u32 = 15;

/// Rows after a `TYPE DE PRODUIT` label in which a size row is searched.
const LOCAL_SIZE_SCAN_ROWS: u32 = 4;

/// Buffer used when a type header exists but no size row was found.
const HEADER_BUFFER_ROWS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    /// A row with at least [`MIN_SIZE_MATCHES`] size headers.
    SizeHeaderRow,
    /// A `TYPE DE PRODUIT` label in the first column.
    ProductTypeHeader,
    /// Any `TYPE` substring in the first column.
    TypeSubstring,
    /// Nothing recognized; fixed fallback row.
    Default,
}

/// Where product rows start on one sheet, and how that was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionAnchor {
    /// First 0-based row to write product data into.
    pub data_start_row: u32,
    /// The size header row, when one was found.
    pub size_header_row: Option<u32>,
    pub strategy: LocatorStrategy,
}

fn size_matches(grid: &SheetGrid, row: u32) -> usize {
    (0..SCAN_COL_LIMIT)
        .filter(|&col| {
            let text = grid.text(row, col).trim().to_uppercase();
            SIZE_HEADERS.contains(&text.as_str())
        })
        .count()
}

/// Locate the first product row of `grid`.
pub fn locate_product_region(grid: &SheetGrid) -> RegionAnchor {
    let scan_limit = grid.max_row + SCAN_ROW_SLACK;

    // Strategy 1: the size header row is the last header row.
    for row in 0..scan_limit {
        if size_matches(grid, row) >= MIN_SIZE_MATCHES {
            return RegionAnchor {
                data_start_row: row + 1,
                size_header_row: Some(row),
                strategy: LocatorStrategy::SizeHeaderRow,
            };
        }
    }

    // Strategy 2: a product type label, with a local size scan below it.
    for row in 0..scan_limit {
        if !grid
            .text(row, 0)
            .to_uppercase()
            .contains("TYPE DE PRODUIT")
        {
            continue;
        }
        let local_limit = (row + 1 + LOCAL_SIZE_SCAN_ROWS).min(grid.max_row + 1);
        for next_row in row + 1..local_limit {
            if size_matches(grid, next_row) >= MIN_SIZE_MATCHES {
                return RegionAnchor {
                    data_start_row: next_row + 1,
                    size_header_row: Some(next_row),
                    strategy: LocatorStrategy::ProductTypeHeader,
                };
            }
        }
        return RegionAnchor {
            data_start_row: row + HEADER_BUFFER_ROWS,
            size_header_row: None,
            strategy: LocatorStrategy::ProductTypeHeader,
        };
    }

    // Strategy 3: any TYPE-ish label in the first column.
    for row in 0..scan_limit {
        if grid.text(row, 0).to_uppercase().contains("TYPE") {
            return RegionAnchor {
                data_start_row: row + HEADER_BUFFER_ROWS,
                size_header_row: None,
                strategy: LocatorStrategy::TypeSubstring,
            };
        }
    }

    RegionAnchor {
        data_start_row: DEFAULT_ANCHOR_ROW,
        size_header_row: None,
        strategy: LocatorStrategy::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SheetGrid;

    fn grid(cells: &[((u32, u32), &str)]) -> SheetGrid {
        SheetGrid::from_cells(
            cells
                .iter()
                .map(|&((row, col), text)| ((row, col), text.to_string())),
        )
    }

    #[test]
    fn size_header_row_wins() {
        // Sizes on row index 4 across columns 1..=5: data starts at 5.
        let g = grid(&[
            ((0, 0), "MERCH nomProjet"),
            ((4, 1), "XS"),
            ((4, 2), "S"),
            ((4, 3), "M"),
            ((4, 4), "L"),
            ((4, 5), "XL"),
        ]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::SizeHeaderRow);
        assert_eq!(anchor.size_header_row, Some(4));
        assert_eq!(anchor.data_start_row, 5);
    }

    #[test]
    fn two_size_hits_are_not_enough() {
        let g = grid(&[((2, 1), "S"), ((2, 2), "M")]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::Default);
        assert_eq!(anchor.data_start_row, DEFAULT_ANCHOR_ROW);
    }

    #[test]
    fn size_match_is_case_and_whitespace_insensitive() {
        let g = grid(&[((1, 1), " xs "), ((1, 2), "m"), ((1, 3), "XL")]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::SizeHeaderRow);
        assert_eq!(anchor.data_start_row, 2);
    }

    #[test]
    fn size_header_row_outranks_product_type_label() {
        let g = grid(&[
            ((2, 0), "Type de produit"),
            ((3, 1), "XS"),
            ((3, 2), "S"),
            ((3, 3), "M"),
        ]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::SizeHeaderRow);
        assert_eq!(anchor.size_header_row, Some(3));
        assert_eq!(anchor.data_start_row, 4);
    }

    #[test]
    fn product_type_header_without_sizes_uses_buffer() {
        let g = grid(&[((2, 0), "TYPE DE PRODUIT"), ((8, 0), "bas de page")]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::ProductTypeHeader);
        assert_eq!(anchor.size_header_row, None);
        assert_eq!(anchor.data_start_row, 5);
    }

    #[test]
    fn bare_type_substring_uses_buffer() {
        let g = grid(&[((3, 0), "Type / modèle")]);
        let anchor = locate_product_region(&g);
        assert_eq!(anchor.strategy, LocatorStrategy::TypeSubstring);
        assert_eq!(anchor.data_start_row, 6);
    }

    #[test]
    fn empty_grid_falls_back_to_default_row() {
        let anchor = locate_product_region(&SheetGrid::default());
        assert_eq!(anchor.strategy, LocatorStrategy::Default);
        assert_eq!(anchor.data_start_row, DEFAULT_ANCHOR_ROW);
    }
}
