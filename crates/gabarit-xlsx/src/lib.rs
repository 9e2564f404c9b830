//! SpreadsheetML template filling.
//!
//! Three processors share one toolkit: workbook sheet resolution, shared
//! strings, a read-only text grid with merged regions, and a streaming
//! cell patcher that rewrites only the worksheet parts it touches. All
//! written strings are inline strings, so `sharedStrings.xml` is never
//! grown and untouched cells keep their indices.

mod error;
mod fill;
mod locator;
mod patch;
mod sheet;
mod styles;
mod xml;

pub use error::XlsxError;
pub use fill::{
    fill_contract_xlsx, fill_merch_xlsx, fill_summary_xlsx, summary_row_values, MerchFillReport,
    XlsxFillReport, SUMMARY_COLUMNS,
};
pub use locator::{
    locate_product_region, LocatorStrategy, RegionAnchor, DEFAULT_ANCHOR_ROW, MIN_SIZE_MATCHES,
    SIZE_HEADERS,
};
pub use patch::{patch_sheet_xml, CellPatch, SheetPatches};
pub use sheet::{
    parse_shared_strings, read_merged_regions, read_sheet_grid, workbook_sheets, SheetGrid,
    SheetInfo,
};
pub use styles::register_thin_border_style;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub const STYLES_PART: &str = "xl/styles.xml";
