//! `gabarit-model` defines the core in-memory data structures shared by the
//! template-filling pipeline.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the substitution engine (token catalog, matcher passes)
//! - the `.docx` / `.xlsx` container layers
//! - the CLI boundary via `serde` (JSON-safe payload schema)

mod address;
mod merge;
mod product;
mod record;
mod run;
mod value;

pub use address::{col_to_name, name_to_col, A1ParseError, CellRef};
pub use merge::{MergedRegion, MergedRegions};
pub use product::Product;
pub use record::{scalar_text, FillRecord, RecordError};
pub use run::{Block, Run};
pub use value::CellValue;
