//! WordprocessingML template filling.
//!
//! The document part is scanned into blocks of runs (paragraphs, including
//! those nested in table cells), the substitution engine plans edits per
//! block, and a streaming rewrite applies them to `word/document.xml`
//! without disturbing any markup it does not touch. After the package is
//! saved, a best-effort raw-markup repair pass catches placeholders the
//! object model could not see.

mod document;
mod error;
mod fill;
mod repair;
mod rewrite;

pub use document::scan_blocks;
pub use error::DocxError;
pub use fill::{fill_docx, plan_blocks, BlockPlan, DocxFillReport};
pub use repair::repair_saved_package;
pub use rewrite::apply_plans;

/// Part name of the main document story.
pub const DOCUMENT_PART: &str = "word/document.xml";
