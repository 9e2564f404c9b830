//! Placeholder resolution and substitution engine.
//!
//! Substitution is an ordered chain of matcher passes over an immutable
//! token catalog snapshot:
//!
//! 1. run-exact: a run whose cleaned, trimmed text equals a token is
//!    rewritten in place ([`substitute_block`], [`substitute_text`]);
//! 2. block-reconstruct: a block whose concatenated text still contains a
//!    token (raw or with invisible code points interleaved) collapses onto
//!    a single run carrying the replaced full text;
//! 3. raw-markup repair ([`MarkupRepair`]): a gap-tolerant pattern applied
//!    to serialized markup, for placeholders fragmented across tag
//!    boundaries that the object model cannot see.
//!
//! Each pass is idempotent and a no-op where an earlier pass already
//! resolved the token. Every pass iterates tokens longest-first so a short
//! token never corrupts an occurrence embedded in a longer one.

mod catalog;
mod invisible;
mod passes;
mod repair;
mod rules;

pub use catalog::{contract_tokens, merch_tokens, TokenBinding, TokenCatalog};
pub use invisible::{find_ignoring_invisible, is_invisible, strip_invisible, INVISIBLE_CHARS};
pub use passes::{apply_edit, edited_run_texts, substitute_block, substitute_text, BlockEdit};
pub use repair::{escape_xml_text, MarkupRepair, RepairError};
pub use rules::{contract_strike_rules, runs_to_strike, StrikeRule};
