use regex::Regex;
use thiserror::Error;

use crate::catalog::TokenCatalog;
use crate::invisible::INVISIBLE_CHARS;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("invalid repair pattern for token {token:?}: {source}")]
    Pattern {
        token: String,
        source: regex::Error,
    },
}

/// Raw-markup repair pass.
///
/// Compiles, per token (longest first), a pattern matching the token's
/// characters with any number of markup tags, whitespace runs or invisible
/// code points between *every* adjacent pair. This catches placeholders
/// fragmented across structural boundaries (`XX</w:t></w:r><w:r><w:t>X1`)
/// that the object-model passes cannot see.
///
/// Idempotent: replacement values are business data, not token text, so a
/// second application finds no matches.
#[derive(Debug)]
pub struct MarkupRepair {
    patterns: Vec<(Regex, String)>,
}

impl MarkupRepair {
    pub fn new(catalog: &TokenCatalog) -> Result<Self, RepairError> {
        let gap = gap_pattern();
        let patterns = catalog
            .iter()
            .filter(|b| !b.token.is_empty())
            .map(|b| {
                let pattern = token_pattern(&b.token, &gap);
                let regex = Regex::new(&pattern).map_err(|source| RepairError::Pattern {
                    token: b.token.clone(),
                    source,
                })?;
                Ok((regex, escape_xml_text(&b.value)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Apply every token pattern to a serialized markup member. Returns
    /// `None` when nothing matched.
    pub fn apply(&self, markup: &str) -> Option<String> {
        let mut out = std::borrow::Cow::Borrowed(markup);
        let mut changed = false;
        for (regex, replacement) in &self.patterns {
            if regex.is_match(&out) {
                // Replace through a closure so `$` in values is literal.
                let replaced = regex
                    .replace_all(&out, |_: &regex::Captures<'_>| replacement.clone())
                    .into_owned();
                out = std::borrow::Cow::Owned(replaced);
                changed = true;
            }
        }
        changed.then(|| out.into_owned())
    }
}

fn gap_pattern() -> String {
    let mut class = String::new();
    for c in INVISIBLE_CHARS {
        class.push_str(&format!("\\x{{{:X}}}", c as u32));
    }
    format!("(?:<[^>]*>|\\s|[{class}])*")
}

fn token_pattern(token: &str, gap: &str) -> String {
    let mut pattern = String::new();
    let mut first = true;
    for c in token.chars() {
        if !first {
            pattern.push_str(gap);
        }
        pattern.push_str(&regex::escape(&c.to_string()));
        first = false;
    }
    pattern
}

/// Escape a replacement value for insertion into XML character data.
pub fn escape_xml_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TokenCatalog;
    use pretty_assertions::assert_eq;

    fn repair() -> MarkupRepair {
        MarkupRepair::new(&TokenCatalog::new([
            ("XXX1", "Acme Tour"),
            ("XXX10", "OUI"),
        ]))
        .unwrap()
    }

    #[test]
    fn repairs_token_split_across_run_boundaries() {
        let xml = r#"<w:p><w:r><w:t>XX</w:t></w:r><w:r><w:t>X1</w:t></w:r></w:p>"#;
        let out = repair().apply(xml).unwrap();
        assert!(out.contains("Acme Tour"));
        assert!(!out.contains("XX</w:t>"));
    }

    #[test]
    fn longest_token_is_repaired_before_its_prefix() {
        let xml = r#"<w:t>XXX</w:t><w:t>10</w:t>"#;
        let out = repair().apply(xml).unwrap();
        assert!(out.contains("OUI"));
        assert!(!out.contains("Acme Tour0"));
    }

    #[test]
    fn tolerates_whitespace_and_invisibles_in_the_gap() {
        let xml = "<w:t>X X\u{200B}X 1</w:t>";
        let out = repair().apply(xml).unwrap();
        assert_eq!(out, "<w:t>Acme Tour</w:t>");
    }

    #[test]
    fn second_application_is_a_no_op() {
        let xml = r#"<w:t>XX</w:t><w:t>X1</w:t>"#;
        let repair = repair();
        let once = repair.apply(xml).unwrap();
        assert_eq!(repair.apply(&once), None);
    }

    #[test]
    fn replacement_value_is_xml_escaped_and_dollar_safe() {
        let repair = MarkupRepair::new(&TokenCatalog::new([("TOK", "A&B <$1>")])).unwrap();
        let out = repair.apply("<w:t>TOK</w:t>").unwrap();
        assert_eq!(out, "<w:t>A&amp;B &lt;$1&gt;</w:t>");
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(repair().apply("<w:t>nothing</w:t>"), None);
    }
}
