//! Workbook structure and worksheet reads.
//!
//! Everything here is read-only: the sheet list from `xl/workbook.xml`
//! resolved through its relationships, the shared strings table, merged
//! regions, and [`SheetGrid`], a sparse map of the string-valued cells of
//! one worksheet. Numeric and formula cells are not substitution targets
//! and are not loaded.

use std::collections::{BTreeMap, HashMap};

use gabarit_model::{CellRef, MergedRegion, MergedRegions};
use gabarit_opc::OpcPackage;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::xml::local_name;
use crate::{XlsxError, WORKBOOK_PART, WORKBOOK_RELS_PART};

/// One worksheet of the workbook, with its part name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub rel_id: String,
    pub part: String,
}

/// List the worksheets in workbook order.
pub fn workbook_sheets(pkg: &OpcPackage) -> Result<Vec<SheetInfo>, XlsxError> {
    let workbook = pkg.required_part(WORKBOOK_PART)?;
    let rels = pkg.required_part(WORKBOOK_RELS_PART)?;
    let targets = parse_relationship_targets(rels)?;

    let mut reader = Reader::from_reader(workbook);
    reader.config_mut().trim_text(false);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"sheet" => {
                let mut name = None;
                let mut rel_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match local_name(attr.key.as_ref()) {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        b"id" => rel_id = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                let (Some(name), Some(rel_id)) = (name, rel_id) else {
                    continue;
                };
                let Some(part) = targets.get(&rel_id) else {
                    return Err(XlsxError::Invalid(format!(
                        "missing worksheet relationship for sheet {name}"
                    )));
                };
                sheets.push(SheetInfo {
                    name,
                    rel_id: rel_id.clone(),
                    part: part.clone(),
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if sheets.is_empty() {
        return Err(XlsxError::Invalid("workbook has no sheets".to_string()));
    }
    Ok(sheets)
}

fn parse_relationship_targets(rels: &[u8]) -> Result<HashMap<String, String>, XlsxError> {
    let mut reader = Reader::from_reader(rels);
    reader.config_mut().trim_text(false);
    let mut targets = HashMap::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match local_name(attr.key.as_ref()) {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

/// Resolve a workbook-relative relationship target to a part name.
fn resolve_target(target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = vec!["xl"];
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            seg => segments.push(seg),
        }
    }
    segments.join("/")
}

/// Parse `xl/sharedStrings.xml` into plain texts, concatenating rich runs
/// and skipping phonetic hints.
pub fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut items = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut rph_depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"si" => current = Some(String::new()),
                b"rPh" => rph_depth += 1,
                b"t" if rph_depth == 0 => in_t = true,
                _ => {}
            },
            Event::Empty(e) if local_name(e.name().as_ref()) == b"si" => {
                items.push(String::new());
            }
            Event::Text(e) => {
                if in_t {
                    if let Some(item) = current.as_mut() {
                        item.push_str(&e.unescape()?);
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"si" => items.push(current.take().unwrap_or_default()),
                b"rPh" => rph_depth = rph_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(items)
}

/// The string-valued cells of one worksheet, plus its extent.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    texts: BTreeMap<(u32, u32), String>,
    /// Highest 0-based row index carrying any cell or row element.
    pub max_row: u32,
}

impl SheetGrid {
    pub fn text(&self, row: u32, col: u32) -> &str {
        self.texts
            .get(&(row, col))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &str)> {
        self.texts
            .iter()
            .map(|(&(row, col), text)| (CellRef::new(row, col), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_cells<I: IntoIterator<Item = ((u32, u32), String)>>(cells: I) -> Self {
        let texts: BTreeMap<(u32, u32), String> = cells.into_iter().collect();
        let max_row = texts.keys().map(|&(row, _)| row).max().unwrap_or(0);
        Self { texts, max_row }
    }
}

/// Read the string cells of a worksheet part.
pub fn read_sheet_grid(xml: &[u8], shared: &[String]) -> Result<SheetGrid, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut grid = SheetGrid::default();
    let mut cell: Option<(CellRef, Option<String>)> = None;
    let mut v_text = String::new();
    let mut is_text = String::new();
    let mut in_v = false;
    let mut in_is_t = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == b"row" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if local_name(attr.key.as_ref()) == b"r" {
                        if let Ok(row) = attr.unescape_value()?.parse::<u32>() {
                            grid.max_row = grid.max_row.max(row.saturating_sub(1));
                        }
                    }
                }
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let mut r = None;
                let mut t = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match local_name(attr.key.as_ref()) {
                        b"r" => r = Some(attr.unescape_value()?.into_owned()),
                        b"t" => t = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                if let Some(r) = r {
                    let cell_ref = CellRef::from_a1(&r)?;
                    grid.max_row = grid.max_row.max(cell_ref.row);
                    cell = Some((cell_ref, t));
                    v_text.clear();
                    is_text.clear();
                }
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"v" => in_v = true,
            Event::Start(e) if local_name(e.name().as_ref()) == b"t" => in_is_t = true,
            Event::Text(e) => {
                if in_v {
                    v_text.push_str(&e.unescape()?);
                } else if in_is_t {
                    is_text.push_str(&e.unescape()?);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"v" => in_v = false,
                b"t" => in_is_t = false,
                b"c" => {
                    if let Some((cell_ref, ty)) = cell.take() {
                        let text = match ty.as_deref() {
                            Some("s") => v_text
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|idx| shared.get(idx).cloned()),
                            Some("inlineStr") => Some(is_text.clone()),
                            Some("str") => Some(v_text.clone()),
                            _ => None,
                        };
                        if let Some(text) = text.filter(|t| !t.is_empty()) {
                            grid.texts.insert((cell_ref.row, cell_ref.col), text);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

/// Collect the merged regions declared by a worksheet part.
pub fn read_merged_regions(xml: &[u8]) -> Result<MergedRegions, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut merged = MergedRegions::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if local_name(e.name().as_ref()) == b"mergeCell" =>
            {
                for attr in e.attributes() {
                    let attr = attr?;
                    if local_name(attr.key.as_ref()) == b"ref" {
                        let value = attr.unescape_value()?;
                        merged.push(MergedRegion::from_ref(&value)?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_shared_inline_and_formula_strings() {
        let shared = vec!["Projet".to_string(), "XXX1".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row r="1">
                <c r="A1" t="s"><v>0</v></c>
                <c r="B1" t="s"><v>1</v></c>
                <c r="C1"><v>42</v></c>
                <c r="D1" t="inlineStr"><is><t>brut</t></is></c>
                <c r="E1" t="str"><v>calc</v></c>
            </row>
        </sheetData></worksheet>"#;
        let grid = read_sheet_grid(xml, &shared).unwrap();
        assert_eq!(grid.text(0, 0), "Projet");
        assert_eq!(grid.text(0, 1), "XXX1");
        assert_eq!(grid.text(0, 2), ""); // numeric cells are not loaded
        assert_eq!(grid.text(0, 3), "brut");
        assert_eq!(grid.text(0, 4), "calc");
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn max_row_tracks_rows_without_strings() {
        let xml = br#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>x</t></is></c></row>
            <row r="9"><c r="A9"><v>1</v></c></row>
        </sheetData></worksheet>"#;
        let grid = read_sheet_grid(xml, &[]).unwrap();
        assert_eq!(grid.max_row, 8);
    }

    #[test]
    fn shared_strings_concatenate_rich_runs() {
        let xml = br#"<sst>
            <si><t>plain</t></si>
            <si><r><t>ri</t></r><r><t>che</t></r></si>
            <si><t>main</t><rPh sb="0" eb="1"><t>ignored</t></rPh></si>
        </sst>"#;
        let items = parse_shared_strings(xml).unwrap();
        assert_eq!(items, ["plain", "riche", "main"]);
    }

    #[test]
    fn resolves_sheet_relationships() {
        let mut pkg = OpcPackage::default();
        pkg.set_part(
            WORKBOOK_PART,
            br#"<workbook><sheets>
                <sheet name="Produits" sheetId="1" r:id="rId1"/>
                <sheet name="Infos" sheetId="2" r:id="rId2"/>
            </sheets></workbook>"#
                .to_vec(),
        );
        pkg.set_part(
            WORKBOOK_RELS_PART,
            br#"<Relationships>
                <Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
                <Relationship Id="rId2" Target="/xl/worksheets/sheet2.xml"/>
            </Relationships>"#
                .to_vec(),
        );
        let sheets = workbook_sheets(&pkg).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Produits");
        assert_eq!(sheets[0].part, "xl/worksheets/sheet1.xml");
        assert_eq!(sheets[1].part, "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn merged_regions_shadow_non_anchor_cells() {
        let xml = br#"<worksheet><mergeCells count="1"><mergeCell ref="A1:B2"/></mergeCells></worksheet>"#;
        let merged = read_merged_regions(xml).unwrap();
        assert!(merged.is_shadowed(CellRef::new(0, 1)));
        assert!(!merged.is_shadowed(CellRef::new(0, 0)));
    }
}
