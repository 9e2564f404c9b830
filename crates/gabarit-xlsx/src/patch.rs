//! Part-preserving cell patch application.
//!
//! A small edit set keyed by cell address, applied to worksheet XML in a
//! single streaming pass. Existing rows and cells merge with patched ones
//! in row-major order; missing rows and a missing or empty `<sheetData>`
//! are created on the fly. Strings are written as inline strings, numbers
//! as plain values, and an existing `s` style attribute is preserved
//! unless the patch overrides it.

use std::collections::BTreeMap;

use gabarit_model::{CellRef, CellValue};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::xml::{escape_text, local_name, needs_space_preserve};
use crate::XlsxError;

/// A single cell edit: the value to write and an optional style override.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub value: CellValue,
    pub style_index: Option<u32>,
}

impl CellPatch {
    pub fn value(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            style_index: None,
        }
    }

    pub fn with_style(value: impl Into<CellValue>, style_index: u32) -> Self {
        Self {
            value: value.into(),
            style_index: Some(style_index),
        }
    }
}

/// Pending edits for one worksheet, row-major ordered.
#[derive(Debug, Clone, Default)]
pub struct SheetPatches {
    cells: BTreeMap<(u32, u32), CellPatch>,
}

impl SheetPatches {
    pub fn set(&mut self, cell: CellRef, patch: CellPatch) {
        self.cells.insert((cell.row, cell.col), patch);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Patches grouped by 1-based row number, columns sorted.
    fn by_row(&self) -> BTreeMap<u32, Vec<(u32, &CellPatch)>> {
        let mut out: BTreeMap<u32, Vec<(u32, &CellPatch)>> = BTreeMap::new();
        for (&(row0, col0), patch) in &self.cells {
            out.entry(row0 + 1).or_default().push((col0, patch));
        }
        out
    }
}

/// Apply `patches` to a worksheet part and return the rewritten bytes.
pub fn patch_sheet_xml(original: &[u8], patches: &SheetPatches) -> Result<Vec<u8>, XlsxError> {
    if patches.is_empty() {
        return Ok(original.to_vec());
    }

    let row_patches = patches.by_row();
    let remaining_rows: Vec<u32> = row_patches.keys().copied().collect();
    let mut row_idx = 0usize;

    let mut reader = Reader::from_reader(original);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + patches.len() * 64));

    let mut buf = Vec::new();
    let mut saw_sheet_data = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.into_owned()))?;
                patch_sheet_data(
                    &mut reader,
                    &mut writer,
                    &row_patches,
                    &remaining_rows,
                    &mut row_idx,
                )?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                // Convert `<sheetData/>` into `<sheetData>...</sheetData>`.
                writer.write_event(Event::Start(e.into_owned()))?;
                for row in remaining_rows.iter().skip(row_idx).copied() {
                    let cells = row_patches.get(&row).map(Vec::as_slice).unwrap_or_default();
                    write_new_row(&mut writer, row, cells)?;
                }
                row_idx = remaining_rows.len();
                writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"worksheet" => {
                if !saw_sheet_data {
                    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
                    for row in remaining_rows.iter().skip(row_idx).copied() {
                        let cells = row_patches.get(&row).map(Vec::as_slice).unwrap_or_default();
                        write_new_row(&mut writer, row, cells)?;
                    }
                    row_idx = remaining_rows.len();
                    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn patch_sheet_data(
    reader: &mut Reader<&[u8]>,
    writer: &mut Writer<Vec<u8>>,
    row_patches: &BTreeMap<u32, Vec<(u32, &CellPatch)>>,
    remaining_rows: &[u32],
    row_idx: &mut usize,
) -> Result<(), XlsxError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"row" => {
                let row_start = e.into_owned();
                let Some(row_num) = parse_row_r(&row_start)? else {
                    writer.write_event(Event::Start(row_start))?;
                    continue;
                };

                flush_rows_before(writer, row_patches, remaining_rows, row_idx, row_num)?;

                if let Some(cells) = row_patches.get(&row_num) {
                    if *row_idx < remaining_rows.len() && remaining_rows[*row_idx] == row_num {
                        *row_idx += 1;
                    }
                    writer.write_event(Event::Start(row_start))?;
                    patch_row(reader, writer, row_num, cells)?;
                } else {
                    writer.write_event(Event::Start(row_start))?;
                }
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"row" => {
                let row_empty = e.into_owned();
                let Some(row_num) = parse_row_r(&row_empty)? else {
                    writer.write_event(Event::Empty(row_empty))?;
                    continue;
                };

                flush_rows_before(writer, row_patches, remaining_rows, row_idx, row_num)?;

                if let Some(cells) = row_patches.get(&row_num) {
                    if *row_idx < remaining_rows.len() && remaining_rows[*row_idx] == row_num {
                        *row_idx += 1;
                    }
                    // Convert `<row/>` into `<row>...</row>`.
                    writer.write_event(Event::Start(row_empty))?;
                    for (col, patch) in cells {
                        write_cell_patch(writer, row_num, *col, patch, None)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("row")))?;
                } else {
                    writer.write_event(Event::Empty(row_empty))?;
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                while *row_idx < remaining_rows.len() {
                    let row = remaining_rows[*row_idx];
                    let cells = row_patches.get(&row).map(Vec::as_slice).unwrap_or_default();
                    write_new_row(writer, row, cells)?;
                    *row_idx += 1;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                break;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while patching sheetData".to_string(),
                ))
            }
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok(())
}

fn flush_rows_before(
    writer: &mut Writer<Vec<u8>>,
    row_patches: &BTreeMap<u32, Vec<(u32, &CellPatch)>>,
    remaining_rows: &[u32],
    row_idx: &mut usize,
    row_num: u32,
) -> Result<(), XlsxError> {
    while *row_idx < remaining_rows.len() && remaining_rows[*row_idx] < row_num {
        let row = remaining_rows[*row_idx];
        let cells = row_patches.get(&row).map(Vec::as_slice).unwrap_or_default();
        write_new_row(writer, row, cells)?;
        *row_idx += 1;
    }
    Ok(())
}

fn patch_row(
    reader: &mut Reader<&[u8]>,
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    patches: &[(u32, &CellPatch)],
) -> Result<(), XlsxError> {
    let mut buf = Vec::new();
    let mut patch_idx = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let cell_start = e.into_owned();
                let Some((cell_ref, existing_s)) = parse_cell_addr(&cell_start)? else {
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                };
                if cell_ref.row + 1 != row_num {
                    // Mismatched cell refs are preserved unchanged.
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                }

                let col = cell_ref.col;
                while patch_idx < patches.len() && patches[patch_idx].0 < col {
                    let (patch_col, patch) = patches[patch_idx];
                    write_cell_patch(writer, row_num, patch_col, patch, None)?;
                    patch_idx += 1;
                }

                if patch_idx < patches.len() && patches[patch_idx].0 == col {
                    let patch = patches[patch_idx].1;
                    patch_idx += 1;
                    skip_cell(reader)?;
                    write_cell_patch(writer, row_num, col, patch, existing_s.as_deref())?;
                } else {
                    writer.write_event(Event::Start(cell_start))?;
                }
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"c" => {
                let cell_empty = e.into_owned();
                let Some((cell_ref, existing_s)) = parse_cell_addr(&cell_empty)? else {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                };
                if cell_ref.row + 1 != row_num {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                }

                let col = cell_ref.col;
                while patch_idx < patches.len() && patches[patch_idx].0 < col {
                    let (patch_col, patch) = patches[patch_idx];
                    write_cell_patch(writer, row_num, patch_col, patch, None)?;
                    patch_idx += 1;
                }

                if patch_idx < patches.len() && patches[patch_idx].0 == col {
                    let patch = patches[patch_idx].1;
                    patch_idx += 1;
                    write_cell_patch(writer, row_num, col, patch, existing_s.as_deref())?;
                } else {
                    writer.write_event(Event::Empty(cell_empty))?;
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"row" => {
                while patch_idx < patches.len() {
                    let (col, patch) = patches[patch_idx];
                    write_cell_patch(writer, row_num, col, patch, None)?;
                    patch_idx += 1;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                break;
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while patching row".to_string(),
                ))
            }
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok(())
}

/// Consume the remainder of a patched `<c>` subtree without writing it.
fn skip_cell(reader: &mut Reader<&[u8]>) -> Result<(), XlsxError> {
    let mut buf = Vec::new();
    let mut depth = 1usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while skipping patched cell".to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn write_new_row(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    patches: &[(u32, &CellPatch)],
) -> Result<(), XlsxError> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_num.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    for (col, patch) in patches {
        write_cell_patch(writer, row_num, *col, patch, None)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_cell_patch(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    col: u32,
    patch: &CellPatch,
    existing_s: Option<&str>,
) -> Result<(), XlsxError> {
    let a1 = CellRef::new(row_num - 1, col).to_a1();

    // Explicit style override wins, otherwise the existing s=... survives.
    let style_index = patch
        .style_index
        .or_else(|| existing_s.and_then(|s| s.parse::<u32>().ok()));

    let mut cell = String::new();
    cell.push_str(r#"<c r=""#);
    cell.push_str(&a1);
    cell.push('"');
    if let Some(s) = style_index.filter(|s| *s != 0) {
        cell.push_str(&format!(r#" s="{s}""#));
    }

    let mut ty: Option<&'static str> = None;
    let mut value_xml = String::new();
    match &patch.value {
        CellValue::Empty => {}
        CellValue::Text(s) if s.is_empty() => {}
        CellValue::Text(s) => {
            ty = Some("inlineStr");
            value_xml.push_str("<is><t");
            if needs_space_preserve(s) {
                value_xml.push_str(r#" xml:space="preserve""#);
            }
            value_xml.push('>');
            value_xml.push_str(&escape_text(s));
            value_xml.push_str("</t></is>");
        }
        CellValue::Number(n) => {
            value_xml.push_str("<v>");
            value_xml.push_str(&n.to_string());
            value_xml.push_str("</v>");
        }
        CellValue::Bool(b) => {
            ty = Some("b");
            value_xml.push_str("<v>");
            value_xml.push_str(if *b { "1" } else { "0" });
            value_xml.push_str("</v>");
        }
    }

    if let Some(t) = ty {
        cell.push_str(&format!(r#" t="{t}""#));
    }
    if value_xml.is_empty() {
        cell.push_str("/>");
    } else {
        cell.push('>');
        cell.push_str(&value_xml);
        cell.push_str("</c>");
    }

    writer.get_mut().extend_from_slice(cell.as_bytes());
    Ok(())
}

fn parse_row_r(row: &BytesStart<'_>) -> Result<Option<u32>, XlsxError> {
    for attr in row.attributes() {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == b"r" {
            let value = attr.unescape_value()?.into_owned();
            return Ok(value.parse::<u32>().ok());
        }
    }
    Ok(None)
}

fn parse_cell_addr(cell: &BytesStart<'_>) -> Result<Option<(CellRef, Option<String>)>, XlsxError> {
    let mut r = None;
    let mut s = None;
    for attr in cell.attributes() {
        let attr = attr?;
        match local_name(attr.key.as_ref()) {
            b"r" => r = Some(attr.unescape_value()?.into_owned()),
            b"s" => s = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }
    let Some(r) = r else { return Ok(None) };
    Ok(CellRef::from_a1(&r).ok().map(|cell_ref| (cell_ref, s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn apply(xml: &str, edits: &[((u32, u32), CellPatch)]) -> String {
        let mut patches = SheetPatches::default();
        for ((row, col), patch) in edits {
            patches.set(CellRef::new(*row, *col), patch.clone());
        }
        String::from_utf8(patch_sheet_xml(xml.as_bytes(), &patches).unwrap()).unwrap()
    }

    #[test]
    fn replaces_existing_cell_preserving_style() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" s="7" t="s"><v>3</v></c></row></sheetData></worksheet>"#;
        let out = apply(xml, &[((0, 0), CellPatch::value("Projet X"))]);
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="1"><c r="A1" s="7" t="inlineStr"><is><t>Projet X</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn style_override_beats_existing_style() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" s="7"/></row></sheetData></worksheet>"#;
        let out = apply(xml, &[((0, 0), CellPatch::with_style("x", 12))]);
        assert!(out.contains(r#"<c r="A1" s="12" t="inlineStr">"#));
    }

    #[test]
    fn merges_new_cells_into_existing_row_in_column_order() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="B2"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = apply(
            xml,
            &[
                ((1, 0), CellPatch::value("avant")),
                ((1, 3), CellPatch::value(7u64)),
            ],
        );
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="2"><c r="A2" t="inlineStr"><is><t>avant</t></is></c><c r="B2"><v>1</v></c><c r="D2"><v>7</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn appends_missing_rows_in_order() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = apply(
            xml,
            &[
                ((0, 0), CellPatch::value("haut")),
                ((5, 1), CellPatch::value("bas")),
            ],
        );
        assert!(out.contains(r#"<row r="1"><c r="A1" t="inlineStr"><is><t>haut</t></is></c></row><row r="2">"#));
        assert!(out.contains(r#"<row r="6"><c r="B6" t="inlineStr"><is><t>bas</t></is></c></row></sheetData>"#));
    }

    #[test]
    fn empty_sheet_data_is_expanded() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;
        let out = apply(xml, &[((0, 0), CellPatch::value("seul"))]);
        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>seul</t></is></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn empty_text_with_border_style_writes_style_only_cell() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;
        let out = apply(xml, &[((0, 0), CellPatch::with_style("", 4))]);
        assert!(out.contains(r#"<c r="A1" s="4"/>"#));
    }

    #[test]
    fn leading_whitespace_gets_space_preserve() {
        let xml = r#"<worksheet><sheetData/></worksheet>"#;
        let out = apply(xml, &[((0, 0), CellPatch::value(" marge"))]);
        assert!(out.contains(r#"<t xml:space="preserve"> marge</t>"#));
    }
}
