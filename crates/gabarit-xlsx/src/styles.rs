//! Thin-border cell style registration in `xl/styles.xml`.
//!
//! Written product rows carry a full thin border. Rather than mutating
//! existing styles, one border and one cell XF referencing it are appended
//! and every written cell points at the new XF index. Call once per
//! workbook.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::xml::local_name;
use crate::XlsxError;

const THIN_BORDER: &str = concat!(
    "<border>",
    r#"<left style="thin"/>"#,
    r#"<right style="thin"/>"#,
    r#"<top style="thin"/>"#,
    r#"<bottom style="thin"/>"#,
    "<diagonal/>",
    "</border>"
);

/// Append a thin-border cell XF to the stylesheet and return the rewritten
/// part together with the new style index.
pub fn register_thin_border_style(styles_xml: &[u8]) -> Result<(Vec<u8>, u32), XlsxError> {
    let (border_count, xf_count) = count_children(styles_xml)?;
    let Some(border_count) = border_count else {
        return Err(XlsxError::Invalid(
            "stylesheet has no borders section".to_string(),
        ));
    };
    let Some(xf_count) = xf_count else {
        return Err(XlsxError::Invalid(
            "stylesheet has no cellXfs section".to_string(),
        ));
    };

    let new_xf = format!(
        r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="{border_count}" xfId="0" applyBorder="1"/>"#
    );

    let mut reader = Reader::from_reader(styles_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(styles_xml.len() + 256));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"borders" => {
                writer.write_event(Event::Start(with_count(&e, border_count + 1)?))?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"borders" => {
                writer.get_mut().extend_from_slice(THIN_BORDER.as_bytes());
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"borders" => {
                writer.write_event(Event::Start(with_count(&e, border_count + 1)?))?;
                writer.get_mut().extend_from_slice(THIN_BORDER.as_bytes());
                writer.write_event(Event::End(BytesEnd::new("borders")))?;
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                writer.write_event(Event::Start(with_count(&e, xf_count + 1)?))?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                writer.get_mut().extend_from_slice(new_xf.as_bytes());
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                writer.write_event(Event::Start(with_count(&e, xf_count + 1)?))?;
                writer.get_mut().extend_from_slice(new_xf.as_bytes());
                writer.write_event(Event::End(BytesEnd::new("cellXfs")))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok((writer.into_inner(), xf_count))
}

/// Count direct `<border>` children of `<borders>` and `<xf>` children of
/// `<cellXfs>`. `None` when the section is absent.
fn count_children(styles_xml: &[u8]) -> Result<(Option<u32>, Option<u32>), XlsxError> {
    let mut reader = Reader::from_reader(styles_xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut borders: Option<u32> = None;
    let mut xfs: Option<u32> = None;
    let mut in_borders = false;
    let mut in_cellxfs = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"borders" => {
                    in_borders = true;
                    borders.get_or_insert(0);
                }
                b"cellXfs" => {
                    in_cellxfs = true;
                    xfs.get_or_insert(0);
                }
                b"border" if in_borders => {
                    borders = Some(borders.unwrap_or(0) + 1);
                }
                b"xf" if in_cellxfs => {
                    xfs = Some(xfs.unwrap_or(0) + 1);
                }
                _ => {}
            },
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"borders" => in_borders = false,
                b"cellXfs" => in_cellxfs = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok((borders, xfs))
}

fn with_count(start: &BytesStart<'_>, count: u32) -> Result<BytesStart<'static>, XlsxError> {
    let name = String::from_utf8_lossy(local_name(start.name().as_ref())).into_owned();
    let mut out = BytesStart::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == b"count" {
            continue;
        }
        out.push_attribute(attr);
    }
    out.push_attribute(("count", count.to_string().as_str()));
    Ok(out)
}
