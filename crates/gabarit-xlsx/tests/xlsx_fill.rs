//! End-to-end processor runs over minimal in-memory workbooks.

use std::io::{Cursor, Write};
use std::path::Path;

use gabarit_model::FillRecord;
use gabarit_opc::OpcPackage;
use gabarit_xlsx::{fill_contract_xlsx, fill_merch_xlsx, fill_summary_xlsx};
use serde_json::json;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const WORKBOOK: &str = r#"<workbook><sheets><sheet name="Feuil1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
const WORKBOOK_RELS: &str =
    r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#;
const STYLES: &str = r#"<styleSheet><borders count="1"><border/></borders><cellXfs count="1"><xf numFmtId="0"/></cellXfs></styleSheet>"#;

fn write_workbook(path: &Path, sheet_xml: &str, extra: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    let parts: Vec<(&str, &str)> = [
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        ("xl/worksheets/sheet1.xml", sheet_xml),
    ]
    .into_iter()
    .chain(extra.iter().copied())
    .collect();
    for (name, xml) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    std::fs::write(path, zip.finish().unwrap().into_inner()).unwrap();
}

fn sheet1(path: &Path) -> String {
    let pkg = OpcPackage::from_path(path).unwrap();
    String::from_utf8(pkg.part("xl/worksheets/sheet1.xml").unwrap().to_vec()).unwrap()
}

#[test]
fn contract_fill_replaces_tokens_and_skips_merged_shadows() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("t.xlsx");
    let output = dir.path().join("o.xlsx");

    write_workbook(
        &template,
        r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Projet XXX1</t></is></c><c r="B1" t="inlineStr"><is><t>XXX2</t></is></c></row>
<row r="2"><c r="B2" t="inlineStr"><is><t>XXX3</t></is></c></row>
</sheetData><mergeCells count="1"><mergeCell ref="A2:B2"/></mergeCells></worksheet>"#,
        &[],
    );

    let rec = FillRecord::from_value(json!({
        "nomProjet": "Tournée",
        "typeProjet": "Album",
        "commercial": "Martin"
    }))
    .unwrap();

    let report = fill_contract_xlsx(&template, &rec, &output).unwrap();
    assert_eq!(report.cells_replaced, 2);
    assert_eq!(report.merged_skipped, 1);

    let sheet = sheet1(&output);
    assert!(sheet.contains("Projet Tournée"));
    assert!(sheet.contains("<is><t>Album</t></is>"));
    // shadowed merged cell keeps its placeholder
    assert!(sheet.contains("XXX3"));
}

#[test]
fn contract_fill_resolves_shared_string_cells_inline() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("t.xlsx");
    let output = dir.path().join("o.xlsx");

    write_workbook(
        &template,
        r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#,
        &[(
            "xl/sharedStrings.xml",
            r#"<sst count="1" uniqueCount="1"><si><t>ref COMPTENUM</t></si></sst>"#,
        )],
    );

    let rec = FillRecord::from_value(json!({"compteClientRef": "C-77"})).unwrap();
    fill_contract_xlsx(&template, &rec, &output).unwrap();

    let sheet = sheet1(&output);
    assert!(sheet.contains(r#"t="inlineStr"><is><t>ref C-77</t></is>"#));
    // the shared table itself is untouched
    let pkg = OpcPackage::from_path(&output).unwrap();
    let sst = String::from_utf8(pkg.part("xl/sharedStrings.xml").unwrap().to_vec()).unwrap();
    assert!(sst.contains("ref COMPTENUM"));
}

#[test]
fn summary_fill_writes_row_two() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("t.xlsx");
    let output = dir.path().join("o.xlsx");

    write_workbook(
        &template,
        r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>entêtes</t></is></c></row></sheetData></worksheet>"#,
        &[],
    );

    let rec = FillRecord::from_value(json!({
        "nomProjet": "Tournée",
        "typeProjet": "Album",
        "commissionSnagz": "12%"
    }))
    .unwrap();

    fill_summary_xlsx(&template, &rec, &output).unwrap();
    let sheet = sheet1(&output);
    assert!(sheet.contains(r#"<row r="2"><c r="A2" t="inlineStr"><is><t>Tournée</t></is></c>"#));
    assert!(sheet.contains(r#"<c r="U2" t="inlineStr"><is><t>12%</t></is>"#));
}

#[test]
fn merch_fill_locates_anchor_and_writes_bordered_product_rows() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("t.xlsx");
    let output = dir.path().join("o.xlsx");

    // Size headers on row 5 (1-based), so products start on row 6.
    write_workbook(
        &template,
        r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>MERCH nomProjet</t></is></c></row>
<row r="5"><c r="F5" t="inlineStr"><is><t>XS</t></is></c><c r="G5" t="inlineStr"><is><t>S</t></is></c><c r="H5" t="inlineStr"><is><t>M</t></is></c><c r="I5" t="inlineStr"><is><t>L</t></is></c><c r="J5" t="inlineStr"><is><t>XL</t></is></c></row>
</sheetData></worksheet>"#,
        &[],
    );

    let rec = FillRecord::from_value(json!({
        "nomProjet": "Tournée 2026",
        "raisonSociale": "Label SARL",
        "dateSortie": "2026-03-01",
        "products": [
            {
                "typeProduit": "T-shirt",
                "titre": "Tee Tour",
                "codeEAN": "1234567890123",
                "occ": false,
                "stock": {"M-Noir": 4, "L-Noir": 2},
                "couleurs": ["Noir"],
                "tailles": ["M", "L"]
            },
            {
                "type": "Hoodie",
                "title": "Hood Tour",
                "price": 45,
                "stock": {"M": "3"}
            }
        ]
    }))
    .unwrap();

    let report = fill_merch_xlsx(&template, &rec, &output).unwrap();
    assert_eq!(report.products, 2);
    assert_eq!(report.border_style, Some(1));
    assert!(report.cells_replaced >= 1);

    let sheet = sheet1(&output);
    // banner token replaced
    assert!(sheet.contains("MERCH Tournée 2026"));
    // first product row lands on row 6 with the border style
    assert!(sheet.contains(r#"<row r="6"><c r="A6" s="1" t="inlineStr"><is><t>T-shirt</t></is></c>"#));
    assert!(sheet.contains(r#"<c r="E6" s="1"><v>6</v></c>"#)); // total stock
    assert!(sheet.contains(r#"<c r="H6" s="1"><v>4</v></c>"#)); // M stock
    assert!(sheet.contains(r#"<c r="M6" s="1" t="inlineStr"><is><t>NON</t></is></c>"#));
    assert!(sheet.contains("DATE DE SORTIE (Album): 2026-03-01"));
    // second product, alias fields
    assert!(sheet.contains(r#"<row r="7"><c r="A7" s="1" t="inlineStr"><is><t>Hoodie</t></is></c>"#));
    assert!(sheet.contains(r#"<c r="L7" s="1" t="inlineStr"><is><t>45</t></is></c>"#));

    // stylesheet gained the thin border xf
    let pkg = OpcPackage::from_path(&output).unwrap();
    let styles = String::from_utf8(pkg.part("xl/styles.xml").unwrap().to_vec()).unwrap();
    assert!(styles.contains(r#"<left style="thin"/>"#));
    assert!(styles.contains(r#"borderId="1""#));
}

#[test]
fn merch_fill_without_products_still_substitutes() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("t.xlsx");
    let output = dir.path().join("o.xlsx");

    write_workbook(
        &template,
        r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Boutique shopifyDomain</t></is></c></row></sheetData></worksheet>"#,
        &[],
    );

    let rec =
        FillRecord::from_value(json!({"shopifyDomain": "tournee.myshopify.com"})).unwrap();
    let report = fill_merch_xlsx(&template, &rec, &output).unwrap();
    assert_eq!(report.products, 0);
    assert!(sheet1(&output).contains("Boutique tournee.myshopify.com"));
}
