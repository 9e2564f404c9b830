//! The three spreadsheet processors: contract fill, summary row, merch.

use std::path::Path;

use gabarit_engine::{contract_tokens, merch_tokens, substitute_text, TokenCatalog};
use gabarit_model::{CellRef, CellValue, FillRecord, MergedRegions, Product};
use gabarit_opc::OpcPackage;
use tracing::{debug, warn};

use crate::locator::locate_product_region;
use crate::patch::{patch_sheet_xml, CellPatch, SheetPatches};
use crate::sheet::{
    parse_shared_strings, read_merged_regions, read_sheet_grid, workbook_sheets, SheetGrid,
    SheetInfo,
};
use crate::styles::register_thin_border_style;
use crate::{XlsxError, SHARED_STRINGS_PART, STYLES_PART};

/// Keys of the summary row, in column order.
pub const SUMMARY_COLUMNS: [&str; 21] = [
    "nomProjet",
    "typeProjet",
    "commercial",
    "boutiqueEnLigne",
    "client",
    "contactsClient",
    "numeroCompteClient",
    "dateMiseEnLigne",
    "dateCommercialisation",
    "dateSortieOfficielle",
    "precommande",
    "dedicace",
    "facturation",
    "abonnementMensuelShopify",
    "abonnementAnnuelShopify",
    "coutsMondialRelay",
    "coutsDelivengo",
    "fraisMensuelMaintenance",
    "fraisOuvertureBoutique",
    "fraisOuvertureSansHabillage",
    "commissionSnagz",
];

/// 0-based row the summary record lands on (row 2 of the sheet).
const SUMMARY_ROW: u32 = 1;

/// Width of a merch product row.
const PRODUCT_COLUMNS: usize = 21;

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxFillReport {
    pub sheets: usize,
    pub cells_replaced: usize,
    pub merged_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MerchFillReport {
    pub sheets: usize,
    pub cells_replaced: usize,
    pub merged_skipped: usize,
    pub products: usize,
    pub border_style: Option<u32>,
}

struct Workbook {
    pkg: OpcPackage,
    sheets: Vec<SheetInfo>,
    shared: Vec<String>,
}

impl Workbook {
    fn load(template: &Path) -> Result<Self, XlsxError> {
        let pkg = OpcPackage::from_path(template)?;
        let sheets = workbook_sheets(&pkg)?;
        let shared = pkg
            .part(SHARED_STRINGS_PART)
            .map(parse_shared_strings)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            pkg,
            sheets,
            shared,
        })
    }

    fn sheet_xml(&self, info: &SheetInfo) -> Result<Vec<u8>, XlsxError> {
        Ok(self.pkg.required_part(&info.part)?.to_vec())
    }
}

/// Substitute contract placeholders in every string cell of every sheet.
pub fn fill_contract_xlsx(
    template: impl AsRef<Path>,
    record: &FillRecord,
    output: impl AsRef<Path>,
) -> Result<XlsxFillReport, XlsxError> {
    let mut wb = Workbook::load(template.as_ref())?;
    let catalog = contract_tokens(record);
    let mut report = XlsxFillReport {
        sheets: wb.sheets.len(),
        ..Default::default()
    };

    for info in wb.sheets.clone() {
        let xml = wb.sheet_xml(&info)?;
        let grid = read_sheet_grid(&xml, &wb.shared)?;
        let merged = read_merged_regions(&xml)?;
        let patches = substitution_patches(&info, &grid, &merged, &catalog, &mut report);
        if !patches.is_empty() {
            wb.pkg.set_part(info.part.clone(), patch_sheet_xml(&xml, &patches)?);
        }
    }

    wb.pkg.save(output)?;
    Ok(report)
}

fn substitution_patches(
    info: &SheetInfo,
    grid: &SheetGrid,
    merged: &MergedRegions,
    catalog: &TokenCatalog,
    report: &mut XlsxFillReport,
) -> SheetPatches {
    let mut patches = SheetPatches::default();
    for (cell, text) in grid.cells() {
        let Some(new_text) = substitute_text(text, catalog) else {
            continue;
        };
        if merged.is_shadowed(cell) {
            warn!(
                sheet = %info.name,
                cell = %cell.to_a1(),
                "placeholder inside merged region, only the anchor is writable"
            );
            report.merged_skipped += 1;
            continue;
        }
        report.cells_replaced += 1;
        patches.set(cell, CellPatch::value(new_text));
    }
    patches
}

/// Write the 21-column summary record into row 2 of the first sheet.
pub fn fill_summary_xlsx(
    template: impl AsRef<Path>,
    record: &FillRecord,
    output: impl AsRef<Path>,
) -> Result<XlsxFillReport, XlsxError> {
    let mut wb = Workbook::load(template.as_ref())?;
    let info = wb.sheets[0].clone();
    let xml = wb.sheet_xml(&info)?;
    let merged = read_merged_regions(&xml)?;

    let mut report = XlsxFillReport {
        sheets: 1,
        ..Default::default()
    };
    let mut patches = SheetPatches::default();
    for (col, value) in summary_row_values(record).into_iter().enumerate() {
        let cell = CellRef::new(SUMMARY_ROW, col as u32);
        if merged.is_shadowed(cell) {
            warn!(sheet = %info.name, cell = %cell.to_a1(), "summary target is merged, skipped");
            report.merged_skipped += 1;
            continue;
        }
        report.cells_replaced += 1;
        patches.set(cell, CellPatch::value(value));
    }
    wb.pkg.set_part(info.part.clone(), patch_sheet_xml(&xml, &patches)?);
    wb.pkg.save(output)?;
    Ok(report)
}

/// The summary record as written, in column order. Values arrive already
/// rendered upstream, so they pass through verbatim.
pub fn summary_row_values(record: &FillRecord) -> Vec<String> {
    SUMMARY_COLUMNS
        .iter()
        .map(|key| record.text(key))
        .collect()
}

/// Merch fill: token substitution on every sheet, then product rows from
/// the located anchor with thin borders.
pub fn fill_merch_xlsx(
    template: impl AsRef<Path>,
    record: &FillRecord,
    output: impl AsRef<Path>,
) -> Result<MerchFillReport, XlsxError> {
    let mut wb = Workbook::load(template.as_ref())?;
    let catalog = merch_tokens(record);
    let products = record.products()?;
    let combined_dates = combined_release_dates(record);
    let raison_sociale = record.first_text(&["raisonSociale", "customerName"]);

    let border_style = match wb.pkg.part(STYLES_PART) {
        Some(styles) => match register_thin_border_style(styles) {
            Ok((updated, idx)) => {
                wb.pkg.set_part(STYLES_PART, updated);
                Some(idx)
            }
            Err(err) => {
                warn!(error = %err, "cannot register border style, product rows written unstyled");
                None
            }
        },
        None => {
            warn!("workbook has no stylesheet, product rows written unstyled");
            None
        }
    };

    let mut report = MerchFillReport {
        sheets: wb.sheets.len(),
        border_style,
        ..Default::default()
    };

    for info in wb.sheets.clone() {
        let xml = wb.sheet_xml(&info)?;
        let grid = read_sheet_grid(&xml, &wb.shared)?;
        let merged = read_merged_regions(&xml)?;

        let mut sub_report = XlsxFillReport::default();
        let mut patches = substitution_patches(&info, &grid, &merged, &catalog, &mut sub_report);
        report.cells_replaced += sub_report.cells_replaced;
        report.merged_skipped += sub_report.merged_skipped;

        let anchor = locate_product_region(&grid);
        debug!(
            sheet = %info.name,
            row = anchor.data_start_row,
            strategy = ?anchor.strategy,
            "product region located"
        );

        for (offset, product) in products.iter().enumerate() {
            let row = anchor.data_start_row + offset as u32;
            for (col, value) in product_row_values(product, &combined_dates, &raison_sociale)
                .into_iter()
                .enumerate()
            {
                let cell = CellRef::new(row, col as u32);
                if merged.is_shadowed(cell) {
                    warn!(
                        sheet = %info.name,
                        cell = %cell.to_a1(),
                        "product cell target is merged, skipped"
                    );
                    report.merged_skipped += 1;
                    continue;
                }
                let patch = match border_style {
                    Some(style) => CellPatch::with_style(value, style),
                    None => CellPatch::value(value),
                };
                patches.set(cell, patch);
            }
        }

        if !patches.is_empty() {
            wb.pkg.set_part(info.part.clone(), patch_sheet_xml(&xml, &patches)?);
        }
    }

    report.products = products.len();
    wb.pkg.save(output)?;
    Ok(report)
}

/// One product as a 21-column row.
fn product_row_values(
    product: &Product,
    combined_dates: &str,
    raison_sociale: &str,
) -> Vec<CellValue> {
    let values = vec![
        CellValue::text(product.type_produit.clone()),
        CellValue::text(product.titre.clone()),
        CellValue::text(product.description.clone()),
        CellValue::text(product.code_ean.clone()),
        CellValue::from(product.total_stock()),
        CellValue::from(product.size_stock("XS")),
        CellValue::from(product.size_stock("S")),
        CellValue::from(product.size_stock("M")),
        CellValue::from(product.size_stock("L")),
        CellValue::from(product.size_stock("XL")),
        CellValue::text(product.poids_text()),
        CellValue::text(product.prix_text()),
        CellValue::text(if product.occ { "OUI" } else { "NON" }),
        CellValue::text(combined_dates),
        CellValue::text(raison_sociale),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Empty,
        CellValue::text(product.couleurs_joined()),
        CellValue::text(product.tailles_joined()),
        CellValue::Empty,
    ];
    debug_assert_eq!(values.len(), PRODUCT_COLUMNS);
    values
}

/// The combined release/commercialisation field of a product row. Field
/// names vary across payload producers, so each date accepts its
/// historical aliases.
fn combined_release_dates(record: &FillRecord) -> String {
    let sortie = record.first_text(&[
        "dateSortie",
        "dateDeSortie",
        "dateAlbum",
        "dateSortieAlbum",
    ]);
    let commercialisation = record.first_text(&[
        "dateCommercialisation",
        "dateDeCommercialisation",
        "dateMerch",
        "dateCommercialisationMerch",
    ]);

    let mut out = String::new();
    if !sortie.is_empty() {
        out.push_str(&format!("DATE DE SORTIE (Album): {sortie}"));
    }
    if !commercialisation.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("COMMERCIALISATION (Merch): {commercialisation}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FillRecord {
        FillRecord::from_value(value).unwrap()
    }

    #[test]
    fn summary_row_is_in_documented_column_order() {
        let rec = record(json!({
            "nomProjet": "Tournée",
            "commissionSnagz": "12%",
            "precommande": "OUI"
        }));
        let values = summary_row_values(&rec);
        assert_eq!(values.len(), 21);
        assert_eq!(values[0], "Tournée");
        assert_eq!(values[10], "OUI");
        assert_eq!(values[20], "12%");
        assert_eq!(values[4], ""); // absent keys become empty cells
    }

    #[test]
    fn combined_dates_uses_aliases_and_joins_with_newline() {
        let rec = record(json!({
            "dateAlbum": "2026-03-01",
            "dateMerch": "2026-04-01"
        }));
        assert_eq!(
            combined_release_dates(&rec),
            "DATE DE SORTIE (Album): 2026-03-01\nCOMMERCIALISATION (Merch): 2026-04-01"
        );

        let only_merch = record(json!({"dateCommercialisation": "2026-04-01"}));
        assert_eq!(
            combined_release_dates(&only_merch),
            "COMMERCIALISATION (Merch): 2026-04-01"
        );
    }

    #[test]
    fn product_row_renders_occ_and_stocks() {
        let product: Product = serde_json::from_value(json!({
            "typeProduit": "T-shirt",
            "titre": "Tour",
            "occ": true,
            "stock": {"M-Noir": 3, "M-Blanc": 2, "L-Noir": 1}
        }))
        .unwrap();
        let values = product_row_values(&product, "", "Label");
        assert_eq!(values.len(), 21);
        assert_eq!(values[4], CellValue::Number(6.0));
        assert_eq!(values[7], CellValue::Number(5.0)); // M
        assert_eq!(values[8], CellValue::Number(1.0)); // L
        assert_eq!(values[12], CellValue::text("OUI"));
        assert_eq!(values[14], CellValue::text("Label"));
    }
}
