use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{ReportError, Result};
use crate::normalize::normalize_row;
use crate::partition::{resolve_partition, Partition, PartitionCatalog};
use crate::types::Case;
use crate::workbook::Workbook;

/// Everything one successful load produces. Replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Dataset {
    pub cases: Vec<Case>,
    pub catalog: PartitionCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub sheets_seen: usize,
    /// Sheets whose label has no month or no 4-digit year.
    pub sheets_skipped: usize,
    pub rows_seen: usize,
    /// Rows failing the acceptance predicate (blank, header, or bad age).
    pub rows_dropped: usize,
    pub cases_loaded: usize,
}

/// Normalize every recognized sheet of `workbook`.
///
/// Fails with [`ReportError::NoValidData`] when no sheet resolves to a
/// partition or no row anywhere is accepted; no partial dataset is returned.
pub fn load_workbook(workbook: &Workbook) -> Result<(Dataset, LoadReport)> {
    let mut report = LoadReport {
        sheets_seen: workbook.sheets.len(),
        ..LoadReport::default()
    };
    let mut cases: Vec<Case> = Vec::new();
    let mut partitions: Vec<Partition> = Vec::new();

    for sheet in &workbook.sheets {
        let Some(resolved) = resolve_partition(&sheet.name) else {
            debug!("skipping sheet '{}': no month/year in label", sheet.name);
            report.sheets_skipped += 1;
            continue;
        };

        let before = cases.len();
        for (i, cells) in sheet.rows.iter().enumerate() {
            report.rows_seen += 1;
            match normalize_row(cells, resolved) {
                Some(case) => cases.push(case),
                None => {
                    trace!("sheet '{}': dropped row {}", sheet.name, i + 1);
                    report.rows_dropped += 1;
                }
            }
        }
        let case_count = cases.len() - before;
        debug!(
            "sheet '{}' -> {}/{}: {} case(s)",
            sheet.name,
            resolved.month + 1,
            resolved.year,
            case_count
        );
        partitions.push(Partition {
            label: sheet.name.clone(),
            month: resolved.month,
            year: resolved.year,
            case_count,
        });
    }

    if partitions.is_empty() || cases.is_empty() {
        return Err(ReportError::NoValidData {
            sheets: report.sheets_seen,
        });
    }

    report.cases_loaded = cases.len();
    info!(
        "Loaded {} case(s) from {} partition(s) ({} sheet(s) skipped, {} row(s) dropped)",
        report.cases_loaded,
        partitions.len(),
        report.sheets_skipped,
        report.rows_dropped
    );

    Ok((
        Dataset {
            cases,
            catalog: PartitionCatalog::new(partitions),
        },
        report,
    ))
}

/// Read the workbook at `path` and load it.
pub fn load_path(path: &Path) -> Result<(Dataset, LoadReport)> {
    info!("Reading workbook from {}", path.display());
    let workbook = Workbook::open(path)?;
    load_workbook(&workbook)
}
