use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::builder::Builder;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::aggregate::SeriesRow;
use crate::error::{ReportError, Result};
use crate::loader::Dataset;
use crate::partition::PartitionRow;
use crate::reports::Dashboard;
use crate::types::{Case, CaseRow};
use crate::util::format_number;

pub const CASES_FILE: &str = "cases.csv";
pub const PARTITIONS_FILE: &str = "partitions.csv";
pub const BREAKDOWNS_FILE: &str = "category_breakdowns.csv";
pub const MEDICATIONS_FILE: &str = "medication_ranking.csv";
pub const DASHBOARD_FILE: &str = "dashboard.json";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// One entry of `category_breakdowns.csv`.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BreakdownRow {
    #[serde(rename = "Field")]
    #[tabled(rename = "Field")]
    pub field: String,
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: usize,
}

/// One entry of `medication_ranking.csv`.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MedicationRow {
    #[serde(rename = "Class")]
    #[tabled(rename = "Class")]
    pub class: String,
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Medication")]
    #[tabled(rename = "Medication")]
    pub name: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent")]
    pub percent: String,
}

pub fn breakdown_rows(dashboard: &Dashboard) -> Vec<BreakdownRow> {
    dashboard
        .breakdowns
        .iter()
        .flat_map(|b| {
            b.entries.iter().map(move |e| BreakdownRow {
                field: b.field.to_string(),
                name: e.name.clone(),
                value: e.value,
            })
        })
        .collect()
}

pub fn medication_rows(dashboard: &Dashboard) -> Vec<MedicationRow> {
    dashboard
        .medications
        .classes()
        .into_iter()
        .flat_map(|(class, ranking)| {
            ranking.iter().enumerate().map(move |(i, t)| MedicationRow {
                class: class.to_string(),
                rank: i + 1,
                name: t.name.clone(),
                count: t.value,
                percent: format_number(t.percent, 1),
            })
        })
        .collect()
}

/// Write every report file into `out_dir`, creating it when missing.
/// Returns the written paths in order.
pub fn write_reports(
    out_dir: &Path,
    dataset: &Dataset,
    view: &[Case],
    dashboard: &Dashboard,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|source| ReportError::FileRead {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let path = |name: &str| out_dir.join(name);

    let cases: Vec<CaseRow> = view.iter().map(CaseRow::from).collect();
    write_csv(&path(CASES_FILE), &cases)?;

    let partitions: Vec<PartitionRow> = dataset
        .catalog
        .partitions()
        .iter()
        .map(PartitionRow::from)
        .collect();
    write_csv(&path(PARTITIONS_FILE), &partitions)?;

    write_csv(&path(BREAKDOWNS_FILE), &breakdown_rows(dashboard))?;
    write_csv(&path(MEDICATIONS_FILE), &medication_rows(dashboard))?;
    write_json(&path(DASHBOARD_FILE), dashboard)?;

    let written: Vec<PathBuf> = [
        CASES_FILE,
        PARTITIONS_FILE,
        BREAKDOWNS_FILE,
        MEDICATIONS_FILE,
        DASHBOARD_FILE,
    ]
    .iter()
    .map(|n| out_dir.join(n))
    .collect();
    info!("Wrote {} report file(s) to {}", written.len(), out_dir.display());
    Ok(written)
}

/// Render up to `max_rows` rows as a Markdown table.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Same as [`render_table`] for series rows, whose columns are only known at runtime.
pub fn render_series(rows: &[SeriesRow], max_rows: usize) -> String {
    let Some(first) = rows.first() else {
        return "(no rows)".to_string();
    };
    let mut builder = Builder::default();
    let mut header = vec!["Month".to_string()];
    header.extend(first.values.iter().map(|(k, _)| k.clone()));
    builder.push_record(header);
    for row in rows.iter().take(max_rows) {
        let mut record = vec![row.name.clone()];
        record.extend(row.values.iter().map(|(_, v)| format_number(*v, 2)));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

pub fn preview_series(title: &str, rows: &[SeriesRow], max_rows: usize) {
    println!("{}\n", title);
    println!("{}\n", render_series(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::case;
    use crate::types::CategoryCount;
    use tempfile::TempDir;

    fn dashboard_for(cases: &[Case]) -> Dashboard {
        Dashboard::build(cases, cases)
    }

    #[test]
    fn test_render_table_markdown() {
        let rows = vec![
            CategoryCount { name: "THAI".into(), value: 3 },
            CategoryCount { name: "NON-THAI".into(), value: 1 },
        ];
        let out = render_table(&rows, 1);
        assert!(out.contains("| Name"));
        assert!(out.contains("THAI"));
        assert!(!out.contains("NON-THAI"));
        assert_eq!(render_table::<CategoryCount>(&[], 5), "(no rows)");
    }

    #[test]
    fn test_render_series_uses_dynamic_columns() {
        let mut row = SeriesRow::new("Jan");
        row.push("24h", 4.5);
        let out = render_series(&[row], 10);
        assert!(out.contains("Month"));
        assert!(out.contains("24h"));
        assert!(out.contains("4.50"));
    }

    #[test]
    fn test_medication_rows_rank_per_class() {
        let mut a = case("a");
        a.opioids = vec!["Morphine".into(), "Fentanyl".into(), "Morphine".into()];
        a.adjuvants = vec!["Gabapentin".into()];
        let d = dashboard_for(&[a]);
        let rows = medication_rows(&d);
        assert_eq!(rows.len(), 3);
        assert_eq!(
            (rows[0].class.as_str(), rows[0].rank, rows[0].name.as_str()),
            ("Opioids", 1, "Morphine")
        );
        assert_eq!(rows[0].percent, "66.7");
        assert_eq!((rows[2].class.as_str(), rows[2].rank), ("Adjuvants", 1));
    }

    #[test]
    fn test_write_reports_creates_all_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let cases = vec![case("P001")];
        let dataset = Dataset {
            cases: cases.clone(),
            catalog: Default::default(),
        };
        let d = dashboard_for(&cases);

        let written = write_reports(&out, &dataset, &cases, &d).unwrap();
        assert_eq!(written.len(), 5);
        assert!(written.iter().all(|p| p.exists()));

        let csv = std::fs::read_to_string(out.join(CASES_FILE)).unwrap();
        assert!(csv.starts_with("ID,Date,"));
        assert!(csv.contains("P001"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(DASHBOARD_FILE)).unwrap()).unwrap();
        assert_eq!(json["overview"]["totalCases"], 1);
    }
}
