use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::filter::{CaseField, CrossFilter, MonthSelection, YearSelection};

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Parser, Debug, Clone)]
#[command(
    name = "aps_report",
    about = "Acute pain service case reports from a monthly workbook",
    version
)]
pub struct Settings {
    /// Workbook to load: an .xlsx/.xls file, a directory of "<Mon YYYY>.csv" sheets, one .csv, or a .json export
    #[arg(long, env = "APS_INPUT", default_value = "aps_data")]
    pub input: PathBuf,

    /// Directory the report files are written to
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Initial year selection ("All" or a 4-digit year); defaults to the latest partition
    #[arg(long)]
    pub year: Option<YearSelection>,

    /// Initial month selection ("All", "Jan".."Dec" or 1-12)
    #[arg(long)]
    pub month: Option<MonthSelection>,

    /// Cross-filter as field=value, e.g. payer="AMS Contract"
    #[arg(long, value_parser = parse_cross_filter)]
    pub filter: Option<CrossFilter>,

    /// Rows shown per table preview
    #[arg(long, default_value = "5")]
    pub preview_rows: usize,

    /// Load, write the reports once and exit instead of showing the menu
    #[arg(long)]
    pub batch: bool,
}

/// Parse `field=value` into a cross-filter. The value is kept verbatim.
pub fn parse_cross_filter(raw: &str) -> Result<CrossFilter, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;
    let field: CaseField = field.parse()?;
    Ok(CrossFilter::new(field, value))
}

// ── Logging bootstrap ─────────────────────────────────────────────────────────

/// EnvFilter directive for a level name such as `WARNING`.
pub fn log_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber, writing to stderr so the
/// menu on stdout stays readable. Unknown levels fall back to `info`.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(log_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s = Settings::try_parse_from(["aps_report"]).unwrap();
        assert_eq!(s.out_dir, PathBuf::from("."));
        assert_eq!(s.log_level, "INFO");
        assert_eq!(s.year, None);
        assert_eq!(s.preview_rows, 5);
        assert!(!s.batch);
    }

    #[test]
    fn test_settings_selection_flags() {
        let s = Settings::try_parse_from([
            "aps_report",
            "--input",
            "book.json",
            "--year",
            "2024",
            "--month",
            "Mar",
            "--filter",
            "payer=AMS Contract",
            "--batch",
        ])
        .unwrap();
        assert_eq!(s.input, PathBuf::from("book.json"));
        assert_eq!(s.year, Some(YearSelection::Year(2024)));
        assert_eq!(s.month, Some(MonthSelection::Month(2)));
        assert_eq!(
            s.filter,
            Some(CrossFilter::new(CaseField::Payer, "AMS Contract"))
        );
        assert!(s.batch);
    }

    #[test]
    fn test_settings_rejects_bad_values() {
        assert!(Settings::try_parse_from(["aps_report", "--log-level", "TRACE"]).is_err());
        assert!(Settings::try_parse_from(["aps_report", "--month", "Foo"]).is_err());
        assert!(Settings::try_parse_from(["aps_report", "--filter", "payer"]).is_err());
    }

    #[test]
    fn test_parse_cross_filter() {
        let f = parse_cross_filter("drugGroupCategory=Opioid + NSAID").unwrap();
        assert_eq!(f.field, CaseField::DrugGroupCategory);
        assert_eq!(f.value, "Opioid + NSAID");
        assert!(parse_cross_filter("ward=3").is_err());
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive("WARNING"), "warn");
        assert_eq!(log_directive("debug"), "debug");
        assert_eq!(log_directive("ERROR"), "error");
    }
}
