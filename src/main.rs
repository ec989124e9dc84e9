// Entry point and high-level CLI flow.
//
// - Option [1] loads the workbook and prints what was recognized.
// - Option [2] picks the year/month to report on.
// - Option [3] sets or clears the single cross-filter.
// - Option [4] writes the report files and prints previews.
// With --batch the program loads, writes the reports once and exits.
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use aps_report::aggregate::count_categories;
use aps_report::config::{setup_logging, Settings};
use aps_report::error::ReportError;
use aps_report::filter::{CaseField, MonthSelection, Selection, YearSelection};
use aps_report::loader::{load_path, Dataset};
use aps_report::output;
use aps_report::partition::{month_name, PartitionRow};
use aps_report::reports::Dashboard;
use aps_report::types::CaseRow;
use aps_report::util::{format_int, format_number};

/// What one interactive run holds between menu choices. A reload replaces
/// the dataset only when it succeeds.
struct Session {
    settings: Settings,
    dataset: Option<Dataset>,
    selection: Selection,
}

/// Print `label` and read one trimmed line from stdin.
fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Ask whether to go back to the menu after generating reports.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

impl Session {
    fn new(settings: Settings) -> Self {
        Session {
            settings,
            dataset: None,
            selection: Selection::default(),
        }
    }

    /// Option [1]. On failure the previously loaded dataset stays active.
    fn handle_load(&mut self) -> Result<(), ReportError> {
        let (dataset, report) = load_path(&self.settings.input)?;

        println!(
            "Processing workbook... ({} case(s) loaded from {} partition(s))",
            format_int(report.cases_loaded),
            format_int(dataset.catalog.len())
        );
        if report.sheets_skipped > 0 {
            println!(
                "Note: {} sheet(s) skipped, names must look like 'Jan 2025'.",
                format_int(report.sheets_skipped)
            );
        }
        if report.rows_dropped > 0 {
            println!(
                "Note: {} row(s) dropped (blank, header or missing age).",
                format_int(report.rows_dropped)
            );
        }
        let rows: Vec<PartitionRow> = dataset
            .catalog
            .partitions()
            .iter()
            .map(PartitionRow::from)
            .collect();
        output::preview_table("Partitions", None, &rows, rows.len());

        let mut selection = Selection::for_catalog(&dataset.catalog);
        if let Some(year) = self.settings.year {
            selection.year = year;
        }
        if let Some(month) = self.settings.month {
            selection.month = month;
        }
        selection.cross_filter = self.settings.filter.clone();
        if selection.reconcile(&dataset.catalog) {
            info!("Selection adjusted to {} / {}", selection.year, selection.month);
        }

        self.selection = selection;
        self.dataset = Some(dataset);
        println!("Reporting on {}.\n", self.describe_selection());
        Ok(())
    }

    fn describe_selection(&self) -> String {
        let mut s = format!("{} / {}", self.selection.month, self.selection.year);
        if let Some(f) = &self.selection.cross_filter {
            s.push_str(&format!(" where {} = '{}'", f.field, f.value));
        }
        s
    }

    /// Option [2].
    fn handle_select_period(&mut self) {
        let Some(dataset) = &self.dataset else {
            println!("Error: No data loaded. Please load the workbook first (option 1).\n");
            return;
        };
        let catalog = &dataset.catalog;

        let years: Vec<String> = catalog.available_years().iter().map(|y| y.to_string()).collect();
        println!("Available years: All, {}", years.join(", "));
        let raw = prompt(&format!("Year [{}]: ", self.selection.year));
        if !raw.is_empty() {
            match raw.parse::<YearSelection>() {
                Ok(year) => self.selection.year = year,
                Err(e) => println!("{}", e),
            }
        }

        let months: Vec<&str> = catalog
            .available_months(self.selection.year)
            .into_iter()
            .map(month_name)
            .collect();
        println!("Available months: All, {}", months.join(", "));
        let raw = prompt(&format!("Month [{}]: ", self.selection.month));
        if !raw.is_empty() {
            match raw.parse::<MonthSelection>() {
                Ok(month) => self.selection.month = month,
                Err(e) => println!("{}", e),
            }
        }

        if self.selection.reconcile(catalog) {
            println!("Selection not available in the loaded data; adjusted.");
        }
        println!("Reporting on {}.\n", self.describe_selection());
    }

    /// Option [3]. Picking a value replaces any active cross-filter.
    fn handle_cross_filter(&mut self) {
        let Some(dataset) = &self.dataset else {
            println!("Error: No data loaded. Please load the workbook first (option 1).\n");
            return;
        };

        println!("[0] Clear cross-filter");
        for (i, field) in CaseField::ALL.iter().enumerate() {
            println!("[{}] {}", i + 1, field);
        }
        let field = match read_choice().parse::<usize>() {
            Ok(0) => {
                self.selection.clear_cross_filter();
                println!("Cross-filter cleared.\n");
                return;
            }
            Ok(n) if n <= CaseField::ALL.len() => CaseField::ALL[n - 1],
            _ => {
                println!("Invalid choice.\n");
                return;
            }
        };

        let mut period = self.selection.clone();
        period.clear_cross_filter();
        let view = period.apply(&dataset.cases);
        let values = count_categories(&view, |c| field.value_of(c));
        if values.is_empty() {
            println!("No cases in {} / {}.\n", period.month, period.year);
            return;
        }
        for (i, v) in values.iter().enumerate() {
            println!("[{}] {} ({})", i + 1, v.name, format_int(v.value));
        }
        match read_choice().parse::<usize>() {
            Ok(n) if (1..=values.len()).contains(&n) => {
                self.selection.select_category(field, values[n - 1].name.clone());
                println!("Reporting on {}.\n", self.describe_selection());
            }
            _ => println!("Invalid choice.\n"),
        }
    }

    /// Option [4]: write every report file and print Markdown previews.
    fn handle_generate_reports(&self) -> anyhow::Result<()> {
        let Some(dataset) = &self.dataset else {
            println!("Error: No data loaded. Please load the workbook first (option 1).\n");
            return Ok(());
        };
        let max_rows = self.settings.preview_rows;

        let view = self.selection.apply(&dataset.cases);
        let trend = self.selection.year_scope(&dataset.cases);
        if view.is_empty() {
            warn!("no cases match {}", self.describe_selection());
        }
        let dashboard = Dashboard::build(&view, &trend);

        println!("Generating reports for {}...", self.describe_selection());
        let written = output::write_reports(&self.settings.out_dir, dataset, &view, &dashboard)
            .with_context(|| format!("writing reports to {}", self.settings.out_dir.display()))?;
        println!("Outputs saved to individual files...\n");

        let o = &dashboard.overview;
        println!("Overview");
        println!(
            "Total cases: {} | Avg rest pain 0-24h: {} | Complication rate: {}% | Pain reduction >50%: {}%\n",
            format_int(o.total_cases),
            format_number(o.avg_rest_pain_24h.average, 2),
            format_number(o.complication_rate.rate, 1),
            format_number(o.success_rate.rate, 1)
        );

        let cases: Vec<CaseRow> = view.iter().map(CaseRow::from).collect();
        output::preview_table("Cases", None, &cases, max_rows);
        output::preview_series("Rest Pain Trend", &dashboard.rest_pain_trend, max_rows);
        output::preview_series("Pain Reduction >50%", &dashboard.pain_reduction_trend, max_rows);
        for series in &dashboard.severe_pain {
            output::preview_series(
                &format!("{} (target {}%)", series.label, series.target),
                &series.rows,
                max_rows,
            );
        }
        output::preview_table(
            "Category Breakdowns",
            Some("top 6 per field, the rest as Other"),
            &output::breakdown_rows(&dashboard),
            max_rows * 3,
        );
        output::preview_table(
            "Medication Ranking",
            Some("share of all listed tokens"),
            &output::medication_rows(&dashboard),
            max_rows * 3,
        );

        for path in written {
            println!("(Exported {})", path.display());
        }
        println!();
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    setup_logging(&settings.log_level)?;

    let batch = settings.batch;
    let mut session = Session::new(settings);

    if batch {
        session
            .handle_load()
            .with_context(|| format!("loading {}", session.settings.input.display()))?;
        return session.handle_generate_reports();
    }

    loop {
        println!("APS Report");
        println!("[1] Load the workbook");
        println!("[2] Select period");
        println!("[3] Cross-filter");
        println!("[4] Generate Reports\n");
        match read_choice().as_str() {
            "1" => {
                if let Err(e) = session.handle_load() {
                    match e {
                        ReportError::NoValidData { .. } => eprintln!("{}\n", e),
                        other => eprintln!("Failed to load workbook: {}\n", other),
                    }
                    if session.dataset.is_some() {
                        println!("Keeping the previously loaded data.\n");
                    }
                }
            }
            "2" => session.handle_select_period(),
            "3" => session.handle_cross_filter(),
            "4" => {
                println!();
                if let Err(e) = session.handle_generate_reports() {
                    eprintln!("Write error: {:#}", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1-4.\n");
            }
        }
    }
    Ok(())
}
