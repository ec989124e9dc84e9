//! Partition resolution: sheet labels such as `"Jan 2025"` become a
//! zero-based month and a year, and the loaded partitions form a catalog.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tabled::Tabled;

use crate::filter::YearSelection;

/// Fixed month table; index is the zero-based month.
pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const FULL_MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("word pattern is valid"));

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").expect("year pattern is valid"));

/// Display label for a zero-based month, `"?"` when out of range.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES.get(month as usize).copied().unwrap_or("?")
}

/// The (month, year) a sheet label resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPartition {
    /// Zero-based month index.
    pub month: u32,
    pub year: i32,
}

/// Month index of a standalone word: the three-letter abbreviation, or a
/// longer prefix of the full month name (`Sept`, `January`).
fn month_of_word(word: &str) -> Option<usize> {
    if word.len() < 3 {
        return None;
    }
    let word = word.to_ascii_lowercase();
    let abbrev = &word[..3];
    let month = MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(abbrev))?;
    FULL_MONTH_NAMES[month].starts_with(&word).then_some(month)
}

/// Extract the first month word and the first 4-digit run from a label.
/// A label missing either is rejected.
///
/// Month tokens must stand alone, so `"Summary 2025"` does not read as March.
pub fn resolve_partition(label: &str) -> Option<ResolvedPartition> {
    let month = WORD_RE
        .find_iter(label)
        .find_map(|m| month_of_word(m.as_str()))?;
    let year = YEAR_RE.find(label)?.as_str().parse::<i32>().ok()?;

    Some(ResolvedPartition {
        month: month as u32,
        year,
    })
}

/// One loaded (month, year) slice of the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub label: String,
    pub month: u32,
    pub year: i32,
    pub case_count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PartitionRow {
    #[serde(rename = "Sheet")]
    #[tabled(rename = "Sheet")]
    pub label: String,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Cases")]
    #[tabled(rename = "Cases")]
    pub cases: usize,
}

impl From<&Partition> for PartitionRow {
    fn from(p: &Partition) -> Self {
        PartitionRow {
            label: p.label.clone(),
            month: month_name(p.month).to_string(),
            year: p.year,
            cases: p.case_count,
        }
    }
}

/// All partitions of one load, in workbook order. Rebuilt on every load.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PartitionCatalog {
    partitions: Vec<Partition>,
}

impl PartitionCatalog {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn total_cases(&self) -> usize {
        self.partitions.iter().map(|p| p.case_count).sum()
    }

    /// Distinct years, most recent first.
    pub fn available_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.partitions.iter().map(|p| p.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    /// Distinct months in ascending order, limited to `year` unless it is `All`.
    pub fn available_months(&self, year: YearSelection) -> Vec<u32> {
        let mut months: Vec<u32> = self
            .partitions
            .iter()
            .filter(|p| year.matches(p.year))
            .map(|p| p.month)
            .collect();
        months.sort_unstable();
        months.dedup();
        months
    }

    /// The partition with the greatest (year, month).
    pub fn latest(&self) -> Option<&Partition> {
        self.partitions.iter().max_by_key(|p| (p.year, p.month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(label: &str, month: u32, year: i32, case_count: usize) -> Partition {
        Partition {
            label: label.to_string(),
            month,
            year,
            case_count,
        }
    }

    #[test]
    fn test_resolve_simple_label() {
        assert_eq!(
            resolve_partition("Jan 2025"),
            Some(ResolvedPartition { month: 0, year: 2025 })
        );
    }

    #[test]
    fn test_resolve_is_case_insensitive_and_takes_first_matches() {
        assert_eq!(
            resolve_partition("APS dec-2024 (rev 2025)"),
            Some(ResolvedPartition { month: 11, year: 2024 })
        );
        assert_eq!(
            resolve_partition("mar apr 2023"),
            Some(ResolvedPartition { month: 2, year: 2023 })
        );
    }

    #[test]
    fn test_resolve_accepts_full_month_names() {
        assert_eq!(
            resolve_partition("September 2024"),
            Some(ResolvedPartition { month: 8, year: 2024 })
        );
        assert_eq!(
            resolve_partition("Sept2024"),
            Some(ResolvedPartition { month: 8, year: 2024 })
        );
    }

    #[test]
    fn test_resolve_rejects_month_letters_inside_words() {
        assert_eq!(resolve_partition("Summary 2025"), None);
        assert_eq!(resolve_partition("Marathon 2025"), None);
    }

    #[test]
    fn test_resolve_skips_thai_numeral_year() {
        assert_eq!(
            resolve_partition("Jan ๒๕๖๘ 2025"),
            Some(ResolvedPartition { month: 0, year: 2025 })
        );
        assert_eq!(resolve_partition("Jan ๒๕๖๘"), None);
    }

    #[test]
    fn test_resolve_rejects_missing_month_or_year() {
        assert_eq!(resolve_partition("Jan"), None);
        assert_eq!(resolve_partition("Feb 25"), None);
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(0), "Jan");
        assert_eq!(month_name(11), "Dec");
        assert_eq!(month_name(12), "?");
    }

    #[test]
    fn test_available_years_descending_and_distinct() {
        let catalog = PartitionCatalog::new(vec![
            part("Nov 2024", 10, 2024, 3),
            part("Jan 2025", 0, 2025, 4),
            part("Dec 2024", 11, 2024, 2),
        ]);
        assert_eq!(catalog.available_years(), vec![2025, 2024]);
        assert_eq!(catalog.total_cases(), 9);
    }

    #[test]
    fn test_available_months_scoped_by_year() {
        let catalog = PartitionCatalog::new(vec![
            part("Nov 2024", 10, 2024, 3),
            part("Feb 2025", 1, 2025, 1),
            part("Jan 2025", 0, 2025, 4),
        ]);
        assert_eq!(catalog.available_months(YearSelection::Year(2025)), vec![0, 1]);
        assert_eq!(catalog.available_months(YearSelection::Year(2023)), Vec::<u32>::new());
        assert_eq!(catalog.available_months(YearSelection::All), vec![0, 1, 10]);
    }

    #[test]
    fn test_latest_is_greatest_year_month() {
        let catalog = PartitionCatalog::new(vec![
            part("Feb 2025", 1, 2025, 1),
            part("Dec 2024", 11, 2024, 2),
        ]);
        assert_eq!(catalog.latest().map(|p| p.label.as_str()), Some("Feb 2025"));
        assert!(PartitionCatalog::default().latest().is_none());
    }
}
