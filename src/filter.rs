//! Filter engine: temporal selection plus a single cross-filter predicate.
//!
//! Selection state is an explicit value owned by the caller. Every view is
//! re-derived from `(cases, selection)` with no hidden state, so the same
//! inputs always give the same output.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::Serialize;

use crate::partition::{month_name, PartitionCatalog, MONTH_NAMES};
use crate::types::{Case, Labeled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum YearSelection {
    #[default]
    All,
    Year(i32),
}

impl YearSelection {
    pub fn matches(self, year: i32) -> bool {
        match self {
            YearSelection::All => true,
            YearSelection::Year(y) => y == year,
        }
    }
}

impl FromStr for YearSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(YearSelection::All);
        }
        s.parse::<i32>()
            .map(YearSelection::Year)
            .map_err(|_| format!("invalid year '{}': expected a year or 'All'", s))
    }
}

impl fmt::Display for YearSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSelection::All => f.write_str("All Years"),
            YearSelection::Year(y) => write!(f, "{}", y),
        }
    }
}

/// Month selection; specific months are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MonthSelection {
    #[default]
    All,
    Month(u32),
}

impl MonthSelection {
    pub fn matches(self, month: u32) -> bool {
        match self {
            MonthSelection::All => true,
            MonthSelection::Month(m) => m == month,
        }
    }
}

impl FromStr for MonthSelection {
    type Err = String;

    /// Accepts `All`, a month abbreviation (`Jan`), or a calendar number 1-12.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(MonthSelection::All);
        }
        if let Some(idx) = MONTH_NAMES.iter().position(|m| m.eq_ignore_ascii_case(s)) {
            return Ok(MonthSelection::Month(idx as u32));
        }
        match s.parse::<u32>() {
            Ok(n) if (1..=12).contains(&n) => Ok(MonthSelection::Month(n - 1)),
            _ => Err(format!(
                "invalid month '{}': expected Jan-Dec, 1-12 or 'All'",
                s
            )),
        }
    }
}

impl fmt::Display for MonthSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthSelection::All => f.write_str("All Months"),
            MonthSelection::Month(m) => f.write_str(month_name(*m)),
        }
    }
}

/// Categorical case fields a cross-filter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseField {
    OperationType,
    OrthoType,
    PatientGender,
    PatientType,
    Payer,
    Nationality,
    TraumaType,
    PostOpPainMgmt,
    Specialty,
    DrugGroupCategory,
}

impl CaseField {
    pub const ALL: [CaseField; 10] = [
        CaseField::OperationType,
        CaseField::OrthoType,
        CaseField::PatientGender,
        CaseField::PatientType,
        CaseField::Payer,
        CaseField::Nationality,
        CaseField::TraumaType,
        CaseField::PostOpPainMgmt,
        CaseField::Specialty,
        CaseField::DrugGroupCategory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CaseField::OperationType => "operationType",
            CaseField::OrthoType => "orthoType",
            CaseField::PatientGender => "patientGender",
            CaseField::PatientType => "patientType",
            CaseField::Payer => "payer",
            CaseField::Nationality => "nationality",
            CaseField::TraumaType => "traumaType",
            CaseField::PostOpPainMgmt => "postOpPainMgmt",
            CaseField::Specialty => "specialty",
            CaseField::DrugGroupCategory => "drugGroupCategory",
        }
    }

    /// The field's display value for one case.
    pub fn value_of(self, case: &Case) -> Cow<'_, str> {
        match self {
            CaseField::OperationType => Cow::Borrowed(case.operation_type.label()),
            CaseField::OrthoType => Cow::Borrowed(case.ortho_type.label()),
            CaseField::PatientGender => Cow::Borrowed(case.patient_gender.label()),
            CaseField::PatientType => Cow::Borrowed(case.patient_type.label()),
            CaseField::Payer => Cow::Borrowed(case.payer.label()),
            CaseField::Nationality => Cow::Borrowed(case.nationality.label()),
            CaseField::TraumaType => Cow::Borrowed(case.trauma_type.label()),
            CaseField::PostOpPainMgmt => Cow::Borrowed(case.post_op_pain_mgmt.label()),
            CaseField::Specialty => Cow::Borrowed(case.specialty.label()),
            CaseField::DrugGroupCategory => Cow::Borrowed(case.drug_group_category.as_str()),
        }
    }
}

impl FromStr for CaseField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CaseField::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

impl fmt::Display for CaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single (field, value) equality predicate, as set by a category click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossFilter {
    pub field: CaseField,
    pub value: String,
}

impl CrossFilter {
    pub fn new(field: CaseField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, case: &Case) -> bool {
        self.field.value_of(case) == self.value.as_str()
    }
}

/// Narrow `cases` to the selected year and month, then apply the optional
/// cross-filter. The input is never modified.
pub fn filter_cases(
    cases: &[Case],
    year: YearSelection,
    month: MonthSelection,
    cross_filter: Option<&CrossFilter>,
) -> Vec<Case> {
    cases
        .iter()
        .filter(|c| year.matches(c.date.year()) && month.matches(c.date.month0()))
        .filter(|c| cross_filter.map_or(true, |f| f.matches(c)))
        .cloned()
        .collect()
}

/// The caller-owned view selection threaded into every filter call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Selection {
    pub year: YearSelection,
    pub month: MonthSelection,
    pub cross_filter: Option<CrossFilter>,
}

impl Selection {
    /// Default selection right after a load: the most recent partition.
    pub fn for_catalog(catalog: &PartitionCatalog) -> Self {
        match catalog.latest() {
            Some(p) => Selection {
                year: YearSelection::Year(p.year),
                month: MonthSelection::Month(p.month),
                cross_filter: None,
            },
            None => Selection::default(),
        }
    }

    /// Replace any active cross-filter; predicates never combine.
    pub fn select_category(&mut self, field: CaseField, value: impl Into<String>) {
        self.cross_filter = Some(CrossFilter::new(field, value));
    }

    pub fn clear_cross_filter(&mut self) {
        self.cross_filter = None;
    }

    /// Reset year/month to valid values for `catalog`. Returns `true` when
    /// anything changed.
    ///
    /// An unavailable year (or `All` with only one year loaded) becomes the
    /// most recent year; an unavailable month becomes `All`. An empty catalog
    /// resets both to `All`.
    pub fn reconcile(&mut self, catalog: &PartitionCatalog) -> bool {
        let before = (self.year, self.month);
        let years = catalog.available_years();
        let Some(&latest_year) = years.first() else {
            self.year = YearSelection::All;
            self.month = MonthSelection::All;
            return before != (self.year, self.month);
        };

        let year_ok = match self.year {
            YearSelection::All => years.len() > 1,
            YearSelection::Year(y) => years.contains(&y),
        };
        if !year_ok {
            self.year = YearSelection::Year(latest_year);
        }

        if let MonthSelection::Month(m) = self.month {
            if !catalog.available_months(self.year).contains(&m) {
                self.month = MonthSelection::All;
            }
        }
        before != (self.year, self.month)
    }

    /// Cases in the selected year and month, after the cross-filter.
    pub fn apply(&self, cases: &[Case]) -> Vec<Case> {
        filter_cases(cases, self.year, self.month, self.cross_filter.as_ref())
    }

    /// Cases in the selected year (all months), after the cross-filter.
    /// Monthly trend reports read this scope.
    pub fn year_scope(&self, cases: &[Case]) -> Vec<Case> {
        filter_cases(cases, self.year, MonthSelection::All, self.cross_filter.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{case, case_in};
    use crate::partition::Partition;
    use crate::types::{OperationType, Payer};

    fn catalog(parts: &[(u32, i32)]) -> PartitionCatalog {
        PartitionCatalog::new(
            parts
                .iter()
                .map(|&(month, year)| Partition {
                    label: format!("{} {}", month_name(month), year),
                    month,
                    year,
                    case_count: 1,
                })
                .collect(),
        )
    }

    fn sample() -> Vec<Case> {
        let mut a = case_in("a", 2024, 11);
        a.payer = Payer::AmsContract;
        let mut b = case_in("b", 2025, 0);
        b.operation_type = OperationType::Elective;
        let c = case_in("c", 2025, 1);
        vec![a, b, c]
    }

    #[test]
    fn test_identity_law() {
        let cases = sample();
        let out = filter_cases(&cases, YearSelection::All, MonthSelection::All, None);
        assert_eq!(out, cases);
        assert!(filter_cases(&[], YearSelection::All, MonthSelection::All, None).is_empty());
    }

    #[test]
    fn test_temporal_filter() {
        let cases = sample();
        let ids = |v: Vec<Case>| v.into_iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(
            ids(filter_cases(&cases, YearSelection::Year(2025), MonthSelection::All, None)),
            vec!["b", "c"]
        );
        assert_eq!(
            ids(filter_cases(&cases, YearSelection::All, MonthSelection::Month(11), None)),
            vec!["a"]
        );
        assert!(filter_cases(&cases, YearSelection::Year(2024), MonthSelection::Month(0), None).is_empty());
    }

    #[test]
    fn test_cross_filter_applies_after_temporal_filter() {
        let cases = sample();
        let filter = CrossFilter::new(CaseField::OperationType, "Elective OR");
        let out = filter_cases(&cases, YearSelection::Year(2025), MonthSelection::All, Some(&filter));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");

        let filter = CrossFilter::new(CaseField::Payer, "AMS Contract");
        let out = filter_cases(&cases, YearSelection::Year(2025), MonthSelection::All, Some(&filter));
        assert!(out.is_empty());
    }

    #[test]
    fn test_filter_is_repeatable() {
        let cases = sample();
        let mut selection = Selection::default();
        selection.select_category(CaseField::Nationality, "THAI");
        assert_eq!(selection.apply(&cases), selection.apply(&cases));
    }

    #[test]
    fn test_select_category_replaces_previous_predicate() {
        let mut selection = Selection::default();
        selection.select_category(CaseField::Payer, "AMS Contract");
        selection.select_category(CaseField::OperationType, "Elective OR");
        assert_eq!(
            selection.cross_filter,
            Some(CrossFilter::new(CaseField::OperationType, "Elective OR"))
        );
        let cases = sample();
        assert_eq!(selection.apply(&cases).len(), 1);
        selection.clear_cross_filter();
        assert_eq!(selection.apply(&cases).len(), 3);
    }

    #[test]
    fn test_year_scope_ignores_month() {
        let cases = sample();
        let selection = Selection {
            year: YearSelection::Year(2025),
            month: MonthSelection::Month(1),
            cross_filter: None,
        };
        assert_eq!(selection.apply(&cases).len(), 1);
        assert_eq!(selection.year_scope(&cases).len(), 2);
    }

    #[test]
    fn test_for_catalog_picks_latest_partition() {
        let cat = catalog(&[(1, 2025), (11, 2024)]);
        let selection = Selection::for_catalog(&cat);
        assert_eq!(selection.year, YearSelection::Year(2025));
        assert_eq!(selection.month, MonthSelection::Month(1));
        assert_eq!(Selection::for_catalog(&PartitionCatalog::default()), Selection::default());
    }

    #[test]
    fn test_reconcile_resets_unavailable_year_and_month() {
        let cat = catalog(&[(0, 2025), (1, 2025), (11, 2024)]);
        let mut selection = Selection {
            year: YearSelection::Year(2023),
            month: MonthSelection::Month(11),
            cross_filter: None,
        };
        assert!(selection.reconcile(&cat));
        assert_eq!(selection.year, YearSelection::Year(2025));
        assert_eq!(selection.month, MonthSelection::All);
        assert!(!selection.reconcile(&cat));
    }

    #[test]
    fn test_reconcile_keeps_valid_selection() {
        let cat = catalog(&[(0, 2025), (11, 2024)]);
        let mut selection = Selection {
            year: YearSelection::Year(2024),
            month: MonthSelection::Month(11),
            cross_filter: Some(CrossFilter::new(CaseField::Payer, "AMS Contract")),
        };
        assert!(!selection.reconcile(&cat));
        assert_eq!(selection.month, MonthSelection::Month(11));
        assert!(selection.cross_filter.is_some());
    }

    #[test]
    fn test_reconcile_all_years() {
        let mut selection = Selection::default();
        assert!(!selection.reconcile(&catalog(&[(0, 2025), (11, 2024)])));
        assert_eq!(selection.year, YearSelection::All);

        assert!(selection.reconcile(&catalog(&[(0, 2025)])));
        assert_eq!(selection.year, YearSelection::Year(2025));

        assert!(selection.reconcile(&PartitionCatalog::default()));
        assert_eq!(selection.year, YearSelection::All);
    }

    #[test]
    fn test_month_scope_follows_reset_year() {
        let cat = catalog(&[(3, 2025), (11, 2024)]);
        let mut selection = Selection {
            year: YearSelection::Year(2022),
            month: MonthSelection::Month(11),
            cross_filter: None,
        };
        selection.reconcile(&cat);
        assert_eq!(selection.year, YearSelection::Year(2025));
        assert_eq!(selection.month, MonthSelection::All);
    }

    #[test]
    fn test_parse_selections_and_fields() {
        assert_eq!("All".parse::<YearSelection>(), Ok(YearSelection::All));
        assert_eq!("2024".parse::<YearSelection>(), Ok(YearSelection::Year(2024)));
        assert!("twenty".parse::<YearSelection>().is_err());
        assert_eq!("mar".parse::<MonthSelection>(), Ok(MonthSelection::Month(2)));
        assert_eq!("12".parse::<MonthSelection>(), Ok(MonthSelection::Month(11)));
        assert!("13".parse::<MonthSelection>().is_err());
        assert_eq!("payer".parse::<CaseField>(), Ok(CaseField::Payer));
        assert_eq!("OPERATIONTYPE".parse::<CaseField>(), Ok(CaseField::OperationType));
        assert!("age".parse::<CaseField>().is_err());
    }

    #[test]
    fn test_case_field_values() {
        let c = case("x");
        assert_eq!(CaseField::PostOpPainMgmt.value_of(&c), "IV PCA");
        assert_eq!(CaseField::DrugGroupCategory.value_of(&c), "Unknown");
        assert_eq!(CaseField::Nationality.value_of(&c), "THAI");
    }
}
