//! Aggregation engine: null-tolerant averages, rates, monthly grouping,
//! top-N category breakdowns with an overflow bucket, and token rankings.
//!
//! Every function is a pure reduction over borrowed cases.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use chrono::Datelike;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::partition::month_name;
use crate::types::{Case, CategoryCount, TokenFrequency};
use crate::util::round_to;

/// Explicit categories kept before the rest collapse into [`OTHER`].
pub const TOP_CATEGORIES: usize = 6;
/// Entries kept by a token ranking.
pub const TOP_TOKENS: usize = 10;
/// Label of the overflow bucket.
pub const OTHER: &str = "Other";
/// Label used for a missing or empty categorical value.
pub const UNKNOWN: &str = "Unknown";
/// A quality indicator at or above this count marks a severe-pain case.
pub const SEVERE_THRESHOLD: f64 = 3.0;

// ── Averages and rates ────────────────────────────────────────────────────────

/// Mean over the non-null values of a group, with the sum and count it used.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NullTolerantAverage {
    /// `sum / count`, or exactly `0.0` when `count` is zero.
    pub average: f64,
    pub sum: f64,
    pub count: usize,
}

/// Average `value` over `cases`, skipping cases where it is `None`.
pub fn null_tolerant_average<'a, I, F>(cases: I, value: F) -> NullTolerantAverage
where
    I: IntoIterator<Item = &'a Case>,
    F: Fn(&Case) -> Option<f64>,
{
    let (sum, count) = cases
        .into_iter()
        .filter_map(value)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    let average = if count == 0 { 0.0 } else { sum / count as f64 };
    NullTolerantAverage {
        average,
        sum,
        count,
    }
}

/// A percentage with the counts behind it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rate {
    /// Percent, rounded to one decimal; `0.0` for an empty group.
    pub rate: f64,
    pub numerator: usize,
    pub denominator: usize,
}

impl Rate {
    pub fn from_counts(numerator: usize, denominator: usize) -> Self {
        let rate = if denominator == 0 {
            0.0
        } else {
            round_to(numerator as f64 / denominator as f64 * 100.0, 1)
        };
        Rate {
            rate,
            numerator,
            denominator,
        }
    }
}

/// Share of `cases` satisfying `predicate`.
pub fn rate<'a, I, P>(cases: I, predicate: P) -> Rate
where
    I: IntoIterator<Item = &'a Case>,
    P: Fn(&Case) -> bool,
{
    let (hits, total) = cases
        .into_iter()
        .fold((0usize, 0usize), |(h, t), c| (h + predicate(c) as usize, t + 1));
    Rate::from_counts(hits, total)
}

// ── Monthly grouping ──────────────────────────────────────────────────────────

/// Cases sharing one calendar month (zero-based), regardless of year.
#[derive(Debug, Clone)]
pub struct MonthGroup<'a> {
    pub month: u32,
    pub cases: Vec<&'a Case>,
}

impl MonthGroup<'_> {
    pub fn name(&self) -> &'static str {
        month_name(self.month)
    }
}

/// Bucket cases by the month of their date. Buckets come back in ascending
/// month order; months without cases are skipped.
pub fn group_by_month<'a, I>(cases: I) -> Vec<MonthGroup<'a>>
where
    I: IntoIterator<Item = &'a Case>,
{
    let mut map: BTreeMap<u32, Vec<&'a Case>> = BTreeMap::new();
    for case in cases {
        map.entry(case.date.month0()).or_default().push(case);
    }
    map.into_iter()
        .map(|(month, cases)| MonthGroup { month, cases })
        .collect()
}

// ── Series rows ───────────────────────────────────────────────────────────────

/// One chart/table row: a label plus named numeric series values.
///
/// Serializes flat, e.g. `{"name": "Jan", "24h": 4.5, "24h_num": 9, "24h_den": 2}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesRow {
    pub name: String,
    pub values: Vec<(String, f64)>,
}

impl SeriesRow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.values.push((key.into(), value));
        self
    }

    /// Push the average (two decimals) with `<key>_num` / `<key>_den` companions.
    pub fn push_average(&mut self, key: &str, avg: NullTolerantAverage) -> &mut Self {
        self.push(key, round_to(avg.average, 2))
            .push(format!("{}_num", key), avg.sum)
            .push(format!("{}_den", key), avg.count as f64)
    }

    /// Push the rate with `<key>_num` / `<key>_den` companions.
    pub fn push_rate(&mut self, key: &str, rate: Rate) -> &mut Self {
        self.push(key, rate.rate)
            .push(format!("{}_num", key), rate.numerator as f64)
            .push(format!("{}_den", key), rate.denominator as f64)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}

impl Serialize for SeriesRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("name", &self.name)?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One row per populated month, with the average of `value` under `key`.
pub fn monthly_average<'a, I, F>(cases: I, key: &str, value: F) -> Vec<SeriesRow>
where
    I: IntoIterator<Item = &'a Case>,
    F: Fn(&Case) -> Option<f64>,
{
    group_by_month(cases)
        .into_iter()
        .map(|group| {
            let mut row = SeriesRow::new(group.name());
            row.push_average(key, null_tolerant_average(group.cases.iter().copied(), &value));
            row
        })
        .collect()
}

/// One row per populated month, with the rate of `predicate` under `key`.
pub fn monthly_rate<'a, I, P>(cases: I, key: &str, predicate: P) -> Vec<SeriesRow>
where
    I: IntoIterator<Item = &'a Case>,
    P: Fn(&Case) -> bool,
{
    group_by_month(cases)
        .into_iter()
        .map(|group| {
            let mut row = SeriesRow::new(group.name());
            row.push_rate(key, rate(group.cases.iter().copied(), &predicate));
            row
        })
        .collect()
}

// ── Categorical breakdowns ────────────────────────────────────────────────────

fn category_key<'c>(raw: Cow<'c, str>) -> Cow<'c, str> {
    if raw.trim().is_empty() {
        Cow::Borrowed(UNKNOWN)
    } else {
        raw
    }
}

/// Count distinct values, most frequent first. Ties keep first-seen order.
pub fn count_categories<'a, I, K>(cases: I, key: K) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a Case>,
    K: Fn(&'a Case) -> Cow<'a, str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();
    for case in cases {
        let name = category_key(key(case));
        match index.get(name.as_ref()).copied() {
            Some(i) => counts[i].value += 1,
            None => {
                index.insert(name.to_string(), counts.len());
                counts.push(CategoryCount {
                    name: name.into_owned(),
                    value: 1,
                });
            }
        }
    }
    counts.sort_by(|a, b| b.value.cmp(&a.value));
    counts
}

/// Keep the `n` largest entries of a descending list and fold the rest into
/// one [`OTHER`] entry, but only when more than `n + 1` entries exist.
pub fn collapse_overflow(mut sorted: Vec<CategoryCount>, n: usize) -> Vec<CategoryCount> {
    if sorted.len() <= n + 1 {
        return sorted;
    }
    let rest: usize = sorted.drain(n..).map(|c| c.value).sum();
    sorted.push(CategoryCount {
        name: OTHER.to_string(),
        value: rest,
    });
    sorted
}

/// Top-N-plus-overflow breakdown of any categorical key.
pub fn top_n_breakdown<'a, I, K>(cases: I, n: usize, key: K) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a Case>,
    K: Fn(&'a Case) -> Cow<'a, str>,
{
    collapse_overflow(count_categories(cases, key), n)
}

/// Frequency breakdown with the standard top-6 + "Other" rule.
pub fn category_breakdown<'a, K>(cases: &'a [Case], key: K) -> Vec<CategoryCount>
where
    K: Fn(&'a Case) -> Cow<'a, str>,
{
    top_n_breakdown(cases, TOP_CATEGORIES, key)
}

/// Monthly stacked counts of a categorical field.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CategoryTrend {
    /// Series keys shared by every row, most frequent first.
    pub keys: Vec<String>,
    pub rows: Vec<SeriesRow>,
}

/// Monthly stacked trend. The top-6 set is chosen once over all of `cases`
/// and reused for every month; anything outside it counts as [`OTHER`],
/// even in a month where it was the most common value.
pub fn category_trend<'a, K>(cases: &'a [Case], key: K) -> CategoryTrend
where
    K: Fn(&'a Case) -> Cow<'a, str>,
{
    let ranked = count_categories(cases, &key);
    let overflow = ranked.len() > TOP_CATEGORIES + 1;
    let mut keys: Vec<String> = ranked
        .into_iter()
        .take(if overflow { TOP_CATEGORIES } else { usize::MAX })
        .map(|c| c.name)
        .collect();
    if overflow && !keys.iter().any(|k| k == OTHER) {
        keys.push(OTHER.to_string());
    }

    let rows = group_by_month(cases)
        .into_iter()
        .map(|group| {
            let month = group.name();
            let mut counts = vec![0usize; keys.len()];
            for case in group.cases {
                let name = category_key(key(case));
                let slot = keys
                    .iter()
                    .position(|k| k.as_str() == name.as_ref())
                    .or_else(|| keys.iter().position(|k| k == OTHER));
                if let Some(i) = slot {
                    counts[i] += 1;
                }
            }
            let mut row = SeriesRow::new(month);
            for (k, n) in keys.iter().zip(counts) {
                row.push(k.clone(), n as f64);
            }
            row
        })
        .collect();

    CategoryTrend { keys, rows }
}

// ── Token rankings ────────────────────────────────────────────────────────────

/// Rank free-text tokens from a list-valued field. Percentages are shares of
/// all counted tokens, not of cases. Only the top 10 are returned.
pub fn token_frequency<'a, I, L>(cases: I, list: L) -> Vec<TokenFrequency>
where
    I: IntoIterator<Item = &'a Case>,
    L: Fn(&'a Case) -> &'a [String],
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut total = 0usize;
    for case in cases {
        for token in list(case) {
            let name = token.trim();
            if name.is_empty() {
                continue;
            }
            total += 1;
            match index.get(name).copied() {
                Some(i) => counts[i].1 += 1,
                None => {
                    index.insert(name, counts.len());
                    counts.push((name, 1));
                }
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_TOKENS)
        .map(|(name, value)| TokenFrequency {
            name: name.to_string(),
            value,
            percent: if total == 0 {
                0.0
            } else {
                round_to(value as f64 / total as f64 * 100.0, 1)
            },
        })
        .collect()
}

// ── Severe-pain rates ─────────────────────────────────────────────────────────

/// The four quality-indicator frequency fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityIndicator {
    Rest24h,
    Movement24h,
    Rest72h,
    Movement72h,
}

impl QualityIndicator {
    pub const ALL: [QualityIndicator; 4] = [
        QualityIndicator::Rest24h,
        QualityIndicator::Movement24h,
        QualityIndicator::Rest72h,
        QualityIndicator::Movement72h,
    ];

    pub fn value(self, case: &Case) -> Option<f64> {
        let qi = &case.quality_indicators;
        match self {
            QualityIndicator::Rest24h => qi.freq_rest_24h,
            QualityIndicator::Movement24h => qi.freq_movement_24h,
            QualityIndicator::Rest72h => qi.freq_rest_72h,
            QualityIndicator::Movement72h => qi.freq_movement_72h,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityIndicator::Rest24h => "Severe Rest Pain Freq (24h)",
            QualityIndicator::Movement24h => "Severe Move Pain Freq (24h)",
            QualityIndicator::Rest72h => "Severe Rest Pain Freq (72h)",
            QualityIndicator::Movement72h => "Severe Move Pain Freq (72h)",
        }
    }

    /// Target rate (percent) the dashboard annotates each series with.
    pub fn default_target(self) -> f64 {
        match self {
            QualityIndicator::Rest24h | QualityIndicator::Rest72h => 10.0,
            QualityIndicator::Movement24h => 15.0,
            QualityIndicator::Movement72h => 5.0,
        }
    }
}

/// Monthly share of cases whose indicator reached [`SEVERE_THRESHOLD`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SevereRateSeries {
    pub indicator: QualityIndicator,
    pub label: &'static str,
    /// Display annotation only; it does not affect the rates.
    pub target: f64,
    pub rows: Vec<SeriesRow>,
}

impl SevereRateSeries {
    /// Months whose rate exceeds the target.
    pub fn months_over_target(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.get("Rate (%)").is_some_and(|v| v > self.target))
            .map(|r| r.name.as_str())
            .collect()
    }
}

pub fn severe_rate_series<'a, I>(
    cases: I,
    indicator: QualityIndicator,
    target: f64,
) -> SevereRateSeries
where
    I: IntoIterator<Item = &'a Case>,
{
    let rows = monthly_rate(cases, "Rate (%)", |c| {
        indicator.value(c).is_some_and(|v| v >= SEVERE_THRESHOLD)
    });
    SevereRateSeries {
        indicator,
        label: indicator.label(),
        target,
        rows,
    }
}
