use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::{
    category_breakdown, category_trend, group_by_month, monthly_average, monthly_rate,
    null_tolerant_average, rate, severe_rate_series, token_frequency, CategoryTrend,
    NullTolerantAverage, QualityIndicator, Rate, SeriesRow, SevereRateSeries,
};
use crate::filter::CaseField;
use crate::types::{
    AdverseEvent, Case, CategoryCount, DrugGroup, Gender, Labeled, OperationType, OrthoType,
    PainInterference, PainWindows, Specialty, TokenFrequency,
};
use crate::util::round_to;

/// Headline numbers of the filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_cases: usize,
    pub avg_rest_pain_24h: NullTolerantAverage,
    pub complication_rate: Rate,
    pub success_rate: Rate,
}

pub fn overview(cases: &[Case]) -> Overview {
    let mut avg = null_tolerant_average(cases, |c| c.pain_scores.rest.h0_24);
    avg.average = round_to(avg.average, 2);
    Overview {
        total_cases: cases.len(),
        avg_rest_pain_24h: avg,
        complication_rate: rate(cases, |c| c.complications),
        success_rate: rate(cases, |c| c.pain_reduction_50_percent),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PainMode {
    Rest,
    Movement,
}

impl PainMode {
    fn windows(self, case: &Case) -> &PainWindows {
        match self {
            PainMode::Rest => &case.pain_scores.rest,
            PainMode::Movement => &case.pain_scores.movement,
        }
    }
}

/// Monthly 24h/48h/72h averages for rest or movement pain, optionally
/// scoped to one operation type.
pub fn pain_trend(
    cases: &[Case],
    mode: PainMode,
    operation: Option<OperationType>,
) -> Vec<SeriesRow> {
    let scoped = cases
        .iter()
        .filter(|c| operation.map_or(true, |op| c.operation_type == op));
    group_by_month(scoped)
        .into_iter()
        .map(|group| {
            let mut row = SeriesRow::new(group.name());
            let members = || group.cases.iter().copied();
            row.push_average("24h", null_tolerant_average(members(), |c| mode.windows(c).h0_24))
                .push_average("48h", null_tolerant_average(members(), |c| mode.windows(c).h24_48))
                .push_average("72h", null_tolerant_average(members(), |c| mode.windows(c).h48_72));
            row
        })
        .collect()
}

pub fn pain_reduction_trend(cases: &[Case]) -> Vec<SeriesRow> {
    monthly_rate(cases, "Success Rate (%)", |c| c.pain_reduction_50_percent)
}

pub fn satisfaction_trend(cases: &[Case]) -> Vec<SeriesRow> {
    monthly_average(cases, "Satisfaction Score", |c| Some(c.satisfaction_score))
}

pub fn proms_trend(cases: &[Case]) -> Vec<SeriesRow> {
    monthly_average(cases, "PROMs Improvement", |c| Some(c.proms_improvement))
}

pub fn discharge_pain_trend(cases: &[Case]) -> Vec<SeriesRow> {
    monthly_average(cases, "Discharge Pain", |c| c.pain_score_discharge)
}

// ── Distributions ─────────────────────────────────────────────────────────────

/// Count every member of a closed enumeration, zero counts included, in
/// declaration order.
pub fn enum_distribution<E, F>(cases: &[Case], field: F) -> Vec<CategoryCount>
where
    E: Labeled,
    F: Fn(&Case) -> E,
{
    let mut counts = vec![0usize; E::ALL.len()];
    for case in cases {
        let value = field(case);
        if let Some(i) = E::ALL.iter().position(|m| *m == value) {
            counts[i] += 1;
        }
    }
    E::ALL
        .iter()
        .zip(counts)
        .map(|(m, value)| CategoryCount {
            name: m.label().to_string(),
            value,
        })
        .collect()
}

/// How many cases list each drug group; a case can count toward several.
pub fn drug_group_summary(cases: &[Case]) -> Vec<CategoryCount> {
    DrugGroup::ALL
        .iter()
        .map(|g| CategoryCount {
            name: g.label().to_string(),
            value: cases
                .iter()
                .map(|c| c.drug_groups.iter().filter(|d| *d == g).count())
                .sum(),
        })
        .collect()
}

pub fn field_breakdown(cases: &[Case], field: CaseField) -> Vec<CategoryCount> {
    category_breakdown(cases, move |c| field.value_of(c))
}

pub fn field_trend(cases: &[Case], field: CaseField) -> CategoryTrend {
    category_trend(cases, move |c| field.value_of(c))
}

pub const AGE_GROUPS: [&str; 4] = ["<30", "30-49", "50-69", "70+"];

fn age_group(age: f64) -> &'static str {
    if age < 30.0 {
        AGE_GROUPS[0]
    } else if age < 50.0 {
        AGE_GROUPS[1]
    } else if age < 70.0 {
        AGE_GROUPS[2]
    } else {
        AGE_GROUPS[3]
    }
}

/// Age bands in fixed order; bands with no cases are left out.
pub fn age_groups(cases: &[Case]) -> Vec<CategoryCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for case in cases {
        *counts.entry(age_group(case.patient_age)).or_default() += 1;
    }
    AGE_GROUPS
        .iter()
        .filter_map(|g| {
            counts.get(g).map(|&value| CategoryCount {
                name: g.to_string(),
                value,
            })
        })
        .collect()
}

/// Adverse events of one class, most frequent first.
pub fn safety_distribution(cases: &[Case], severe: bool) -> Vec<CategoryCount> {
    let mut counts = vec![0usize; AdverseEvent::ALL.len()];
    for event in cases.iter().flat_map(|c| c.adverse_events.iter()) {
        if event.is_severe() != severe {
            continue;
        }
        if let Some(i) = AdverseEvent::ALL.iter().position(|e| e == event) {
            counts[i] += 1;
        }
    }
    let mut out: Vec<CategoryCount> = AdverseEvent::ALL
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(e, value)| CategoryCount {
            name: e.label().to_string(),
            value,
        })
        .collect();
    out.sort_by(|a, b| b.value.cmp(&a.value));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterferenceScore {
    pub subject: &'static str,
    #[serde(rename = "Avg Score")]
    pub avg_score: f64,
}

/// Per-dimension mean over every case in view. The divisor is the case
/// count, never below one.
pub fn pain_interference(cases: &[Case]) -> Vec<InterferenceScore> {
    let divisor = cases.len().max(1) as f64;
    let mut sums = [0.0f64; 7];
    for case in cases {
        for (sum, (_, v)) in sums.iter_mut().zip(case.pain_interference.dimensions()) {
            *sum += v;
        }
    }
    PainInterference::default()
        .dimensions()
        .into_iter()
        .zip(sums)
        .map(|((subject, _), sum)| InterferenceScore {
            subject,
            avg_score: round_to(sum / divisor, 2),
        })
        .collect()
}

/// Monthly case counts per specialty, every specialty present in every row.
pub fn specialty_monthly(cases: &[Case]) -> Vec<SeriesRow> {
    group_by_month(cases)
        .into_iter()
        .map(|group| {
            let mut row = SeriesRow::new(group.name());
            for s in Specialty::ALL {
                let n = group.cases.iter().filter(|c| c.specialty == *s).count();
                row.push(s.label(), n as f64);
            }
            row
        })
        .collect()
}

// ── Dashboard bundle ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRankings {
    pub opioids: Vec<TokenFrequency>,
    pub non_opioids: Vec<TokenFrequency>,
    pub adjuvants: Vec<TokenFrequency>,
}

impl MedicationRankings {
    pub fn build(cases: &[Case]) -> Self {
        MedicationRankings {
            opioids: token_frequency(cases, |c| c.opioids.as_slice()),
            non_opioids: token_frequency(cases, |c| c.non_opioids.as_slice()),
            adjuvants: token_frequency(cases, |c| c.adjuvants.as_slice()),
        }
    }

    /// (class, ranking) pairs in display order.
    pub fn classes(&self) -> [(&'static str, &[TokenFrequency]); 3] {
        [
            ("Opioids", self.opioids.as_slice()),
            ("Non-Opioids", self.non_opioids.as_slice()),
            ("Adjuvants", self.adjuvants.as_slice()),
        ]
    }
}

/// Breakdowns with an overflow bucket, keyed by field name.
pub const BREAKDOWN_FIELDS: [CaseField; 5] = [
    CaseField::Payer,
    CaseField::TraumaType,
    CaseField::Specialty,
    CaseField::Nationality,
    CaseField::DrugGroupCategory,
];

/// Fields with a monthly stacked trend.
pub const TREND_FIELDS: [CaseField; 7] = [
    CaseField::Payer,
    CaseField::TraumaType,
    CaseField::Specialty,
    CaseField::Nationality,
    CaseField::DrugGroupCategory,
    CaseField::PatientGender,
    CaseField::PatientType,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedBreakdown {
    pub field: CaseField,
    pub entries: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedTrend {
    pub field: CaseField,
    #[serde(flatten)]
    pub trend: CategoryTrend,
}

/// Every dashboard report for one filtered view.
///
/// `period` views (KPIs, distributions, rankings) read the selected month;
/// `trend` views read the whole selected year so months can be compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub overview: Overview,
    pub rest_pain_trend: Vec<SeriesRow>,
    pub movement_pain_trend: Vec<SeriesRow>,
    pub pain_reduction_trend: Vec<SeriesRow>,
    pub satisfaction_trend: Vec<SeriesRow>,
    pub proms_trend: Vec<SeriesRow>,
    pub discharge_pain_trend: Vec<SeriesRow>,
    pub operation_types: Vec<CategoryCount>,
    pub ortho_types: Vec<CategoryCount>,
    pub genders: Vec<CategoryCount>,
    pub drug_groups: Vec<CategoryCount>,
    pub age_groups: Vec<CategoryCount>,
    pub breakdowns: Vec<NamedBreakdown>,
    pub trends: Vec<NamedTrend>,
    pub medications: MedicationRankings,
    pub severe_pain: Vec<SevereRateSeries>,
    pub general_side_effects: Vec<CategoryCount>,
    pub severe_complications: Vec<CategoryCount>,
    pub pain_interference: Vec<InterferenceScore>,
    pub specialty_monthly: Vec<SeriesRow>,
}

impl Dashboard {
    pub fn build(period: &[Case], trend: &[Case]) -> Self {
        Dashboard {
            overview: overview(period),
            rest_pain_trend: pain_trend(trend, PainMode::Rest, None),
            movement_pain_trend: pain_trend(trend, PainMode::Movement, None),
            pain_reduction_trend: pain_reduction_trend(trend),
            satisfaction_trend: satisfaction_trend(trend),
            proms_trend: proms_trend(trend),
            discharge_pain_trend: discharge_pain_trend(trend),
            operation_types: enum_distribution::<OperationType, _>(period, |c| c.operation_type),
            ortho_types: enum_distribution::<OrthoType, _>(period, |c| c.ortho_type),
            genders: enum_distribution::<Gender, _>(period, |c| c.patient_gender),
            drug_groups: drug_group_summary(period),
            age_groups: age_groups(period),
            breakdowns: BREAKDOWN_FIELDS
                .iter()
                .map(|&field| NamedBreakdown {
                    field,
                    entries: field_breakdown(period, field),
                })
                .collect(),
            trends: TREND_FIELDS
                .iter()
                .map(|&field| NamedTrend {
                    field,
                    trend: field_trend(trend, field),
                })
                .collect(),
            medications: MedicationRankings::build(period),
            severe_pain: QualityIndicator::ALL
                .iter()
                .map(|&qi| severe_rate_series(trend, qi, qi.default_target()))
                .collect(),
            general_side_effects: safety_distribution(period, false),
            severe_complications: safety_distribution(period, true),
            pain_interference: pain_interference(period),
            specialty_monthly: specialty_monthly(trend),
        }
    }

    pub fn breakdown(&self, field: CaseField) -> Option<&[CategoryCount]> {
        self.breakdowns
            .iter()
            .find(|b| b.field == field)
            .map(|b| b.entries.as_slice())
    }
}
