//! Record normalization: one positional spreadsheet row plus its resolved
//! partition becomes one [`Case`], or the row is dropped.
//!
//! Only the row-acceptance predicate can drop a row. Every other malformed
//! cell degrades to `None`, an empty list, or the field's fallback value.

use chrono::NaiveDate;

use crate::partition::ResolvedPartition;
use crate::types::{
    lookup_or, AdverseEvent, Case, DrugGroup, Gender, Labeled, Nationality, OperationType,
    OrthoType, PainInterference, PainScores, PainWindows, PatientType, Payer, PostOpPainMgmt,
    QualityIndicators, Specialty, TraumaType,
};
use crate::util::{parse_delimited_list, parse_flag, parse_nullable_number};
use crate::workbook::{Cell, Column};

/// Source column of every field the normalizer reads.
pub mod col {
    use crate::workbook::Column;

    pub const ID: Column = Column::from_letters("A");
    pub const AGE: Column = Column::from_letters("E");
    pub const PATIENT_TYPE: Column = Column::from_letters("F");
    pub const PAYER: Column = Column::from_letters("G");
    pub const GENDER: Column = Column::from_letters("H");
    pub const NATIONALITY: Column = Column::from_letters("I");
    pub const POST_OP_PAIN_MGMT: Column = Column::from_letters("J");
    pub const SPECIALTY: Column = Column::from_letters("M");
    pub const TRAUMA_TYPE: Column = Column::from_letters("O");
    /// Day-0 rest pain, the baseline of the 50% reduction flag.
    pub const BASELINE_REST: Column = Column::from_letters("R");
    pub const REST_24H: Column = Column::from_letters("T");
    pub const MOVE_24H: Column = Column::from_letters("U");
    pub const QI_REST_24H: Column = Column::from_letters("V");
    pub const REST_48H: Column = Column::from_letters("W");
    pub const MOVE_48H: Column = Column::from_letters("X");
    pub const REST_72H: Column = Column::from_letters("Y");
    pub const MOVE_72H: Column = Column::from_letters("Z");
    pub const QI_REST_72H: Column = Column::from_letters("AA");
    pub const OPIOIDS: Column = Column::from_letters("AB");
    pub const NON_OPIOIDS: Column = Column::from_letters("AC");
    pub const ADJUVANTS: Column = Column::from_letters("AD");
    pub const DRUG_GROUPS: Column = Column::from_letters("AE");
    pub const QI_MOVE_72H: Column = Column::from_letters("AF");
    pub const DISCHARGE_PAIN: Column = Column::from_letters("AH");
    pub const SATISFACTION: Column = Column::from_letters("AW");
    pub const PROMS: Column = Column::from_letters("AX");
    pub const FEEDBACK: Column = Column::from_letters("AY");
    // The movement quality indicator for 24h shares its column with the
    // 48-72h movement score in the export.
    pub const QI_MOVE_24H: Column = MOVE_72H;
}

/// Adverse-event marker columns, in the order events are appended.
pub const ADVERSE_EVENT_COLUMNS: [(Column, AdverseEvent); 7] = [
    (Column::from_letters("AO"), AdverseEvent::NauseaVomiting),
    (Column::from_letters("AP"), AdverseEvent::Sedation),
    (Column::from_letters("AQ"), AdverseEvent::Pruritus),
    (Column::from_letters("AR"), AdverseEvent::UrinaryRetention),
    (Column::from_letters("AS"), AdverseEvent::Dizziness),
    (Column::from_letters("AT"), AdverseEvent::Hypotension),
    (Column::from_letters("AU"), AdverseEvent::RespiratoryDepression),
];

/// Literal header values that mark a re-read header row in the ID column.
const HEADER_SENTINELS: [&str; 2] = ["ID", "HN"];

/// A raw row viewed through the column table. Borrows the sheet's cells.
#[derive(Debug, Clone)]
pub struct RawRow<'a> {
    pub id: Option<&'a Cell>,
    pub age: Option<&'a Cell>,
    pub patient_type: Option<&'a Cell>,
    pub payer: Option<&'a Cell>,
    pub gender: Option<&'a Cell>,
    pub nationality: Option<&'a Cell>,
    pub post_op_pain_mgmt: Option<&'a Cell>,
    pub specialty: Option<&'a Cell>,
    pub trauma_type: Option<&'a Cell>,
    pub baseline_rest: Option<&'a Cell>,
    pub rest: [Option<&'a Cell>; 3],
    pub movement: [Option<&'a Cell>; 3],
    pub qi_rest_24h: Option<&'a Cell>,
    pub qi_rest_72h: Option<&'a Cell>,
    pub qi_move_24h: Option<&'a Cell>,
    pub qi_move_72h: Option<&'a Cell>,
    pub opioids: Option<&'a Cell>,
    pub non_opioids: Option<&'a Cell>,
    pub adjuvants: Option<&'a Cell>,
    pub drug_groups: Option<&'a Cell>,
    pub discharge_pain: Option<&'a Cell>,
    pub adverse_events: [Option<&'a Cell>; 7],
    pub satisfaction: Option<&'a Cell>,
    pub proms: Option<&'a Cell>,
    pub feedback: Option<&'a Cell>,
    /// Every cell in column order, for the keyword scan.
    pub cells: &'a [Cell],
}

impl<'a> RawRow<'a> {
    pub fn from_cells(cells: &'a [Cell]) -> Self {
        // Blank cells read the same as missing ones.
        let at = |c: Column| cells.get(c.index()).filter(|cell| !cell.is_empty());
        RawRow {
            id: at(col::ID),
            age: at(col::AGE),
            patient_type: at(col::PATIENT_TYPE),
            payer: at(col::PAYER),
            gender: at(col::GENDER),
            nationality: at(col::NATIONALITY),
            post_op_pain_mgmt: at(col::POST_OP_PAIN_MGMT),
            specialty: at(col::SPECIALTY),
            trauma_type: at(col::TRAUMA_TYPE),
            baseline_rest: at(col::BASELINE_REST),
            rest: [at(col::REST_24H), at(col::REST_48H), at(col::REST_72H)],
            movement: [at(col::MOVE_24H), at(col::MOVE_48H), at(col::MOVE_72H)],
            qi_rest_24h: at(col::QI_REST_24H),
            qi_rest_72h: at(col::QI_REST_72H),
            qi_move_24h: at(col::QI_MOVE_24H),
            qi_move_72h: at(col::QI_MOVE_72H),
            opioids: at(col::OPIOIDS),
            non_opioids: at(col::NON_OPIOIDS),
            adjuvants: at(col::ADJUVANTS),
            drug_groups: at(col::DRUG_GROUPS),
            discharge_pain: at(col::DISCHARGE_PAIN),
            adverse_events: ADVERSE_EVENT_COLUMNS.map(|(c, _)| at(c)),
            satisfaction: at(col::SATISFACTION),
            proms: at(col::PROMS),
            feedback: at(col::FEEDBACK),
            cells,
        }
    }

    /// Row-acceptance predicate: a real identity value and a numeric age.
    pub fn is_accepted(&self) -> bool {
        let has_id = self.id.is_some_and(|c| {
            let text = c.text();
            let id = text.trim();
            !id.is_empty() && !HEADER_SENTINELS.contains(&id)
        });
        has_id && parse_nullable_number(self.age).is_some()
    }
}

/// The synthetic date of every case in a partition: the 15th of its month.
pub fn anchor_date(partition: ResolvedPartition) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(partition.year, partition.month + 1, 15)
}

/// Normalize one positional row. Returns `None` when the row fails the
/// acceptance predicate.
pub fn normalize_row(cells: &[Cell], partition: ResolvedPartition) -> Option<Case> {
    let row = RawRow::from_cells(cells);
    if !row.is_accepted() {
        return None;
    }
    let date = anchor_date(partition)?;
    let id = row.id?.text().trim().to_string();
    let patient_age = parse_nullable_number(row.age)?;

    let text_of = |cell: Option<&Cell>| cell.map(|c| c.text().trim().to_uppercase());
    let lookup_text = |cell: Option<&Cell>| cell.map(|c| c.text().into_owned());

    let patient_gender = if text_of(row.gender).is_some_and(|s| s.starts_with('M')) {
        Gender::Male
    } else {
        Gender::Female
    };
    let patient_type = if text_of(row.patient_type).is_some_and(|s| s.contains("EXISTING")) {
        PatientType::Existing
    } else {
        PatientType::New
    };
    let nationality = if text_of(row.nationality).is_some_and(|s| s.contains("THAI")) {
        Nationality::Thai
    } else {
        Nationality::NonThai
    };

    let payer = lookup_or(lookup_text(row.payer).as_deref(), Payer::ALL, Payer::LocalSelfpay);
    let trauma_type = lookup_or(
        lookup_text(row.trauma_type).as_deref(),
        TraumaType::ALL,
        TraumaType::Other,
    );
    let post_op_pain_mgmt = lookup_or(
        lookup_text(row.post_op_pain_mgmt).as_deref(),
        PostOpPainMgmt::ALL,
        PostOpPainMgmt::IvPca,
    );
    let specialty = lookup_or(
        lookup_text(row.specialty).as_deref(),
        Specialty::ALL,
        Specialty::Orthopedics,
    );

    let drug_groups: Vec<DrugGroup> = parse_delimited_list(row.drug_groups)
        .iter()
        .filter_map(|token| DrugGroup::from_label(token))
        .collect();
    let drug_group_category = row
        .drug_groups
        .map(|c| c.text().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let adverse_events: Vec<AdverseEvent> = row
        .adverse_events
        .iter()
        .zip(ADVERSE_EVENT_COLUMNS.iter())
        .filter(|(cell, _)| parse_flag(**cell))
        .map(|(_, (_, event))| *event)
        .collect();

    let (operation_type, ortho_type) = scan_procedure_keywords(row.cells);

    let windows = |cells: &[Option<&Cell>; 3]| PainWindows {
        h0_24: parse_nullable_number(cells[0]),
        h24_48: parse_nullable_number(cells[1]),
        h48_72: parse_nullable_number(cells[2]),
    };
    let pain_scores = PainScores {
        rest: windows(&row.rest),
        movement: windows(&row.movement),
    };

    let pain_reduction_50_percent = halved_from_baseline(
        parse_nullable_number(row.baseline_rest),
        pain_scores.rest.h0_24,
    );

    let quality_indicators = QualityIndicators {
        freq_rest_24h: parse_nullable_number(row.qi_rest_24h),
        freq_rest_72h: parse_nullable_number(row.qi_rest_72h),
        freq_movement_24h: parse_nullable_number(row.qi_move_24h),
        freq_movement_72h: parse_nullable_number(row.qi_move_72h),
    };

    // A zero satisfaction score is outside the 1-5 scale and reads as unanswered.
    let satisfaction_score = parse_nullable_number(row.satisfaction)
        .filter(|v| *v != 0.0)
        .unwrap_or(5.0);
    let proms_improvement = parse_nullable_number(row.proms).unwrap_or(0.0);

    let patient_feedback = row
        .feedback
        .map(|c| c.text().trim().to_string())
        .filter(|s| !s.is_empty());

    Some(Case {
        id,
        date,
        patient_age,
        patient_gender,
        patient_type,
        payer,
        nationality,
        trauma_type,
        post_op_pain_mgmt,
        drug_groups,
        drug_group_category,
        opioids: parse_delimited_list(row.opioids),
        non_opioids: parse_delimited_list(row.non_opioids),
        adjuvants: parse_delimited_list(row.adjuvants),
        specialty,
        operation_type,
        ortho_type,
        pain_scores,
        pain_score_discharge: parse_nullable_number(row.discharge_pain),
        pain_reduction_50_percent,
        complications: !adverse_events.is_empty(),
        adverse_events,
        quality_indicators,
        satisfaction_score,
        proms_improvement,
        pain_interference: PainInterference::default(),
        patient_feedback,
    })
}

/// Scan every cell, in column order, for procedure keywords. The last
/// matching cell wins for each of the two attributes.
pub fn scan_procedure_keywords(cells: &[Cell]) -> (OperationType, OrthoType) {
    let mut operation = OperationType::NonElective;
    let mut ortho = OrthoType::NonTrauma;
    for cell in cells {
        let text = cell.text().to_uppercase();
        if text.contains("NON OPERATION") {
            operation = OperationType::NonOperation;
        } else if text.contains("NON ELECTIVE") {
            operation = OperationType::NonElective;
        } else if text.contains("ELECTIVE") {
            operation = OperationType::Elective;
        }

        if text.contains("NON TRAUMA") {
            ortho = OrthoType::NonTrauma;
        } else if text.contains("TRAUMA") {
            ortho = OrthoType::Trauma;
        }
    }
    (operation, ortho)
}

/// True iff both scores are present, the baseline is positive, and the
/// follow-up is at most half of it.
pub fn halved_from_baseline(baseline: Option<f64>, follow_up: Option<f64>) -> bool {
    match (baseline, follow_up) {
        (Some(base), Some(next)) if base > 0.0 => next <= base * 0.5,
        _ => false,
    }
}
