//! Case builders shared by the unit tests.

use chrono::NaiveDate;

use crate::types::{
    Case, Gender, Nationality, OperationType, OrthoType, PainInterference, PainScores,
    PatientType, Payer, PostOpPainMgmt, QualityIndicators, Specialty, TraumaType,
};

/// A case with every optional measurement missing, dated in the given
/// (year, zero-based month).
pub fn case_in(id: &str, year: i32, month: u32) -> Case {
    Case {
        id: id.to_string(),
        date: NaiveDate::from_ymd_opt(year, month + 1, 15).unwrap(),
        patient_age: 50.0,
        patient_gender: Gender::Female,
        patient_type: PatientType::New,
        payer: Payer::LocalSelfpay,
        nationality: Nationality::Thai,
        trauma_type: TraumaType::Other,
        post_op_pain_mgmt: PostOpPainMgmt::IvPca,
        drug_groups: Vec::new(),
        drug_group_category: "Unknown".to_string(),
        opioids: Vec::new(),
        non_opioids: Vec::new(),
        adjuvants: Vec::new(),
        specialty: Specialty::Orthopedics,
        operation_type: OperationType::NonElective,
        ortho_type: OrthoType::NonTrauma,
        pain_scores: PainScores::default(),
        pain_score_discharge: None,
        pain_reduction_50_percent: false,
        complications: false,
        adverse_events: Vec::new(),
        quality_indicators: QualityIndicators::default(),
        satisfaction_score: 5.0,
        proms_improvement: 0.0,
        pain_interference: PainInterference::default(),
        patient_feedback: None,
    }
}

pub fn case(id: &str) -> Case {
    case_in(id, 2025, 0)
}
