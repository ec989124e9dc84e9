use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// A closed enumeration whose members are identified by their exported label.
pub trait Labeled: Copy + PartialEq + 'static {
    /// Every member, in declaration order.
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    /// Exact (case-sensitive) label match.
    fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.label() == raw)
    }
}

/// Enumeration lookup with a silent fallback.
///
/// The trimmed raw text must equal the label of a member of `valid`;
/// absent or unrecognized values yield `fallback`.
pub fn lookup_or<E: Labeled>(raw: Option<&str>, valid: &[E], fallback: E) -> E {
    let Some(raw) = raw.map(str::trim) else {
        return fallback;
    };
    valid
        .iter()
        .copied()
        .find(|v| v.label() == raw)
        .unwrap_or(fallback)
}

macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl Labeled for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

labeled_enum! {
    pub enum Gender {
        Male => "Male",
        Female => "Female",
    }
}

labeled_enum! {
    pub enum PatientType {
        Existing => "EXISTING",
        New => "NEW",
    }
}

labeled_enum! {
    pub enum Payer {
        LocalInsurance => "Local Insurance",
        LocalSelfpay => "Local Selfpay",
        AmsContract => "AMS Contract",
        InterInsurance => "Inter Insurance",
    }
}

labeled_enum! {
    pub enum Nationality {
        Thai => "THAI",
        NonThai => "NON-THAI",
    }
}

labeled_enum! {
    pub enum TraumaType {
        TrafficAccident => "Traffic Accident",
        Fall => "Fall",
        SportsInjury => "Sports Injury",
        Assault => "Assault",
        Industrial => "Industrial",
        Other => "Other",
    }
}

labeled_enum! {
    /// Post-operative pain management method.
    pub enum PostOpPainMgmt {
        IvPca => "IV PCA",
        Epidural => "Epidural",
        NerveBlock => "Nerve Block",
        OralMeds => "Oral Meds",
        IvBolus => "IV Bolus",
    }
}

labeled_enum! {
    pub enum Specialty {
        Orthopedics => "Orthopedics",
        GeneralSurgery => "General Surgery",
        Neurosurgery => "Neurosurgery",
        Urology => "Urology",
        Obgyn => "OBGYN",
        Plastics => "Plastics",
    }
}

labeled_enum! {
    pub enum OperationType {
        Elective => "Elective OR",
        NonElective => "Non Elective OR",
        NonOperation => "Non operation",
    }
}

labeled_enum! {
    pub enum OrthoType {
        Trauma => "TRAUMA",
        NonTrauma => "NON TRAUMA",
    }
}

labeled_enum! {
    pub enum DrugGroup {
        Opioids => "OPIOIDS",
        NonOpioids => "NON-OPIOIDS",
        Adjuvants => "ADJUVANTS",
    }
}

labeled_enum! {
    pub enum AdverseEvent {
        NauseaVomiting => "Nausea/Vomiting",
        Sedation => "Sedation",
        Pruritus => "Pruritus",
        UrinaryRetention => "Urinary Retention",
        Dizziness => "Dizziness",
        Hypotension => "Hypotension (Severe)",
        RespiratoryDepression => "Resp. Depression",
        Hematoma => "Hematoma/Bleeding",
        NerveInjury => "Nerve Injury",
        Infection => "Infection",
        DuralPuncture => "Dural Puncture",
        MotorBlock => "Prolonged Motor Block",
        CatheterMigration => "Catheter Migration",
        LocalAnestheticToxicity => "LAST (Toxicity)",
        Anaphylaxis => "Anaphylaxis",
    }
}

impl AdverseEvent {
    /// Events reported under "severe complications"; everything else is a
    /// general side effect.
    pub fn is_severe(self) -> bool {
        matches!(
            self,
            AdverseEvent::Hypotension
                | AdverseEvent::RespiratoryDepression
                | AdverseEvent::Hematoma
                | AdverseEvent::NerveInjury
                | AdverseEvent::Anaphylaxis
        )
    }
}

/// Pain scores for the three post-operative follow-up windows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PainWindows {
    pub h0_24: Option<f64>,
    pub h24_48: Option<f64>,
    pub h48_72: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PainScores {
    pub rest: PainWindows,
    pub movement: PainWindows,
}

/// Frequency counts of pain >= 4 observations per window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIndicators {
    pub freq_rest_24h: Option<f64>,
    pub freq_rest_72h: Option<f64>,
    pub freq_movement_24h: Option<f64>,
    pub freq_movement_72h: Option<f64>,
}

/// Pain interference with daily activities, each on a 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PainInterference {
    pub general_activity: f64,
    pub mood: f64,
    pub walking_ability: f64,
    pub normal_work: f64,
    pub relations: f64,
    pub sleep: f64,
    pub enjoyment: f64,
}

impl PainInterference {
    pub fn dimensions(&self) -> [(&'static str, f64); 7] {
        [
            ("General Activity", self.general_activity),
            ("Mood", self.mood),
            ("Walking Ability", self.walking_ability),
            ("Normal Work", self.normal_work),
            ("Relations", self.relations),
            ("Sleep", self.sleep),
            ("Enjoyment", self.enjoyment),
        ]
    }
}

/// One normalized clinical episode. Built once by the normalizer and only
/// read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    /// The 15th of the partition's month; only meaningful at month granularity.
    pub date: NaiveDate,
    pub patient_age: f64,
    pub patient_gender: Gender,
    pub patient_type: PatientType,
    pub payer: Payer,
    pub nationality: Nationality,
    pub trauma_type: TraumaType,
    pub post_op_pain_mgmt: PostOpPainMgmt,
    pub drug_groups: Vec<DrugGroup>,
    pub drug_group_category: String,
    pub opioids: Vec<String>,
    pub non_opioids: Vec<String>,
    pub adjuvants: Vec<String>,
    pub specialty: Specialty,
    pub operation_type: OperationType,
    pub ortho_type: OrthoType,
    pub pain_scores: PainScores,
    pub pain_score_discharge: Option<f64>,
    #[serde(rename = "painReduction50Percent")]
    pub pain_reduction_50_percent: bool,
    pub complications: bool,
    pub adverse_events: Vec<AdverseEvent>,
    pub quality_indicators: QualityIndicators,
    pub satisfaction_score: f64,
    pub proms_improvement: f64,
    pub pain_interference: PainInterference,
    pub patient_feedback: Option<String>,
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "-".to_string())
}

/// Flat, display-ready view of a case for `cases.csv` and table previews.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CaseRow {
    #[serde(rename = "ID")]
    #[tabled(rename = "ID")]
    pub id: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Patient")]
    #[tabled(rename = "Patient")]
    pub patient: String,
    #[serde(rename = "Nationality")]
    #[tabled(rename = "Nationality")]
    pub nationality: String,
    #[serde(rename = "Specialty")]
    #[tabled(rename = "Specialty")]
    pub specialty: String,
    #[serde(rename = "Operation")]
    #[tabled(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "OrthoType")]
    #[tabled(rename = "OrthoType")]
    pub ortho_type: String,
    #[serde(rename = "TraumaType")]
    #[tabled(rename = "TraumaType")]
    pub trauma_type: String,
    #[serde(rename = "PainMgmt")]
    #[tabled(rename = "PainMgmt")]
    pub pain_mgmt: String,
    #[serde(rename = "Pain0_24h")]
    #[tabled(rename = "Pain0_24h")]
    pub pain_rest_24h: String,
    #[serde(rename = "Discharge")]
    #[tabled(rename = "Discharge")]
    pub discharge: String,
    #[serde(rename = "AdverseEvents")]
    #[tabled(rename = "AdverseEvents")]
    pub adverse_events: String,
}

impl From<&Case> for CaseRow {
    fn from(c: &Case) -> Self {
        CaseRow {
            id: c.id.clone(),
            date: c.date.format("%Y-%m-%d").to_string(),
            patient: format!("{}, {}", c.patient_gender, c.patient_age),
            nationality: c.nationality.to_string(),
            specialty: c.specialty.to_string(),
            operation: c.operation_type.to_string(),
            ortho_type: c.ortho_type.to_string(),
            trauma_type: c.trauma_type.to_string(),
            pain_mgmt: c.post_op_pain_mgmt.to_string(),
            pain_rest_24h: opt(c.pain_scores.rest.h0_24),
            discharge: opt(c.pain_score_discharge),
            adverse_events: c
                .adverse_events
                .iter()
                .map(|e| e.label())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// One entry of a categorical breakdown.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CategoryCount {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: usize,
}

/// One entry of a free-text token ranking; `percent` is a share of all tokens.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TokenFrequency {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: usize,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent")]
    pub percent: f64,
}
