use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Patient record as returned by `/api/patients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub gender: String,
    #[serde(default)]
    pub risk_factors: BTreeMap<String, bool>,
    #[serde(default)]
    pub family_history: Vec<String>,
    #[serde(default)]
    pub surgical_history: Vec<String>,
    #[serde(default)]
    pub additional_notes: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Nested doctor records and anything else the client does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub risk_factors: BTreeMap<String, bool>,
    pub family_history: Vec<String>,
    pub surgical_history: Vec<String>,
    pub additional_notes: Vec<String>,
    pub consultant_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_resident_id: Option<i64>,
}

impl NewPatient {
    pub fn new(name: impl Into<String>, age: u32, gender: impl Into<String>, consultant_id: i64) -> Self {
        Self {
            name: name.into(),
            age,
            gender: gender.into(),
            risk_factors: BTreeMap::new(),
            family_history: Vec::new(),
            surgical_history: Vec::new(),
            additional_notes: Vec::new(),
            consultant_id,
            current_resident_id: None,
        }
    }
}

/// Partial update; unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_factors: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_history: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surgical_history: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_resident_id: Option<i64>,
}

/// One clinical-history entry of a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalHistory {
    pub id: i64,
    pub patient_id: i64,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_processed: Option<bool>,
    #[serde(default)]
    pub processing_status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewClinicalHistory {
    pub patient_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClinicalHistoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<String>,
}
