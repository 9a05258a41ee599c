mod clinical_history;
mod patients;
mod types;

pub use clinical_history::ClinicalHistoryApi;
pub use patients::PatientsApi;
pub use types::{
    ClinicalHistory, ClinicalHistoryUpdate, NewClinicalHistory, NewPatient, Patient, PatientUpdate,
};
