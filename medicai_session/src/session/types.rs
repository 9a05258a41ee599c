use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Validating,
    Authenticated,
    Refreshing,
}

/// Snapshot of the authenticated-user state. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub status: SessionStatus,
}

impl Session {
    pub(crate) fn anonymous() -> Self {
        Self {
            user: None,
            status: SessionStatus::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Authenticated | SessionStatus::Refreshing
        )
    }
}

/// Identity record returned by `/auth/me` and `/auth/register`.
///
/// Fields the client does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub doctor_type: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Account data submitted to `/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub medical_license_number: String,
    pub qualifications: String,
    pub specialty: String,
    pub subspecialty: Option<String>,
    pub years_of_experience: u32,
    pub doctor_type: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub contact_number: String,
    pub emergency_contact: Option<String>,
    pub department: String,
    pub office_location: Option<String>,
    pub graduation_date: Option<NaiveDate>,
    pub join_date: NaiveDate,
    pub consultation_hours: Option<String>,
    pub bio: Option<String>,
    pub research_interests: Option<String>,
    pub publications: Option<String>,
    pub certifications: Option<String>,
    pub rotation_schedule: Option<String>,
}

impl RegistrationRequest {
    /// A resident registration with the defaults the registration form applies.
    #[allow(clippy::too_many_arguments)]
    pub fn resident(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        medical_license_number: impl Into<String>,
        date_of_birth: NaiveDate,
        contact_number: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            medical_license_number: medical_license_number.into(),
            qualifications: String::new(),
            specialty: "General Practice".to_string(),
            subspecialty: None,
            years_of_experience: 0,
            doctor_type: "resident".to_string(),
            date_of_birth,
            gender: "male".to_string(),
            contact_number: contact_number.into(),
            emergency_contact: None,
            department: department.into(),
            office_location: None,
            graduation_date: None,
            join_date: Utc::now().date_naive(),
            consultation_hours: None,
            bio: None,
            research_interests: None,
            publications: None,
            certifications: None,
            rotation_schedule: None,
        }
    }
}

/// Body of `/auth/token` and `/auth/refresh` responses.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: Option<String>,
    #[allow(dead_code)]
    pub(crate) token_type: Option<String>,
    pub(crate) refresh_token: Option<String>,
}
