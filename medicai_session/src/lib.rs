//! medicai-session - Session lifecycle and authenticated requests for the Medicai API
//!
//! The [`SessionManager`] owns the credential and the authenticated-user state:
//! login, startup validation, silent renewal ahead of token expiry, single-flight
//! refresh and logout. The [`RequestGateway`] sends API calls with the current
//! bearer token and retries once through a coordinated refresh on a 401.

mod api;
mod config;
mod gateway;
mod session;
mod storage;
mod token;
mod utils;

pub use config::{MEDICAI_API_URL, SessionConfig};

pub use storage::{Credential, CredentialStore, KeyValueStore, StorageError};

pub use token::{Renewal, TokenClock, TokenError};

pub use session::{
    HttpIdentityBackend, IdentityBackend, RegistrationRequest, Session, SessionError,
    SessionManager, SessionStatus, UserProfile, ValidationErrors,
};

pub use gateway::{ApiRequest, GatewayError, RequestGateway};

pub use api::{
    ClinicalHistory, ClinicalHistoryApi, ClinicalHistoryUpdate, NewClinicalHistory, NewPatient,
    Patient, PatientUpdate, PatientsApi,
};
