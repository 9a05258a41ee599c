mod backend;
mod errors;
mod manager;
mod timer;
mod types;


pub use backend::{HttpIdentityBackend, IdentityBackend};
pub use errors::{SessionError, ValidationErrors};
pub use manager::SessionManager;
pub use types::{RegistrationRequest, Session, SessionStatus, UserProfile};
