use dotenvy::dotenv;
use medicai_session::{
    CredentialStore, PatientsApi, RequestGateway, SessionConfig, SessionManager, SessionStatus,
};

mod logging;
use logging::init_tracing;

/// Restore or create a session, show who is signed in and how many patients they
/// can see, then keep the session renewed until Ctrl-C.
///
/// `--logout` clears the stored credential and exits.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing("demo_session");

    let config = SessionConfig::from_env();
    let store = CredentialStore::from_env().await?;
    let session = SessionManager::from_config(&config, store)?;
    let gateway = RequestGateway::new(&config, session.clone())?;

    if std::env::args().any(|arg| arg == "--logout") {
        session.logout().await?;
        println!("Logged out");
        return Ok(());
    }

    let restored = session.validate_on_startup().await;
    let user = match restored.user {
        Some(user) if restored.is_authenticated() => {
            tracing::info!("Restored stored session");
            user
        }
        _ => {
            let username = std::env::var("MEDICAI_USERNAME")
                .map_err(|_| "No stored session; set MEDICAI_USERNAME and MEDICAI_PASSWORD")?;
            let password = std::env::var("MEDICAI_PASSWORD")
                .map_err(|_| "MEDICAI_PASSWORD is not set")?;
            session.login(&username, &password).await?
        }
    };

    println!("Signed in as {} <{}>", user.full_name(), user.email);
    if let Some(specialty) = &user.specialty {
        println!("Specialty: {specialty}");
    }

    let patients = PatientsApi::new(gateway).list().await?;
    println!("{} patient(s) on record", patients.len());

    let mut changes = session.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let status = changes.borrow_and_update().status;
            tracing::info!("Session status: {:?}", status);
            if status == SessionStatus::Anonymous {
                println!("Session ended; please log in again");
            }
        }
    });

    println!("Keeping the session alive; press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, stored session kept for next start");
    Ok(())
}
