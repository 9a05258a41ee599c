//! Axum-based mock of the Medicai identity and records API.
//!
//! Each test starts its own server on an ephemeral port, so tests do not share
//! state and need no fixed port.

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::fixtures::{DOCTOR_EMAIL, DOCTOR_PASSWORD};

const DOCTOR_ID: i64 = 1;

#[derive(Clone)]
pub struct MockState {
    /// Tokens accepted on `/auth/me` and `/api/*`.
    valid_tokens: Arc<Mutex<HashSet<String>>>,
    /// Every token ever issued; `/auth/refresh` accepts any of them.
    issued_tokens: Arc<Mutex<HashSet<String>>>,
    serial: Arc<AtomicU64>,
    next_id: Arc<AtomicI64>,
    pub token_lifetime_secs: Arc<AtomicI64>,
    pub refresh_ok: Arc<AtomicBool>,
    /// Reject every `/api/*` call regardless of token.
    pub reject_api: Arc<AtomicBool>,
    pub refresh_delay_ms: Arc<AtomicU64>,
    pub token_calls: Arc<AtomicUsize>,
    pub me_calls: Arc<AtomicUsize>,
    pub refresh_calls: Arc<AtomicUsize>,
    pub api_calls: Arc<AtomicUsize>,
    pub unauthorized_api_calls: Arc<AtomicUsize>,
    registered: Arc<Mutex<HashSet<String>>>,
    patients: Arc<Mutex<BTreeMap<i64, Value>>>,
    histories: Arc<Mutex<BTreeMap<i64, Value>>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            valid_tokens: Arc::default(),
            issued_tokens: Arc::default(),
            serial: Arc::default(),
            next_id: Arc::new(AtomicI64::new(100)),
            token_lifetime_secs: Arc::new(AtomicI64::new(3600)),
            refresh_ok: Arc::new(AtomicBool::new(true)),
            reject_api: Arc::default(),
            refresh_delay_ms: Arc::default(),
            token_calls: Arc::default(),
            me_calls: Arc::default(),
            refresh_calls: Arc::default(),
            api_calls: Arc::default(),
            unauthorized_api_calls: Arc::default(),
            registered: Arc::new(Mutex::new(HashSet::from([DOCTOR_EMAIL.to_string()]))),
            patients: Arc::default(),
            histories: Arc::default(),
        }
    }
}

impl MockState {
    fn issue_token(&self) -> String {
        let jti = self.serial.fetch_add(1, Ordering::SeqCst);
        let lifetime = self.token_lifetime_secs.load(Ordering::SeqCst);
        let exp = Utc::now() + ChronoDuration::seconds(lifetime);
        let token = encode(
            &Header::default(),
            &json!({ "sub": DOCTOR_ID.to_string(), "exp": exp.timestamp(), "jti": jti }),
            &EncodingKey::from_secret(b"mock-backend-secret"),
        )
        .expect("encoding mock token");

        self.valid_tokens.lock().unwrap().insert(token.clone());
        self.issued_tokens.lock().unwrap().insert(token.clone());
        token
    }

    /// Make every token issued so far fail with 401, as a server-side expiry would.
    pub fn expire_access_tokens(&self) {
        self.valid_tokens.lock().unwrap().clear();
    }

    fn is_valid(&self, token: &str) -> bool {
        self.valid_tokens.lock().unwrap().contains(token)
    }

    fn was_issued(&self, token: &str) -> bool {
        self.issued_tokens.lock().unwrap().contains(token)
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert_patient(&self, name: &str) -> i64 {
        let id = self.next_id();
        self.patients.lock().unwrap().insert(id, patient_body(id, &json!({ "name": name })));
        id
    }

    pub fn patient_count(&self) -> usize {
        self.patients.lock().unwrap().len()
    }
}

pub struct MockApiServer {
    pub base_url: String,
    pub state: MockState,
    handle: JoinHandle<()>,
}

impl MockApiServer {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("binding mock server");
        let addr = listener.local_addr().expect("mock server address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }
}

impl Drop for MockApiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/auth/token", post(token))
        .route("/auth/me", get(me))
        .route("/auth/refresh", post(refresh))
        .route("/auth/register", post(register))
        .route("/api/patients", get(list_patients).post(create_patient))
        .route(
            "/api/patients/{id}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/api/clinical-histories", post(create_history))
        .route(
            "/api/clinical-histories/{id}",
            get(list_histories).put(update_history).delete(delete_history),
        )
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn doctor_profile(id: i64, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "first_name": "Gregory",
        "last_name": "House",
        "doctor_type": "consultant",
        "specialty": "Diagnostic Medicine",
        "is_active": true
    })
}

fn patient_body(id: i64, input: &Value) -> Value {
    let now = Utc::now().to_rfc3339();
    let mut patient = json!({
        "id": id,
        "name": "",
        "age": 0,
        "gender": "",
        "risk_factors": {},
        "family_history": [],
        "surgical_history": [],
        "additional_notes": [],
        "created_at": now,
        "updated_at": now,
        "consultant": doctor_profile(DOCTOR_ID, DOCTOR_EMAIL)
    });
    merge(&mut patient, input);
    patient
}

fn merge(target: &mut Value, update: &Value) {
    if let (Some(target), Some(update)) = (target.as_object_mut(), update.as_object()) {
        for (key, value) in update {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Gate for `/api/*` handlers.
fn authorize(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    match bearer(headers) {
        Some(token) if state.is_valid(&token) && !state.reject_api.load(Ordering::SeqCst) => Ok(()),
        _ => {
            state.unauthorized_api_calls.fetch_add(1, Ordering::SeqCst);
            Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
        }
    }
}

async fn token(State(state): State<MockState>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.token_calls.fetch_add(1, Ordering::SeqCst);

    let username = form.get("username").map(String::as_str);
    let password = form.get("password").map(String::as_str);
    let grant_type = form.get("grant_type").map(String::as_str);

    if grant_type != Some("password") {
        return detail(StatusCode::BAD_REQUEST, "Unsupported grant type");
    }
    if username != Some(DOCTOR_EMAIL) || password != Some(DOCTOR_PASSWORD) {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }

    Json(json!({ "access_token": state.issue_token(), "token_type": "bearer" })).into_response()
}

async fn me(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.me_calls.fetch_add(1, Ordering::SeqCst);
    match bearer(&headers) {
        Some(token) if state.is_valid(&token) => {
            Json(doctor_profile(DOCTOR_ID, DOCTOR_EMAIL)).into_response()
        }
        _ => detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
    }
}

async fn refresh(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let accepted = state.refresh_ok.load(Ordering::SeqCst)
        && bearer(&headers).is_some_and(|token| state.was_issued(&token));
    if !accepted {
        return detail(StatusCode::UNAUTHORIZED, "Could not refresh token");
    }

    Json(json!({ "access_token": state.issue_token(), "token_type": "bearer" })).into_response()
}

async fn register(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let license = body["medical_license_number"].as_str().unwrap_or_default();
    if license.len() < 5 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "detail": [{
                    "loc": ["body", "medical_license_number"],
                    "msg": "String should have at least 5 characters",
                    "type": "string_too_short"
                }]
            })),
        )
            .into_response();
    }

    let email = body["email"].as_str().unwrap_or_default().to_string();
    if !state.registered.lock().unwrap().insert(email.clone()) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }

    let mut profile = doctor_profile(state.next_id(), &email);
    merge(
        &mut profile,
        &json!({
            "first_name": body["first_name"],
            "last_name": body["last_name"],
            "doctor_type": body["doctor_type"],
            "specialty": body["specialty"],
            "medical_license_number": license
        }),
    );
    Json(profile).into_response()
}

async fn list_patients(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let patients: Vec<Value> = state.patients.lock().unwrap().values().cloned().collect();
    Json(patients).into_response()
}

async fn create_patient(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let id = state.next_id();
    let patient = patient_body(id, &body);
    state.patients.lock().unwrap().insert(id, patient.clone());
    Json(patient).into_response()
}

async fn get_patient(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    match state.patients.lock().unwrap().get(&id) {
        Some(patient) => Json(patient.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Patient not found"),
    }
}

async fn update_patient(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut patients = state.patients.lock().unwrap();
    match patients.get_mut(&id) {
        Some(patient) => {
            merge(patient, &body);
            Json(patient.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Patient not found"),
    }
}

async fn delete_patient(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    match state.patients.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => detail(StatusCode::NOT_FOUND, "Patient not found"),
    }
}

async fn create_history(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let Some(patient_id) = body["patient_id"].as_i64() else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "patient_id is required");
    };
    if !state.patients.lock().unwrap().contains_key(&patient_id) {
        return detail(StatusCode::NOT_FOUND, "Patient not found");
    }

    let id = state.next_id();
    let mut history = json!({
        "id": id,
        "patient_id": patient_id,
        "recorded_at": Utc::now().to_rfc3339(),
        "is_processed": false,
        "processing_status": "pending",
        "created_by_id": DOCTOR_ID
    });
    merge(&mut history, &body);
    state.histories.lock().unwrap().insert(id, history.clone());
    Json(history).into_response()
}

/// `GET /api/clinical-histories/{id}` lists by patient id.
async fn list_histories(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(patient_id): Path<i64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let histories: Vec<Value> = state
        .histories
        .lock()
        .unwrap()
        .values()
        .filter(|h| h["patient_id"].as_i64() == Some(patient_id))
        .cloned()
        .collect();
    Json(histories).into_response()
}

async fn update_history(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    let mut histories = state.histories.lock().unwrap();
    match histories.get_mut(&id) {
        Some(history) => {
            merge(history, &body);
            Json(history.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Clinical history not found"),
    }
}

async fn delete_history(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }
    match state.histories.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => detail(StatusCode::NOT_FOUND, "Clinical history not found"),
    }
}
