use super::types::{NewPatient, Patient, PatientUpdate};
use crate::gateway::{ApiRequest, GatewayError, RequestGateway};

const PATIENTS_PATH: &str = "/api/patients";

/// Patient CRUD routed through the [`RequestGateway`].
#[derive(Clone)]
pub struct PatientsApi {
    gateway: RequestGateway,
}

impl PatientsApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self) -> Result<Vec<Patient>, GatewayError> {
        self.gateway.send_json(ApiRequest::get(PATIENTS_PATH)).await
    }

    pub async fn get(&self, id: i64) -> Result<Patient, GatewayError> {
        self.gateway
            .send_json(ApiRequest::get(format!("{PATIENTS_PATH}/{id}")))
            .await
    }

    pub async fn create(&self, patient: &NewPatient) -> Result<Patient, GatewayError> {
        let request = ApiRequest::post(PATIENTS_PATH).json(patient)?;
        self.gateway.send_json(request).await
    }

    pub async fn update(&self, id: i64, update: &PatientUpdate) -> Result<Patient, GatewayError> {
        let request = ApiRequest::put(format!("{PATIENTS_PATH}/{id}")).json(update)?;
        self.gateway.send_json(request).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .gateway
            .send_json(ApiRequest::delete(format!("{PATIENTS_PATH}/{id}")))
            .await?;
        Ok(())
    }
}
