use super::types::{ClinicalHistory, ClinicalHistoryUpdate, NewClinicalHistory};
use crate::gateway::{ApiRequest, GatewayError, RequestGateway};

const HISTORIES_PATH: &str = "/api/clinical-histories";

/// Clinical-history CRUD routed through the [`RequestGateway`].
#[derive(Clone)]
pub struct ClinicalHistoryApi {
    gateway: RequestGateway,
}

impl ClinicalHistoryApi {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Histories of one patient.
    pub async fn list(&self, patient_id: i64) -> Result<Vec<ClinicalHistory>, GatewayError> {
        self.gateway
            .send_json(ApiRequest::get(format!("{HISTORIES_PATH}/{patient_id}")))
            .await
    }

    pub async fn create(&self, history: &NewClinicalHistory) -> Result<ClinicalHistory, GatewayError> {
        let request = ApiRequest::post(HISTORIES_PATH).json(history)?;
        self.gateway.send_json(request).await
    }

    pub async fn update(
        &self,
        id: i64,
        update: &ClinicalHistoryUpdate,
    ) -> Result<ClinicalHistory, GatewayError> {
        let request = ApiRequest::put(format!("{HISTORIES_PATH}/{id}")).json(update)?;
        self.gateway.send_json(request).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .gateway
            .send_json(ApiRequest::delete(format!("{HISTORIES_PATH}/{id}")))
            .await?;
        Ok(())
    }
}
