//! Upstream payloads of the initialise/login exchange

use serde::Deserialize;
use serde_json::Value;

use super::{Credentials, Session};
use crate::error::{LeafClientError, Result};

/// `InitialApp.php` response
#[derive(Debug, Deserialize)]
pub(crate) struct InitialAppResponse {
    /// Per-session encryption key for the password
    pub baseprm: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VehicleInfo {
    pub custom_sessionid: String,
    pub vin: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VehicleInfoList {
    #[serde(rename = "vehicleInfo")]
    pub vehicle_info: Vec<VehicleInfo>,
}

/// `UserLoginRequest.php` response.
///
/// The gateway is inconsistent about where it puts vehicle info: some
/// accounts get it wrapped in `VehicleInfoList`, others get a bare
/// `vehicleInfo` array. The wrapped form wins when both are present.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LoginResponse {
    Wrapped {
        #[serde(rename = "VehicleInfoList")]
        list: VehicleInfoList,
    },
    Bare {
        #[serde(rename = "vehicleInfo")]
        vehicle_info: Vec<VehicleInfo>,
    },
}

impl LoginResponse {
    fn vehicles(&self) -> &[VehicleInfo] {
        match self {
            LoginResponse::Wrapped { list } => &list.vehicle_info,
            LoginResponse::Bare { vehicle_info } => vehicle_info,
        }
    }

    /// Session for the first vehicle on the account
    pub fn into_session(self) -> Result<Session> {
        let vehicle = self.vehicles().first().ok_or(LeafClientError::NoVehicle)?;
        let credentials = Credentials::from_upstream(&vehicle.custom_sessionid, &vehicle.vin)?;
        Ok(Session {
            credentials,
            vehicle_name: vehicle.nickname.clone(),
        })
    }
}

pub(crate) fn parse_initial_app(payload: Option<Value>) -> Result<String> {
    let payload = payload
        .ok_or_else(|| LeafClientError::ParseError("InitialApp.php: empty response".into()))?;
    let response: InitialAppResponse = serde_json::from_value(payload)
        .map_err(|e| LeafClientError::ParseError(format!("InitialApp.php: {}", e)))?;
    Ok(response.baseprm)
}

pub(crate) fn parse_login(payload: Option<Value>) -> Result<Session> {
    let payload = payload.ok_or(LeafClientError::NoVehicle)?;
    let response: LoginResponse = serde_json::from_value(payload)
        .map_err(|e| LeafClientError::ParseError(format!("UserLoginRequest.php: {}", e)))?;
    response.into_session()
}
