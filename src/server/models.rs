use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) timestamp: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ServiceInfo {
    pub(crate) message: &'static str,
    pub(crate) version: &'static str,
    pub(crate) description: &'static str,
    pub(crate) endpoints: BTreeMap<&'static str, &'static str>,
}
