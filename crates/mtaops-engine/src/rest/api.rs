//! Engine REST API types.
//! Some response fields exist only to mirror the engine's payloads.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use mtaops_protocols::engine::Variables;

/// Paged list envelope.
#[derive(Debug, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub total: usize,
}

/// Named variable as the engine encodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestVariable {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessRequest {
    pub process_definition_key: String,
    pub variables: Vec<RestVariable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceResponse {
    pub id: String,
    #[serde(default)]
    pub process_definition_key: Option<String>,
    /// `key:version:deploymentId`, reported when the key itself is absent.
    #[serde(default)]
    pub process_definition_id: Option<String>,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub start_time: Option<String>,
}

impl ProcessInstanceResponse {
    pub fn definition_key(&self) -> Option<String> {
        self.process_definition_key.clone().or_else(|| {
            self.process_definition_id
                .as_deref()
                .and_then(|id| id.split(':').next())
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricProcessInstanceResponse {
    pub id: String,
    #[serde(default)]
    pub start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub id: String,
    /// Activity the execution currently sits on.
    #[serde(default)]
    pub activity_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionActionRequest {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<RestVariable>,
}

#[derive(Debug, Serialize)]
pub struct JobActionRequest {
    pub action: &'static str,
    pub retries: u32,
}

#[derive(Debug, Deserialize)]
pub struct JobResponse {
    pub id: String,
}

pub fn to_rest_variables(variables: Variables) -> Vec<RestVariable> {
    let mut list: Vec<RestVariable> = variables
        .into_iter()
        .map(|(name, value)| RestVariable { name, value })
        .collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    list
}

pub fn from_rest_variables(list: Vec<RestVariable>) -> Variables {
    list.into_iter().map(|v| (v.name, v.value)).collect()
}
