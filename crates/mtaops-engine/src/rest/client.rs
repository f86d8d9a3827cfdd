//! Process engine REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use mtaops_config::{EngineConfig, DEFAULT_WAIT_POINTS};
use mtaops_protocols::engine::{ProcessDescription, ProcessEngine, Variables};
use mtaops_protocols::error::EngineError;

use super::api::{
    from_rest_variables, to_rest_variables, DataPage, ExecutionActionRequest, ExecutionResponse,
    HistoricProcessInstanceResponse, JobActionRequest, JobResponse, ProcessInstanceResponse,
    RestVariable, StartProcessRequest,
};
use crate::deletion::{delete_with_retry, DeletionPolicy};

/// Upper bound on children fetched per parent when walking a process tree.
const TREE_PAGE_SIZE: usize = 1000;

/// [`ProcessEngine`] over the engine's REST API.
pub struct RestProcessEngine {
    base_url: String,
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    deletion: DeletionPolicy,
    wait_points: Vec<String>,
}

impl RestProcessEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            username: None,
            password: None,
            deletion: DeletionPolicy::default(),
            wait_points: DEFAULT_WAIT_POINTS.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Request(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            deletion: DeletionPolicy::from_config(config),
            wait_points: config.wait_points.clone(),
        })
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion = policy;
        self
    }

    pub fn with_wait_points<I, S>(mut self, wait_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wait_points = wait_points.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `activity_id` is one of the receive tasks a process parks on.
    fn is_wait_point(&self, activity_id: Option<&str>) -> bool {
        activity_id.is_some_and(|id| self.wait_points.iter().any(|w| w == id))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    /// Send and map non-success statuses onto [`EngineError`].
    async fn send(&self, builder: RequestBuilder, resource: &str) -> Result<reqwest::Response, EngineError> {
        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(EngineError::NotFound(resource.to_string())),
            StatusCode::CONFLICT => Err(EngineError::OptimisticLock(format!("{}: {}", resource, message))),
            _ => Err(EngineError::ApiError {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, resource: &str) -> Result<T, EngineError> {
        self.send(builder, resource)
            .await?
            .json::<T>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    /// Walk the tree below `root_id` through `path?superProcessInstanceId=`,
    /// returning descendants ordered by start time.
    async fn collect_descendants(&self, path: &str, root_id: &str) -> Result<Vec<String>, EngineError> {
        let size = TREE_PAGE_SIZE.to_string();
        let mut found: Vec<(String, String)> = Vec::new();
        let mut frontier = vec![root_id.to_string()];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent in frontier {
                let builder = self.request(Method::GET, path).query(&[
                    ("superProcessInstanceId", parent.as_str()),
                    ("size", size.as_str()),
                ]);
                let page: DataPage<HistoricProcessInstanceResponse> = self.send_json(builder, path).await?;
                for child in page.data {
                    next.push(child.id.clone());
                    found.push((child.start_time.unwrap_or_default(), child.id));
                }
            }
            frontier = next;
        }

        // Stable: breadth-first order breaks start-time ties.
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    async fn delete_tree_once(&self, process_id: &str, reason: &str) -> Result<(), EngineError> {
        let path = format!("runtime/process-instances/{}", process_id);
        let builder = self.request(Method::DELETE, &path).query(&[("deleteReason", reason)]);
        match self.send(builder, &path).await {
            Ok(_) => Ok(()),
            Err(EngineError::NotFound(_)) => {
                debug!("Execution tree of {} already gone", process_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Map a 404 onto `None`.
fn optional<T>(result: Result<T, EngineError>) -> Result<Option<T>, EngineError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EngineError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ProcessEngine for RestProcessEngine {
    async fn start_process(&self, definition_key: &str, variables: Variables) -> Result<String, EngineError> {
        let path = "runtime/process-instances";
        let body = StartProcessRequest {
            process_definition_key: definition_key.to_string(),
            variables: to_rest_variables(variables),
        };
        let started: ProcessInstanceResponse = self
            .send_json(self.request(Method::POST, path).json(&body), path)
            .await?;
        debug!("Started {} process {}", definition_key, started.id);
        Ok(started.id)
    }

    async fn describe_process(&self, process_id: &str) -> Result<Option<ProcessDescription>, EngineError> {
        let path = format!("runtime/process-instances/{}", process_id);
        let instance: Option<ProcessInstanceResponse> =
            optional(self.send_json(self.request(Method::GET, &path), &path).await)?;
        let Some(instance) = instance else {
            return Ok(None);
        };

        let vars_path = format!("{}/variables", path);
        let variables: Vec<RestVariable> = self
            .send_json(self.request(Method::GET, &vars_path), &vars_path)
            .await?;

        Ok(Some(ProcessDescription {
            process_id: instance.id.clone(),
            definition_key: instance.definition_key().unwrap_or_default(),
            variables: from_rest_variables(variables),
        }))
    }

    async fn active_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError> {
        self.collect_descendants("runtime/process-instances", root_id).await
    }

    async fn historic_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError> {
        self.collect_descendants("history/historic-process-instances", root_id).await
    }

    async fn executions_at_wait_point(&self, process_id: &str) -> Result<Vec<String>, EngineError> {
        let path = "runtime/executions";
        let builder = self
            .request(Method::GET, path)
            .query(&[("processInstanceId", process_id)]);
        let page: DataPage<ExecutionResponse> = self.send_json(builder, path).await?;
        Ok(page
            .data
            .into_iter()
            .filter(|e| self.is_wait_point(e.activity_id.as_deref()))
            .map(|e| e.id)
            .collect())
    }

    async fn trigger_at_wait_point(&self, execution_id: &str, variables: Variables) -> Result<(), EngineError> {
        let path = format!("runtime/executions/{}", execution_id);
        let body = ExecutionActionRequest {
            action: "trigger",
            variables: to_rest_variables(variables),
        };
        self.send(self.request(Method::PUT, &path).json(&body), &path).await?;
        Ok(())
    }

    async fn dead_letter_work(&self, process_id: &str) -> Result<Vec<String>, EngineError> {
        let path = "management/deadletter-jobs";
        let builder = self
            .request(Method::GET, path)
            .query(&[("processInstanceId", process_id)]);
        let page: DataPage<JobResponse> = self.send_json(builder, path).await?;
        Ok(page.data.into_iter().map(|job| job.id).collect())
    }

    async fn move_to_executable(&self, work_id: &str, retries: u32) -> Result<(), EngineError> {
        let path = format!("management/deadletter-jobs/{}", work_id);
        let body = JobActionRequest { action: "move", retries };
        self.send(self.request(Method::POST, &path).json(&body), &path).await?;
        Ok(())
    }

    async fn delete_execution_tree(&self, process_id: &str, reason: &str) -> Result<(), EngineError> {
        delete_with_retry(process_id, &self.deletion, || self.delete_tree_once(process_id, reason)).await
    }

    async fn is_finished(&self, root_id: &str) -> Result<bool, EngineError> {
        let path = format!("runtime/process-instances/{}", root_id);
        let instance: Option<ProcessInstanceResponse> =
            optional(self.send_json(self.request(Method::GET, &path), &path).await)?;
        Ok(instance.is_none_or(|i| i.ended))
    }

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<serde_json::Value>, EngineError> {
        let path = format!("runtime/executions/{}/variables/{}", execution_id, name);
        let variable: Option<RestVariable> =
            optional(self.send_json(self.request(Method::GET, &path), &path).await)?;
        Ok(variable.map(|v| v.value))
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: serde_json::Value) -> Result<(), EngineError> {
        let path = format!("runtime/executions/{}/variables", execution_id);
        let body = vec![RestVariable {
            name: name.to_string(),
            value,
        }];
        self.send(self.request(Method::PUT, &path).json(&body), &path).await?;
        Ok(())
    }

    async fn finished_processes_started_before(
        &self,
        cutoff: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, EngineError> {
        let path = "history/historic-process-instances";
        let builder = self.request(Method::GET, path).query(&[
            ("finished", "true".to_string()),
            ("excludeSubprocesses", "true".to_string()),
            ("startedBefore", cutoff.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("sort", "startTime".to_string()),
            ("order", "asc".to_string()),
            ("start", offset.to_string()),
            ("size", limit.to_string()),
        ]);
        let page: DataPage<HistoricProcessInstanceResponse> = self.send_json(builder, path).await?;
        Ok(page.data.into_iter().map(|p| p.id).collect())
    }

    async fn delete_historic_data(&self, process_id: &str) -> Result<(), EngineError> {
        let path = format!("history/historic-process-instances/{}", process_id);
        optional(self.send(self.request(Method::DELETE, &path), &path).await)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
