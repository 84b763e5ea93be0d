//! Correction service
//!
//! Orchestrates one correction: configuration check, range lock, request,
//! strict parse, result. The lock is released on every exit path.

use crate::error::CorrectionError;
use crate::llm::{CorrectionRequest, CorrectionResponse, LlmApiClient};
use crate::tasks::{TaskId, TaskManager};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Where a correction is in its lifecycle
///
/// `Idle -> Locked -> Requesting -> Parsing -> {Applied | Rejected | Failed} -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionPhase {
    Idle,
    Locked,
    Requesting,
    Parsing,
    /// Result handed to the chat layer
    Applied,
    /// Refused before any lock or network call
    Rejected,
    /// Failed after the lock was taken
    Failed,
}

impl CorrectionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CorrectionPhase::Applied | CorrectionPhase::Rejected | CorrectionPhase::Failed
        )
    }
}

impl fmt::Display for CorrectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CorrectionPhase::Idle => "idle",
            CorrectionPhase::Locked => "locked",
            CorrectionPhase::Requesting => "requesting",
            CorrectionPhase::Parsing => "parsing",
            CorrectionPhase::Applied => "applied",
            CorrectionPhase::Rejected => "rejected",
            CorrectionPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A validated correction ready for the chat layer
#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub task_id: TaskId,
    pub request: CorrectionRequest,
    pub response: CorrectionResponse,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct CorrectionService {
    client: LlmApiClient,
    tasks: Arc<TaskManager>,
}

impl CorrectionService {
    pub fn new(client: LlmApiClient) -> Self {
        Self::with_tasks(client, Arc::new(TaskManager::new()))
    }

    pub fn with_tasks(client: LlmApiClient, tasks: Arc<TaskManager>) -> Self {
        Self { client, tasks }
    }

    pub fn client(&self) -> &LlmApiClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut LlmApiClient {
        &mut self.client
    }

    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    pub async fn correct(
        &self,
        request: CorrectionRequest,
    ) -> Result<CorrectionResult, CorrectionError> {
        self.correct_with_progress(request, |_| {}).await
    }

    /// Run one correction, reporting every phase to `on_phase`
    pub async fn correct_with_progress<F>(
        &self,
        request: CorrectionRequest,
        mut on_phase: F,
    ) -> Result<CorrectionResult, CorrectionError>
    where
        F: FnMut(CorrectionPhase) + Send,
    {
        let mut errors = self.client.validate_configuration();
        if request.api_endpoint.trim().is_empty() && errors.is_empty() {
            errors.push("API endpoint is not configured".to_string());
        }
        if request.api_key.trim().is_empty() && errors.is_empty() {
            errors.push("API key is not configured".to_string());
        }
        if !errors.is_empty() {
            return Err(self.reject(CorrectionError::Configuration(errors), &mut on_phase));
        }
        if request.text.trim().is_empty() {
            return Err(self.reject(CorrectionError::EmptyText, &mut on_phase));
        }

        let range = request.target_range();
        let guard = match self
            .tasks
            .acquire(&request.document_id, range, &request.prompt_name)
        {
            Ok(guard) => guard,
            Err(overlap) => return Err(self.reject(overlap.into(), &mut on_phase)),
        };
        let task_id = guard.id();
        on_phase(CorrectionPhase::Locked);

        let started = Instant::now();
        on_phase(CorrectionPhase::Requesting);
        let outcome = match self.client.send_raw(&request).await {
            Ok(body) => {
                on_phase(CorrectionPhase::Parsing);
                self.client.parse_response(&request, &body)
            }
            Err(err) => Err(err),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                guard.complete();
                info!(
                    task = %task_id,
                    document = %request.document_id,
                    prompt = %request.prompt_name,
                    range = %range,
                    corrections = response.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "correction completed"
                );
                on_phase(CorrectionPhase::Applied);
                on_phase(CorrectionPhase::Idle);
                Ok(CorrectionResult {
                    task_id,
                    request,
                    response,
                    elapsed,
                })
            }
            Err(err) => {
                guard.fail();
                let err = CorrectionError::from(err);
                error!(
                    task = %task_id,
                    document = %request.document_id,
                    kind = err.kind(),
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "correction failed"
                );
                on_phase(CorrectionPhase::Failed);
                on_phase(CorrectionPhase::Idle);
                Err(err)
            }
        }
    }

    fn reject<F>(&self, err: CorrectionError, on_phase: &mut F) -> CorrectionError
    where
        F: FnMut(CorrectionPhase),
    {
        warn!(kind = err.kind(), error = %err, "correction rejected");
        on_phase(CorrectionPhase::Rejected);
        on_phase(CorrectionPhase::Idle);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FakeTransport;
    use prosefix_core::{ApiSettings, TextRange};

    fn settings() -> ApiSettings {
        ApiSettings {
            api_key: "sk-test".to_string(),
            ..ApiSettings::default()
        }
    }

    fn request(text: &str) -> CorrectionRequest {
        CorrectionRequest {
            document_id: "doc".to_string(),
            text: text.to_string(),
            prompt: "Fix grammar.".to_string(),
            prompt_name: "Grammar".to_string(),
            is_selection: false,
            selection_range: None,
            api_endpoint: "https://api.openai.com/v1".to_string(),
            api_key: "sk-test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_phase_sequence_success() {
        let fake = FakeTransport::new(r#"{"corrections":[]}"#);
        let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake));
        let mut phases = Vec::new();
        service
            .correct_with_progress(request("Hello"), |p| phases.push(p))
            .await
            .unwrap();
        assert_eq!(
            phases,
            vec![
                CorrectionPhase::Locked,
                CorrectionPhase::Requesting,
                CorrectionPhase::Parsing,
                CorrectionPhase::Applied,
                CorrectionPhase::Idle
            ]
        );
        assert_eq!(service.tasks().active_count(), 0);
    }

    #[tokio::test]
    async fn test_network_error_fails_and_releases() {
        let fake = FakeTransport::with_error("connection refused");
        let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake));
        let mut phases = Vec::new();
        let err = service
            .correct_with_progress(request("Hello"), |p| phases.push(p))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network");
        assert!(phases.contains(&CorrectionPhase::Failed));
        assert!(!phases.contains(&CorrectionPhase::Parsing));
        assert_eq!(service.tasks().active_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_rejected_without_lock() {
        let fake = FakeTransport::new(r#"{"corrections":[]}"#);
        let service = CorrectionService::new(LlmApiClient::with_transport(
            ApiSettings::default(),
            fake.clone(),
        ));
        let mut phases = Vec::new();
        let err = service
            .correct_with_progress(request("Hello"), |p| phases.push(p))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrectionError::Configuration(_)));
        assert_eq!(phases, vec![CorrectionPhase::Rejected, CorrectionPhase::Idle]);
        assert_eq!(fake.request_count(), 0);
    }

    #[tokio::test]
    async fn test_overlap_rejected() {
        let fake = FakeTransport::new(r#"{"corrections":[]}"#);
        let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake.clone()));
        let held = service
            .tasks()
            .start_task("doc", TextRange::new(0, 2), "Formal")
            .unwrap();

        let err = service.correct(request("Hello")).await.unwrap_err();
        assert_eq!(err.kind(), "overlap");
        assert_eq!(fake.request_count(), 0);

        service.tasks().complete_task(held);
        assert!(service.correct(request("Hello")).await.is_ok());
    }
}
