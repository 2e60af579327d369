use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::canvas::FlowAnalysis;
use crate::error::CollaboratorError;

/// Input for one flow analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Compiled code context
    pub context: String,
    /// Entrypoint the flow starts from
    pub entrypoint: String,
    /// Model identifier
    pub model: String,
}

/// Core trait for services that turn code context into an execution flow
#[async_trait]
pub trait FlowAnalyzer: Send + Sync {
    /// Analyze the request and return the ordered flow steps
    async fn analyze(&self, request: &AnalysisRequest) -> Result<FlowAnalysis, CollaboratorError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Run an analysis under `timeout`, retrying exactly once on a transient failure
pub async fn analyze_with_retry(
    analyzer: &dyn FlowAnalyzer,
    request: &AnalysisRequest,
    timeout: Duration,
) -> Result<FlowAnalysis, CollaboratorError> {
    let mut retried = false;

    loop {
        let outcome = match tokio::time::timeout(timeout, analyzer.analyze(request)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(format!(
                "no response from {} within {}s",
                analyzer.provider_name(),
                timeout.as_secs_f32()
            ))),
        };

        match outcome {
            Err(error) if error.is_transient() && !retried => {
                warn!("Analysis attempt failed ({}), retrying once", error);
                retried = true;
            }
            Ok(analysis) => {
                info!("{} returned {} top-level steps", analyzer.provider_name(), analysis.steps.len());
                return Ok(analysis);
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::canvas::{FlowStep, StepKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedAnalyzer {
        outcomes: Mutex<Vec<Result<FlowAnalysis, CollaboratorError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedAnalyzer {
        fn new(outcomes: Vec<Result<FlowAnalysis, CollaboratorError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl FlowAnalyzer for ScriptedAnalyzer {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<FlowAnalysis, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcomes.lock().unwrap().remove(0)
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    fn analysis() -> FlowAnalysis {
        FlowAnalysis {
            summary: None,
            steps: vec![FlowStep {
                id: "start".to_string(),
                kind: StepKind::Start,
                label: "Begin".to_string(),
                detail: None,
                branches: vec![],
            }],
            data_formats: vec![],
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            context: "def main(): pass".to_string(),
            entrypoint: "main".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let analyzer = ScriptedAnalyzer::new(vec![
            Err(CollaboratorError::RateLimit("slow down".to_string())),
            Ok(analysis()),
        ]);

        let result = analyze_with_retry(&analyzer, &request(), Duration::from_secs(5)).await;
        assert!(result.is_ok());
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_is_final() {
        let analyzer = ScriptedAnalyzer::new(vec![
            Err(CollaboratorError::Timeout("first".to_string())),
            Err(CollaboratorError::RateLimit("second".to_string())),
            Ok(analysis()),
        ]);

        let err = analyze_with_retry(&analyzer, &request(), Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, CollaboratorError::RateLimit("second".to_string()));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let analyzer = ScriptedAnalyzer::new(vec![Err(CollaboratorError::Auth("bad key".to_string()))]);

        let err = analyze_with_retry(&analyzer, &request(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Auth(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_collaborator_times_out() {
        let mut analyzer = ScriptedAnalyzer::new(vec![Ok(analysis()), Ok(analysis())]);
        analyzer.delay = Duration::from_millis(500);

        let err = analyze_with_retry(&analyzer, &request(), Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Timeout(_)));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 2);
    }
}
