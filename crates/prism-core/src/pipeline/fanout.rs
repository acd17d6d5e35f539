//! Concurrent execution of one pipeline per selected model.

use crate::error::PipelineError;
use crate::knowledge::KnowledgeRetriever;
use crate::pipeline::PipelineOutcome;
use crate::pipeline::executor::PipelineExecutor;
use crate::provider::ModelProvider;
use crate::report::StructuredReport;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Retry policy for whole pipeline runs.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self { max_retries, initial_delay, max_delay, multiplier }
    }

    /// Default policy with the given number of retries.
    pub fn with_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    /// Calculate the delay for a given retry attempt.
    ///
    /// Uses exponential backoff: initial_delay * multiplier^retry_count, capped at max_delay.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as f64
            * self.multiplier.powi(retry_count as i32))
        .min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Launches one pipeline per model and joins them all.
pub struct FanOutCoordinator {
    provider: Arc<dyn ModelProvider>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    retry_policy: RetryPolicy,
}

impl FanOutCoordinator {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider, retriever: None, retry_policy: RetryPolicy::default() }
    }

    /// Enables knowledge-base retrieval for every run.
    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Runs every model concurrently and returns one outcome per entry of
    /// `models`, in the same order.
    ///
    /// A failing, panicking or cancelled run becomes a `Failure` and never
    /// affects its siblings. Cancelling `cancel`, or dropping the returned
    /// future, cancels every run still in flight.
    pub async fn run_all(
        &self,
        topic: &str,
        models: &[String],
        template_content: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<PipelineOutcome> {
        info!(topic = %topic, models = ?models, template = template_content.is_some(), "Starting report fan-out");

        let scope = cancel.child_token();
        let _guard = scope.clone().drop_guard();

        let handles: Vec<_> = models
            .iter()
            .map(|model_id| {
                let provider = Arc::clone(&self.provider);
                let retriever = self.retriever.clone();
                let retry_policy = self.retry_policy.clone();
                let topic = topic.to_string();
                let template = template_content.map(str::to_string);
                let model_id = model_id.clone();
                let token = scope.child_token();

                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        outcome = run_with_retry(
                            provider.as_ref(),
                            retriever.as_ref(),
                            &retry_policy,
                            &topic,
                            &model_id,
                            template.as_deref(),
                        ) => outcome,
                        () = token.cancelled() => {
                            info!(model_id = %model_id, "Run cancelled");
                            PipelineOutcome::failure(model_id.as_str(), &PipelineError::Cancelled)
                        }
                    }
                })
            })
            .collect();

        let outcomes: Vec<PipelineOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(models)
            .map(|(joined, model_id)| joined.unwrap_or_else(|e| join_failure(model_id, e)))
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(succeeded, failed = outcomes.len() - succeeded, "Report fan-out finished");
        outcomes
    }
}

async fn run_with_retry(
    provider: &dyn ModelProvider,
    retriever: Option<&Arc<KnowledgeRetriever>>,
    retry_policy: &RetryPolicy,
    topic: &str,
    model_id: &str,
    template_content: Option<&str>,
) -> PipelineOutcome {
    let mut retry_count = 0;
    loop {
        match run_once(provider, retriever, topic, model_id, template_content).await {
            Ok(report) => {
                return PipelineOutcome::Success { model_id: model_id.to_string(), report };
            }
            Err(e) if e.is_retryable() && retry_count < retry_policy.max_retries => {
                let delay = retry_policy.calculate_delay(retry_count);
                debug!(
                    model_id = %model_id,
                    retry_count = retry_count + 1,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Retrying pipeline after backoff"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => {
                error!(model_id = %model_id, error = %e, "Pipeline run failed");
                return PipelineOutcome::failure(model_id, &e);
            }
        }
    }
}

async fn run_once(
    provider: &dyn ModelProvider,
    retriever: Option<&Arc<KnowledgeRetriever>>,
    topic: &str,
    model_id: &str,
    template_content: Option<&str>,
) -> Result<StructuredReport, PipelineError> {
    let model = provider.model_for(model_id)?;
    PipelineExecutor::new(model, retriever.cloned()).run(topic, template_content).await
}

fn join_failure(model_id: &str, err: JoinError) -> PipelineOutcome {
    let error = if err.is_panic() {
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        PipelineError::Panicked(message)
    } else {
        PipelineError::Cancelled
    };
    error!(model_id = %model_id, error = %error, "Pipeline task did not complete");
    PipelineOutcome::failure(model_id, &error)
}
