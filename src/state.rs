//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Every actix worker thread gets its own clone of `AppState`, and all of
//!   them must see the same calls
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - Config and metrics use it directly; call sessions are locked inside the session store
//!
//! ### Trait objects
//! - The orchestrator holds `Arc<dyn SessionStore>` and `Arc<dyn AiGateway>`, so tests can
//!   swap in fakes without touching the handlers

use crate::ai::{AiGateway, ChatCompletionClient, CoachingGateway};
use crate::calls::{CallLedger, CallOrchestrator, InMemorySessionStore, SessionStore};
use crate::config::{AiConfig, AppConfig};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Thread Safety Pattern:
/// Everything mutable sits behind `Arc<RwLock<T>>` or behind a component that locks
/// internally, so cloning `AppState` is cheap and every clone sees the same data.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (coaching content can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (updated by the metrics middleware on every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Call lifecycle: session store, AI gateway and ledger
    pub calls: CallOrchestrator,

    /// AI settings the completion client was built with. Runtime config updates
    /// to `ai.*` do not reach the client, so the config view compares against this.
    pub active_ai: AiConfig,

    /// When the server started (never changes, so no Arc<RwLock> needed)
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total errors (for reliability monitoring)
/// - **endpoint_metrics**: Per-endpoint statistics (slow AI round-trips show up here)
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Detailed metrics for each API endpoint
    /// Key: endpoint name (e.g., "GET /home")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Wire the production components from configuration: in-memory session
    /// store, reqwest completion client behind the coaching gateway, empty ledger.
    pub fn new(config: AppConfig) -> Self {
        let completions = Arc::new(ChatCompletionClient::from_config(&config.ai));
        let gateway = Arc::new(CoachingGateway::new(
            completions,
            config.ai.analysis_temperature,
            config.ai.summary_temperature,
        ));

        Self::with_components(config, Arc::new(InMemorySessionStore::new()), gateway)
    }

    /// Build state around an explicit store and gateway.
    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn AiGateway>,
    ) -> Self {
        Self {
            active_ai: config.ai.clone(),
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            calls: CallOrchestrator::new(store, gateway, Arc::new(CallLedger::new())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update the configuration with validation.
    ///
    /// The completion client keeps the model and temperatures it was built with;
    /// changes to `ai.*` are stored here and take effect on restart.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap_or_else(PoisonError::into_inner) = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.request_count += 1;
    }

    /// Increment the total error counter (4xx and 5xx responses).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "GET /analyze/{call_id}")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// Clones the data so we don't hold the lock while serializing the response.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Number of calls started and not yet ended.
    pub fn active_calls(&self) -> usize {
        self.calls.store().count_active()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average = Total Duration ÷ Number of Requests
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error Rate = Number of Errors ÷ Total Requests (0.0 to 1.0)
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
