//! Mock service implementation for testing
//!
//! Simulates an installed or missing fapolicyd with configurable failures
//! and latency, and counts calls so tests can verify what the epics did.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::service::ServiceControl;
use crate::error::{FeatureError, Result};

/// Configuration for mock service behavior
#[derive(Debug, Clone)]
pub struct MockServiceConfig {
    /// Whether the service is installed
    pub installed: bool,

    /// Current running state, shared between clones
    pub active: Arc<AtomicBool>,

    /// Error to return from start
    pub start_error: Option<String>,

    /// Error to return from stop
    pub stop_error: Option<String>,

    /// Error to return from status queries
    pub status_error: Option<String>,

    /// Delay before completing operations
    pub delay: Duration,

    pub start_call_count: Arc<AtomicUsize>,
    pub stop_call_count: Arc<AtomicUsize>,
    pub status_call_count: Arc<AtomicUsize>,
}

impl Default for MockServiceConfig {
    fn default() -> Self {
        Self {
            installed: true,
            active: Arc::new(AtomicBool::new(false)),
            start_error: None,
            stop_error: None,
            status_error: None,
            delay: Duration::from_millis(0),
            start_call_count: Arc::new(AtomicUsize::new(0)),
            stop_call_count: Arc::new(AtomicUsize::new(0)),
            status_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Mock fapolicyd. Clones share state and counters.
#[derive(Debug, Clone, Default)]
pub struct MockService {
    config: MockServiceConfig,
}

impl MockService {
    pub fn new(config: MockServiceConfig) -> Self {
        Self { config }
    }

    /// Installed and running
    pub fn running() -> Self {
        Self::new(MockServiceConfig {
            active: Arc::new(AtomicBool::new(true)),
            ..Default::default()
        })
    }

    /// Installed but stopped
    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn not_installed() -> Self {
        Self::new(MockServiceConfig {
            installed: false,
            ..Default::default()
        })
    }

    /// Installed and stopped; every start fails with `error`
    pub fn start_failure(error: &str) -> Self {
        Self::new(MockServiceConfig {
            start_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Installed and running; every stop fails with `error`
    pub fn stop_failure(error: &str) -> Self {
        Self::new(MockServiceConfig {
            active: Arc::new(AtomicBool::new(true)),
            stop_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn status_failure(error: &str) -> Self {
        Self::new(MockServiceConfig {
            status_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockServiceConfig {
            delay,
            ..Default::default()
        })
    }

    pub fn start_call_count(&self) -> usize {
        self.config.start_call_count.load(Ordering::SeqCst)
    }

    pub fn stop_call_count(&self) -> usize {
        self.config.stop_call_count.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> usize {
        self.config.status_call_count.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> bool {
        self.config.active.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }

    fn check_installed(&self) -> Result<()> {
        if self.config.installed {
            Ok(())
        } else {
            Err(FeatureError::NotInstalled)
        }
    }
}

#[async_trait]
impl ServiceControl for MockService {
    async fn is_valid(&self) -> bool {
        self.config.installed
    }

    async fn is_active(&self) -> Result<bool> {
        self.config.status_call_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_installed()?;

        match &self.config.status_error {
            Some(error) => Err(FeatureError::Service(error.clone())),
            None => Ok(self.active()),
        }
    }

    async fn start(&self) -> Result<()> {
        self.config.start_call_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_installed()?;

        if let Some(error) = &self.config.start_error {
            return Err(FeatureError::Service(error.clone()));
        }
        self.config.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.config.stop_call_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_installed()?;

        if let Some(error) = &self.config.stop_error {
            return Err(FeatureError::Service(error.clone()));
        }
        self.config.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}
