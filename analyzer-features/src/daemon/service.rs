//! Control surface of the fapolicyd service
//!
//! The daemon feature talks to the service only through [`ServiceControl`],
//! so tests and the demo binary can run against [`MockService`].
//!
//! [`MockService`]: super::mock::MockService

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether the service is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// Active
    True,
    /// Installed but inactive
    False,
    #[default]
    Unknown,
}

impl From<bool> for ServiceStatus {
    fn from(active: bool) -> Self {
        if active {
            ServiceStatus::True
        } else {
            ServiceStatus::False
        }
    }
}

#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Whether the service is installed on this host.
    async fn is_valid(&self) -> bool;

    async fn is_active(&self) -> Result<bool>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}
