//! Liveness and deployment identity reporting.

use serde::Serialize;

use crate::config::BuildMetadata;

/// Fixed message returned by the health route.
///
/// Product-neutral wording; the document keys (`encore_compiler` included)
/// keep their established names.
pub const HEALTH_MESSAGE: &str = "Your app is up and running!";

/// Build and deploy identity of the running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub app_revision: String,
    pub encore_compiler: String,
    pub deploy_id: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "ok".
    pub code: &'static str,
    pub message: &'static str,
    pub details: HealthSnapshot,
}

/// Produces the health document from static metadata.
#[derive(Debug, Clone)]
pub struct HealthReporter {
    snapshot: HealthSnapshot,
}

impl HealthReporter {
    pub fn new(metadata: &BuildMetadata) -> Self {
        Self {
            snapshot: HealthSnapshot {
                app_revision: metadata.commit.as_revision_string(),
                encore_compiler: metadata.compiler.clone(),
                deploy_id: metadata.deploy_id.clone(),
            },
        }
    }

    pub fn report(&self) -> HealthResponse {
        HealthResponse {
            code: "ok",
            message: HEALTH_MESSAGE,
            details: self.snapshot.clone(),
        }
    }
}
