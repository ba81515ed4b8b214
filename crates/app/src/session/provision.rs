//! Session provisioning client
//!
//! Thin HTTP client for the provisioning service: create a session (which
//! allocates the media-relay room and mints the access token), query it, and
//! release it on teardown.

use parlor_foundation::AppError;
use parlor_protocol::{SessionGrant, SessionInfo};
use tracing::{debug, info};

pub struct ProvisioningClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProvisioningClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create(&self) -> Result<SessionGrant, AppError> {
        let grant: SessionGrant = self
            .http
            .post(format!("{}/api/session/create", self.base_url))
            .send()
            .await
            .map_err(provisioning_err)?
            .error_for_status()
            .map_err(provisioning_err)?
            .json()
            .await
            .map_err(provisioning_err)?;
        info!(target: "channel", session_id = %grant.session_id, room = %grant.room_name, "session provisioned");
        Ok(grant)
    }

    pub async fn info(&self, session_id: &str) -> Result<SessionInfo, AppError> {
        self.http
            .get(format!("{}/api/session/{}", self.base_url, session_id))
            .send()
            .await
            .map_err(provisioning_err)?
            .error_for_status()
            .map_err(provisioning_err)?
            .json()
            .await
            .map_err(provisioning_err)
    }

    /// Release the remote session resource. Errors are reported but the
    /// session is considered gone either way.
    pub async fn release(&self, session_id: &str) -> Result<(), AppError> {
        self.http
            .delete(format!("{}/api/session/{}", self.base_url, session_id))
            .send()
            .await
            .map_err(provisioning_err)?
            .error_for_status()
            .map_err(provisioning_err)?;
        debug!(target: "channel", session_id, "session released");
        Ok(())
    }
}

fn provisioning_err(e: reqwest::Error) -> AppError {
    AppError::Provisioning(e.to_string())
}
