use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;

/// How a pending approval is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    fn path_segment(self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
        }
    }
}

/// Resolves approvals announced by `AgentEvent::ApprovalRequired`.
///
/// Calls are independent of any stream: they share no state with a decoder
/// and the outcome only shows up as whatever the backend streams next.
#[derive(Clone)]
pub struct ApprovalGateway {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ApprovalGateway {
    pub(crate) fn new(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    /// `POST /api/approval/{id}/approve`
    pub async fn approve(&self, approval_id: &str) -> Result<(), ClientError> {
        self.resolve(approval_id, ApprovalDecision::Approve).await
    }

    /// `POST /api/approval/{id}/reject`
    pub async fn reject(&self, approval_id: &str) -> Result<(), ClientError> {
        self.resolve(approval_id, ApprovalDecision::Reject).await
    }

    pub async fn resolve(
        &self,
        approval_id: &str,
        decision: ApprovalDecision,
    ) -> Result<(), ClientError> {
        if approval_id.trim().is_empty() {
            return Err(ClientError::Validation(
                "approval id must not be empty".into(),
            ));
        }
        let url = self
            .config
            .endpoint(&["approval", approval_id, decision.path_segment()])?;
        debug!(%url, approval_id, ?decision, "resolving approval");

        let response = self
            .client
            .post(url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ClientError::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(status));
        }
        Ok(())
    }

    /// Resolves on a background task so the caller never waits on it.
    pub fn spawn_resolve(
        &self,
        approval_id: impl Into<String>,
        decision: ApprovalDecision,
    ) -> tokio::task::JoinHandle<Result<(), ClientError>> {
        let gateway = self.clone();
        let approval_id = approval_id.into();
        tokio::spawn(async move { gateway.resolve(&approval_id, decision).await })
    }
}
