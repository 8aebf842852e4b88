//! Escalation bridge between a suspended run and the host's UI.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::error::{HelmError, Result};
use crate::types::{HumanDecision, HumanInputRequest, HumanResponse};

/// Shared response slot the loop polls while it is suspended.
///
/// The host keeps a clone. When a run raises a human-input request the
/// bridge exposes it via [`pending`](Self::pending); the host answers
/// with [`respond`](Self::respond) and the polling loop picks the answer
/// up on its next tick. Responses whose request id does not match the
/// outstanding request are dropped.
#[derive(Clone, Default)]
pub struct HumanInputBridge {
    inner: Arc<Mutex<BridgeInner>>,
}

#[derive(Default)]
struct BridgeInner {
    pending: Option<HumanInputRequest>,
    response: Option<HumanResponse>,
}

impl HumanInputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request a run is currently waiting on, if any.
    pub fn pending(&self) -> Option<HumanInputRequest> {
        self.inner.lock().unwrap().pending.clone()
    }

    /// Deliver the host's answer to the outstanding request.
    pub fn respond(&self, response: HumanResponse) {
        self.inner.lock().unwrap().response = Some(response);
    }

    /// Suspend until the matching response arrives.
    ///
    /// `proceed` resolves with the response. `abort` resolves as a user
    /// cancellation, a poll timeout as a system one; neither is ever a
    /// generic error. A run canceled while waiting unwinds with its own
    /// cancellation error.
    pub(crate) async fn await_response(
        &self,
        request: &HumanInputRequest,
        context: &ExecutionContext,
        poll: Duration,
        timeout: Duration,
    ) -> Result<HumanResponse> {
        self.begin(request.clone());
        let wait = async {
            loop {
                context.check_canceled()?;
                if let Some(response) = self.take_matching(request.id) {
                    return Ok(response);
                }
                time::sleep(poll).await;
            }
        };
        let result = match time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(request_id = %request.id, "human input timed out, treating as cancellation");
                Err(HelmError::canceled(false))
            }
        };
        self.clear();
        match result {
            Ok(response) if response.decision == HumanDecision::Abort => {
                debug!(request_id = %request.id, "human chose to abort the run");
                Err(HelmError::canceled(true))
            }
            other => other,
        }
    }

    fn begin(&self, request: HumanInputRequest) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending = Some(request);
        inner.response = None;
    }

    fn take_matching(&self, id: Uuid) -> Option<HumanResponse> {
        let mut inner = self.inner.lock().unwrap();
        let response = inner.response.take()?;
        if response.request_id == id {
            inner.pending = None;
            Some(response)
        } else {
            warn!(
                expected = %id,
                got = %response.request_id,
                "dropping stale human response"
            );
            None
        }
    }

    fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending = None;
        inner.response = None;
    }
}
