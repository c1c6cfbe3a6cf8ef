//! In-memory transport for tests.
//!
//! [`ScriptedTransport`] records every request it is given and answers from a queue of
//! [`Reply`] values, so service behaviour can be checked without a server.

use crate::cancellation::CancellationToken;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::{ChartError, ChartResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Scripted answer to one request.
#[derive(Clone, Debug)]
pub enum Reply {
    Respond { status: u16, body: Vec<u8> },
    /// Never answer.
    Hang,
    /// Cancel the token, then answer with an empty body and the given status.
    CancelThenRespond(CancellationToken, u16),
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Respond {
            status,
            body: body.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    requests: Mutex<Vec<ApiRequest>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedTransport {
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::default(),
            replies: Mutex::new(replies.into_iter().collect()),
        })
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> ChartResult<ApiResponse> {
        let path = request.path.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(Reply::Respond { status, body }) => Ok(ApiResponse { status, body }),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::CancelThenRespond(token, status)) => {
                token.cancel();
                Ok(ApiResponse {
                    status,
                    body: Vec::new(),
                })
            }
            None => Err(ChartError::InvalidInput(format!(
                "no scripted reply left for '{path}'"
            ))),
        }
    }
}
