//! In-memory transport for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{Method, TransportError};
use crate::transport::{Exchange, Request, Response, Transport};

type Responder = Box<dyn Fn(&Request) -> Option<Result<Response, TransportError>> + Send + Sync>;

/// Records every request and answers from a list of responders.
///
/// The first responder returning `Some` wins; unmatched requests get `200 {}`.
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<Request>>,
    responders: Vec<Responder>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responders: Vec::new(),
        }
    }

    pub(crate) fn respond(
        mut self,
        responder: impl Fn(&Request) -> Option<Result<Response, TransportError>> + Send + Sync + 'static,
    ) -> Self {
        self.responders.push(Box::new(responder));
        self
    }

    /// Answer requests whose URL contains `fragment` with `status` and `body`.
    pub(crate) fn status_for(self, method: Method, fragment: &'static str, status: u16, body: &'static str) -> Self {
        self.respond(move |req| {
            (req.method == method && req.url.contains(fragment)).then(|| {
                Ok(Response {
                    status,
                    body: body.to_string(),
                })
            })
        })
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD url` lines, for order assertions.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: &Request) -> Exchange {
        self.requests.lock().unwrap().push(request.clone());
        let result = self
            .responders
            .iter()
            .find_map(|responder| responder(request))
            .unwrap_or_else(|| {
                Ok(Response {
                    status: 200,
                    body: "{}".to_string(),
                })
            });
        Exchange {
            result,
            attempts: 1,
        }
    }
}
