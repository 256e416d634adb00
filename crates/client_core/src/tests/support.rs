use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    error::{CacheError, CacheResult},
    transport::{ApiRequest, ApiResponse, Transport},
};

type Responder = Arc<dyn Fn(&ApiRequest) -> CacheResult<Value> + Send + Sync>;

/// In-process transport with per-path responders, a fixed latency and a
/// log of every request it saw. Responders run after the delay, so they
/// observe whatever state the test changed meanwhile.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Responder>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Mutex<Duration>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub(crate) fn route(
        &self,
        path: &str,
        responder: impl Fn(&ApiRequest) -> CacheResult<Value> + Send + Sync + 'static,
    ) {
        self.routes
            .lock()
            .insert(path.to_string(), Arc::new(responder));
    }

    pub(crate) fn reply(&self, path: &str, body: Value) {
        self.route(path, move |_| Ok(body.clone()));
    }

    pub(crate) fn fail(&self, path: &str, status: u16, message: &str) {
        let message = message.to_string();
        self.route(path, move |_| {
            Err(CacheError::Transport {
                status: Some(status),
                message: message.clone(),
            })
        });
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> CacheResult<ApiResponse> {
        self.requests.lock().push(request.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let responder = self.routes.lock().get(&request.path).cloned();
        let Some(responder) = responder else {
            return Err(CacheError::NotFound(format!("no route for {}", request.path)));
        };
        Ok(ApiResponse {
            status: 200,
            body: responder(&request)?,
        })
    }
}
