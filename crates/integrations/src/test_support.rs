//! Scripted in-memory transport for exercising the fetchers without an
//! upstream.

use crate::transport::{EspTransport, HttpResponse};
use async_trait::async_trait;
use campaign_core::{CampaignError, CampaignResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
enum Scripted {
    Response(HttpResponse),
    Failure(String),
}

/// Answers by exact URL. Each URL holds a queue; the last queued answer
/// repeats once the others are used up. URLs with no script get the
/// fallback answer, or a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fallback: Mutex<Option<Scripted>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.push(url, Scripted::Response(HttpResponse::new(status, body)));
    }

    pub fn respond_json(&self, url: &str, status: u16, body: &serde_json::Value) {
        self.respond(url, status, &body.to_string());
    }

    /// Queue a transport-level failure (no HTTP response).
    pub fn fail(&self, url: &str, message: &str) {
        self.push(url, Scripted::Failure(message.to_string()));
    }

    /// Answer for every URL that has no script of its own.
    pub fn respond_any(&self, status: u16, body: &str) {
        *self.fallback.lock() = Some(Scripted::Response(HttpResponse::new(status, body)));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Tokens sent with each call, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, t)| t.clone()).collect()
    }

    fn push(&self, url: &str, answer: Scripted) {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
    }

    fn next_answer(&self, url: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl EspTransport for ScriptedTransport {
    async fn get(&self, url: &str, token: &str) -> CampaignResult<HttpResponse> {
        self.calls.lock().push((url.to_string(), token.to_string()));
        let answer = self
            .next_answer(url)
            .or_else(|| self.fallback.lock().clone())
            .unwrap_or_else(|| {
                Scripted::Response(HttpResponse::new(404, r#"{"message":"Not Found"}"#))
            });
        match answer {
            Scripted::Response(response) => Ok(response),
            Scripted::Failure(message) => Err(CampaignError::Transport(message)),
        }
    }
}
