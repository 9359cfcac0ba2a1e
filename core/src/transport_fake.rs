//! Fake transport for testing
//!
//! Replies come from scripted queues keyed by method and URL fragment instead
//! of real HTTP calls. Clones share the same script and call log, so a test
//! can hand one clone to the code under test and inspect the other.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::transport_types::{AsyncTransport, Credential, HttpMethod, TransportError};

/// A request observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
}

#[derive(Debug)]
struct FakeRoute {
    method: HttpMethod,
    fragment: String,
    queue: VecDeque<Result<String, TransportError>>,
    sticky: Option<Result<String, TransportError>>,
    panics: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    routes: Vec<FakeRoute>,
    calls: Vec<RecordedCall>,
    error_message: Option<String>,
}

/// Fake transport for testing (uses scripted fixture strings)
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    /// Create an empty fake; unscripted calls answer HTTP 404
    pub fn new() -> Self {
        Self::default()
    }

    /// Create fake transport that returns a network error for every call
    pub fn with_error(msg: &str) -> Self {
        let fake = Self::new();
        fake.lock().error_message = Some(msg.to_string());
        fake
    }

    /// Queue one successful reply for requests whose URL contains `fragment`
    pub fn respond(&self, method: HttpMethod, fragment: &str, body: &str) -> &Self {
        self.push(method, fragment, Ok(body.to_string()));
        self
    }

    /// Queue the same reply `times` times
    pub fn respond_times(
        &self,
        method: HttpMethod,
        fragment: &str,
        body: &str,
        times: usize,
    ) -> &Self {
        for _ in 0..times {
            self.push(method, fragment, Ok(body.to_string()));
        }
        self
    }

    /// Queue one failing reply
    pub fn fail(&self, method: HttpMethod, fragment: &str, error: TransportError) -> &Self {
        self.push(method, fragment, Err(error));
        self
    }

    /// Reply used once the queue for this route is drained
    pub fn always(
        &self,
        method: HttpMethod,
        fragment: &str,
        reply: Result<String, TransportError>,
    ) -> &Self {
        let mut state = self.lock();
        let route = route_mut(&mut state, method, fragment);
        route.sticky = Some(reply);
        self
    }

    /// Panic inside the transport call for matching requests, after recording it
    pub fn panic_on(&self, method: HttpMethod, fragment: &str) -> &Self {
        let mut state = self.lock();
        route_mut(&mut state, method, fragment).panics = true;
        self
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls with `method` whose URL contains `fragment`
    pub fn count(&self, method: HttpMethod, fragment: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.url.contains(fragment))
            .count()
    }

    fn push(&self, method: HttpMethod, fragment: &str, reply: Result<String, TransportError>) {
        let mut state = self.lock();
        route_mut(&mut state, method, fragment).queue.push_back(reply);
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking test thread must not hide the call log from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reply(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.map(str::to_string),
        });

        if let Some(ref msg) = state.error_message {
            return Err(TransportError::Network(msg.clone()));
        }

        // Longest matching fragment wins so "/provenance/q1" beats "/provenance".
        let route = state
            .routes
            .iter_mut()
            .filter(|route| route.method == method && url.contains(&route.fragment))
            .max_by_key(|route| route.fragment.len());

        if route.as_ref().is_some_and(|route| route.panics) {
            panic!("fake transport scripted to panic on {} {}", method, url);
        }

        match route {
            Some(route) => match route.queue.pop_front() {
                Some(reply) => reply,
                None => route.sticky.clone().unwrap_or_else(|| {
                    Err(TransportError::Http {
                        status: 404,
                        message: format!("fake script exhausted for {} {}", method, url),
                    })
                }),
            },
            None => Err(TransportError::Http {
                status: 404,
                message: format!("no fake route for {} {}", method, url),
            }),
        }
    }
}

fn route_mut<'a>(
    state: &'a mut FakeState,
    method: HttpMethod,
    fragment: &str,
) -> &'a mut FakeRoute {
    let position = state
        .routes
        .iter()
        .position(|route| route.method == method && route.fragment == fragment);
    match position {
        Some(index) => &mut state.routes[index],
        None => {
            state.routes.push(FakeRoute {
                method,
                fragment: fragment.to_string(),
                queue: VecDeque::new(),
                sticky: None,
                panics: false,
            });
            let last = state.routes.len() - 1;
            &mut state.routes[last]
        }
    }
}

#[async_trait]
impl AsyncTransport for FakeTransport {
    async fn get(&self, url: &str, _credential: &Credential) -> Result<String, TransportError> {
        self.reply(HttpMethod::Get, url, None)
    }

    async fn post_json(
        &self,
        url: &str,
        _credential: &Credential,
        body: &str,
    ) -> Result<String, TransportError> {
        self.reply(HttpMethod::Post, url, Some(body))
    }

    async fn delete(&self, url: &str, _credential: &Credential) -> Result<String, TransportError> {
        self.reply(HttpMethod::Delete, url, None)
    }
}
