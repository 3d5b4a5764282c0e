//! HTTP API
//!
//! `POST /chat` streams a turn as SSE; the two tool endpoints run the same
//! code paths the model reaches through tool calls.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::orchestrator::Orchestrator;
use crate::tools::ToolContext;
use std::sync::Arc;

/// Everything that needs the model credential
pub struct Services {
    pub orchestrator: Orchestrator,
    pub tools: ToolContext,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// `None` when no credential is configured; every API route then refuses
    services: Option<Arc<Services>>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Some(Arc::new(services)),
        }
    }

    pub fn without_credentials() -> Self {
        Self { services: None }
    }
}
