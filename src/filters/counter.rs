//! Request counting and the completion guard.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::error::RejectReason;
use crate::filters::{Decision, Filter, RequestContext};
use crate::observability::MetricsCollector;

/// Records a request when it starts and its outcome when it completes.
///
/// Finishing consumes the guard. A guard dropped without finishing (the
/// request future was cancelled) records a rejection tagged `Other`, so every
/// counted request is completed exactly once.
#[derive(Debug)]
pub struct RequestRecord {
    collector: Arc<MetricsCollector>,
    route_id: String,
    started: Instant,
    finished: bool,
}

impl RequestRecord {
    pub fn start(collector: Arc<MetricsCollector>, route_id: impl Into<String>) -> Self {
        let route_id = route_id.into();
        collector.record_request(&route_id);
        Self {
            collector,
            route_id,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// Complete with the final status.
    ///
    /// `rejected_by` is the reason of the gateway filter that produced the
    /// status; for backend statuses the reason is derived from the code.
    pub fn finish(mut self, status: StatusCode, rejected_by: Option<RejectReason>) {
        self.finished = true;
        self.collector
            .record_response_time(&self.route_id, self.started.elapsed());

        if status.as_u16() >= 400 {
            let reason = rejected_by.unwrap_or_else(|| RejectReason::from_status(status.as_u16()));
            self.collector.record_rejection(&self.route_id, reason);
        }
    }
}

impl Drop for RequestRecord {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(route_id = %self.route_id, "Request dropped before completion");
        self.collector
            .record_response_time(&self.route_id, self.started.elapsed());
        self.collector
            .record_rejection(&self.route_id, RejectReason::Other);
    }
}

/// First filter of the chain: counts the request and attaches its guard.
pub struct CounterFilter {
    collector: Arc<MetricsCollector>,
}

impl CounterFilter {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Filter for CounterFilter {
    fn name(&self) -> &'static str {
        "counter"
    }

    async fn apply(&self, ctx: &mut RequestContext<'_>) -> Decision {
        ctx.record = Some(RequestRecord::start(
            self.collector.clone(),
            ctx.route.route_id.clone(),
        ));
        ControlFlow::Continue(())
    }
}
