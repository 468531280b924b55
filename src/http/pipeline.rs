//! Ordered request pipeline.
//!
//! # Flow
//! ```text
//! request → stage[0].on_request → stage[1].on_request → ... → dispatch
//!                 │ Respond                                    │
//!                 ▼                                            ▼
//!          unwind entered stages                 unwind entered stages (reverse)
//!                 │                                            │
//!                 ▼                                            ▼
//!             transmit                          outbound stages (in order) → transmit
//! ```
//!
//! A stage either lets the request continue or answers it itself. Stages
//! that were entered get `on_response` in reverse order, so a stage never
//! sees a response for a request it did not see. Outbound stages only run on
//! dispatched responses and see them last, right before transmission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::context::{RequestContext, RouteKind};
use crate::http::contract::error_response;
use crate::routing::WriteClassifier;
use crate::writer::forwarder::WriteForwarder;

/// Result of a stage's request hook.
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

/// A pluggable step of the inbound chain.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn on_request(&self, ctx: &mut RequestContext, request: &mut Request<Body>) -> Flow;

    /// Called for every response to a request this stage let through.
    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// A step that may replace the dispatched response, e.g. to rewrite its body.
#[async_trait]
pub trait ResponseStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transform(&self, ctx: &RequestContext, response: Response) -> Response;
}

/// Bounds applied to every dispatched request.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Deadline for the handler or the forwarded exchange.
    pub timeout: Duration,
    /// Largest declared request body.
    pub max_body: usize,
}

/// Chooses between the local handlers and the writer node.
///
/// Deadline expiry and oversized bodies are answered here, inside the
/// pipeline, so those responses still unwind through every entered stage.
pub struct Dispatcher {
    classifier: WriteClassifier,
    forwarder: WriteForwarder,
    limits: DispatchLimits,
}

impl Dispatcher {
    pub fn new(classifier: WriteClassifier, forwarder: WriteForwarder, limits: DispatchLimits) -> Self {
        Self {
            classifier,
            forwarder,
            limits,
        }
    }

    async fn dispatch(&self, ctx: &mut RequestContext, request: Request<Body>, next: Next) -> Response {
        if let Some(declared) = declared_length(&request) {
            if declared > self.limits.max_body as u64 {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    declared,
                    limit = self.limits.max_body,
                    "Request body over limit"
                );
                return error_response(StatusCode::PAYLOAD_TOO_LARGE);
            }
        }

        let route = if self.classifier.is_write(&request) {
            RouteKind::Forwarded
        } else {
            RouteKind::Local
        };
        ctx.route = route;

        let exchange = async {
            match route {
                RouteKind::Forwarded => self.forwarder.forward(ctx, request).await,
                _ => next.run(request).await,
            }
        };

        match tokio::time::timeout(self.limits.timeout, exchange).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    route = route.as_str(),
                    timeout = ?self.limits.timeout,
                    "Request deadline exceeded"
                );
                error_response(StatusCode::GATEWAY_TIMEOUT)
            }
        }
    }
}

fn declared_length(request: &Request<Body>) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// The assembled chain.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    outbound: Vec<Arc<dyn ResponseStage>>,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn builder(dispatcher: Dispatcher) -> PipelineBuilder {
        PipelineBuilder {
            stages: Vec::new(),
            outbound: Vec::new(),
            dispatcher,
        }
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run one request through the chain.
    pub async fn handle(&self, mut request: Request<Body>, next: Next) -> Response {
        let mut ctx = RequestContext::from_request(&request);
        let mut entered = 0;

        for stage in &self.stages {
            match stage.on_request(&mut ctx, &mut request).await {
                Flow::Continue => entered += 1,
                Flow::Respond(mut response) => {
                    tracing::trace!(
                        request_id = %ctx.request_id,
                        stage = stage.name(),
                        status = %response.status(),
                        "Stage answered request"
                    );
                    self.unwind(&ctx, entered, &mut response);
                    return response;
                }
            }
        }

        let mut response = self.dispatcher.dispatch(&mut ctx, request, next).await;
        self.unwind(&ctx, entered, &mut response);

        for stage in &self.outbound {
            response = stage.transform(&ctx, response).await;
        }
        response
    }

    fn unwind(&self, ctx: &RequestContext, entered: usize, response: &mut Response) {
        for stage in self.stages[..entered].iter().rev() {
            stage.on_response(ctx, response);
        }
    }
}

pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    outbound: Vec<Arc<dyn ResponseStage>>,
    dispatcher: Dispatcher,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn outbound(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.outbound.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            outbound: self.outbound,
            dispatcher: self.dispatcher,
        }
    }
}

/// Axum middleware entry point.
pub async fn run_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    pipeline.handle(request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteRouteConfig;
    use crate::writer::{WriterClient, WriterEndpoint};
    use axum::{
        http::{HeaderValue, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Records hook calls into a shared journal.
    struct Recorder {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        answer: bool,
    }

    #[async_trait]
    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_request(&self, _ctx: &mut RequestContext, _request: &mut Request<Body>) -> Flow {
            self.journal.lock().unwrap().push(format!("{}:req", self.name));
            if self.answer {
                Flow::Respond((StatusCode::SERVICE_UNAVAILABLE, "stop").into_response())
            } else {
                Flow::Continue
            }
        }

        fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
            self.journal.lock().unwrap().push(format!("{}:resp", self.name));
            response
                .headers_mut()
                .append("x-seen-by", HeaderValue::from_static(self.name));
        }
    }

    fn dispatcher() -> Dispatcher {
        let endpoint = WriterEndpoint::parse("http://127.0.0.1:9").unwrap();
        let client = WriterClient::new(endpoint, Duration::from_millis(100), 1024);
        Dispatcher::new(
            WriteClassifier::from_config(&[WriteRouteConfig::default()]),
            WriteForwarder::new(client, 1024),
            DispatchLimits {
                timeout: Duration::from_millis(200),
                max_body: 1024,
            },
        )
    }

    fn recorder(name: &'static str, journal: &Arc<Mutex<Vec<String>>>, answer: bool) -> Arc<dyn Stage> {
        Arc::new(Recorder {
            name,
            journal: journal.clone(),
            answer,
        })
    }

    fn app(pipeline: Pipeline) -> Router {
        Router::new()
            .route("/hello", get(|| async { "hello" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(middleware::from_fn_with_state(Arc::new(pipeline), run_pipeline))
    }

    #[tokio::test]
    async fn stages_run_in_order_and_unwind_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(dispatcher())
            .stage(recorder("a", &journal, false))
            .stage(recorder("b", &journal, false))
            .build();
        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);

        let response = app(pipeline)
            .oneshot(Request::builder().uri("/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:req", "b:req", "b:resp", "a:resp"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_later_stages_and_handler() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(dispatcher())
            .stage(recorder("a", &journal, false))
            .stage(recorder("gate", &journal, true))
            .stage(recorder("c", &journal, false))
            .build();

        let response = app(pipeline)
            .oneshot(Request::builder().uri("/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let seen: Vec<_> = response.headers().get_all("x-seen-by").iter().collect();
        assert_eq!(seen, vec!["a"]);
        assert_eq!(*journal.lock().unwrap(), vec!["a:req", "gate:req", "a:resp"]);
    }

    #[tokio::test]
    async fn deadline_answer_unwinds_entered_stages() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(dispatcher())
            .stage(recorder("a", &journal, false))
            .build();

        let response = app(pipeline)
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()["x-seen-by"], "a");
        assert_eq!(*journal.lock().unwrap(), vec!["a:req", "a:resp"]);
    }

    #[tokio::test]
    async fn oversized_declared_body_is_refused_inside_the_chain() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(dispatcher())
            .stage(recorder("a", &journal, false))
            .build();

        let response = app(pipeline)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/wsapi/update_password")
                    .header(header::CONTENT_LENGTH, "4096")
                    .body(Body::from(vec![b'x'; 4096]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["x-seen-by"], "a");
    }
}
