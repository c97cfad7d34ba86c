//! Flow Model
//!
//! Immutable description of an authentication pipeline. Steps form a chain
//! through `Arc` predecessor links; nothing executes while building. The
//! forward-ordered step list is reconstructed by walking the predecessor
//! links and reversing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::transport::HttpMethod;
use crate::core::template::render_path;
use crate::error::VaultSessionError;
use crate::types::VaultToken;

/// Running state threaded through a flow by the executor.
#[derive(Clone, Debug)]
pub enum FlowValue {
    /// A JSON value.
    Json(serde_json::Value),
    /// A headers-only value; merged as request headers, never sent as body.
    Headers(HashMap<String, String>),
    /// Result of a zip: left operand first, right operand second.
    Pair(Box<FlowValue>, Box<FlowValue>),
    /// A token produced mid-flow.
    Token(VaultToken),
}

impl FlowValue {
    /// Render the value as a JSON request body.
    pub fn body_json(&self) -> serde_json::Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Headers(_) => serde_json::Value::Null,
            Self::Pair(left, right) => {
                serde_json::Value::Array(vec![left.body_json(), right.body_json()])
            }
            Self::Token(token) => serde_json::Value::String(token.secret().to_string()),
        }
    }
}

impl From<serde_json::Value> for FlowValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<HashMap<String, String>> for FlowValue {
    fn from(headers: HashMap<String, String>) -> Self {
        Self::Headers(headers)
    }
}

/// Lazily invoked value supplier. No network.
pub type SupplierFn = Arc<dyn Fn() -> Result<FlowValue, VaultSessionError> + Send + Sync>;

/// Pure transform of the running state.
pub type MapFn = Arc<dyn Fn(FlowValue) -> Result<FlowValue, VaultSessionError> + Send + Sync>;

/// Side effect; the state passes through unchanged.
pub type EffectFn = Arc<dyn Fn(&FlowValue) + Send + Sync>;

/// Terminal mapping from the running state to a token.
pub type LoginFn = Arc<dyn Fn(FlowValue) -> Result<VaultToken, VaultSessionError> + Send + Sync>;

/// One remote call within a flow. The path is relative to the service base
/// URL.
#[derive(Clone)]
pub struct FlowHttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// API path, e.g. `auth/approle/role/web/secret-id`.
    pub path: String,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Explicit body; when absent the current state is submitted.
    pub body: Option<serde_json::Value>,
}

impl FlowHttpRequest {
    /// Create a GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a POST request for `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(path)
        }
    }

    /// Set an explicit JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

pub(crate) enum StepKind {
    Value(FlowValue),
    Supplier(SupplierFn),
    HttpRequest(FlowHttpRequest),
    Map(MapFn),
    /// Head of an independently evaluated sub-chain; paired as the right
    /// operand.
    Zip(FlowStep),
    OnNext(EffectFn),
    /// Terminal: POST the current state as body to `path`.
    LoginRequest { path: String },
    /// Terminal: pure mapping to a token.
    LoginMap(LoginFn),
}

impl StepKind {
    /// Step kind name used in error reporting.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Supplier(_) => "supplier",
            Self::HttpRequest(_) => "http-request",
            Self::Map(_) => "map",
            Self::Zip(_) => "zip",
            Self::OnNext(_) => "on-next",
            Self::LoginRequest { .. } => "login",
            Self::LoginMap(_) => "login",
        }
    }
}

struct Node {
    kind: StepKind,
    prev: Option<Arc<Node>>,
}

/// One step of an authentication flow under construction.
///
/// Steps are immutable and cheaply cloneable; chaining methods return a new
/// step referencing its predecessor.
#[derive(Clone)]
pub struct FlowStep {
    node: Arc<Node>,
}

impl FlowStep {
    fn root(kind: StepKind) -> Self {
        Self {
            node: Arc::new(Node { kind, prev: None }),
        }
    }

    fn chained(&self, kind: StepKind) -> Self {
        Self {
            node: Arc::new(Node {
                kind,
                prev: Some(self.node.clone()),
            }),
        }
    }

    /// Start a chain from a fixed literal.
    pub fn from_value(value: impl Into<FlowValue>) -> Self {
        Self::root(StepKind::Value(value.into()))
    }

    /// Start a chain from a lazily invoked supplier.
    pub fn from_supplier<F>(supplier: F) -> Self
    where
        F: Fn() -> Result<FlowValue, VaultSessionError> + Send + Sync + 'static,
    {
        Self::root(StepKind::Supplier(Arc::new(supplier)))
    }

    /// Start a chain from a remote call.
    pub fn from_http_request(request: FlowHttpRequest) -> Self {
        Self::root(StepKind::HttpRequest(request))
    }

    /// Transform the running state.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(FlowValue) -> Result<FlowValue, VaultSessionError> + Send + Sync + 'static,
    {
        self.chained(StepKind::Map(Arc::new(f)))
    }

    /// Pair this chain's value (left) with another chain's value (right).
    ///
    /// The other chain is evaluated independently, from a fresh state.
    pub fn zip_with(&self, other: &FlowStep) -> Self {
        self.chained(StepKind::Zip(other.clone()))
    }

    /// Observe the running state without changing it.
    pub fn on_next<F>(&self, f: F) -> Self
    where
        F: Fn(&FlowValue) + Send + Sync + 'static,
    {
        self.chained(StepKind::OnNext(Arc::new(f)))
    }

    /// Perform a remote call; the response body becomes the new state.
    pub fn request(&self, request: FlowHttpRequest) -> Self {
        self.chained(StepKind::HttpRequest(request))
    }

    /// Terminate the chain with a login call.
    ///
    /// The current state is POSTed as the request body to the rendered
    /// path; template variables are URL-encoded.
    pub fn login_path(&self, template: &str, vars: &[&str]) -> AuthFlow {
        let step = self.chained(StepKind::LoginRequest {
            path: render_path(template, vars),
        });
        AuthFlow::from_terminal(step)
    }

    /// Terminate the chain with a pure mapping to a token.
    pub fn login_with<F>(&self, f: F) -> AuthFlow
    where
        F: Fn(FlowValue) -> Result<VaultToken, VaultSessionError> + Send + Sync + 'static,
    {
        let step = self.chained(StepKind::LoginMap(Arc::new(f)));
        AuthFlow::from_terminal(step)
    }

    /// Forward-ordered chain from the sentinel to this step.
    pub(crate) fn chain(&self) -> Vec<FlowStep> {
        let mut steps = Vec::new();
        let mut cursor = Some(self.node.clone());
        while let Some(node) = cursor {
            cursor = node.prev.clone();
            steps.push(FlowStep { node });
        }
        steps.reverse();
        steps
    }

    pub(crate) fn kind(&self) -> &StepKind {
        &self.node.kind
    }
}

/// A complete authentication flow: an ordered step sequence with exactly one
/// terminal login step.
#[derive(Clone)]
pub struct AuthFlow {
    steps: Vec<FlowStep>,
}

impl AuthFlow {
    fn from_terminal(terminal: FlowStep) -> Self {
        Self {
            steps: terminal.chain(),
        }
    }

    /// The ordered steps, terminal login last.
    pub(crate) fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    /// Number of steps including the terminal login.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// A flow always has at least its login step.
    pub fn is_empty(&self) -> bool {
        false
    }
}
