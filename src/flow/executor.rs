//! Flow Executor
//!
//! One-pass interpreter for [`AuthFlow`]s. Walks the ordered steps, threads
//! the running state through them, and produces a token or a failure
//! identifying the offending step. Performs no retries.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

use crate::core::template::api_url;
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{
    create_error_from_response, FlowError, LoginError, VaultSessionError, VaultSessionResult,
};
use crate::flow::steps::{AuthFlow, FlowHttpRequest, FlowStep, FlowValue, StepKind};
use crate::types::{AuthResponse, SessionToken};

/// Interpreter walking a flow's steps against an injected HTTP transport.
pub struct FlowExecutor<T: HttpTransport> {
    base_url: String,
    transport: Arc<T>,
}

impl<T: HttpTransport> FlowExecutor<T> {
    /// Create a new executor for a service base URL.
    pub fn new(base_url: impl Into<String>, transport: Arc<T>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    /// Execute a flow: one deterministic pass, no retries.
    pub async fn execute(&self, flow: &AuthFlow) -> VaultSessionResult<SessionToken> {
        let steps = flow.steps();
        let (terminal, prefix) = steps
            .split_last()
            .ok_or(VaultSessionError::Flow(FlowError::MissingLoginStep))?;

        let state = self.run_chain(prefix).await?;
        let index = prefix.len();

        match terminal.kind() {
            StepKind::LoginRequest { path } => {
                let token = self
                    .submit_login(path, state)
                    .await
                    .map_err(|e| step_error(terminal, index, e))?;
                Ok(token)
            }
            StepKind::LoginMap(f) => {
                let input = state.unwrap_or(FlowValue::Json(serde_json::Value::Null));
                let token = f(input).map_err(|e| step_error(terminal, index, e))?;
                Ok(SessionToken::Plain(token))
            }
            _ => Err(VaultSessionError::Flow(FlowError::MissingLoginStep)),
        }
    }

    /// Fold the non-terminal steps left-to-right over an initially absent
    /// state. Boxed for zip recursion.
    fn run_chain<'a>(
        &'a self,
        steps: &'a [FlowStep],
    ) -> BoxFuture<'a, VaultSessionResult<Option<FlowValue>>> {
        async move {
            let mut state: Option<FlowValue> = None;

            for (index, step) in steps.iter().enumerate() {
                state = self
                    .run_step(step, state)
                    .await
                    .map_err(|e| step_error(step, index, e))?;
            }

            Ok(state)
        }
        .boxed()
    }

    async fn run_step(
        &self,
        step: &FlowStep,
        state: Option<FlowValue>,
    ) -> VaultSessionResult<Option<FlowValue>> {
        match step.kind() {
            StepKind::Value(value) => Ok(Some(value.clone())),
            StepKind::Supplier(f) => Ok(Some(f()?)),
            StepKind::HttpRequest(request) => {
                let response = self.perform_request(request, state).await?;
                Ok(Some(FlowValue::Json(response)))
            }
            StepKind::Map(f) => {
                let input = state.unwrap_or(FlowValue::Json(serde_json::Value::Null));
                Ok(Some(f(input)?))
            }
            StepKind::Zip(other) => {
                // The right sub-chain runs independently, from a fresh state.
                let right = self
                    .run_chain(&other.chain())
                    .await?
                    .unwrap_or(FlowValue::Json(serde_json::Value::Null));
                let left = state.unwrap_or(FlowValue::Json(serde_json::Value::Null));
                Ok(Some(FlowValue::Pair(Box::new(left), Box::new(right))))
            }
            StepKind::OnNext(f) => {
                if let Some(value) = &state {
                    f(value);
                }
                Ok(state)
            }
            StepKind::LoginRequest { .. } | StepKind::LoginMap(_) => {
                // Terminal steps are handled by `execute`; a login in a zip
                // sub-chain is unreachable by construction.
                Err(VaultSessionError::Flow(FlowError::MissingLoginStep))
            }
        }
    }

    async fn perform_request(
        &self,
        request: &FlowHttpRequest,
        state: Option<FlowValue>,
    ) -> VaultSessionResult<serde_json::Value> {
        let mut http = HttpRequest {
            method: request.method,
            url: api_url(&self.base_url, &request.path),
            headers: request.headers.clone(),
            body: None,
            timeout: None,
        };

        // Explicit entity wins; otherwise the running state is submitted,
        // with a headers-only state merged as headers rather than body.
        match (&request.body, state) {
            (Some(body), _) => {
                http.body = Some(body.to_string());
            }
            (None, Some(FlowValue::Headers(headers))) => {
                http.headers.extend(headers);
            }
            (None, Some(value)) => {
                http.body = Some(value.body_json().to_string());
            }
            (None, None) => {}
        }
        if http.body.is_some() {
            http.headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/json".to_string());
        }

        debug!(method = http.method.as_str(), url = %http.url, "flow request");

        let response = self.transport.send(http).await?;
        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        response.json()
    }

    async fn submit_login(
        &self,
        path: &str,
        state: Option<FlowValue>,
    ) -> VaultSessionResult<SessionToken> {
        let mut http = HttpRequest::post(api_url(&self.base_url, path));
        match state {
            Some(FlowValue::Headers(headers)) => {
                http.headers.extend(headers);
            }
            Some(value) => {
                http.body = Some(value.body_json().to_string());
                http.headers
                    .insert("content-type".to_string(), "application/json".to_string());
            }
            None => {}
        }

        debug!(url = %http.url, "flow login");

        let response = self.transport.send(http).await?;
        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let auth: AuthResponse = response.json()?;
        match auth.auth {
            Some(section) => {
                if section.client_token.is_empty() {
                    return Err(VaultSessionError::Login(LoginError::NoClientToken));
                }
                Ok(SessionToken::Login(section.into_login_token()))
            }
            // A success response without an authentication section cannot
            // yield a token.
            None => Err(VaultSessionError::Flow(FlowError::NoTokenProduced)),
        }
    }
}

fn step_error(step: &FlowStep, index: usize, source: VaultSessionError) -> VaultSessionError {
    VaultSessionError::Flow(FlowError::StepFailed {
        kind: step.kind().name(),
        index,
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::MockHttpTransport;
    use crate::error::ApiError;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://vault.example.com:8200";

    fn executor(transport: &Arc<MockHttpTransport>) -> FlowExecutor<MockHttpTransport> {
        FlowExecutor::new(BASE, transport.clone())
    }

    #[tokio::test]
    async fn test_value_login_flow() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"auth": {"client_token": "abc", "renewable": true, "lease_duration": 3600}}),
        );

        let flow = FlowStep::from_value(json!({"role_id": "web"}))
            .login_path("auth/{mount}/login", &["approle"]);

        let token = executor(&transport).execute(&flow).await.unwrap();
        let login = token.as_login().unwrap();
        assert_eq!(login.token.secret(), "abc");
        assert!(login.renewable);

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, format!("{}/v1/auth/approle/login", BASE));
        assert_eq!(request.body.as_deref(), Some(r#"{"role_id":"web"}"#));
    }

    #[tokio::test]
    async fn test_state_threads_through_map() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"auth": {"client_token": "abc"}}));

        let flow = FlowStep::from_value(json!("raw"))
            .map(|v| Ok(FlowValue::Json(json!({"jwt": v.body_json()}))))
            .login_path("auth/jwt/login", &[]);

        executor(&transport).execute(&flow).await.unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"jwt":"raw"}"#));
    }

    #[tokio::test]
    async fn test_http_step_response_becomes_state() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"data": {"secret_id": "sid-1"}}));
        transport.queue_json_response(200, &json!({"auth": {"client_token": "abc"}}));

        let flow = FlowStep::from_http_request(FlowHttpRequest::post(
            "auth/approle/role/web/secret-id",
        ))
        .map(|v| {
            let sid = v.body_json()["data"]["secret_id"].clone();
            Ok(FlowValue::Json(json!({"secret_id": sid})))
        })
        .login_path("auth/approle/login", &[]);

        executor(&transport).execute(&flow).await.unwrap();

        let requests = transport.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].body.as_deref(),
            Some(r#"{"secret_id":"sid-1"}"#)
        );
    }

    #[tokio::test]
    async fn test_headers_state_merges_as_headers_not_body() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"data": {"secret_id": "sid-1"}}));
        transport.queue_json_response(200, &json!({"auth": {"client_token": "abc"}}));

        let mut headers = HashMap::new();
        headers.insert("X-Vault-Token".to_string(), "wrapping-token".to_string());

        let flow = FlowStep::from_value(FlowValue::Headers(headers))
            .request(FlowHttpRequest::post("sys/wrapping/unwrap"))
            .login_path("auth/approle/login", &[]);

        executor(&transport).execute(&flow).await.unwrap();

        let unwrap_request = &transport.get_requests()[0];
        assert_eq!(
            unwrap_request.headers.get("X-Vault-Token").unwrap(),
            "wrapping-token"
        );
        assert!(unwrap_request.body.is_none());
    }

    #[tokio::test]
    async fn test_zip_right_chain_runs_from_fresh_state() {
        let transport = Arc::new(MockHttpTransport::new());

        // Right chain ignores the left chain's state entirely.
        let right = FlowStep::from_supplier(|| Ok(FlowValue::Json(json!("right-value"))));

        let flow = FlowStep::from_value(json!("left-value"))
            .zip_with(&right)
            .login_with(|state| match state {
                FlowValue::Pair(left, right) => {
                    assert_eq!(left.body_json(), json!("left-value"));
                    assert_eq!(right.body_json(), json!("right-value"));
                    Ok(crate::types::VaultToken::new("zip-token"))
                }
                other => panic!("expected pair, got {:?}", other),
            });

        let token = executor(&transport).execute(&flow).await.unwrap();
        assert_eq!(token.token().secret(), "zip-token");
    }

    #[tokio::test]
    async fn test_zip_equals_executing_right_alone() {
        let transport = Arc::new(MockHttpTransport::new());
        let right = FlowStep::from_value(json!(7)).map(|v| {
            let n = v.body_json().as_i64().unwrap();
            Ok(FlowValue::Json(json!(n * 2)))
        });

        let alone = right.login_with(|v| {
            Ok(crate::types::VaultToken::new(v.body_json().to_string()))
        });
        let alone_token = executor(&transport).execute(&alone).await.unwrap();
        assert_eq!(alone_token.token().secret(), "14");

        let zipped = FlowStep::from_value(json!(0)).zip_with(&right).login_with(|state| {
            match state {
                FlowValue::Pair(_, right) => {
                    Ok(crate::types::VaultToken::new(right.body_json().to_string()))
                }
                _ => unreachable!(),
            }
        });
        let zipped_token = executor(&transport).execute(&zipped).await.unwrap();
        assert_eq!(zipped_token.token().secret(), "14");
    }

    #[tokio::test]
    async fn test_on_next_observes_without_changing_state() {
        let transport = Arc::new(MockHttpTransport::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let flow = FlowStep::from_value(json!("payload"))
            .on_next(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .login_with(|v| {
                assert_eq!(v.body_json(), json!("payload"));
                Ok(crate::types::VaultToken::new("t"))
            });

        executor(&transport).execute(&flow).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_error_wrapped_with_step_identity() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(403, &json!({"errors": ["permission denied"]}));

        let flow = FlowStep::from_value(json!({}))
            .request(FlowHttpRequest::get("secret/data/app"))
            .login_path("auth/approle/login", &[]);

        let error = executor(&transport).execute(&flow).await.unwrap_err();
        match error {
            VaultSessionError::Flow(FlowError::StepFailed { kind, index, source }) => {
                assert_eq!(kind, "http-request");
                assert_eq!(index, 1);
                match *source {
                    VaultSessionError::Api(ApiError { status, ref messages }) => {
                        assert_eq!(status, 403);
                        assert_eq!(messages[0], "permission denied");
                    }
                    other => panic!("unexpected source: {other}"),
                }
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_auth_section_is_no_token_produced() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"data": {"foo": "bar"}}));

        let flow = FlowStep::from_value(json!({})).login_path("auth/approle/login", &[]);

        let error = executor(&transport).execute(&flow).await.unwrap_err();
        match error {
            VaultSessionError::Flow(FlowError::StepFailed { kind, source, .. }) => {
                assert_eq!(kind, "login");
                assert!(matches!(
                    *source,
                    VaultSessionError::Flow(FlowError::NoTokenProduced)
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_retries_single_pass() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(500, &json!({"errors": ["boom"]}));

        let flow = FlowStep::from_value(json!({})).login_path("auth/approle/login", &[]);

        let _ = executor(&transport).execute(&flow).await.unwrap_err();
        assert_eq!(transport.request_count(), 1);
    }
}
