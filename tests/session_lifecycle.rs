//! End-to-end session lifecycle tests against a mock secrets service.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_session::{
    session_config, FlowHttpRequest, FlowStep, InMemoryEventListener, MockScheduler,
    ReqwestHttpTransport, RenewOutcome, SessionEvent, VaultSessionClient, VaultSessionError,
    VaultToken,
};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn auth_body(token: &str, renewable: bool, lease: u64) -> serde_json::Value {
    json!({"auth": {
        "client_token": token,
        "renewable": renewable,
        "lease_duration": lease,
        "accessor": "accessor-1",
        "type": "service"
    }})
}

struct Harness {
    client: VaultSessionClient<ReqwestHttpTransport>,
    scheduler: Arc<MockScheduler>,
    listener: Arc<InMemoryEventListener>,
}

fn harness(server: &MockServer) -> Harness {
    let config = session_config()
        .base_url(server.uri())
        .revocation_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let scheduler = Arc::new(MockScheduler::new());
    let listener = Arc::new(InMemoryEventListener::new());
    let client = VaultSessionClient::new(config)
        .unwrap()
        .with_scheduler(scheduler.clone())
        .add_listener(listener.clone());

    Harness {
        client,
        scheduler,
        listener,
    }
}

#[tokio::test]
async fn approle_flow_logs_in_and_schedules_renewal() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    // The flow first obtains a secret id, then maps it into login
    // credentials.
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/role/web/secret-id"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"secret_id": "sec-1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .and(body_json(json!({"role_id": "web", "secret_id": "sec-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server);
    let flow = FlowStep::from_http_request(FlowHttpRequest::post(
        "auth/approle/role/web/secret-id",
    ))
    .map(|secret| {
        Ok(json!({
            "role_id": "web",
            "secret_id": secret.body_json()["data"]["secret_id"],
        })
        .into())
    })
    .login_path("auth/approle/login", &[]);

    let session = h.client.session_from_flow(flow);
    let token = session.get_token().await.unwrap();

    assert_eq!(token.secret(), "hvs.abc");
    assert_eq!(h.scheduler.last_delay(), Some(Duration::from_secs(3595)));
    assert!(h
        .listener
        .contains(|e| matches!(e, SessionEvent::LoginSucceeded { renewable: true })));
}

#[tokio::test]
async fn concurrent_callers_share_one_login() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/login/alice"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_body("hvs.abc", true, 3600))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h.client.session_from_login(
        "auth/userpass/login/{username}",
        &["alice"],
        json!({"password": "p"}),
    );

    let calls: Vec<_> = (0..16)
        .map(|_| {
            let session = session.clone();
            async move { session.get_token().await }
        })
        .collect();

    for token in join_all(calls).await {
        assert_eq!(token.unwrap().secret(), "hvs.abc");
    }
    // The mock's expect(1) verifies a single upstream login on drop.
}

#[tokio::test]
async fn renewal_keeps_token_above_threshold_and_drops_below() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3600)))
        .mount(&server)
        .await;

    // First renewal returns a healthy lease, second one a nearly expired
    // lease.
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .and(header("X-Vault-Token", "hvs.abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 600)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3)))
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h
        .client
        .session_from_login("auth/token/login", &[], json!({}));
    session.get_token().await.unwrap();

    assert_eq!(session.renew().await, RenewOutcome::renewed());
    assert_eq!(h.scheduler.last_delay(), Some(Duration::from_secs(595)));

    assert_eq!(session.renew().await, RenewOutcome::terminal());
    assert!(h.listener.contains(|e| matches!(e, SessionEvent::TokenExpired)));
}

#[tokio::test]
async fn renewal_rejection_drops_token_and_relogin_succeeds() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3600)))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
        )
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h
        .client
        .session_from_login("auth/token/login", &[], json!({}));
    session.get_token().await.unwrap();

    assert_eq!(session.renew().await, RenewOutcome::terminal());
    assert!(h
        .listener
        .contains(|e| matches!(e, SessionEvent::RenewalFailed { terminal: true, .. })));

    // Token was dropped, so the next call performs a fresh login.
    session.get_token().await.unwrap();
}

#[tokio::test]
async fn transient_renewal_failure_keeps_token() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3600)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"errors": ["sealed"]})))
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h
        .client
        .session_from_login("auth/token/login", &[], json!({}));
    session.get_token().await.unwrap();

    assert_eq!(session.renew().await, RenewOutcome::retryable());
    // Token retained: no second login.
    assert_eq!(session.get_token().await.unwrap().secret(), "hvs.abc");
}

#[tokio::test]
async fn destroy_revokes_once_and_terminates() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("hvs.abc", true, 3600)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .and(header("X-Vault-Token", "hvs.abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h
        .client
        .session_from_login("auth/token/login", &[], json!({}));
    session.get_token().await.unwrap();

    session.destroy().await;
    session.destroy().await;

    assert!(matches!(
        session.get_token().await.unwrap_err(),
        VaultSessionError::Closed
    ));
    assert!(h.listener.contains(|e| matches!(e, SessionEvent::TokenRevoked)));
}

#[tokio::test]
async fn external_token_enriched_by_lookup_and_not_revoked() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "hvs.ext"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"renewable": true, "ttl": 600, "accessor": "acc", "type": "service"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // No revoke-self mock mounted: a revoke attempt would 404 and, more to
    // the point, fail the expect below.
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-self"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h.client.session_with_token(VaultToken::new("hvs.ext"));

    let token = session.get_token().await.unwrap();
    assert_eq!(token.secret(), "hvs.ext");
    // Lookup metadata made the token renewable.
    assert_eq!(h.scheduler.last_delay(), Some(Duration::from_secs(595)));

    // Externally supplied tokens are never revoked.
    session.destroy().await;
}

#[tokio::test]
async fn lookup_failure_is_nonfatal() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"errors": ["down"]})))
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h.client.session_with_token(VaultToken::new("hvs.ext"));

    assert_eq!(session.get_token().await.unwrap().secret(), "hvs.ext");
    assert!(h
        .listener
        .contains(|e| matches!(e, SessionEvent::LookupFailed { .. })));
    // Without metadata the token is not renewable: nothing scheduled.
    assert_eq!(h.scheduler.scheduled_count(), 0);
}

#[tokio::test]
async fn login_rejection_surfaces_api_error() {
    if !can_bind_localhost() {
        return;
    }

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/login/alice"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"errors": ["invalid username or password"]})),
        )
        .mount(&server)
        .await;

    let h = harness(&server);
    let session = h.client.session_from_login(
        "auth/userpass/login/{username}",
        &["alice"],
        json!({"password": "wrong"}),
    );

    let error = session.get_token().await.unwrap_err();
    match error {
        VaultSessionError::Api(api) => {
            assert_eq!(api.status, 400);
            assert!(api.messages.contains(&"invalid username or password".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h
        .listener
        .contains(|e| matches!(e, SessionEvent::LoginFailed { .. })));
}
