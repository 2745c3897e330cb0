//! Provider lifecycle against real and scripted page-access sources.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adminkit::auth::{RoleRef, create_token, identity_from_token};
use adminkit::config::{Access, Auth};
use adminkit::{
    AccessPolicy, Action, AuthState, Crud, Guard, HttpSource, Identity, PageSource, Phase,
    Provider, Result,
};
use serde_json::Value;

use super::{Backend, closed_endpoint, users_payload};

fn http_provider(endpoint: String) -> Provider<HttpSource> {
    let config = Access {
        endpoint,
        request_timeout_secs: 1,
        ..Default::default()
    };
    Provider::new(
        HttpSource::new(&config).unwrap(),
        AccessPolicy::from(&config),
    )
}

/// Counts fetches and stalls for the subject named `slow`.
#[derive(Clone, Default)]
struct ScriptedSource {
    fetches: Arc<AtomicUsize>,
}

impl PageSource for ScriptedSource {
    async fn fetch(&self, identity: &Identity) -> Result<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if identity.subject == "slow" {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        Ok(users_payload())
    }
}

fn signed_in(subject: &str, roles: &[&str]) -> AuthState {
    AuthState::SignedIn(Identity::new(subject, roles.iter().copied()))
}

/// Admin plus user roles union to create/read/update on `/users`.
#[tokio::test]
async fn admin_sees_users_page() {
    let backend = Backend::ok(users_payload().to_string()).await;
    let provider = http_provider(backend.endpoint());

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN", "ROLE_USER"]));
    provider.ready().await;

    assert_eq!(provider.navigate("/users/"), Guard::Allow);
    assert_eq!(provider.current_path().as_deref(), Some("/users"));
    assert!(provider.has(Action::Read));
    assert!(provider.has(Action::Create));
    assert!(!provider.has(Action::Delete));
    assert_eq!(
        provider.permissions(),
        Crud {
            create: true,
            read: true,
            update: true,
            delete: false,
        }
    );
}

/// A role without read on a listed route is sent to the forbidden page.
#[tokio::test]
async fn plain_user_is_redirected() {
    let backend = Backend::ok(users_payload().to_string()).await;
    let provider = http_provider(backend.endpoint());

    provider.set_auth(signed_in("u2", &["ROLE_USER"]));
    provider.ready().await;

    assert_eq!(
        provider.navigate("/users"),
        Guard::Redirect("/forbidden".into())
    );
    assert!(!provider.has(Action::Read));
    assert_eq!(provider.navigate("/reports?tab=weekly"), Guard::Allow);
    assert!(provider.has(Action::Read));
    assert!(!provider.has(Action::Update));

    // Unlisted routes are not readable by anyone
    assert_eq!(
        provider.guard("/settings"),
        Guard::Redirect("/forbidden".into())
    );
    assert_eq!(provider.guard("/forbidden"), Guard::Allow);
}

#[tokio::test]
async fn backend_error_fails_closed() {
    let backend = Backend::start(500, "{}", Duration::ZERO).await;
    let provider = http_provider(backend.endpoint());

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN"]));
    let snapshot = provider.ready().await;

    assert_eq!(snapshot.phase, Phase::Ready);
    assert!(snapshot.pages.is_empty());
    assert_eq!(provider.resolve_for_url("/users"), Crud::NONE);
    assert_eq!(
        provider.guard("/users"),
        Guard::Redirect("/forbidden".into())
    );
    assert_eq!(provider.guard("/login"), Guard::Allow);
}

#[tokio::test]
async fn unreachable_backend_fails_closed() {
    let provider = http_provider(closed_endpoint().await);

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN"]));
    provider.ready().await;
    assert!(!provider.can_read("/users"));
}

/// Nothing protected renders while the list is still in flight.
#[tokio::test]
async fn guard_waits_for_slow_load() {
    let source = ScriptedSource::default();
    let provider = Provider::new(source, AccessPolicy::default());

    provider.set_auth(signed_in("slow", &["ROLE_ADMIN"]));
    assert_eq!(provider.phase(), Phase::LoadingPages);
    assert_eq!(provider.guard("/users"), Guard::Pending);
    assert_eq!(provider.guard("/login"), Guard::Allow);

    provider.ready().await;
    assert_eq!(provider.guard("/users"), Guard::Allow);
}

/// Switching users mid-load keeps only the newest user's list.
#[tokio::test]
async fn latest_identity_wins() {
    let source = ScriptedSource::default();
    let provider = Provider::new(source.clone(), AccessPolicy::default());

    provider.set_auth(signed_in("slow", &["ROLE_ADMIN"]));
    provider.set_auth(signed_in("fast", &["ROLE_USER"]));
    let snapshot = provider.ready().await;
    assert_eq!(snapshot.generation, 2);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = provider.snapshot();
    assert_eq!(snapshot.generation, 2);
    match &snapshot.auth {
        AuthState::SignedIn(identity) => assert_eq!(identity.subject, "fast"),
        other => panic!("expected signed in, got {other:?}"),
    }
    assert!(!provider.can_read("/users"));
    assert!(provider.can_read("/reports"));
}

#[tokio::test]
async fn same_principal_does_not_refetch() {
    let source = ScriptedSource::default();
    let provider = Provider::new(source.clone(), AccessPolicy::default());

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN"]));
    provider.ready().await;
    provider.set_auth(AuthState::SignedIn(
        Identity::new("u1", ["ROLE_ADMIN"]).with_token("rotated"),
    ));
    assert_eq!(provider.phase(), Phase::Ready);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

    match provider.snapshot().auth {
        AuthState::SignedIn(identity) => assert_eq!(identity.token.as_deref(), Some("rotated")),
        other => panic!("expected signed in, got {other:?}"),
    }

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN", "ROLE_USER"]));
    provider.ready().await;
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

    provider.invalidate();
    provider.ready().await;
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sign_out_clears_permissions() {
    let source = ScriptedSource::default();
    let provider = Provider::new(source, AccessPolicy::default());

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN"]));
    provider.ready().await;
    assert!(provider.can_read("/users"));

    provider.set_auth(AuthState::SignedOut);
    assert!(!provider.can_read("/users"));
    assert_eq!(
        provider.guard("/users"),
        Guard::Redirect("/forbidden".into())
    );

    provider.set_auth(AuthState::Loading);
    assert_eq!(provider.phase(), Phase::Initializing);
    assert_eq!(provider.guard("/users"), Guard::Pending);
}

/// A closed provider drops the in-flight result and ignores new input.
#[tokio::test]
async fn close_stops_updates() {
    let source = ScriptedSource::default();
    let provider = Provider::new(source.clone(), AccessPolicy::default());
    let mut rx = provider.subscribe();

    provider.set_auth(signed_in("slow", &["ROLE_ADMIN"]));
    provider.close();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(provider.phase(), Phase::LoadingPages);
    provider.set_auth(signed_in("other", &["ROLE_ADMIN"]));
    assert_eq!(provider.phase(), Phase::LoadingPages);

    // Only the LoadingPages transition was ever published
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn subscribers_observe_ready() {
    let provider = Provider::new(ScriptedSource::default(), AccessPolicy::default());
    let mut rx = provider.subscribe();

    provider.set_auth(signed_in("u1", &["ROLE_ADMIN"]));
    let snapshot = rx
        .wait_for(|s| s.phase == Phase::Ready)
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.pages.len(), 2);
}

/// Token in, gated navigation out, with the token forwarded to the backend.
#[tokio::test]
async fn session_token_drives_provider() {
    let auth = Auth {
        jwt_secret: "integration-secret-at-least-32-bytes".to_string(),
        ..Default::default()
    };
    let token = create_token(
        &auth,
        "user-7",
        &[
            RoleRef::Object {
                name: "ROLE_ADMIN".into(),
            },
            RoleRef::Name(" ROLE_USER ".into()),
        ],
    )
    .unwrap();
    let identity = identity_from_token(&auth, &token).unwrap();
    assert_eq!(identity.roles, vec!["ROLE_ADMIN", "ROLE_USER"]);

    let backend = Backend::ok(users_payload().to_string()).await;
    let provider = http_provider(backend.endpoint());
    provider.set_auth(AuthState::SignedIn(identity));
    provider.ready().await;

    assert_eq!(provider.navigate("/users"), Guard::Allow);
    let head = backend.requests()[0].to_lowercase();
    assert!(head.contains(&format!("bearer {}", token.to_lowercase())));
}
