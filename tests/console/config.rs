//! Configuration wiring tests.
//!
//! A single config file should be enough to stand up the access provider
//! and the table defaults, with secrets only ever coming from outside it.

use std::io::Write;

use adminkit::config::{ConfigLoader, Overrides};
use adminkit::table::{FileStorage, Storage};
use adminkit::{AccessPolicy, AuthState, Guard, Identity, Provider, StaticSource};
use serde_json::json;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{body}").unwrap();
    file
}

/// The loader strips `jwt_secret` from TOML files before applying
/// environment / CLI overrides.
#[test]
fn jwt_secret_stripped_from_config_file() {
    let file = write_config(
        r#"
[auth]
jwt_secret = "should_be_stripped_even_if_long_enough"
"#,
    );

    let loader = ConfigLoader::new("CONSOLECFG_STRIP");
    let err = loader.load(Some(file.path()), Overrides::default()).unwrap_err();
    assert!(err.to_string().contains("CONSOLECFG_STRIP_JWT_SECRET"));

    let config = loader
        .load(
            Some(file.path()),
            Overrides {
                jwt_secret: Some("cli_override_secret"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(config.auth.jwt_secret, "cli_override_secret");
}

#[test]
fn unparseable_file_is_a_config_error() {
    let file = write_config("[access\nendpoint = ");
    let err = ConfigLoader::new("CONSOLECFG_BAD")
        .load(
            Some(file.path()),
            Overrides {
                jwt_secret: Some("secret"),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, adminkit::Error::Config(_)));
}

/// Routing rules from the file reach the provider's guard.
#[tokio::test]
async fn file_policy_drives_guard() {
    let file = write_config(
        r#"
[access]
forbidden_path = "/denied"
public_paths = ["/login", "/status"]
dynamic_parents = ["/users"]
"#,
    );
    let config = ConfigLoader::new("CONSOLECFG_POLICY")
        .load(
            Some(file.path()),
            Overrides {
                jwt_secret: Some("secret"),
                ..Default::default()
            },
        )
        .unwrap();

    let source = StaticSource::new(json!([{
        "url": "/users",
        "rolePermissions": {"ROLE_ADMIN": {"read": true}}
    }]));
    let provider = Provider::new(source, AccessPolicy::from(&config.access));
    provider.set_auth(AuthState::SignedIn(Identity::new("u1", ["ROLE_ADMIN"])));
    provider.ready().await;

    assert_eq!(provider.guard("/users/42"), Guard::Allow);
    assert_eq!(
        provider.guard("/users/42/edit"),
        Guard::Redirect("/denied".into())
    );
    assert_eq!(provider.guard("/status"), Guard::Allow);
    assert_eq!(provider.guard("/denied"), Guard::Allow);
}

/// The configured storage path backs table preferences on disk.
#[test]
fn storage_path_from_cli() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs").join("state.json");

    let config = ConfigLoader::new("CONSOLECFG_STORAGE")
        .load(
            None,
            Overrides {
                storage_path: Some(path.as_path()),
                page_size: Some(25),
                jwt_secret: Some("secret"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(config.table.page_size_options, vec![10, 20, 25, 30, 40, 50]);

    let storage = FileStorage::new(&config.storage.path);
    storage.set("marker", "1").unwrap();
    assert!(path.exists());
}
