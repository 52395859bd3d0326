//! # Compatibility Tests
//!
//! Values sealed by the Go `nacl/box` implementation must open here, and
//! Lockboxes produced by `locket` must reconcile.

mod common;

use std::io::Write;

use common::{fixture_keypair, fixture_lockbox, Harness, PUBLIC_HEX};
use lockbox_controller::cli::{self, OutputFormat};
use lockbox_controller::controller::reconciler::Outcome;
use lockbox_controller::crd::Lockbox;
use lockbox_controller::crypto::{self, KeyPair, KeyPairError};

#[test]
fn test_go_sealed_values_open() {
    let keypair = fixture_keypair();
    let lockbox = fixture_lockbox();
    let sender = lockbox.sender_key().unwrap();

    assert_eq!(
        sender.to_base64(),
        "sqMPhQpYz5RMYjfU7/XtEVL6G8OwTSfVWGdhZ+AQsVw="
    );
    assert_eq!(lockbox.peer_key().unwrap(), keypair.public);
    assert_eq!(lockbox.open_namespace(&keypair.private).unwrap(), b"example");

    let opened = crypto::open(&lockbox.spec.data["test1"].0, &sender, &keypair.private).unwrap();
    assert_eq!(opened, b"test1");
}

#[test]
fn test_fixture_private_key_matches_public_key() {
    let keypair = fixture_keypair();
    assert_eq!(keypair.private.public_key().to_hex(), PUBLIC_HEX);
}

#[test]
fn test_lockbox_document_round_trips_through_yaml() {
    let lockbox = fixture_lockbox();
    let yaml = serde_yaml::to_string(&lockbox).unwrap();

    assert!(yaml.contains("sender: sqMPhQpYz5RMYjfU7/XtEVL6G8OwTSfVWGdhZ+AQsVw="));
    let parsed: Lockbox = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed.spec, lockbox.spec);
}

#[test]
fn test_keypair_file_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "private: JSFz+XXwoN2xmKfllYwHQgOg6fRCdeC4QPldRWxKzC4=").unwrap();
    writeln!(file, "public: akK5/CsBH7iMAXQUg+O//kVb2rGuNdC7U6PADUBtiDY=").unwrap();

    let keypair = KeyPair::from_file(file.path()).unwrap();
    assert_eq!(keypair.public, fixture_keypair().public);
}

#[test]
fn test_missing_keypair_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        KeyPair::from_file(dir.path().join("absent.yaml")),
        Err(KeyPairError::Io(_))
    ));
}

#[tokio::test]
async fn test_locket_output_reconciles() {
    let identity = KeyPair::generate();
    let harness = Harness::new(identity.clone());

    let input = "\
apiVersion: v1
kind: Secret
metadata:
  name: api-token
type: kubernetes.io/basic-auth
stringData:
  username: admin
  password: hunter2
";
    let lockbox = cli::seal_document(input.as_bytes(), Some("payments"), "default", &identity.public)
        .unwrap();
    let encoded = cli::encode(&lockbox, OutputFormat::Json).unwrap();
    let applied: Lockbox = serde_json::from_str(&encoded).unwrap();

    let outcome = harness.reconciler.reconcile_lockbox(&applied).await.unwrap();
    assert_eq!(outcome, Outcome::Created);

    let secret = harness.store.secret("payments", "api-token").unwrap();
    assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/basic-auth"));
    let data = secret.data.unwrap();
    assert_eq!(data["username"].0, b"admin");
    assert_eq!(data["password"].0, b"hunter2");
}

#[tokio::test]
async fn test_lockbox_sealed_for_another_namespace_cannot_be_replayed() {
    let identity = KeyPair::generate();
    let harness = Harness::new(identity.clone());

    let input = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: db\n  namespace: team-a\n";
    let mut lockbox = cli::seal_document(input.as_bytes(), None, "default", &identity.public)
        .unwrap();
    lockbox.metadata.namespace = Some("team-b".to_string());

    assert!(harness.reconciler.reconcile_lockbox(&lockbox).await.is_err());
    assert!(harness.store.secret("team-b", "db").is_none());
}
