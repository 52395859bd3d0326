//! # Locket
//!
//! Seals a `v1/Secret` document into a `Lockbox` that only the controller
//! holding the peer private key can unlock.
//!
//! ## Usage
//!
//! ```bash
//! # Seal for the controller running in the current cluster
//! locket -f secret.yaml > lockbox.yaml
//!
//! # Seal offline for a known public key
//! locket -f secret.yaml --peer-hex 6a42b9fc...8836 -o json
//!
//! # Seal for a controller in another cluster
//! locket -f secret.yaml --kubeconfig ~/.kube/staging --master https://10.0.0.1:6443
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use futures::AsyncReadExt;
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::{debug, info, warn};

use crate::constants::{PUBLIC_KEY_FETCH_TIMEOUT_SECS, PUBLIC_KEY_PATH};
use crate::crd::Lockbox;
use crate::crypto::{KeyPair, PublicKey, KEY_SIZE};

/// Seal a Kubernetes Secret into a Lockbox
#[derive(Debug, Parser)]
#[command(name = "locket", version, about, long_about = None)]
pub struct Args {
    /// Input Secret document (YAML or JSON); stdin when absent
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Output encoding
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,

    /// Peer public key as 64 hex characters; fetched from the cluster when absent
    #[arg(long, value_name = "HEX")]
    pub peer_hex: Option<String>,

    /// Namespace of the lockbox controller
    #[arg(long, default_value = "lockbox")]
    pub lockbox_namespace: String,

    /// Name of the lockbox service
    #[arg(long, default_value = "lockbox")]
    pub lockbox_service: String,

    /// Target namespace when the Secret does not name one
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Path to a kubeconfig; the usual discovery applies when absent
    #[arg(long, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Address of the Kubernetes API server, overriding the kubeconfig
    #[arg(long, value_name = "URL")]
    pub master: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Parse a Secret document
pub fn parse_secret(input: &[u8]) -> Result<Secret> {
    serde_yaml::from_slice(input).context("unable to decode secret file")
}

/// Target namespace for a Secret: its own, then the override, then the fallback
pub fn target_namespace(secret: &Secret, namespace: Option<&str>, fallback: &str) -> String {
    secret
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .or(namespace.filter(|ns| !ns.is_empty()))
        .unwrap_or(fallback)
        .to_string()
}

/// Validate a public key served by the controller
pub fn peer_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != KEY_SIZE {
        bail!(
            "incorrect peer key length: {}, should be {KEY_SIZE}",
            bytes.len()
        );
    }
    Ok(PublicKey::from_slice(bytes)?)
}

/// Fetch the controller's public key through the API server service proxy
pub async fn fetch_peer_key(client: &Client, namespace: &str, service: &str) -> Result<PublicKey> {
    let uri = format!(
        "/api/v1/namespaces/{namespace}/services/http:{service}:/proxy{PUBLIC_KEY_PATH}"
    );
    debug!(%uri, "Fetching peer public key");
    let request = http::Request::get(&uri)
        .body(Vec::new())
        .context("unable to build public key request")?;

    let fetch = async {
        let reader = client.request_stream(request).await?;
        futures::pin_mut!(reader);
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        anyhow::Ok(body)
    };
    let body = tokio::time::timeout(Duration::from_secs(PUBLIC_KEY_FETCH_TIMEOUT_SECS), fetch)
        .await
        .context("timed out fetching public key")?
        .context("unable to fetch public key")?;

    peer_key_from_bytes(&body).context("unable to fetch peer key")
}

/// Encode a Lockbox followed by a newline
pub fn encode(lockbox: &Lockbox, format: OutputFormat) -> Result<String> {
    let mut out = match format {
        OutputFormat::Yaml => serde_yaml::to_string(lockbox).context("unable to encode Lockbox")?,
        OutputFormat::Json => {
            serde_json::to_string_pretty(lockbox).context("unable to encode Lockbox")?
        }
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Seal a Secret document for `peer` with a fresh sender key pair
pub fn seal_document(
    input: &[u8],
    namespace: Option<&str>,
    fallback_namespace: &str,
    peer: &PublicKey,
) -> Result<Lockbox> {
    let secret = parse_secret(input)?;
    let namespace = target_namespace(&secret, namespace, fallback_namespace);
    let sender = KeyPair::generate();

    info!(
        secret = secret.metadata.name.as_deref().unwrap_or_default(),
        namespace = %namespace,
        peer = %peer,
        "Sealing secret"
    );
    Lockbox::new_from_secret(&secret, &namespace, peer, &sender).context("unable to seal secret")
}

fn read_input(file: Option<&PathBuf>) -> Result<Vec<u8>> {
    let mut input = Vec::new();
    match file {
        Some(path) => {
            std::fs::File::open(path)
                .with_context(|| format!("unable to open secret file {}", path.display()))?
                .read_to_end(&mut input)
                .context("unable to read secret file")?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut input)
                .context("unable to read secret from stdin")?;
        }
    }
    Ok(input)
}

/// Client configuration from `--kubeconfig` and `--master`
///
/// Without a kubeconfig path the configuration is inferred from the
/// environment. A master URL replaces the cluster address, and is enough on
/// its own when nothing can be inferred.
pub async fn load_kube_config(kubeconfig: Option<&Path>, master: Option<&str>) -> Result<kube::Config> {
    let master = master
        .map(|url| {
            url.parse::<http::Uri>()
                .with_context(|| format!("invalid --master URL {url:?}"))
        })
        .transpose()?;

    let mut config = match (kubeconfig, &master) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("unable to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("unable to load kubeconfig")?
        }
        (None, Some(master)) => match kube::Config::infer().await {
            Ok(config) => config,
            Err(e) => {
                debug!(error = %e, "No kubeconfig found, using --master alone");
                kube::Config::new(master.clone())
            }
        },
        (None, None) => kube::Config::infer()
            .await
            .context("unable to load kubeconfig")?,
    };

    if let Some(master) = master {
        config.cluster_url = master;
    }
    Ok(config)
}

/// Run `locket`, writing the sealed document to stdout
pub async fn run(args: Args) -> Result<()> {
    let input = read_input(args.file.as_ref())?;
    let kube_config = load_kube_config(args.kubeconfig.as_deref(), args.master.as_deref()).await;

    let peer = match args.peer_hex.as_deref() {
        Some(hex) => PublicKey::from_hex(hex).context("could not load --peer-hex")?,
        None => {
            let config = kube_config
                .as_ref()
                .map_err(|e| anyhow!("{e:#}"))
                .context("unable to create API client")?;
            let client = Client::try_from(config.clone()).context("unable to create API client")?;
            fetch_peer_key(&client, &args.lockbox_namespace, &args.lockbox_service).await?
        }
    };

    let fallback = match &kube_config {
        Ok(config) => config.default_namespace.clone(),
        Err(e) => {
            warn!("Unable to load kubeconfig, using namespace \"default\": {:#}", e);
            "default".to_string()
        }
    };
    let lockbox = seal_document(&input, args.namespace.as_deref(), &fallback, &peer)?;

    print!("{}", encode(&lockbox, args.output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_YAML: &str = "\
apiVersion: v1
kind: Secret
metadata:
  name: example
  namespace: example
  labels:
    app: web
type: Opaque
data:
  test: dGVzdA==
stringData:
  test1: test1
";

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["locket", "--peer-hex", "00"]).unwrap();
        assert_eq!(args.output, OutputFormat::Yaml);
        assert_eq!(args.lockbox_namespace, "lockbox");
        assert_eq!(args.lockbox_service, "lockbox");
        assert!(args.file.is_none());
        assert!(args.namespace.is_none());
        assert!(args.kubeconfig.is_none());
        assert!(args.master.is_none());
    }

    #[test]
    fn test_args_accept_cluster_flags() {
        let args = Args::try_parse_from([
            "locket",
            "--kubeconfig",
            "/tmp/staging.yaml",
            "--master",
            "https://10.0.0.1:6443",
        ])
        .unwrap();
        assert_eq!(args.kubeconfig, Some(PathBuf::from("/tmp/staging.yaml")));
        assert_eq!(args.master.as_deref(), Some("https://10.0.0.1:6443"));
    }

    const KUBECONFIG_YAML: &str = "\
apiVersion: v1
kind: Config
clusters:
- name: staging
  cluster:
    server: https://staging.example.com:6443
contexts:
- name: staging
  context:
    cluster: staging
    user: ci
    namespace: team-a
current-context: staging
users:
- name: ci
  user:
    token: not-a-real-token
";

    fn kubeconfig_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, KUBECONFIG_YAML.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_kubeconfig_flag_selects_cluster_and_namespace() {
        let file = kubeconfig_file();

        let config = load_kube_config(Some(file.path()), None).await.unwrap();
        assert_eq!(config.cluster_url.scheme_str(), Some("https"));
        assert_eq!(
            config.cluster_url.authority().unwrap().as_str(),
            "staging.example.com:6443"
        );
        assert_eq!(config.default_namespace, "team-a");
    }

    #[tokio::test]
    async fn test_master_flag_overrides_kubeconfig_server() {
        let file = kubeconfig_file();

        let config = load_kube_config(Some(file.path()), Some("https://10.0.0.1:6443"))
            .await
            .unwrap();
        assert_eq!(config.cluster_url.authority().unwrap().as_str(), "10.0.0.1:6443");
        assert_eq!(config.default_namespace, "team-a");
    }

    #[tokio::test]
    async fn test_invalid_master_is_rejected() {
        let file = kubeconfig_file();

        let err = load_kube_config(Some(file.path()), Some("https://bad host"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid --master URL"));
    }

    #[test]
    fn test_args_reject_unknown_output() {
        assert!(Args::try_parse_from(["locket", "-o", "toml"]).is_err());
    }

    #[test]
    fn test_target_namespace_precedence() {
        let mut secret = parse_secret(SECRET_YAML.as_bytes()).unwrap();
        assert_eq!(target_namespace(&secret, Some("other"), "default"), "example");

        secret.metadata.namespace = None;
        assert_eq!(target_namespace(&secret, Some("other"), "default"), "other");
        assert_eq!(target_namespace(&secret, None, "default"), "default");
    }

    #[test]
    fn test_peer_key_must_be_32_bytes() {
        let err = peer_key_from_bytes(&[1u8; 31]).unwrap_err();
        assert_eq!(err.to_string(), "incorrect peer key length: 31, should be 32");
        assert!(peer_key_from_bytes(&[1u8; 32]).is_ok());
    }

    #[test]
    fn test_seal_document_binds_namespace_and_merges_string_data() {
        let peer = KeyPair::generate();
        let lockbox = seal_document(SECRET_YAML.as_bytes(), None, "default", &peer.public).unwrap();

        assert_eq!(lockbox.metadata.name.as_deref(), Some("example"));
        assert_eq!(lockbox.metadata.namespace.as_deref(), Some("example"));
        assert_eq!(lockbox.open_namespace(&peer.private).unwrap(), b"example");
        assert_eq!(
            lockbox.spec.data.keys().collect::<Vec<_>>(),
            ["test", "test1"]
        );
        assert_ne!(lockbox.sender_key().unwrap(), peer.public);
    }

    #[test]
    fn test_seal_document_rejects_non_secret() {
        let peer = KeyPair::generate();
        let doc = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n";
        assert!(seal_document(doc.as_bytes(), None, "default", &peer.public).is_err());
    }

    #[test]
    fn test_encode_outputs_lockbox_document() {
        let peer = KeyPair::generate();
        let lockbox = seal_document(SECRET_YAML.as_bytes(), None, "default", &peer.public).unwrap();

        let yaml = encode(&lockbox, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("apiVersion: lockbox.k8s.cloudflare.com/v1\n"));
        assert!(yaml.contains("kind: Lockbox\n"));
        assert!(yaml.ends_with('\n'));

        let json = encode(&lockbox, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "Lockbox");
        assert_eq!(value["spec"]["template"]["type"], "Opaque");
        assert!(json.ends_with("}\n"));
    }
}
