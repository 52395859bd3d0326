use std::fmt;
use std::io::Read;
use std::path::Path;

use base64::Engine as _;
use k8s_openapi::ByteString;
use rand_core::OsRng;
use serde::Deserialize;
use thiserror::Error;

/// Size in bytes of both halves of a key pair
pub const KEY_SIZE: usize = 32;

/// Errors raised while building keys or loading a key-pair file
#[derive(Debug, Error)]
pub enum KeyPairError {
    #[error("incorrect {which} key length: {actual}, should be {KEY_SIZE}")]
    InvalidLength { which: &'static str, actual: usize },

    #[error("invalid hex key: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("unable to read keypair: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse keypair: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Curve25519 public key
///
/// Identifies the sender of a Lockbox and the peer able to unlock it.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(crypto_box::PublicKey);

impl PublicKey {
    /// Build a public key from a byte slice that must be exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyPairError> {
        let bytes: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| KeyPairError::InvalidLength {
                    which: "public",
                    actual: bytes.len(),
                })?;
        Ok(Self::from(bytes))
    }

    /// Parse a public key from 64 hex characters, as accepted by `locket --peer-hex`
    pub fn from_hex(hex: &str) -> Result<Self, KeyPairError> {
        let bytes = hex::decode(hex.trim())?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.as_bytes())
    }

    pub(crate) fn inner(&self) -> &crypto_box::PublicKey {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for PublicKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(crypto_box::PublicKey::from(bytes))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base64()).finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Curve25519 private key
///
/// The underlying scalar is zeroized on drop and never printed.
#[derive(Clone)]
pub struct SecretKey(crypto_box::SecretKey);

impl SecretKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyPairError> {
        let bytes: [u8; KEY_SIZE] =
            bytes
                .try_into()
                .map_err(|_| KeyPairError::InvalidLength {
                    which: "private",
                    actual: bytes.len(),
                })?;
        Ok(Self(crypto_box::SecretKey::from(bytes)))
    }

    pub fn from_hex(hex: &str) -> Result<Self, KeyPairError> {
        let mut bytes = hex::decode(hex.trim())?;
        let key = Self::from_slice(&bytes);
        zeroize::Zeroize::zeroize(&mut bytes);
        key
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0.to_bytes())
    }

    pub(crate) fn inner(&self) -> &crypto_box::SecretKey {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// A reconciling identity: public key published to sealers, private key used to unlock
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: SecretKey,
}

/// On-disk key-pair document. Byte fields are base64, the same encoding
/// Kubernetes uses for `[]byte`, and unknown fields are rejected.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyPairFile {
    private: ByteString,
    public: ByteString,
}

impl KeyPair {
    /// Generate a fresh key pair from the operating system RNG
    pub fn generate() -> Self {
        let private = crypto_box::SecretKey::generate(&mut OsRng);
        let public = PublicKey(private.public_key());
        Self {
            public,
            private: SecretKey(private),
        }
    }

    pub fn from_hex(public: &str, private: &str) -> Result<Self, KeyPairError> {
        Ok(Self {
            public: PublicKey::from_hex(public)?,
            private: SecretKey::from_hex(private)?,
        })
    }

    /// Load a key pair from a YAML or JSON document with `private` and `public` fields
    pub fn from_yaml_or_json<R: Read>(mut reader: R) -> Result<Self, KeyPairError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let parsed = serde_yaml::from_slice::<KeyPairFile>(&data);
        zeroize::Zeroize::zeroize(&mut data);
        let mut file = parsed?;

        let private = SecretKey::from_slice(&file.private.0);
        zeroize::Zeroize::zeroize(&mut file.private.0);

        Ok(Self {
            private: private?,
            public: PublicKey::from_slice(&file.public.0)?,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyPairError> {
        let file = std::fs::File::open(path)?;
        Self::from_yaml_or_json(file)
    }
}
