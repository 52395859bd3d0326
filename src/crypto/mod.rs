//! # Crypto
//!
//! NaCl public-key authenticated encryption used to lock and unlock Lockbox values.
//!
//! Every sealed value is self-contained: a random 24 byte nonce followed by the
//! output of `crypto_box` (Poly1305 tag, then XSalsa20 ciphertext). This is the
//! same layout produced by libsodium's `crypto_box_easy` with the nonce prepended,
//! so Lockboxes sealed by other NaCl implementations open here unchanged.
//!
//! ## Module Structure
//!
//! - `keys.rs` - 32 byte public/private keys and the key-pair file loader
//! - `sealed_box.rs` - `seal` / `open` over those keys

mod keys;
mod sealed_box;

pub use keys::{KeyPair, KeyPairError, PublicKey, SecretKey, KEY_SIZE};
pub use sealed_box::{open, seal, CryptoError, NONCE_SIZE, TAG_SIZE};
