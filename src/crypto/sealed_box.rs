use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand_core::{OsRng, RngCore};
use thiserror::Error;

use super::{PublicKey, SecretKey};

/// Size of the random nonce prepended to every sealed value
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authenticator that precedes the ciphertext
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("sealed value is {0} bytes, shorter than nonce and authenticator")]
    Truncated(usize),

    #[error("message authentication failed")]
    Authentication,

    #[error("unable to seal message")]
    Seal,
}

/// Seal `plaintext` so that only the holder of `peer`'s private key can open it.
///
/// A fresh nonce is drawn for every call, so sealing the same plaintext twice
/// yields different output.
pub fn seal(plaintext: &[u8], peer: &PublicKey, sender: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let salsa_box = SalsaBox::new(peer.inner(), sender.inner());
    let ciphertext = salsa_box
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a value produced by [`seal`], given the sender's public key and the local private key
pub fn open(sealed: &[u8], sender: &PublicKey, private: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated(sealed.len()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let salsa_box = SalsaBox::new(sender.inner(), private.inner());
    salsa_box
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use proptest::prelude::*;

    #[test]
    fn test_seal_uses_fresh_nonce() {
        let sender = KeyPair::generate();
        let peer = KeyPair::generate();

        let first = seal(b"example", &peer.public, &sender.private).unwrap();
        let second = seal(b"example", &peer.public, &sender.private).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.len(), NONCE_SIZE + TAG_SIZE + "example".len());
    }

    #[test]
    fn test_open_rejects_truncated_input() {
        let keypair = KeyPair::generate();
        assert_eq!(
            open(&[0u8; 39], &keypair.public, &keypair.private),
            Err(CryptoError::Truncated(39))
        );
    }

    #[test]
    fn test_open_rejects_wrong_recipient() {
        let sender = KeyPair::generate();
        let peer = KeyPair::generate();
        let stranger = KeyPair::generate();

        let sealed = seal(b"secret", &peer.public, &sender.private).unwrap();
        assert_eq!(
            open(&sealed, &sender.public, &stranger.private),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_sender_can_also_open_its_own_box() {
        // Box keys are symmetric in (sender, peer), matching NaCl semantics
        let sender = KeyPair::generate();
        let peer = KeyPair::generate();

        let sealed = seal(b"shared", &peer.public, &sender.private).unwrap();
        assert_eq!(open(&sealed, &peer.public, &sender.private).unwrap(), b"shared");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_seal_open_round_trip(message in proptest::collection::vec(any::<u8>(), 0..512)) {
            let sender = KeyPair::generate();
            let peer = KeyPair::generate();

            let sealed = seal(&message, &peer.public, &sender.private).unwrap();
            prop_assert_eq!(open(&sealed, &sender.public, &peer.private).unwrap(), message);
        }

        #[test]
        fn prop_any_flipped_bit_fails_authentication(
            message in proptest::collection::vec(any::<u8>(), 1..64),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let sender = KeyPair::generate();
            let peer = KeyPair::generate();

            let mut sealed = seal(&message, &peer.public, &sender.private).unwrap();
            let at = index.index(sealed.len());
            sealed[at] ^= 1 << bit;

            prop_assert_eq!(
                open(&sealed, &sender.public, &peer.private),
                Err(CryptoError::Authentication)
            );
        }
    }
}
