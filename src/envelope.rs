//! Hybrid public-key envelope.
//!
//! A fresh 256-bit session key encrypts the message with AES-256-EAX; the
//! session key itself is wrapped for the recipient with RSA-2048 OAEP
//! (SHA-1 digest and MGF1). The envelope is a flat concatenation:
//!
//! ```text
//! [wrapped session key: 256][nonce: 16][tag: 16][ciphertext: len(message)]
//! ```
//!
//! There is no length field; the ciphertext runs to the end of the blob.

use crate::error::{PixelCryptError, Result};
use aes::Aes256;
use eax::aead::generic_array::GenericArray;
use eax::aead::{AeadInPlace, KeyInit};
use eax::Eax;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use zeroize::Zeroizing;

type SessionCipher = Eax<Aes256>;

/// RSA modulus size in bits
pub const RSA_BITS: usize = 2048;
/// Size of the OAEP-wrapped session key
pub const WRAPPED_KEY_LEN: usize = RSA_BITS / 8;
pub const SESSION_KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
/// Smallest well-formed envelope (empty ciphertext)
pub const MIN_ENVELOPE_LEN: usize = WRAPPED_KEY_LEN + NONCE_LEN + TAG_LEN;

/// PEM-encoded RSA keypair as handed to callers
#[derive(Clone)]
pub struct KeyPair {
    /// PKCS#8 `PRIVATE KEY` PEM
    pub private_pem: Zeroizing<String>,
    /// SPKI `PUBLIC KEY` PEM
    pub public_pem: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_pem", &"<redacted>")
            .field("public_pem", &self.public_pem)
            .finish()
    }
}

/// Generate a fresh RSA-2048 keypair
pub fn generate_keypair() -> Result<KeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
        .map_err(|e| PixelCryptError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| PixelCryptError::KeyGeneration(e.to_string()))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| PixelCryptError::KeyGeneration(e.to_string()))?;

    Ok(KeyPair {
        private_pem: Zeroizing::new(private_pem.as_str().to_owned()),
        public_pem,
    })
}

/// Envelope length for a message of `message_len` bytes
pub fn sealed_len(message_len: usize) -> usize {
    MIN_ENVELOPE_LEN + message_len
}

/// Parse an SPKI or PKCS#1 public key PEM
pub fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey> {
    let text = pem_text(pem)?;
    let key = RsaPublicKey::from_public_key_pem(text)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
        .map_err(|e| PixelCryptError::KeyFormat(format!("public key: {}", e)))?;
    check_modulus(key.size())?;
    Ok(key)
}

/// Parse a PKCS#8 or PKCS#1 private key PEM
pub fn parse_private_key(pem: &[u8]) -> Result<RsaPrivateKey> {
    let text = pem_text(pem)?;
    let key = RsaPrivateKey::from_pkcs8_pem(text)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(text))
        .map_err(|e| PixelCryptError::KeyFormat(format!("private key: {}", e)))?;
    check_modulus(key.size())?;
    Ok(key)
}

fn pem_text(pem: &[u8]) -> Result<&str> {
    std::str::from_utf8(pem)
        .map(str::trim)
        .map_err(|_| PixelCryptError::KeyFormat("key file is not PEM text".into()))
}

fn check_modulus(bytes: usize) -> Result<()> {
    if bytes != WRAPPED_KEY_LEN {
        return Err(PixelCryptError::KeyFormat(format!(
            "expected a {}-bit RSA key, got {} bits",
            RSA_BITS,
            bytes * 8
        )));
    }
    Ok(())
}

/// Encrypt `message` for the holder of the private half of `public_key_pem`
pub fn seal(message: &[u8], public_key_pem: &[u8]) -> Result<Vec<u8>> {
    let recipient = parse_public_key(public_key_pem)?;
    seal_for(message, &recipient)
}

/// [`seal`] with an already parsed key
pub fn seal_for(message: &[u8], recipient: &RsaPublicKey) -> Result<Vec<u8>> {
    let mut rng = OsRng;

    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    rng.fill_bytes(session_key.as_mut());
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let cipher = SessionCipher::new(GenericArray::from_slice(session_key.as_ref()));
    let mut body = message.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut body)
        .map_err(|_| PixelCryptError::Format("message too long to encrypt".into()))?;

    let wrapped = recipient
        .encrypt(&mut rng, Oaep::new::<Sha1>(), session_key.as_ref())
        .map_err(|e| PixelCryptError::KeyFormat(format!("cannot wrap session key: {}", e)))?;

    let mut envelope = Vec::with_capacity(sealed_len(message.len()));
    envelope.extend_from_slice(&wrapped);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&tag);
    envelope.extend_from_slice(&body);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`seal`].
///
/// A blob shorter than [`MIN_ENVELOPE_LEN`] is a `Format` error and no
/// cryptography is attempted. Every cryptographic failure collapses into
/// `AuthenticationFailure`.
pub fn open(envelope: &[u8], private_key_pem: &[u8]) -> Result<Vec<u8>> {
    check_envelope_len(envelope)?;
    let key = parse_private_key(private_key_pem)?;
    open_with(envelope, &key)
}

/// [`open`] with an already parsed key
pub fn open_with(envelope: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>> {
    check_envelope_len(envelope)?;

    let (wrapped, rest) = envelope.split_at(WRAPPED_KEY_LEN);
    let (nonce, rest) = rest.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let session_key = Zeroizing::new(
        key.decrypt(Oaep::new::<Sha1>(), wrapped)
            .map_err(|_| PixelCryptError::AuthenticationFailure)?,
    );
    if session_key.len() != SESSION_KEY_LEN {
        return Err(PixelCryptError::AuthenticationFailure);
    }

    let cipher = SessionCipher::new(GenericArray::from_slice(&session_key));
    let mut body = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut body,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| PixelCryptError::AuthenticationFailure)?;

    Ok(body)
}

fn check_envelope_len(envelope: &[u8]) -> Result<()> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(PixelCryptError::Format(format!(
            "envelope is {} bytes, minimum is {}",
            envelope.len(),
            MIN_ENVELOPE_LEN
        )));
    }
    Ok(())
}
