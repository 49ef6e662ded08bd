/*! Cryptography of the onion overlay.

Three groups of primitives, all pure functions:

- long-lived relay identities (`crypto_box` X25519 key pairs) and their
  text export/import;
- sealed layer encryption: a short secret is encrypted so that only the
  holder of the recipient `SecretKey` can recover it, using an ephemeral
  key pair that is prepended to the output;
- symmetric authenticated encryption (`XSalsa20Poly1305`) with the nonce
  prepended to the ciphertext, so a single flat byte string carries
  everything decryption needs.

The base64 codec here is the canonical binary <-> text encoding for every
envelope field, which keeps field lengths predictable.
*/

#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crypto_box::aead::generic_array::typenum::marker_traits::Unsigned;
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::SalsaBox;
use rand::{CryptoRng, Rng};
use thiserror::Error;
use xsalsa20poly1305::aead::KeyInit;
use xsalsa20poly1305::XSalsa20Poly1305;

pub use crypto_box::{PublicKey, SecretKey};

/// Raw symmetric key for one envelope layer. Generated fresh per hop per
/// message and transmitted only inside a sealed block.
pub type SymmetricKey = xsalsa20poly1305::Key;

/// Size in bytes of an exported `SymmetricKey`.
pub const SYMMETRIC_KEY_SIZE: usize = xsalsa20poly1305::KEY_SIZE;

/// Size in bytes of the nonce prepended to symmetric ciphertext.
pub const SYMMETRIC_NONCE_SIZE: usize = xsalsa20poly1305::NONCE_SIZE;

/// Size in bytes of the nonce used inside a sealed block.
pub const SEAL_NONCE_SIZE: usize = <SalsaBox as AeadCore>::NonceSize::USIZE;

/** Size in bytes of a sealed block produced by [`seal`].

Serialized form:

Length | Content
------ | ------
`32`   | Ephemeral `PublicKey`
`24`   | Nonce
`48`   | Encrypted symmetric key (32 bytes + 16 bytes MAC)

The block size is constant because [`seal`] accepts at most
`SYMMETRIC_KEY_SIZE` bytes and is only ever fed exported symmetric keys.
Relays rely on this: they slice envelopes positionally.
*/
pub const SEALED_BLOCK_SIZE: usize = crypto_box::KEY_SIZE
    + SEAL_NONCE_SIZE
    + SYMMETRIC_KEY_SIZE
    + <SalsaBox as AeadCore>::TagSize::USIZE;

/// Error that can happen in a crypto operation.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CryptoError {
    /// Plaintext passed to `seal` is longer than an exported symmetric key.
    #[error("Sealed plaintext cannot exceed {SYMMETRIC_KEY_SIZE} bytes")]
    OversizedPlaintext,
    /// Ciphertext cannot be decrypted with the given key.
    #[error("Decrypt data error")]
    Decrypt,
    /// Key material or ciphertext has the wrong length.
    #[error("Malformed key material")]
    Malformed,
    /// Text field is not valid base64.
    #[error("Invalid base64 text")]
    Base64,
}

/// Encode bytes with the canonical text codec of the protocol.
pub fn encode_text(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode text produced by [`encode_text`].
pub fn decode_text(text: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64.decode(text).map_err(|_| CryptoError::Base64)
}

/// Export a `PublicKey` in the form the registry stores and serves.
pub fn export_public_key(pk: &PublicKey) -> String {
    encode_text(pk.as_bytes())
}

/// Import a `PublicKey` from its exported text form.
pub fn import_public_key(text: &str) -> Result<PublicKey, CryptoError> {
    let bytes = decode_text(text)?;
    let bytes: [u8; crypto_box::KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::Malformed)?;
    Ok(PublicKey::from(bytes))
}

/** Encrypt a short secret under `pk` so that only the holder of the
matching `SecretKey` can recover it.

An ephemeral key pair is generated per call; its public half and the nonce
are prepended to the ciphertext, so the output is self-contained. Fails
with `CryptoError::OversizedPlaintext` when `plain` is longer than
`SYMMETRIC_KEY_SIZE`. Callers must only pass exported symmetric keys,
which keeps the output length at `SEALED_BLOCK_SIZE`.
*/
pub fn seal<R: Rng + CryptoRng>(
    rng: &mut R,
    plain: &[u8],
    pk: &PublicKey,
) -> Result<Vec<u8>, CryptoError> {
    if plain.len() > SYMMETRIC_KEY_SIZE {
        return Err(CryptoError::OversizedPlaintext);
    }
    let ephemeral_sk = SecretKey::generate(rng);
    let ephemeral_pk = ephemeral_sk.public_key();
    let precomputed = SalsaBox::new(pk, &ephemeral_sk);
    let nonce = SalsaBox::generate_nonce(&mut *rng);
    // cannot fail, plaintext length is bounded
    let encrypted = precomputed.encrypt(&nonce, plain).unwrap();

    let mut sealed = Vec::with_capacity(SEALED_BLOCK_SIZE);
    sealed.extend_from_slice(ephemeral_pk.as_bytes());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&encrypted);
    Ok(sealed)
}

/** Recover the secret from a sealed block using the recipient `SecretKey`.

Returns `Error` in case of failure:

- block is too short to contain an ephemeral key and a nonce
- MAC verification fails (wrong key or tampered block)
*/
pub fn unseal(sealed: &[u8], sk: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < crypto_box::KEY_SIZE + SEAL_NONCE_SIZE {
        return Err(CryptoError::Malformed);
    }
    let (pk_bytes, rest) = sealed.split_at(crypto_box::KEY_SIZE);
    let (nonce_bytes, encrypted) = rest.split_at(SEAL_NONCE_SIZE);
    let pk_bytes: [u8; crypto_box::KEY_SIZE] = pk_bytes.try_into().map_err(|_| CryptoError::Malformed)?;
    let nonce: [u8; SEAL_NONCE_SIZE] = nonce_bytes.try_into().map_err(|_| CryptoError::Malformed)?;
    let ephemeral_pk = PublicKey::from(pk_bytes);
    let precomputed = SalsaBox::new(&ephemeral_pk, sk);
    precomputed
        .decrypt((&nonce).into(), encrypted)
        .map_err(|_| CryptoError::Decrypt)
}

/// Generate a fresh symmetric key for one envelope layer.
pub fn generate_symmetric_key<R: Rng + CryptoRng>(rng: &mut R) -> SymmetricKey {
    XSalsa20Poly1305::generate_key(rng)
}

/// Import a `SymmetricKey` from raw exported bytes.
pub fn symmetric_key_from_bytes(bytes: &[u8]) -> Result<SymmetricKey, CryptoError> {
    if bytes.len() != SYMMETRIC_KEY_SIZE {
        return Err(CryptoError::Malformed);
    }
    Ok(SymmetricKey::clone_from_slice(bytes))
}

/// Encrypt `plain` under `key` with a fresh nonce. The nonce is prepended
/// to the ciphertext so the output is a single flat byte string.
pub fn encrypt_symmetric<R: Rng + CryptoRng>(
    rng: &mut R,
    key: &SymmetricKey,
    plain: &[u8],
) -> Vec<u8> {
    let cipher = XSalsa20Poly1305::new(key);
    let nonce = XSalsa20Poly1305::generate_nonce(&mut *rng);
    // cannot fail with a valid key and nonce
    let encrypted = cipher.encrypt(&nonce, plain).unwrap();

    let mut data = Vec::with_capacity(SYMMETRIC_NONCE_SIZE + encrypted.len());
    data.extend_from_slice(nonce.as_slice());
    data.extend_from_slice(&encrypted);
    data
}

/// Decrypt data produced by [`encrypt_symmetric`]. The ciphertext is
/// authenticated, so a wrong key or a corrupted byte fails the MAC check
/// instead of yielding garbage.
pub fn decrypt_symmetric(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < SYMMETRIC_NONCE_SIZE {
        return Err(CryptoError::Malformed);
    }
    let (nonce, encrypted) = data.split_at(SYMMETRIC_NONCE_SIZE);
    let cipher = XSalsa20Poly1305::new(key);
    cipher
        .decrypt(xsalsa20poly1305::Nonce::from_slice(nonce), encrypted)
        .map_err(|_| CryptoError::Decrypt)
}
