//! Cryptographic helpers: ECDSA P-256 claim verification and address derivation.
//!
//! Claimants sign in the browser with WebCrypto (`ECDSA`, curve P-256, digest
//! SHA-256). That fixes the wire encodings: the public key arrives as SPKI
//! DER and the signature as the raw 64-byte `r || s` form, both base64-wrapped.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Verification failures, deliberately coarse: callers must not learn which
/// sub-step rejected a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The signature bytes did not decode or did not verify.
    #[error("invalid signature")]
    InvalidSignature,
    /// The public key could not be imported; treated as a server-side fault.
    #[error("crypto verification failed")]
    VerificationFailure,
}

/// Decode a base64 wire field.
pub fn decode_b64(value: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value.trim())
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Verify an ECDSA P-256 / SHA-256 signature over `message`.
///
/// `spki_der` is the claimant's public key in SPKI DER; `signature` is the
/// raw 64-byte `r || s` encoding.
pub fn verify_claim_signature(
    spki_der: &[u8],
    signature: &[u8],
    message: &[u8],
) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_public_key_der(spki_der)
        .map_err(|_| CryptoError::VerificationFailure)?;
    let sig = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
    key.verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Derive the claimant's short owner address from their public key:
/// `"0x"` plus the first 10 hex chars of SHA-256(SPKI DER), uppercased.
/// Deterministic, so repeated claims by one key always report the same owner.
pub fn derive_address(spki_der: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(spki_der));
    format!("0x{}", digest[..10].to_uppercase())
}
