//! Ownership-claim protocol: the validation pipeline in front of the ledger.
//!
//! Stages run in order, each a hard gate; the first failure terminates the
//! claim with a specific error and no partial effect. The ledger is only
//! touched by the final append, inside one exclusive critical section.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::crypto::{self, CryptoError};
use crate::model::{terrain_for_color, Block, ClaimPayload, Ledger, GRID_SIZE, PALETTE};
use crate::storage::StorageError;

/// Inbound claim: coordinates, palette color and the claimant's credentials.
/// `terrain` is never accepted from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub x: i64,
    pub y: i64,
    pub color: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default, rename = "publicKey")]
    pub public_key: Option<String>,
}

/// Claim rejections, in pipeline order. Messages are client-facing and in the
/// product's language; the signature variants stay deliberately vague so the
/// response does not reveal which verification sub-step failed.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Coordonnées invalides (0-99)")]
    InvalidCoordinates,
    #[error("Couleur invalide. Choix possibles : {choices}")]
    InvalidColor { choices: String },
    #[error("Cette case appartient déjà à quelqu'un !")]
    CellAlreadyOwned,
    #[error("Signature et clé publique requises")]
    MissingCredentials,
    #[error("Signature invalide")]
    InvalidSignature,
    #[error("Échec de la vérification cryptographique")]
    CryptoFailure,
    #[error("Échec de l'enregistrement du bloc")]
    Persistence(#[source] StorageError),
}

impl ClaimError {
    fn invalid_color() -> Self {
        let choices = PALETTE
            .iter()
            .map(|(color, _)| *color)
            .collect::<Vec<_>>()
            .join(", ");
        ClaimError::InvalidColor { choices }
    }
}

impl From<CryptoError> for ClaimError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSignature => ClaimError::InvalidSignature,
            CryptoError::VerificationFailure => ClaimError::CryptoFailure,
        }
    }
}

/// The exact message the claimant signs: compact JSON of `{x, y, color}` in
/// that key order. Any change to the key set or ordering breaks verification
/// against browser-side signers.
pub fn canonical_message(x: u32, y: u32, color: &str) -> String {
    #[derive(Serialize)]
    struct SignedClaim<'a> {
        x: u32,
        y: u32,
        color: &'a str,
    }
    serde_json::to_string(&SignedClaim { x, y, color }).expect("canonical claim json")
}

fn parse_coordinates(x: i64, y: i64) -> Result<(u32, u32), ClaimError> {
    let range = 0..i64::from(GRID_SIZE);
    if range.contains(&x) && range.contains(&y) {
        Ok((x as u32, y as u32))
    } else {
        Err(ClaimError::InvalidCoordinates)
    }
}

/// Run one claim through the full pipeline and, on success, append its block.
///
/// Stages 1-6 never mutate the ledger. The uniqueness check is evaluated
/// once up front for fast rejection, then re-evaluated inside the exclusive
/// section together with the append, which closes the check-then-act race
/// between two concurrent claims for the same cell.
pub fn process_claim(ledger: &Mutex<Ledger>, request: &ClaimRequest) -> Result<Block, ClaimError> {
    // 1) coordinates
    let (x, y) = parse_coordinates(request.x, request.y)?;

    // 2) color, with terrain derived from the palette
    let terrain = terrain_for_color(&request.color).ok_or_else(ClaimError::invalid_color)?;

    // 3) uniqueness pre-check (re-checked under the lock below)
    if ledger.lock().unwrap().is_cell_owned(x, y) {
        return Err(ClaimError::CellAlreadyOwned);
    }

    // 4) credentials present
    let (signature_b64, public_key_b64) = match (&request.signature, &request.public_key) {
        (Some(sig), Some(key)) if !sig.trim().is_empty() && !key.trim().is_empty() => (sig, key),
        _ => return Err(ClaimError::MissingCredentials),
    };

    // 5) signature over the canonical {x, y, color} tuple
    let spki = crypto::decode_b64(public_key_b64)?;
    let signature = crypto::decode_b64(signature_b64)?;
    let message = canonical_message(x, y, &request.color);
    crypto::verify_claim_signature(&spki, &signature, message.as_bytes())?;

    // 6) owner address derived from the public key
    let owner = crypto::derive_address(&spki);

    // 7) exclusive section: re-validate uniqueness, append, persist
    let mut guard = ledger.lock().unwrap();
    if guard.is_cell_owned(x, y) {
        return Err(ClaimError::CellAlreadyOwned);
    }
    let block = guard
        .append(ClaimPayload {
            x,
            y,
            color: request.color.clone(),
            terrain: terrain.to_string(),
            owner: owner.clone(),
        })
        .map_err(ClaimError::Persistence)?;
    drop(guard);

    info!(x, y, terrain, %owner, "nouvelle case acquise");
    Ok(block)
}
