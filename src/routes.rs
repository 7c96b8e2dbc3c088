//! HTTP routes over the ledger: claim submission and the derived read views.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::claim::{process_claim, ClaimError, ClaimRequest};
use crate::model::Block;
use crate::AppState;

impl ClaimError {
    /// HTTP status for each rejection class. Missing and invalid credentials
    /// share 401; key-import faults surface as a server error.
    pub fn status(&self) -> StatusCode {
        match self {
            ClaimError::InvalidCoordinates | ClaimError::InvalidColor { .. } => {
                StatusCode::BAD_REQUEST
            }
            ClaimError::CellAlreadyOwned => StatusCode::FORBIDDEN,
            ClaimError::MissingCredentials | ClaimError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            ClaimError::CryptoFailure | ClaimError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ClaimError {
    fn into_response(self) -> Response {
        if let ClaimError::Persistence(err) = &self {
            error!(%err, "failed to persist accepted claim");
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    pub block: Block,
}

/// POST /acquerir-case
pub async fn acquire_cell(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ClaimError> {
    let block = process_claim(&state.ledger, &request)?;
    Ok(Json(ClaimResponse {
        success: true,
        block,
    }))
}

/// GET /gridstate
pub async fn grid_state(State(state): State<AppState>) -> Response {
    let guard = state.ledger.lock().unwrap();
    Json(guard.grid_state()).into_response()
}

/// GET /api/leaderboard
pub async fn leaderboard(State(state): State<AppState>) -> Response {
    let guard = state.ledger.lock().unwrap();
    Json(guard.leaderboard(10)).into_response()
}

/// GET /blocks
pub async fn blocks(State(state): State<AppState>) -> Response {
    let guard = state.ledger.lock().unwrap();
    Json(guard.blocks()).into_response()
}

/// GET /integrity
pub async fn integrity(State(state): State<AppState>) -> Response {
    let guard = state.ledger.lock().unwrap();
    Json(json!({ "isValid": guard.validate() })).into_response()
}

/// GET /health
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_matches_the_protocol_contract() {
        assert_eq!(
            ClaimError::InvalidCoordinates.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClaimError::InvalidColor { choices: String::new() }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ClaimError::CellAlreadyOwned.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ClaimError::MissingCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ClaimError::InvalidSignature.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ClaimError::CryptoFailure.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
