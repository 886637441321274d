//! Channel preference endpoint.

use axum::{extract::State, Json};

use crate::error::{AppError, Result};
use crate::preference::Preferences;
use crate::server::AppState;

/// PUT /api/v1/preferences - create or replace a preference row
#[tracing::instrument(
    name = "http.upsert_preferences",
    skip(state, preferences),
    fields(account_id = %preferences.account_id, merchant_id = ?preferences.merchant_id)
)]
pub async fn upsert_preferences(
    State(state): State<AppState>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<Preferences>> {
    if preferences
        .preferred_locale
        .as_deref()
        .is_some_and(|l| l.trim().is_empty() || l.len() > 16)
    {
        return Err(AppError::Validation(
            "preferred_locale must be 1-16 characters".to_string(),
        ));
    }

    let saved = state.coordinator.preferences().upsert(preferences).await?;
    Ok(Json(saved))
}
