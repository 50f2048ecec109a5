use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::Value;
use tracing::instrument;

use crate::api::error::ApiError;
use crate::{serializer, store};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/pizzas", get(list_pizzas))
}

#[utoipa::path(
    get,
    path = "/pizzas",
    responses(
        (status = 200, description = "List of pizzas"),
    ),
    tag = "pizzas"
)]
#[instrument(skip(state))]
pub async fn list_pizzas(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let body = state
        .store
        .run(|conn| {
            let pizzas = store::list_pizzas(conn)?;
            serializer::to_dict_all(&pizzas, conn, &[])
        })
        .await?;

    Ok(Json(body))
}
