use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::api::error::ApiError;
use crate::api::models::*;
use crate::serializer;
use crate::store::{self, StoreError};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/restaurant_pizzas", post(create_restaurant_pizza))
}

#[utoipa::path(
    post,
    path = "/restaurant_pizzas",
    request_body = CreateRestaurantPizzaRequest,
    responses(
        (status = 201, description = "Restaurant pizza created, with its pizza and restaurant"),
        (status = 400, description = "Invalid price, body or references", body = ApiErrorsResponse),
    ),
    tag = "restaurant_pizzas"
)]
#[instrument(skip(state, payload))]
pub async fn create_restaurant_pizza(
    State(state): State<AppState>,
    payload: Result<Json<CreateRestaurantPizzaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| ApiError::BadRequest(vec![rejection.body_text()]))?;
    let restaurant_pizza = payload.validate().map_err(ApiError::BadRequest)?;

    let body = state
        .store
        .run(move |conn| {
            store::create_restaurant_pizza_then(conn, &restaurant_pizza, |conn, created| {
                let body = serializer::to_dict(&created, conn, &[])?;
                info!(id = created.id, price = created.price, "created restaurant pizza");
                Ok(body)
            })
        })
        .await
        .map_err(|err| match err {
            err @ (StoreError::Validation(_) | StoreError::ReferentialIntegrity(_)) => {
                ApiError::from(err)
            }
            err => {
                error!(error = %err, "failed to create restaurant pizza");
                ApiError::BadRequest(vec!["Unable to create restaurant pizza".to_string()])
            }
        })?;

    Ok((StatusCode::CREATED, Json(body)))
}
