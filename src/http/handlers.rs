//! Route handlers for the order API.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::orders::{Order, OrderError};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub total_amount: f64,
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidAmount(_) => ApiError::Validation(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::Repository(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// `POST /api/orders`
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.orders.create(body.user_id, body.total_amount).await?;
    let location = format!("/api/orders/{}", order.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(order)))
}

/// `GET /api/orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    match state.orders.get(id).await? {
        Some(order) => Ok(Json(order)),
        None => Err(ApiError::NotFound(format!("order {id}"))),
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
