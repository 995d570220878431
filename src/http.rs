use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};

use crate::chart::{ChartEngine, ChartType};
use crate::model::RegressionModel;
use crate::types::{
    round2, ChartTypesOut, Features, GraphOut, GraphQuery, PredictionOut, StatusOut,
    ValidationOut,
};

pub const STATUS_MESSAGE: &str = "COVID-19 Death Prediction API is running.";

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<RegressionModel>,
    pub charts: Arc<ChartEngine>,
}

impl AppState {
    pub fn new(model: RegressionModel, charts: ChartEngine) -> Self {
        Self {
            model: Arc::new(model),
            charts: Arc::new(charts),
        }
    }
}

/// Shape for requests rejected by an extractor, before any handler logic.
fn validation_failure(detail: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ValidationOut { detail }),
    )
        .into_response()
}

async fn home() -> Json<StatusOut> {
    Json(StatusOut {
        message: STATUS_MESSAGE.to_string(),
    })
}

async fn chart_types() -> Json<ChartTypesOut> {
    Json(ChartTypesOut {
        chart_types: ChartType::labels(),
    })
}

async fn generate_graph(
    State(state): State<AppState>,
    query: Result<Query<GraphQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return validation_failure(rejection.body_text()),
    };
    debug!(plot_type = %query.plot_type, "generate_graph");

    match state.charts.generate(&query.plot_type).await {
        Ok(image_data) => Json(GraphOut { image_data }).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Features>, JsonRejection>,
) -> Result<Json<PredictionOut>, Response> {
    let Json(features) = payload.map_err(|rejection| validation_failure(rejection.body_text()))?;

    // Inference faults are not translated into a body.
    let raw = state.model.predict(&features.to_vec()).map_err(|e| {
        error!("prediction failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;

    Ok(Json(PredictionOut {
        Predicted_new_deaths: round2(raw),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/generate_graph", get(generate_graph))
        .route("/chart_types", get(chart_types))
        .route("/predict", post(predict))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

