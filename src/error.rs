use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::types::ErrorOut;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Invalid plot type: {0}")]
    UnknownChartType(String),
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("render failure: {0}")]
    RenderFailure(String),
}

impl ChartError {
    pub fn render(e: impl std::fmt::Display) -> Self {
        ChartError::RenderFailure(e.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChartError::UnknownChartType(_) => "unknown_chart_type",
            ChartError::DataUnavailable(_) => "data_unavailable",
            ChartError::RenderFailure(_) => "render_failure",
        }
    }
}

/// Every chart failure shares one response shape; only the message differs.
impl IntoResponse for ChartError {
    fn into_response(self) -> Response {
        error!(kind = self.kind(), "chart request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorOut {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
