use serde::{Deserialize, Serialize};

/// Body of `POST /predict`. Field order is the column order the regressor
/// was fitted on; `to_vec` relies on it.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Features {
    pub New_cases: f64,
    pub Cumulative_cases: f64,
    pub Cumulative_deaths: f64,
    pub Days_since_start: i64,
    pub New_deaths_7day_avg: f64,
    pub New_deaths_14day_avg: f64,
    pub Death_rate: f64,
    pub Case_growth_rate: f64,
}

impl Features {
    pub const NAMES: [&'static str; 8] = [
        "New_cases",
        "Cumulative_cases",
        "Cumulative_deaths",
        "Days_since_start",
        "New_deaths_7day_avg",
        "New_deaths_14day_avg",
        "Death_rate",
        "Case_growth_rate",
    ];

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.New_cases,
            self.Cumulative_cases,
            self.Cumulative_deaths,
            self.Days_since_start as f64,
            self.New_deaths_7day_avg,
            self.New_deaths_14day_avg,
            self.Death_rate,
            self.Case_growth_rate,
        ]
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub plot_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOut {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphOut {
    pub image_data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartTypesOut {
    pub chart_types: Vec<String>,
}

#[allow(non_snake_case)]
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionOut {
    pub Predicted_new_deaths: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}

/// Request-validation failure, produced before any handler logic runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationOut {
    pub detail: String,
}

/// Two-decimal rounding with ties going to the even neighbour.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}
