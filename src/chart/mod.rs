pub mod aggregate;
pub mod canvas;
pub mod plots;

use base64::{engine::general_purpose, Engine as _};
use std::{fmt, path::PathBuf, str::FromStr};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::dataset::Dataset;
use crate::error::ChartError;
use canvas::Canvas;

pub const TRACKED_COUNTRY: &str = "India";
pub const TOP_COUNTRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartType {
    GlobalNewDeaths,
    TopCountriesByCumulativeDeaths,
    IndiaDailyDeaths,
    TopThreeCountriesOverTime,
    DeathsByWhoRegion,
    RegionDailyDeaths,
    GlobalMovingAverage,
    AvgDeathsByWeekday,
    CorrelationHeatmap,
    RegionDeathsBoxplot,
    LinearRegressionFit,
    DecisionTreeModel,
    RandomForestImportance,
}

/// Where a chart's image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartSource {
    Computed,
    Static(&'static str),
}

impl ChartType {
    pub const ALL: [ChartType; 13] = [
        ChartType::GlobalNewDeaths,
        ChartType::TopCountriesByCumulativeDeaths,
        ChartType::IndiaDailyDeaths,
        ChartType::TopThreeCountriesOverTime,
        ChartType::DeathsByWhoRegion,
        ChartType::RegionDailyDeaths,
        ChartType::GlobalMovingAverage,
        ChartType::AvgDeathsByWeekday,
        ChartType::CorrelationHeatmap,
        ChartType::RegionDeathsBoxplot,
        ChartType::LinearRegressionFit,
        ChartType::DecisionTreeModel,
        ChartType::RandomForestImportance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartType::GlobalNewDeaths => "Global New Deaths Over Time",
            ChartType::TopCountriesByCumulativeDeaths => "Top 10 Countries by Cumulative Deaths",
            ChartType::IndiaDailyDeaths => "India Daily Deaths Trend",
            ChartType::TopThreeCountriesOverTime => "Deaths Over Time in Top 3 Countries",
            ChartType::DeathsByWhoRegion => "Deaths by WHO Region",
            ChartType::RegionDailyDeaths => "Region-wise Daily Deaths Over Time",
            ChartType::GlobalMovingAverage => "7-Day Moving Average (Global Deaths)",
            ChartType::AvgDeathsByWeekday => "Avg Deaths by Day of Week",
            ChartType::CorrelationHeatmap => "Correlation Heatmap",
            ChartType::RegionDeathsBoxplot => "Boxplot of New Deaths by Region",
            ChartType::LinearRegressionFit => "Actual vs Predicted Deaths - Linear Regression",
            ChartType::DecisionTreeModel => "Decision Tree Model",
            ChartType::RandomForestImportance => "Feature Importance of Random Forest",
        }
    }

    pub fn source(self) -> ChartSource {
        match self {
            ChartType::TopThreeCountriesOverTime => {
                ChartSource::Static("deaths_over_time_in_top_3_countries.png")
            }
            ChartType::RegionDailyDeaths => ChartSource::Static("deaths_over_time_by_region.png"),
            ChartType::LinearRegressionFit => ChartSource::Static("linear_regression.png"),
            ChartType::DecisionTreeModel => ChartSource::Static("decision_tree.png"),
            ChartType::RandomForestImportance => ChartSource::Static("random_forest.png"),
            ChartType::GlobalNewDeaths
            | ChartType::TopCountriesByCumulativeDeaths
            | ChartType::IndiaDailyDeaths
            | ChartType::DeathsByWhoRegion
            | ChartType::GlobalMovingAverage
            | ChartType::AvgDeathsByWeekday
            | ChartType::CorrelationHeatmap
            | ChartType::RegionDeathsBoxplot => ChartSource::Computed,
        }
    }

    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|c| c.label().to_string()).collect()
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartType {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s)
            .ok_or_else(|| ChartError::UnknownChartType(s.to_string()))
    }
}

/// Draws a computed chart into PNG bytes on a canvas owned by this call.
pub fn render_png(chart: ChartType, ds: &Dataset) -> Result<Vec<u8>, ChartError> {
    let text = canvas::text_enabled();
    match chart {
        ChartType::GlobalNewDeaths => {
            let series = aggregate::daily_global_deaths(ds);
            Canvas::new(1200, 600).render(|root| plots::global_new_deaths(root, text, &series))
        }
        ChartType::TopCountriesByCumulativeDeaths => {
            let rows = aggregate::top_countries_by_cumulative_deaths(ds, TOP_COUNTRIES);
            let spec = plots::top_countries_bars(&rows);
            Canvas::new(1200, 600).render(|root| plots::bars(root, text, &spec))
        }
        ChartType::IndiaDailyDeaths => {
            let series = aggregate::country_daily_deaths(ds, TRACKED_COUNTRY);
            Canvas::new(1200, 600)
                .render(|root| plots::country_new_deaths(root, text, TRACKED_COUNTRY, &series))
        }
        ChartType::DeathsByWhoRegion => {
            let rows = aggregate::region_cumulative_deaths(ds);
            let spec = plots::region_bars(&rows);
            Canvas::new(1000, 500).render(|root| plots::bars(root, text, &spec))
        }
        ChartType::GlobalMovingAverage => {
            let series = aggregate::daily_global_deaths(ds);
            let dates: Vec<_> = series.iter().map(|(d, _)| *d).collect();
            let daily: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
            let averaged =
                aggregate::moving_average_zero_filled(&daily, aggregate::MOVING_AVERAGE_WINDOW);
            Canvas::new(1400, 700)
                .render(|root| plots::moving_average(root, text, &dates, &daily, &averaged))
        }
        ChartType::AvgDeathsByWeekday => {
            let means = aggregate::weekday_mean_deaths(ds);
            let spec = plots::weekday_bars(&means);
            Canvas::new(640, 480).render(|root| plots::bars(root, text, &spec))
        }
        ChartType::CorrelationHeatmap => {
            let matrix = aggregate::correlation_matrix(ds);
            Canvas::new(1000, 500).render(|root| plots::correlation_heatmap(root, text, &matrix))
        }
        ChartType::RegionDeathsBoxplot => {
            let groups = aggregate::new_deaths_by_region(ds);
            Canvas::new(1200, 600).render(|root| plots::region_boxplot(root, text, &groups))
        }
        ChartType::TopThreeCountriesOverTime
        | ChartType::RegionDailyDeaths
        | ChartType::LinearRegressionFit
        | ChartType::DecisionTreeModel
        | ChartType::RandomForestImportance => Err(ChartError::RenderFailure(format!(
            "{} is served from a pre-rendered image",
            chart
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct ChartEngine {
    dataset_path: PathBuf,
    graphs_dir: PathBuf,
}

impl ChartEngine {
    pub fn new(dataset_path: impl Into<PathBuf>, graphs_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            graphs_dir: graphs_dir.into(),
        }
    }

    pub fn from_config(cfg: &ServiceConfig) -> Self {
        Self::new(cfg.dataset_path.clone(), cfg.graphs_dir.clone())
    }

    pub fn static_path(&self, file: &str) -> PathBuf {
        self.graphs_dir.join(file)
    }

    fn read_static(&self, file: &str) -> Result<Vec<u8>, ChartError> {
        let path = self.static_path(file);
        std::fs::read(&path).map_err(|e| {
            ChartError::DataUnavailable(format!("failed to read {}: {}", path.display(), e))
        })
    }

    /// Re-reads the dataset, then renders or loads the chart. Blocking.
    pub fn generate_blocking(&self, chart: ChartType) -> Result<String, ChartError> {
        let ds = Dataset::load(&self.dataset_path)?;
        debug!(chart = %chart, rows = ds.len(), "dataset loaded");

        let png = match chart.source() {
            ChartSource::Computed => render_png(chart, &ds)?,
            ChartSource::Static(file) => self.read_static(file)?,
        };
        info!(chart = %chart, bytes = png.len(), "chart ready");
        Ok(general_purpose::STANDARD.encode(png))
    }

    /// Parses the label and runs the blocking work off the async workers.
    pub async fn generate(&self, plot_type: &str) -> Result<String, ChartError> {
        let chart: ChartType = plot_type.parse()?;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.generate_blocking(chart))
            .await
            .map_err(|e| ChartError::RenderFailure(format!("chart task failed: {}", e)))?
    }
}
