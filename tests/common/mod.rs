#![allow(dead_code)]

use covid_predictor_backend::{chart::ChartSource, AppState, ChartEngine, ChartType, RegressionModel};
use std::path::Path;
use tempfile::TempDir;

/// Two weeks of data for three countries plus a row with an unparseable date
/// and one with empty numeric cells.
pub fn sample_csv() -> String {
    let mut out = String::from(
        "Date_reported,Country_code,Country,WHO_region,New_cases,Cumulative_cases,New_deaths,Cumulative_deaths\n",
    );
    let countries = [
        ("IN", "India", "SEAR", 3.0),
        ("GB", "United Kingdom of Great Britain and Northern Ireland", "EUR", 2.0),
        ("BR", "Brazil", "AMR", 5.0),
    ];
    for (code, name, region, scale) in countries {
        let mut cum_cases = 0.0;
        let mut cum_deaths = 0.0;
        for day in 1..=14 {
            let cases = scale * 10.0 * day as f64;
            let deaths = scale * ((day % 7) as f64 + 1.0);
            cum_cases += cases;
            cum_deaths += deaths;
            out.push_str(&format!(
                "2020-03-{:02},{},{},{},{},{},{},{}\n",
                day, code, name, region, cases, cum_cases, deaths, cum_deaths
            ));
        }
    }
    out.push_str("bogus-date,IN,India,SEAR,1,1,1,1\n");
    out.push_str("2020-03-15,BR,Brazil,AMR,,,,\n");
    out
}

/// x0 (New_cases) <= 100 ? 12.345 : 40.0, averaged with a constant 20.0 tree.
pub const FOREST_JSON: &str = r#"{
    "kind": "random_forest",
    "n_features": 8,
    "feature_names": ["New_cases","Cumulative_cases","Cumulative_deaths","Days_since_start",
                      "New_deaths_7day_avg","New_deaths_14day_avg","Death_rate","Case_growth_rate"],
    "trees": [
        {"children_left":[1,-1,-1],"children_right":[2,-1,-1],"feature":[0,-2,-2],
         "threshold":[100.0,-2.0,-2.0],"value":[0.0,12.345,40.0]},
        {"children_left":[-1],"children_right":[-1],"feature":[-2],"threshold":[-2.0],"value":[20.0]}
    ]
}"#;

pub fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([10, 200, 30]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dataset")).unwrap();
        std::fs::create_dir_all(dir.path().join("graphs")).unwrap();
        std::fs::write(dir.path().join("dataset/who.csv"), sample_csv()).unwrap();
        std::fs::write(dir.path().join("rf_model.json"), FOREST_JSON).unwrap();
        let png = tiny_png();
        for chart in ChartType::ALL {
            if let ChartSource::Static(file) = chart.source() {
                std::fs::write(dir.path().join("graphs").join(file), &png).unwrap();
            }
        }
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn engine(&self) -> ChartEngine {
        ChartEngine::new(self.path().join("dataset/who.csv"), self.path().join("graphs"))
    }

    pub fn state(&self) -> AppState {
        let model = RegressionModel::load(self.path().join("rf_model.json")).unwrap();
        AppState::new(model, self.engine())
    }
}
