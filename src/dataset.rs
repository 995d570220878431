use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::{io::Read, path::Path};

use crate::error::ChartError;

const COUNTRY_ALIASES: [(&str, &str); 1] = [(
    "United Kingdom of Great Britain and Northern Ireland",
    "United Kingdom",
)];

/// Raw CSV row. Numeric cells are frequently empty in the WHO export.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Date_reported")]
    date_reported: String,
    #[serde(rename = "Country_code", default)]
    country_code: String,
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "WHO_region", default)]
    who_region: String,
    #[serde(rename = "New_cases", default, deserialize_with = "finite_or_missing")]
    new_cases: Option<f64>,
    #[serde(rename = "Cumulative_cases", default, deserialize_with = "finite_or_missing")]
    cumulative_cases: Option<f64>,
    #[serde(rename = "New_deaths", default, deserialize_with = "finite_or_missing")]
    new_deaths: Option<f64>,
    #[serde(rename = "Cumulative_deaths", default, deserialize_with = "finite_or_missing")]
    cumulative_deaths: Option<f64>,
}

/// Numeric cell reader. Empty cells, NA markers such as `NaN`, `NA` or
/// `null`, infinities and anything unparseable are all treated as missing.
fn finite_or_missing<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell: Option<String> = Option::deserialize(de)?;
    Ok(cell
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub date_reported: Option<NaiveDate>,
    pub country_code: String,
    pub country: String,
    pub who_region: String,
    pub new_cases: Option<f64>,
    pub cumulative_cases: Option<f64>,
    pub new_deaths: Option<f64>,
    pub cumulative_deaths: Option<f64>,
}

impl From<RawRecord> for CaseRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            date_reported: parse_report_date(&raw.date_reported),
            country_code: raw.country_code,
            country: canonical_country(raw.country),
            who_region: raw.who_region,
            new_cases: raw.new_cases,
            cumulative_cases: raw.cumulative_cases,
            new_deaths: raw.new_deaths,
            cumulative_deaths: raw.cumulative_deaths,
        }
    }
}

/// Numeric columns in file order; the correlation heatmap works over these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericColumn {
    NewCases,
    CumulativeCases,
    NewDeaths,
    CumulativeDeaths,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 4] = [
        NumericColumn::NewCases,
        NumericColumn::CumulativeCases,
        NumericColumn::NewDeaths,
        NumericColumn::CumulativeDeaths,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::NewCases => "New_cases",
            NumericColumn::CumulativeCases => "Cumulative_cases",
            NumericColumn::NewDeaths => "New_deaths",
            NumericColumn::CumulativeDeaths => "Cumulative_deaths",
        }
    }

    pub fn get(self, rec: &CaseRecord) -> Option<f64> {
        match self {
            NumericColumn::NewCases => rec.new_cases,
            NumericColumn::CumulativeCases => rec.cumulative_cases,
            NumericColumn::NewDeaths => rec.new_deaths,
            NumericColumn::CumulativeDeaths => rec.cumulative_deaths,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<CaseRecord>,
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChartError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ChartError::DataUnavailable(format!("failed to open dataset {}: {}", path.display(), e))
        })?;
        Self::from_reader(file).map_err(|e| match e {
            ChartError::DataUnavailable(msg) => {
                ChartError::DataUnavailable(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ChartError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();
        for row in rdr.deserialize::<RawRecord>() {
            let raw = row.map_err(|e| ChartError::DataUnavailable(format!("malformed dataset row: {}", e)))?;
            records.push(CaseRecord::from(raw));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lenient date parsing: anything unrecognised becomes `None` instead of
/// failing the whole load.
pub fn parse_report_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

pub fn canonical_country(name: String) -> String {
    COUNTRY_ALIASES
        .iter()
        .find(|(long, _)| *long == name)
        .map(|(_, short)| short.to_string())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date_reported,Country_code,Country,WHO_region,New_cases,Cumulative_cases,New_deaths,Cumulative_deaths
2020-01-05,GB,United Kingdom of Great Britain and Northern Ireland,EUR,10,10,,0
not-a-date,IN,India,SEAR,5,15,2,2
2020-01-06,IN,India,SEAR,,15,3,5
";

    #[test]
    fn loads_rows_with_missing_cells() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.records[0].new_deaths, None);
        assert_eq!(ds.records[0].cumulative_deaths, Some(0.0));
        assert_eq!(ds.records[2].new_cases, None);
        assert_eq!(ds.records[2].new_deaths, Some(3.0));
    }

    #[test]
    fn na_markers_and_non_finite_cells_are_missing() {
        let csv = "\
Date_reported,Country_code,Country,WHO_region,New_cases,Cumulative_cases,New_deaths,Cumulative_deaths
2020-01-01,BR,Brazil,AMR,NaN,nan,NA,null
2020-01-01,US,United States of America,AMR,inf,-inf,n/a,4
2020-01-02,BR,Brazil,AMR,1.5,2,3,7
";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        let first = &ds.records[0];
        assert_eq!(
            (first.new_cases, first.cumulative_cases, first.new_deaths, first.cumulative_deaths),
            (None, None, None, None)
        );
        let second = &ds.records[1];
        assert_eq!(second.new_cases, None);
        assert_eq!(second.cumulative_cases, None);
        assert_eq!(second.new_deaths, None);
        assert_eq!(second.cumulative_deaths, Some(4.0));
        assert_eq!(ds.records[2].new_cases, Some(1.5));
        assert_eq!(ds.records[2].new_deaths, Some(3.0));
    }

    #[test]
    fn bad_dates_become_none() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.records[0].date_reported, NaiveDate::from_ymd_opt(2020, 1, 5));
        assert_eq!(ds.records[1].date_reported, None);
    }

    #[test]
    fn long_country_name_is_shortened() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.records[0].country, "United Kingdom");
        assert_eq!(ds.records[1].country, "India");
    }

    #[test]
    fn date_formats() {
        let d = NaiveDate::from_ymd_opt(2021, 3, 9);
        assert_eq!(parse_report_date("2021-03-09"), d);
        assert_eq!(parse_report_date("2021/03/09"), d);
        assert_eq!(parse_report_date("2021-03-09 00:00:00"), d);
        assert_eq!(parse_report_date(""), None);
        assert_eq!(parse_report_date("2021-13-40"), None);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let err = Dataset::load("/nonexistent/who.csv").unwrap_err();
        assert!(matches!(err, ChartError::DataUnavailable(_)));
    }

    #[test]
    fn missing_required_column_is_data_unavailable() {
        let csv = "Date_reported,WHO_region\n2020-01-01,EUR\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ChartError::DataUnavailable(_)));
    }
}
