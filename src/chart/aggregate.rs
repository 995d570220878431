//! Group-by views over the case dataset. Missing cells are skipped the way a
//! NaN-aware dataframe would skip them.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};

use crate::dataset::{CaseRecord, Dataset, NumericColumn};

pub const MOVING_AVERAGE_WINDOW: usize = 7;

pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Sum of new deaths per report date, ascending. Rows without a date are
/// dropped; a date whose cells are all empty sums to zero.
pub fn daily_global_deaths(ds: &Dataset) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for rec in &ds.records {
        if let Some(date) = rec.date_reported {
            *by_date.entry(date).or_insert(0.0) += rec.new_deaths.unwrap_or(0.0);
        }
    }
    by_date.into_iter().collect()
}

/// New deaths for one country, ordered by date.
pub fn country_daily_deaths(ds: &Dataset, country: &str) -> Vec<(NaiveDate, Option<f64>)> {
    let mut rows: Vec<(NaiveDate, Option<f64>)> = ds
        .records
        .iter()
        .filter(|r| r.country == country)
        .filter_map(|r| r.date_reported.map(|d| (d, r.new_deaths)))
        .collect();
    rows.sort_by_key(|(d, _)| *d);
    rows
}

fn max_per_group<K>(ds: &Dataset, key: K, column: NumericColumn) -> Vec<(String, Option<f64>)>
where
    K: Fn(&CaseRecord) -> &str,
{
    let mut groups: HashMap<&str, Option<f64>> = HashMap::new();
    for rec in &ds.records {
        let k = key(rec);
        if k.is_empty() {
            continue;
        }
        let slot = groups.entry(k).or_insert(None);
        if let Some(v) = column.get(rec) {
            *slot = Some(slot.map_or(v, |cur: f64| cur.max(v)));
        }
    }
    let mut out: Vec<(String, Option<f64>)> =
        groups.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    sort_descending(&mut out);
    out
}

/// Descending by value, missing values last, ties broken by key.
fn sort_descending(rows: &mut [(String, Option<f64>)]) {
    rows.sort_by(|(ka, va), (kb, vb)| match (va, vb) {
        (Some(a), Some(b)) => b.total_cmp(a).then_with(|| ka.cmp(kb)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => ka.cmp(kb),
    });
}

pub fn top_countries_by_cumulative_deaths(ds: &Dataset, n: usize) -> Vec<(String, Option<f64>)> {
    let mut rows = max_per_group(ds, |r| r.country.as_str(), NumericColumn::CumulativeDeaths);
    rows.truncate(n);
    rows
}

pub fn region_cumulative_deaths(ds: &Dataset) -> Vec<(String, Option<f64>)> {
    max_per_group(ds, |r| r.who_region.as_str(), NumericColumn::CumulativeDeaths)
}

/// Trailing mean over `window` samples. Positions without a full window are
/// reported as exactly zero rather than a partial mean.
pub fn moving_average_zero_filled(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![0.0; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out.push(sum / window as f64);
        } else {
            out.push(0.0);
        }
    }
    out
}

/// Mean new deaths per weekday, always Monday first.
pub fn weekday_mean_deaths(ds: &Dataset) -> Vec<(Weekday, Option<f64>)> {
    let mut acc = [(0.0f64, 0usize); 7];
    for rec in &ds.records {
        if let (Some(date), Some(v)) = (rec.date_reported, rec.new_deaths) {
            let slot = &mut acc[date.weekday().num_days_from_monday() as usize];
            slot.0 += v;
            slot.1 += 1;
        }
    }
    WEEK.iter()
        .map(|day| {
            let (sum, n) = acc[day.num_days_from_monday() as usize];
            (*day, (n > 0).then(|| sum / n as f64))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<&'static str>,
    /// Row-major, `columns.len()` squared.
    pub values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values[i * self.columns.len() + j]
    }
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Pairwise Pearson correlation over the numeric columns, using only rows
/// where both cells of a pair are present.
pub fn correlation_matrix(ds: &Dataset) -> CorrelationMatrix {
    let cols = NumericColumn::ALL;
    let k = cols.len();
    let mut values = vec![None; k * k];
    for i in 0..k {
        for j in i..k {
            let pairs: Vec<(f64, f64)> = ds
                .records
                .iter()
                .filter_map(|r| Some((cols[i].get(r)?, cols[j].get(r)?)))
                .collect();
            let r = pearson(&pairs).map(|r| if i == j { 1.0 } else { r });
            values[i * k + j] = r;
            values[j * k + i] = r;
        }
    }
    CorrelationMatrix {
        columns: cols.iter().map(|c| c.name()).collect(),
        values,
    }
}

/// New-death observations per WHO region, regions in order of first appearance.
pub fn new_deaths_by_region(ds: &Dataset) -> Vec<(String, Vec<f64>)> {
    let mut order: Vec<(String, Vec<f64>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for rec in &ds.records {
        let region = rec.who_region.as_str();
        if region.is_empty() {
            continue;
        }
        let slot = *index.entry(region).or_insert_with(|| {
            order.push((region.to_string(), Vec::new()));
            order.len() - 1
        });
        if let Some(v) = rec.new_deaths {
            order[slot].1.push(v);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: &str, country: &str, region: &str, new_deaths: Option<f64>, cum: Option<f64>) -> CaseRecord {
        CaseRecord {
            date_reported: crate::dataset::parse_report_date(date),
            country_code: String::new(),
            country: country.to_string(),
            who_region: region.to_string(),
            new_cases: new_deaths.map(|d| d * 10.0),
            cumulative_cases: cum.map(|c| c * 10.0),
            new_deaths,
            cumulative_deaths: cum,
        }
    }

    fn ds(records: Vec<CaseRecord>) -> Dataset {
        Dataset { records }
    }

    #[test]
    fn global_deaths_sum_per_date_and_drop_undated_rows() {
        let d = ds(vec![
            rec("2020-01-02", "A", "EUR", Some(2.0), None),
            rec("2020-01-01", "B", "EUR", Some(1.0), None),
            rec("2020-01-02", "B", "EUR", Some(3.0), None),
            rec("garbage", "B", "EUR", Some(100.0), None),
            rec("2020-01-03", "B", "EUR", None, None),
        ]);
        let out = daily_global_deaths(&d);
        let vals: Vec<f64> = out.iter().map(|(_, v)| *v).collect();
        assert_eq!(vals, vec![1.0, 5.0, 0.0]);
        assert!(out.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn top_countries_is_capped_sorted_and_unique() {
        let mut records = Vec::new();
        for c in 0..15 {
            for day in 1..=3 {
                let cum = (c * 1000 + day) as f64;
                records.push(rec(&format!("2020-01-0{}", day), &format!("C{:02}", c), "EUR", Some(1.0), Some(cum)));
            }
        }
        records.push(rec("2020-01-01", "Empty", "EUR", None, None));
        let out = top_countries_by_cumulative_deaths(&ds(records), 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], ("C14".to_string(), Some(14003.0)));
        assert!(out.windows(2).all(|w| w[0].1 >= w[1].1));
        let mut names: Vec<&String> = out.iter().map(|(n, _)| n).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn missing_maxima_sort_last() {
        let d = ds(vec![
            rec("2020-01-01", "Nowhere", "AFR", None, None),
            rec("2020-01-01", "Somewhere", "EUR", None, Some(5.0)),
        ]);
        let out = region_cumulative_deaths(&d);
        assert_eq!(out[0], ("EUR".to_string(), Some(5.0)));
        assert_eq!(out[1], ("AFR".to_string(), None));
    }

    #[test]
    fn moving_average_zero_fills_first_six() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let ma = moving_average_zero_filled(&values, MOVING_AVERAGE_WINDOW);
        assert_eq!(ma.len(), 10);
        assert!(ma[..6].iter().all(|v| *v == 0.0));
        assert_eq!(ma[6], 4.0);
        assert_eq!(ma[9], 7.0);
    }

    #[test]
    fn moving_average_short_series_is_all_zero() {
        assert_eq!(moving_average_zero_filled(&[5.0, 5.0, 5.0], 7), vec![0.0; 3]);
    }

    #[test]
    fn weekdays_come_out_monday_first() {
        // 2020-01-05 is a Sunday, 2020-01-06 a Monday.
        let d = ds(vec![
            rec("2020-01-05", "A", "EUR", Some(7.0), None),
            rec("2020-01-06", "A", "EUR", Some(2.0), None),
            rec("2020-01-06", "B", "EUR", Some(4.0), None),
            rec("2020-01-08", "A", "EUR", None, None),
        ]);
        let out = weekday_mean_deaths(&d);
        let names: Vec<&str> = out.iter().map(|(d, _)| weekday_name(*d)).collect();
        assert_eq!(
            names,
            ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"]
        );
        assert_eq!(out[0].1, Some(3.0));
        assert_eq!(out[2].1, None);
        assert_eq!(out[6].1, Some(7.0));
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let d = ds(vec![
            rec("2020-01-01", "A", "EUR", Some(1.0), Some(1.0)),
            rec("2020-01-02", "A", "EUR", Some(2.0), Some(3.0)),
            rec("2020-01-03", "A", "EUR", Some(4.0), Some(7.0)),
            rec("2020-01-04", "A", "EUR", Some(3.0), None),
        ]);
        let m = correlation_matrix(&d);
        assert_eq!(m.columns, vec!["New_cases", "Cumulative_cases", "New_deaths", "Cumulative_deaths"]);
        for i in 0..4 {
            assert_eq!(m.get(i, i), Some(1.0));
            for j in 0..4 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
        // New_cases is an exact multiple of New_deaths.
        assert!((m.get(0, 2).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_of_constant_column_is_missing() {
        let d = ds(vec![
            rec("2020-01-01", "A", "EUR", Some(1.0), Some(5.0)),
            rec("2020-01-02", "A", "EUR", Some(2.0), Some(5.0)),
        ]);
        let m = correlation_matrix(&d);
        assert_eq!(m.get(3, 3), None);
        assert_eq!(m.get(2, 3), None);
    }

    #[test]
    fn region_observations_keep_first_appearance_order() {
        let d = ds(vec![
            rec("2020-01-01", "A", "SEAR", Some(1.0), None),
            rec("2020-01-01", "B", "EUR", None, None),
            rec("2020-01-02", "A", "SEAR", Some(3.0), None),
        ]);
        let out = new_deaths_by_region(&d);
        assert_eq!(out[0], ("SEAR".to_string(), vec![1.0, 3.0]));
        assert_eq!(out[1], ("EUR".to_string(), vec![]));
    }

    #[test]
    fn country_filter_orders_by_date() {
        let d = ds(vec![
            rec("2020-01-03", "India", "SEAR", Some(3.0), None),
            rec("2020-01-01", "India", "SEAR", Some(1.0), None),
            rec("2020-01-02", "Nepal", "SEAR", Some(9.0), None),
        ]);
        let out = country_daily_deaths(&d, "India");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, Some(1.0));
        assert_eq!(out[1].1, Some(3.0));
    }
}
