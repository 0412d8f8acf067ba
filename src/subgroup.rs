//! Subgroup
//!
//! Coverage audit of test predictions per demographic cell (race/ethnicity, sex, age
//! decade). Small cells give noisy coverage estimates, so cells below a minimum count are
//! left out and cells below a sparsity threshold are flagged.
use crate::config::PipelineConfig;
use crate::constants::AGE_DECADE_WIDTH;
use crate::data::Dataset;
use crate::errors::QuantileError;
use crate::metrics::coverage::coverage_and_width;
use crate::monotonicity::PredictionMatrix;
use hashbrown::HashMap;
use log::warn;
use serde::{Deserialize, Serialize};

/// Coverage of one demographic cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupRow {
    pub race_eth: i64,
    pub sex: i64,
    /// Lower bound of the age decade, `floor(age / 10) * 10`.
    pub age_decade: i64,
    pub n: usize,
    pub coverage: f64,
    pub mean_width: f64,
    pub sparse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupSummary {
    /// Cells reported.
    pub n_total: usize,
    pub n_sparse: usize,
    /// Cells left out for having fewer than the minimum count.
    pub n_excluded: usize,
    /// Records left out for a missing race, sex or age value.
    pub n_missing_key: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupReport {
    /// Audited interval.
    pub interval: String,
    pub rows: Vec<SubgroupRow>,
    pub summary: SubgroupSummary,
}

fn feature<'a>(data: &'a Dataset, name: &str) -> Result<&'a [f64], QuantileError> {
    data.feature(name).ok_or_else(|| QuantileError::MissingColumn(name.to_string()))
}

/// Audit unweighted interval coverage per (race/ethnicity, sex, age decade) cell.
///
/// Rows are sorted by cell key. Records with a missing race, sex or age value belong to
/// no cell and are only counted.
///
/// * `test` - Test records.
/// * `predictions` - Enforced predictions of the test records.
/// * `config` - Audited features, interval and count thresholds.
pub fn audit_subgroups(
    test: &Dataset,
    predictions: &PredictionMatrix,
    config: &PipelineConfig,
) -> Result<SubgroupReport, QuantileError> {
    let sg = &config.subgroups;
    let race = feature(test, &sg.race_feature)?;
    let sex = feature(test, &sg.sex_feature)?;
    let age = feature(test, &sg.age_feature)?;
    let interval = config.interval(&sg.interval).ok_or_else(|| {
        QuantileError::InvalidParameter(
            "subgroups.interval".to_string(),
            "a configured interval".to_string(),
            sg.interval.clone(),
        )
    })?;
    let (lo, hi) = config.interval_columns(interval)?;
    if predictions.rows() != test.rows() {
        return Err(QuantileError::InvalidInput(format!(
            "{} prediction rows for {} test records",
            predictions.rows(),
            test.rows()
        )));
    }

    let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    let mut n_missing_key = 0;
    for i in 0..test.rows() {
        if !(race[i].is_finite() && sex[i].is_finite() && age[i].is_finite()) {
            n_missing_key += 1;
            continue;
        }
        let decade = ((age[i] / AGE_DECADE_WIDTH).floor() * AGE_DECADE_WIDTH) as i64;
        cells
            .entry((race[i] as i64, sex[i] as i64, decade))
            .or_default()
            .push(i);
    }
    let mut keys: Vec<(i64, i64, i64)> = cells.keys().copied().collect();
    keys.sort_unstable();

    let mut rows = Vec::new();
    let mut n_excluded = 0;
    for key in keys {
        let index = &cells[&key];
        if index.len() < sg.min_count {
            n_excluded += 1;
            continue;
        }
        let y: Vec<f64> = index.iter().map(|i| test.target[*i]).collect();
        let lower: Vec<f64> = index.iter().map(|i| predictions.row(*i)[lo]).collect();
        let upper: Vec<f64> = index.iter().map(|i| predictions.row(*i)[hi]).collect();
        let (coverage, mean_width) = coverage_and_width(&y, &lower, &upper, None);
        rows.push(SubgroupRow {
            race_eth: key.0,
            sex: key.1,
            age_decade: key.2,
            n: index.len(),
            coverage,
            mean_width,
            sparse: index.len() < sg.sparse_threshold,
        });
    }
    let summary = SubgroupSummary {
        n_total: rows.len(),
        n_sparse: rows.iter().filter(|r| r.sparse).count(),
        n_excluded,
        n_missing_key,
    };
    if n_missing_key > 0 {
        warn!("{} test records without a complete subgroup key were not audited", n_missing_key);
    }
    Ok(SubgroupReport {
        interval: interval.name.clone(),
        rows,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 records in (1, 0, 20s), 10 in (2, 1, 40s), 60 in (3, 0, 60s).
    fn cells() -> (Dataset, PredictionMatrix) {
        table(&[(3., 0., 65., 60), (1., 0., 25., 4), (2., 1., 49.9, 10)])
    }

    fn table(groups: &[(f64, f64, f64, usize)]) -> (Dataset, PredictionMatrix) {
        let mut race = Vec::new();
        let mut sex = Vec::new();
        let mut age = Vec::new();
        for &(r, s, a, n) in groups {
            for _ in 0..n {
                race.push(r);
                sex.push(s);
                age.push(a);
            }
        }
        let n = race.len();
        let target: Vec<f64> = (0..n).map(|i| (i % 10) as f64 * 5.0).collect();
        let data = Dataset::new(
            vec!["race_eth".to_string(), "sex".to_string(), "age".to_string()],
            vec![race, sex, age],
            target,
            vec![1.0; n],
            vec!["2001-2002".to_string(); n],
        )
        .unwrap();
        let preds = PredictionMatrix::from_rows(&vec![vec![5., 10., 20., 30., 40.]; n]).unwrap();
        (data, preds)
    }

    #[test]
    fn test_exclusion_and_sparsity() {
        let (data, preds) = cells();
        let report = audit_subgroups(&data, &preds, &PipelineConfig::default()).unwrap();
        assert_eq!(report.interval, "pi90");
        assert_eq!(report.rows.len(), 2);
        let first = &report.rows[0];
        assert_eq!((first.race_eth, first.sex, first.age_decade), (2, 1, 40));
        assert_eq!(first.n, 10);
        assert!(first.sparse);
        let second = &report.rows[1];
        assert_eq!((second.race_eth, second.sex, second.age_decade), (3, 0, 60));
        assert_eq!(second.n, 60);
        assert!(!second.sparse);
        assert_eq!(
            report.summary,
            SubgroupSummary {
                n_total: 2,
                n_sparse: 1,
                n_excluded: 1,
                n_missing_key: 0
            }
        );
    }

    #[test]
    fn test_cell_coverage() {
        let (data, preds) = cells();
        let report = audit_subgroups(&data, &preds, &PipelineConfig::default()).unwrap();
        // Targets cycle over 0, 5, ..., 45 and the interval is [5, 40].
        for row in &report.rows {
            assert_eq!(row.coverage, 0.8);
            assert_eq!(row.mean_width, 35.0);
        }
    }

    #[test]
    fn test_missing_feature() {
        let (data, preds) = cells();
        let mut config = PipelineConfig::default();
        config.subgroups.age_feature = "age_years".to_string();
        match audit_subgroups(&data, &preds, &config) {
            Err(QuantileError::MissingColumn(name)) => assert_eq!(name, "age_years"),
            _ => panic!("Expected a missing column"),
        }
    }

    #[test]
    fn test_count_thresholds_are_inclusive() {
        let (data, preds) = table(&[(1., 0., 30., 5), (2., 0., 30., 50), (4., 1., 70., 49)]);
        let report = audit_subgroups(&data, &preds, &PipelineConfig::default()).unwrap();
        let n_sparse: Vec<(i64, usize, bool)> = report.rows.iter().map(|r| (r.race_eth, r.n, r.sparse)).collect();
        assert_eq!(n_sparse, vec![(1, 5, true), (2, 50, false), (4, 49, true)]);
        assert_eq!(report.summary.n_excluded, 0);
    }

    #[test]
    fn test_missing_keys_form_no_cell() {
        let (data, preds) = table(&[
            (0., 0., 45., 10),
            (f64::NAN, 0., 45., 10),
            (0., f64::NAN, 45., 3),
            (0., 0., f64::NAN, 2),
        ]);
        let report = audit_subgroups(&data, &preds, &PipelineConfig::default()).unwrap();
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!((row.race_eth, row.sex, row.age_decade, row.n), (0, 0, 40, 10));
        assert!(row.sparse);
        assert_eq!(report.summary.n_missing_key, 15);
        assert_eq!(report.summary.n_total, 1);
    }
}
