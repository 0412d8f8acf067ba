//! Data
//!
//! The rectangular record table consumed by the engine, and the borrowed column major
//! matrix view that is handed to quantile learners.
use crate::config::PipelineConfig;
use crate::errors::QuantileError;
use hashbrown::HashMap;
use log::warn;

/// Contiguous Column Major Matrix data container.
///
/// This structure borrows a dense matrix of values held in a single contiguous block.
/// It follows column-major order, so a single feature can be sliced without copying.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }
}

/// A named column of the input table, as produced by the upstream cleaning step.
#[derive(Debug, Clone)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

/// Owned table of records: features (column major), target, sample weight and cohort tag.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    data: Vec<f64>,
    pub target: Vec<f64>,
    pub weight: Vec<f64>,
    pub cohort: Vec<String>,
}

impl Dataset {
    /// Build a dataset from per-feature columns.
    ///
    /// Weights that are not finite or negative are set to zero. Targets must be finite.
    pub fn new(
        feature_names: Vec<String>,
        columns: Vec<Vec<f64>>,
        target: Vec<f64>,
        weight: Vec<f64>,
        cohort: Vec<String>,
    ) -> Result<Self, QuantileError> {
        let rows = target.len();
        if columns.len() != feature_names.len() {
            return Err(QuantileError::InvalidInput(format!(
                "{} feature columns provided for {} feature names",
                columns.len(),
                feature_names.len()
            )));
        }
        for (name, col) in feature_names.iter().zip(&columns) {
            if col.len() != rows {
                return Err(QuantileError::InvalidInput(format!(
                    "column {} has {} rows, target has {}",
                    name,
                    col.len(),
                    rows
                )));
            }
        }
        if weight.len() != rows || cohort.len() != rows {
            return Err(QuantileError::InvalidInput(format!(
                "weight ({}) and cohort ({}) lengths must match target length {}",
                weight.len(),
                cohort.len(),
                rows
            )));
        }
        if let Some(i) = target.iter().position(|y| !y.is_finite()) {
            return Err(QuantileError::InvalidInput(format!("target at row {} is not finite", i)));
        }
        let weight = weight
            .into_iter()
            .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        Ok(Dataset {
            feature_names,
            data: columns.into_iter().flatten().collect(),
            target,
            weight,
            cohort,
        })
    }

    /// Assemble a dataset from a named column table using the configured column names.
    ///
    /// A missing weight column falls back to unit weights; any other missing column is fatal.
    pub fn from_columns(mut columns: HashMap<String, Column>, config: &PipelineConfig) -> Result<Self, QuantileError> {
        let mut take_numeric = |name: &str| -> Result<Vec<f64>, QuantileError> {
            match columns.remove(name) {
                Some(Column::Numeric(v)) => Ok(v),
                Some(Column::Text(_)) => Err(QuantileError::InvalidInput(format!("column {} must be numeric", name))),
                None => Err(QuantileError::MissingColumn(name.to_string())),
            }
        };
        let features = config
            .feature_names
            .iter()
            .map(|name| take_numeric(name))
            .collect::<Result<Vec<_>, _>>()?;
        let target = take_numeric(&config.target)?;
        let weight = match take_numeric(&config.weight_column) {
            Ok(w) => w,
            Err(QuantileError::MissingColumn(name)) => {
                warn!("Weight column {} not found, using unit weights.", name);
                vec![1.0; target.len()]
            }
            Err(e) => return Err(e),
        };
        let cohort = match columns.remove(&config.cohort_column) {
            Some(Column::Text(v)) => v,
            Some(Column::Numeric(v)) => v.iter().map(|c| c.to_string()).collect(),
            None => return Err(QuantileError::MissingColumn(config.cohort_column.clone())),
        };
        Dataset::new(config.feature_names.clone(), features, target, weight, cohort)
    }

    pub fn rows(&self) -> usize {
        self.target.len()
    }

    pub fn cols(&self) -> usize {
        self.feature_names.len()
    }

    /// Borrow the features as a column major matrix.
    pub fn matrix(&self) -> Matrix<'_, f64> {
        Matrix::new(&self.data, self.rows(), self.cols())
    }

    /// Get a feature column by name.
    pub fn feature(&self, name: &str) -> Option<&[f64]> {
        let col = self.feature_names.iter().position(|n| n == name)?;
        let rows = self.rows();
        Some(&self.data[col * rows..(col + 1) * rows])
    }

    /// Copy the given rows, in order, into a new dataset.
    pub fn subset(&self, index: &[usize]) -> Dataset {
        let rows = self.rows();
        let mut data = Vec::with_capacity(index.len() * self.cols());
        for col in 0..self.cols() {
            let column = &self.data[col * rows..(col + 1) * rows];
            data.extend(index.iter().map(|&i| column[i]));
        }
        Dataset {
            feature_names: self.feature_names.clone(),
            data,
            target: index.iter().map(|&i| self.target[i]).collect(),
            weight: index.iter().map(|&i| self.weight[i]).collect(),
            cohort: index.iter().map(|&i| self.cohort[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset() -> Dataset {
        Dataset::new(
            vec!["age".to_string(), "bmi".to_string()],
            vec![vec![30., 40., 50.], vec![21., 25., 29.]],
            vec![20., 25., 30.],
            vec![1., f64::NAN, -2.],
            vec!["2001-2002".to_string(), "2003-2004".to_string(), "2005-2006".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_matrix_access() {
        let v = vec![1, 2, 3, 5, 6, 7];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get(0, 0), &1);
        assert_eq!(m.get(1, 0), &2);
        assert_eq!(m.get(0, 1), &5);
        assert_eq!(m.get_col(1), &vec![5, 6, 7]);
        assert_eq!(m.get_row(2), vec![3, 7]);
    }

    #[test]
    fn test_weights_are_sanitized() {
        let ds = small_dataset();
        assert_eq!(ds.weight, vec![1., 0., 0.]);
    }

    #[test]
    fn test_non_finite_target_rejected() {
        let res = Dataset::new(
            vec!["age".to_string()],
            vec![vec![30., 40.]],
            vec![20., f64::INFINITY],
            vec![1., 1.],
            vec!["a".to_string(), "b".to_string()],
        );
        assert!(matches!(res, Err(QuantileError::InvalidInput(_))));
    }

    #[test]
    fn test_subset_keeps_columns_aligned() {
        let ds = small_dataset();
        let sub = ds.subset(&[2, 0]);
        assert_eq!(sub.feature("age").unwrap(), &[50., 30.]);
        assert_eq!(sub.feature("bmi").unwrap(), &[29., 21.]);
        assert_eq!(sub.target, vec![30., 20.]);
        assert_eq!(sub.cohort, vec!["2005-2006".to_string(), "2001-2002".to_string()]);
    }

    #[test]
    fn test_from_columns_missing_column() {
        let config = PipelineConfig::default();
        let mut columns = HashMap::new();
        for name in &config.feature_names {
            columns.insert(name.clone(), Column::Numeric(vec![1., 2.]));
        }
        columns.insert(config.cohort_column.clone(), Column::Text(vec!["a".into(), "b".into()]));
        let res = Dataset::from_columns(columns, &config);
        match res {
            Err(QuantileError::MissingColumn(name)) => assert_eq!(name, config.target),
            _ => panic!("Expected a missing target column error"),
        }
    }

    #[test]
    fn test_from_columns_defaults_weights() {
        let config = PipelineConfig::default();
        let mut columns = HashMap::new();
        for name in &config.feature_names {
            columns.insert(name.clone(), Column::Numeric(vec![1., 2.]));
        }
        columns.insert(config.target.clone(), Column::Numeric(vec![20., 30.]));
        columns.insert(config.cohort_column.clone(), Column::Numeric(vec![2001., 2003.]));
        let ds = Dataset::from_columns(columns, &config).unwrap();
        assert_eq!(ds.weight, vec![1., 1.]);
        assert_eq!(ds.cohort, vec!["2001".to_string(), "2003".to_string()]);
        assert_eq!(ds.cols(), config.feature_names.len());
    }
}
