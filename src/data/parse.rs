//! CSV ingestion for fit data
//!
//! Wraps the `csv` crate and converts an uploaded text payload into a typed
//! columnar table. All cells must be numeric; a column qualifies as a time
//! variable candidate when its values are strictly increasing, and the first
//! candidate in file order is offered as the default time variable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing an uploaded CSV payload
#[derive(Error, Debug)]
pub enum DataError {
    #[error("CSV error: {0}")]
    ReadError(#[from] csv::Error),
    #[error("File contains no data rows")]
    NoRows,
    #[error("File must contain at least two columns")]
    TooFewColumns,
    #[error("Duplicate column name: {name}")]
    DuplicateColumn { name: String },
    #[error("Non-numeric value '{value}' in column {column}, row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("No column with strictly increasing values to use as a time variable")]
    NoTimeVariable,
}

/// Parsed fit data, stored column-wise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitData {
    columns: Vec<String>,
    values: HashMap<String, Vec<f64>>,
    time_variable_candidates: Vec<String>,
    time_variable: String,
}

impl FitData {
    /// Column names in file order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values of one column, in row order
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(|v| v.as_slice())
    }

    pub fn n_rows(&self) -> usize {
        self.values
            .get(&self.columns[0])
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Columns eligible to serve as the time variable
    pub fn time_variable_candidates(&self) -> &[String] {
        &self.time_variable_candidates
    }

    pub fn time_variable(&self) -> &str {
        &self.time_variable
    }

    /// Values of the currently selected time variable
    pub fn times(&self) -> &[f64] {
        &self.values[&self.time_variable]
    }

    /// Column names other than the time variable, in file order
    ///
    /// These are the columns that can be linked to model variables.
    pub fn linkable_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| **c != self.time_variable)
            .map(|c| c.as_str())
            .collect()
    }

    pub(crate) fn set_time_variable(&mut self, name: &str) -> bool {
        if name == self.time_variable {
            return false;
        }
        if self.time_variable_candidates.iter().any(|c| c == name) {
            self.time_variable = name.to_string();
            true
        } else {
            false
        }
    }
}

/// Parse an uploaded CSV payload into [`FitData`]
///
/// Requires a header row, at least two columns, at least one data row, and
/// numeric values throughout. Ragged rows are rejected by the reader.
pub fn parse_data(raw: &str) -> Result<FitData, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if columns.len() < 2 {
        return Err(DataError::TooFewColumns);
    }
    for (i, name) in columns.iter().enumerate() {
        if columns[..i].contains(name) {
            return Err(DataError::DuplicateColumn { name: name.clone() });
        }
    }

    let mut values: HashMap<String, Vec<f64>> =
        columns.iter().map(|c| (c.clone(), Vec::new())).collect();

    let mut n_rows = 0;
    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        for (column, cell) in columns.iter().zip(record.iter()) {
            let value: f64 = cell.parse().map_err(|_| DataError::NonNumeric {
                column: column.clone(),
                row: row_index + 1,
                value: cell.to_string(),
            })?;
            values.get_mut(column).unwrap().push(value);
        }
        n_rows += 1;
    }

    if n_rows == 0 {
        return Err(DataError::NoRows);
    }

    let time_variable_candidates: Vec<String> = columns
        .iter()
        .filter(|c| is_strictly_increasing(&values[*c]))
        .cloned()
        .collect();

    let time_variable = time_variable_candidates
        .first()
        .cloned()
        .ok_or(DataError::NoTimeVariable)?;

    Ok(FitData {
        columns,
        values,
        time_variable_candidates,
        time_variable,
    })
}

fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_csv() {
        let data = parse_data("a,b\n1,2\n3,4\n5,6\n7,8\n9,10").unwrap();
        assert_eq!(data.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(data.n_rows(), 5);
        assert_eq!(data.time_variable_candidates(), &["a", "b"]);
        assert_eq!(data.time_variable(), "a");
        assert_eq!(data.column("b").unwrap(), &[2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = parse_data("a,b\n1,hello\n").unwrap_err();
        match err {
            DataError::NonNumeric { column, row, value } => {
                assert_eq!(column, "b");
                assert_eq!(row, 1);
                assert_eq!(value, "hello");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_and_narrow_files() {
        assert!(matches!(parse_data("a,b\n"), Err(DataError::NoRows)));
        assert!(matches!(
            parse_data("a\n1\n2\n"),
            Err(DataError::TooFewColumns)
        ));
    }

    #[test]
    fn rejects_duplicate_columns() {
        assert!(matches!(
            parse_data("a,a\n1,2\n"),
            Err(DataError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn non_increasing_columns_are_not_candidates() {
        let data = parse_data("t,cases\n0,10\n1,12\n2,9\n").unwrap();
        assert_eq!(data.time_variable_candidates(), &["t"]);
        assert_eq!(data.time_variable(), "t");
        assert_eq!(data.linkable_columns(), vec!["cases"]);
    }

    #[test]
    fn no_increasing_column_is_an_error() {
        assert!(matches!(
            parse_data("a,b\n2,5\n1,4\n"),
            Err(DataError::NoTimeVariable)
        ));
    }

    #[test]
    fn time_variable_reselection() {
        let mut data = parse_data("a,b\n1,2\n3,4\n5,6\n7,8\n9,10").unwrap();
        assert!(data.set_time_variable("b"));
        assert_eq!(data.time_variable(), "b");
        assert_eq!(data.linkable_columns(), vec!["a"]);
        // unknown or unchanged names are no-ops
        assert!(!data.set_time_variable("b"));
        assert!(!data.set_time_variable("c"));
    }
}
