//! Data loading and column normalization using Polars

use crate::columns::{normalize, T_CAL};
use crate::config::MONETARY_FLOOR;
use crate::error::{LtvError, Result};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

pub const CUSTOMER_ID: &str = "customer_id";
pub const FREQUENCY_CAL: &str = "frequency_cal";
pub const RECENCY_CAL: &str = "recency_cal";
pub const MONETARY_VALUE: &str = "monetary_value";
pub const MONETARY_HOLDOUT: &str = "monetary_holdout";

/// What a dataset is loaded for; decides which columns are required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Training,
    Scoring,
}

impl DatasetKind {
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Training => &[
                CUSTOMER_ID,
                FREQUENCY_CAL,
                RECENCY_CAL,
                T_CAL,
                MONETARY_VALUE,
                MONETARY_HOLDOUT,
            ],
            DatasetKind::Scoring => &[CUSTOMER_ID, FREQUENCY_CAL, RECENCY_CAL, T_CAL, MONETARY_VALUE],
        }
    }
}

/// Per-customer calibration summaries, one entry per row of the input file
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerData {
    /// Identifiers exactly as written in the file
    pub customer_ids: Vec<String>,
    /// Repeat transactions in the calibration window
    pub frequency: Array1<f64>,
    /// Time between first and last transaction
    pub recency: Array1<f64>,
    /// Time between first transaction and end of the calibration window
    pub t_cal: Array1<f64>,
    /// Average transaction value
    pub monetary_value: Array1<f64>,
    /// Average transaction value in the holdout window (training only)
    pub monetary_holdout: Option<Array1<f64>>,
}

impl CustomerData {
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }

    /// Customers with at least one repeat purchase, with non-positive monetary
    /// values raised to [`MONETARY_FLOOR`].
    pub fn repeat_customers(&self) -> CustomerData {
        let rows: Vec<usize> = self
            .frequency
            .iter()
            .enumerate()
            .filter(|&(_, &frequency)| frequency > 0.0)
            .map(|(row, _)| row)
            .collect();
        let pick = |column: &Array1<f64>| column.select(Axis(0), &rows);

        CustomerData {
            customer_ids: rows.iter().map(|&row| self.customer_ids[row].clone()).collect(),
            frequency: pick(&self.frequency),
            recency: pick(&self.recency),
            t_cal: pick(&self.t_cal),
            monetary_value: pick(&self.monetary_value).mapv(clamp_monetary),
            monetary_holdout: self.monetary_holdout.as_ref().map(pick),
        }
    }

    /// Check every row lies where the models are defined: finite values, integral
    /// non-negative frequency, and `0 <= recency <= T_cal`.
    ///
    /// The first offending row is named by its customer id.
    pub fn check_support(&self) -> std::result::Result<(), String> {
        let rows = self
            .customer_ids
            .iter()
            .zip(self.frequency.iter())
            .zip(self.recency.iter())
            .zip(self.t_cal.iter())
            .zip(self.monetary_value.iter());

        for ((((id, &x), &rec), &t), &m) in rows {
            let problem = if !(x.is_finite() && rec.is_finite() && t.is_finite() && m.is_finite()) {
                "non-finite value"
            } else if x < 0.0 || x.fract() != 0.0 {
                "frequency_cal must be a non-negative integer"
            } else if rec < 0.0 {
                "recency_cal is negative"
            } else if rec > t {
                "recency_cal is larger than T_cal"
            } else {
                continue;
            };
            return Err(format!("customer {id}: {problem}"));
        }
        Ok(())
    }
}

/// Raise non-positive average transaction values to [`MONETARY_FLOOR`]
pub fn clamp_monetary(value: f64) -> f64 {
    if value <= 0.0 {
        MONETARY_FLOOR
    } else {
        value
    }
}

/// Load a customer summary CSV.
///
/// # Arguments
/// * `path` - Path to the CSV file
/// * `kind` - Whether the data is for training (holdout column required) or scoring
///
/// # Returns
/// * `CustomerData` with normalized, typed columns
pub fn load_data(path: impl AsRef<Path>, kind: DatasetKind) -> Result<CustomerData> {
    let path = path.as_ref();
    load_data_if_present(path, kind)?
        .ok_or_else(|| LtvError::data_source(path, "file not found"))
}

/// Load a customer summary CSV if it exists.
///
/// Returns `Ok(None)` when there is no file at `path`, `Ok(Some(_))` when it was
/// read and validated, and `Err(DataSource)` when it exists but cannot be used.
/// The file is opened exactly once, so there is no window between checking for it
/// and reading it.
pub fn load_data_if_present(
    path: impl AsRef<Path>,
    kind: DatasetKind,
) -> Result<Option<CustomerData>> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LtvError::data_source(path, e)),
    };

    // Every cell is read as text: identifiers must never go through float parsing
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| LtvError::data_source(path, e))?;
    log::info!(
        "Data loaded from {}: {} rows, {} columns",
        path.display(),
        df.height(),
        df.width()
    );

    let columns = normalized_columns(&df).map_err(|reason| LtvError::data_source(path, reason))?;
    log::info!("Data columns normalized to snake case");

    let missing: Vec<&str> = kind
        .required_columns()
        .iter()
        .copied()
        .filter(|name| !columns.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(LtvError::data_source(
            path,
            format!("missing required columns: {}", missing.join(", ")),
        ));
    }

    let numeric = |name: &str| -> Result<Array1<f64>> {
        numeric_column(columns[name], name).map_err(|reason| LtvError::data_source(path, reason))
    };

    let customer_ids = text_column(columns[CUSTOMER_ID], CUSTOMER_ID)
        .map_err(|reason| LtvError::data_source(path, reason))?;
    let monetary_holdout = match kind {
        DatasetKind::Training => Some(numeric(MONETARY_HOLDOUT)?),
        DatasetKind::Scoring => None,
    };

    Ok(Some(CustomerData {
        customer_ids,
        frequency: numeric(FREQUENCY_CAL)?,
        recency: numeric(RECENCY_CAL)?,
        t_cal: numeric(T_CAL)?,
        monetary_value: numeric(MONETARY_VALUE)?,
        monetary_holdout,
    }))
}

/// Map normalized column names to the columns of `df`
fn normalized_columns(df: &DataFrame) -> std::result::Result<HashMap<String, &Series>, String> {
    let mut columns = HashMap::with_capacity(df.width());
    for series in df.get_columns() {
        let name = normalize(series.name());
        log::debug!("Column {:?} -> {:?}", series.name(), name);
        if columns.insert(name.clone(), series).is_some() {
            return Err(format!("more than one column normalizes to {name:?}"));
        }
    }
    Ok(columns)
}

fn text_column(series: &Series, name: &str) -> std::result::Result<Vec<String>, String> {
    let values = series.str().map_err(|e| format!("column {name}: {e}"))?;
    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(str::to_string)
                .ok_or_else(|| format!("column {name}: empty value at data row {}", row + 1))
        })
        .collect()
}

fn numeric_column(series: &Series, name: &str) -> std::result::Result<Array1<f64>, String> {
    let raw = series.str().map_err(|e| format!("column {name}: {e}"))?;
    let parsed = series
        .cast(&DataType::Float64)
        .map_err(|e| format!("column {name}: {e}"))?;
    let values = parsed.f64().map_err(|e| format!("column {name}: {e}"))?;

    values
        .into_iter()
        .zip(raw.into_iter())
        .enumerate()
        .map(|(row, (value, text))| match (value, text) {
            (Some(value), _) => Ok(value),
            (None, Some(text)) => Err(format!(
                "column {name}: {text:?} at data row {} is not a number",
                row + 1
            )),
            (None, None) => Err(format!("column {name}: empty value at data row {}", row + 1)),
        })
        .collect::<std::result::Result<Vec<f64>, String>>()
        .map(Array1::from)
}
