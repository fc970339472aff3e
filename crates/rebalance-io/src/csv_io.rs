use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use rebalance_core::{Class, Dataset, Feature, FeatureKind, Matrix, Schema};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{IoError, IoResult};

/// How to interpret a labelled CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Header name of the class column.
    pub target: String,
    /// Target value that marks a row `Positive`.
    pub positive: String,
    /// When set, rows must carry either this or the positive value.
    /// Otherwise every non-positive value counts as negative.
    #[serde(default)]
    pub negative: Option<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,
    /// Columns read as categorical even if every value is numeric.
    #[serde(default)]
    pub categorical: Vec<String>,
}

fn default_delimiter() -> u8 {
    b','
}

impl CsvOptions {
    pub fn new(target: impl Into<String>, positive: impl Into<String>) -> Self {
        CsvOptions {
            target: target.into(),
            positive: positive.into(),
            negative: None,
            delimiter: default_delimiter(),
            categorical: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        self.negative = Some(negative.into());
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_categorical(mut self, column: impl Into<String>) -> Self {
        self.categorical.push(column.into());
        self
    }

    /// Label written for negative rows.
    pub fn negative_label(&self) -> &str {
        self.negative.as_deref().unwrap_or("negative")
    }
}

/// Read a labelled CSV file with a header row into a dataset.
///
/// A column is numeric when every value parses as a finite number, and
/// categorical otherwise, with its levels sorted.
#[instrument(skip_all, fields(path = %path.as_ref().display(), target = %options.target))]
pub fn read_dataset(path: impl AsRef<Path>, options: &CsvOptions) -> IoResult<Dataset<f64>> {
    let file = File::open(path.as_ref())?;
    read_dataset_from(file, options)
}

/// Same as [`read_dataset`] for any reader.
pub fn read_dataset_from<R: Read>(reader: R, options: &CsvOptions) -> IoResult<Dataset<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let target_col = headers
        .iter()
        .position(|h| *h == options.target)
        .ok_or_else(|| IoError::MissingColumn(options.target.clone()))?;
    for name in &options.categorical {
        if !headers.contains(name) {
            return Err(IoError::MissingColumn(name.clone()));
        }
    }

    let feature_cols: Vec<usize> = (0..headers.len()).filter(|&j| j != target_col).collect();
    let mut raw: Vec<Vec<String>> = vec![Vec::new(); feature_cols.len()];
    let mut classes = Vec::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let label = record.get(target_col).unwrap_or_default();
        let class = if label == options.positive {
            Class::Positive
        } else if options.negative.as_deref().map_or(true, |neg| neg == label) {
            Class::Negative
        } else {
            return Err(IoError::UnknownLabel {
                row,
                value: label.to_string(),
            });
        };
        classes.push(class);
        for (column, &j) in raw.iter_mut().zip(&feature_cols) {
            column.push(record.get(j).unwrap_or_default().to_string());
        }
    }
    if classes.is_empty() {
        return Err(IoError::EmptyFile);
    }

    // Parse column by column, then interleave into row-major order.
    let mut features = Vec::with_capacity(feature_cols.len());
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_cols.len());
    for (values, &j) in raw.iter().zip(&feature_cols) {
        let name = &headers[j];
        let numeric: Option<Vec<f64>> = if options.categorical.contains(name) {
            None
        } else {
            values
                .iter()
                .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
                .collect()
        };
        match numeric {
            Some(parsed) => {
                features.push(Feature::numeric(name.as_str()));
                columns.push(parsed);
            }
            None => {
                let mut levels = values.clone();
                levels.sort();
                levels.dedup();
                let codes = values
                    .iter()
                    .map(|v| levels.binary_search(v).unwrap_or_default() as f64)
                    .collect();
                debug!(column = %name, n_levels = levels.len(), "categorical column");
                features.push(Feature::categorical(name.as_str(), levels));
                columns.push(codes);
            }
        }
    }

    let n_rows = classes.len();
    let mut data = Vec::with_capacity(n_rows * columns.len());
    for i in 0..n_rows {
        data.extend(columns.iter().map(|c| c[i]));
    }
    let matrix = Matrix::new(data, n_rows, columns.len())?;
    let dataset = Dataset::new(Schema::new(features), matrix, classes)?;
    debug!(
        n_rows,
        n_features = dataset.n_features(),
        n_positive = dataset.class_counts().positive,
        "dataset loaded"
    );
    Ok(dataset)
}

/// Write a dataset as CSV: feature columns in schema order, then the target
/// column. Categorical values are written as their level names.
pub fn write_dataset(path: impl AsRef<Path>, data: &Dataset<f64>, options: &CsvOptions) -> IoResult<()> {
    let file = File::create(path.as_ref())?;
    write_dataset_to(file, data, options)
}

/// Same as [`write_dataset`] for any writer.
pub fn write_dataset_to<W: Write>(writer: W, data: &Dataset<f64>, options: &CsvOptions) -> IoResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    let mut header: Vec<&str> = data.schema().features().iter().map(|f| f.name.as_str()).collect();
    header.push(&options.target);
    wtr.write_record(&header)?;

    let features = data.schema().features();
    for sample in data.samples() {
        let mut record: Vec<String> = Vec::with_capacity(features.len() + 1);
        for (feature, &v) in features.iter().zip(sample.values) {
            match &feature.kind {
                FeatureKind::Numeric => record.push(v.to_string()),
                FeatureKind::Categorical { levels } => {
                    record.push(levels.get(v as usize).cloned().unwrap_or_default())
                }
            }
        }
        record.push(match sample.class {
            Class::Positive => options.positive.clone(),
            Class::Negative => options.negative_label().to_string(),
        });
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "age,dept,salary,left\n\
                       30,it,5.5,no\n\
                       45,hr,3.0,yes\n\
                       28,it,4.25,no\n\
                       51,sales,6.0,no\n";

    #[test]
    fn test_read_mixed_columns() {
        let data = read_dataset_from(CSV.as_bytes(), &CsvOptions::new("left", "yes")).unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data.n_features(), 3);
        assert_eq!(data.class_counts().positive, 1);
        assert_eq!(data.classes()[1], Class::Positive);

        let dept = data.schema().feature(1).unwrap();
        assert_eq!(
            dept.kind,
            FeatureKind::Categorical {
                levels: vec!["hr".into(), "it".into(), "sales".into()]
            }
        );
        assert_eq!(data.features().column(1).unwrap(), vec![1.0, 0.0, 1.0, 2.0]);
        assert_eq!(data.features().column(2).unwrap(), vec![5.5, 3.0, 4.25, 6.0]);
    }

    #[test]
    fn test_forced_categorical_and_delimiter() {
        let csv = "zip;y\n100;1\n200;0\n100;0\n";
        let options = CsvOptions::new("y", "1").with_delimiter(b';').with_categorical("zip");
        let data = read_dataset_from(csv.as_bytes(), &options).unwrap();
        assert!(data.schema().is_categorical(0));
        assert_eq!(data.features().column(0).unwrap(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            read_dataset_from(CSV.as_bytes(), &CsvOptions::new("churn", "yes")),
            Err(IoError::MissingColumn(c)) if c == "churn"
        ));
        assert!(matches!(
            read_dataset_from("a,y\n".as_bytes(), &CsvOptions::new("y", "1")),
            Err(IoError::EmptyFile)
        ));
        assert!(matches!(
            read_dataset_from(CSV.as_bytes(), &CsvOptions::new("left", "yes").with_negative("n")),
            Err(IoError::UnknownLabel { row: 0, .. })
        ));
    }

    #[test]
    fn test_write_then_read_back() {
        let options = CsvOptions::new("left", "yes").with_negative("no");
        let data = read_dataset_from(CSV.as_bytes(), &options).unwrap();
        let mut buf = Vec::new();
        write_dataset_to(&mut buf, &data, &options).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("age,dept,salary,left\n30,it,5.5,no\n"));
        let again = read_dataset_from(text.as_bytes(), &options).unwrap();
        assert_eq!(again, data);
    }
}
