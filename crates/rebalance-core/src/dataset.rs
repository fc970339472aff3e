use crate::dtype::Float;
use crate::error::{CoreError, CoreResult};
use crate::matrix::Matrix;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary class label. `Positive` is the rare (minority) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Class {
    Negative,
    Positive,
}

impl Class {
    pub fn from_bool(positive: bool) -> Self {
        if positive {
            Class::Positive
        } else {
            Class::Negative
        }
    }

    pub fn is_positive(self) -> bool {
        self == Class::Positive
    }

    /// 1 for `Positive`, 0 for `Negative`.
    pub fn as_float<T: Float>(self) -> T {
        match self {
            Class::Positive => T::ONE,
            Class::Negative => T::ZERO,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Negative => write!(f, "negative"),
            Class::Positive => write!(f, "positive"),
        }
    }
}

/// How a feature column is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Numeric,
    /// Stored as the index into `levels`.
    Categorical { levels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub kind: FeatureKind,
}

impl Feature {
    pub fn numeric(name: impl Into<String>) -> Self {
        Feature {
            name: name.into(),
            kind: FeatureKind::Numeric,
        }
    }

    pub fn categorical(name: impl Into<String>, levels: Vec<String>) -> Self {
        Feature {
            name: name.into(),
            kind: FeatureKind::Categorical { levels },
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Number of levels, or `None` for numeric features.
    pub fn n_levels(&self) -> Option<usize> {
        match &self.kind {
            FeatureKind::Numeric => None,
            FeatureKind::Categorical { levels } => Some(levels.len()),
        }
    }
}

/// Ordered feature descriptions for the columns of a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    features: Vec<Feature>,
}

impl Schema {
    pub fn new(features: Vec<Feature>) -> Self {
        Schema { features }
    }

    /// Schema of all-numeric columns.
    pub fn numeric<S: AsRef<str>>(names: &[S]) -> Self {
        Schema {
            features: names.iter().map(|n| Feature::numeric(n.as_ref())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, j: usize) -> Option<&Feature> {
        self.features.get(j)
    }

    pub fn is_categorical(&self, j: usize) -> bool {
        self.features.get(j).is_some_and(Feature::is_categorical)
    }

    pub fn numeric_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&j| !self.is_categorical(j)).collect()
    }

    pub fn categorical_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&j| self.is_categorical(j)).collect()
    }
}

/// Per-class row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    pub fn get(&self, class: Class) -> usize {
        match class {
            Class::Negative => self.negative,
            Class::Positive => self.positive,
        }
    }

    pub fn total(&self) -> usize {
        self.negative + self.positive
    }
}

/// A borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a, T: Float> {
    pub values: &'a [T],
    pub class: Class,
}

/// Labeled tabular data: a schema, a feature matrix and one class per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Dataset<T: Float> {
    schema: Schema,
    features: Matrix<T>,
    classes: Vec<Class>,
}

impl<T: Float> Dataset<T> {
    /// Build a dataset, validating shapes, finiteness and category indices.
    pub fn new(schema: Schema, features: Matrix<T>, classes: Vec<Class>) -> CoreResult<Self> {
        validate(&schema, &features, &classes)?;
        Ok(Dataset {
            schema,
            features,
            classes,
        })
    }

    /// Convenience constructor for all-numeric data.
    pub fn from_numeric(rows: &[Vec<T>], classes: Vec<Class>) -> CoreResult<Self> {
        let features = Matrix::from_rows(rows)?;
        let names: Vec<String> = (0..features.ncols()).map(|j| format!("x{j}")).collect();
        Dataset::new(Schema::numeric(&names), features, classes)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn features(&self) -> &Matrix<T> {
        &self.features
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn sample(&self, i: usize) -> CoreResult<Sample<'_, T>> {
        Ok(Sample {
            values: self.features.row(i)?,
            class: self.classes[i],
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample<'_, T>> + '_ {
        self.features
            .rows()
            .zip(self.classes.iter())
            .map(|(values, &class)| Sample { values, class })
    }

    pub fn class_counts(&self) -> ClassCounts {
        let positive = self.classes.iter().filter(|c| c.is_positive()).count();
        ClassCounts {
            negative: self.classes.len() - positive,
            positive,
        }
    }

    /// Row indices belonging to `class`, ascending.
    pub fn indices_of(&self, class: Class) -> Vec<usize> {
        self.classes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == class)
            .map(|(i, _)| i)
            .collect()
    }

    /// Labels as 0/1 values.
    pub fn labels_as_float(&self) -> Vec<T> {
        self.classes.iter().map(|c| c.as_float()).collect()
    }

    /// New dataset with the given rows, in the given order.
    pub fn subset(&self, indices: &[usize]) -> CoreResult<Self> {
        let features = self.features.select_rows(indices)?;
        let classes = indices.iter().map(|&i| self.classes[i]).collect();
        Ok(Dataset {
            schema: self.schema.clone(),
            features,
            classes,
        })
    }

    /// New dataset with `rows` appended after the existing ones.
    pub fn append(&self, rows: &Matrix<T>, classes: &[Class]) -> CoreResult<Self> {
        validate(&self.schema, rows, classes)?;
        let features = self.features.vstack(rows)?;
        let mut all = Vec::with_capacity(self.classes.len() + classes.len());
        all.extend_from_slice(&self.classes);
        all.extend_from_slice(classes);
        Ok(Dataset {
            schema: self.schema.clone(),
            features,
            classes: all,
        })
    }
}

fn validate<T: Float>(schema: &Schema, features: &Matrix<T>, classes: &[Class]) -> CoreResult<()> {
    if features.ncols() != schema.len() {
        return Err(CoreError::SchemaMismatch(format!(
            "schema has {} features, matrix has {} columns",
            schema.len(),
            features.ncols()
        )));
    }
    if features.nrows() != classes.len() {
        return Err(CoreError::ShapeMismatch {
            expected: vec![features.nrows()],
            got: vec![classes.len()],
        });
    }
    if let Some((row, col)) = features.find_non_finite() {
        return Err(CoreError::NonFiniteValue { row, col });
    }
    for j in schema.categorical_indices() {
        let feature = &schema.features[j];
        let levels = feature.n_levels().unwrap_or(0);
        for row in features.rows() {
            let v = row[j].to_f64();
            if v < 0.0 || v.fract() != 0.0 || v as usize >= levels {
                return Err(CoreError::InvalidCategory {
                    feature: feature.name.clone(),
                    levels,
                    value: v,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed() -> Dataset<f64> {
        let schema = Schema::new(vec![
            Feature::numeric("age"),
            Feature::categorical("dept", vec!["hr".into(), "it".into()]),
        ]);
        let features = Matrix::from_rows(&[
            vec![30.0, 0.0],
            vec![45.0, 1.0],
            vec![28.0, 1.0],
        ])
        .unwrap();
        Dataset::new(
            schema,
            features,
            vec![Class::Negative, Class::Positive, Class::Negative],
        )
        .unwrap()
    }

    #[test]
    fn test_counts_and_indices() {
        let ds = mixed();
        let counts = ds.class_counts();
        assert_eq!(counts.negative, 2);
        assert_eq!(counts.positive, 1);
        assert_eq!(ds.indices_of(Class::Negative), vec![0, 2]);
        assert_eq!(ds.schema().categorical_indices(), vec![1]);
    }

    #[test]
    fn test_invalid_category_rejected() {
        let schema = Schema::new(vec![Feature::categorical("dept", vec!["hr".into()])]);
        let features = Matrix::from_rows(&[vec![1.0]]).unwrap();
        let err = Dataset::new(schema, features, vec![Class::Negative]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCategory { levels: 1, .. }));
    }

    #[test]
    fn test_label_length_mismatch() {
        let err = Dataset::<f64>::from_numeric(&[vec![1.0], vec![2.0]], vec![Class::Positive])
            .unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_append_leaves_original_untouched() {
        let ds = mixed();
        let extra = Matrix::from_rows(&[vec![50.0, 1.0]]).unwrap();
        let grown = ds.append(&extra, &[Class::Positive]).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(grown.len(), 4);
        assert_eq!(grown.class_counts().positive, 2);
        assert_eq!(grown.sample(3).unwrap().values, &[50.0, 1.0]);
    }

    #[test]
    fn test_subset() {
        let ds = mixed();
        let sub = ds.subset(&[2, 1]).unwrap();
        assert_eq!(sub.classes(), &[Class::Negative, Class::Positive]);
        assert_eq!(sub.sample(0).unwrap().values, &[28.0, 1.0]);
    }
}
