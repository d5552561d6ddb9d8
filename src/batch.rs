//! Gathering per-quadrature-point data into dense batches for an external evaluator.
//!
//! A [`BatchLayout`] fixes the set of fields gathered per quadrature point. A [`BatchGather`]
//! appends the values of every visited element to one buffer per field and records the offset
//! of the element's first quadrature point in the batch. After the batch has been evaluated by a
//! [`BatchedEvaluator`], consumers locate their rows in the shared [`BatchOutput`] through the
//! same element index.
use crate::tensor::SymmetricRank2;
use nalgebra::{Scalar, Vector3};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

mod evaluator;
mod gather;

pub use evaluator::{BatchEvaluation, BatchOutput, BatchedEvaluator, BatchedMaterial, SharedBatchOutput};
pub use gather::BatchGather;

/// The kind of a gathered field, which determines its number of components.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    Vector,
    SymmetricRank2,
}

impl FieldKind {
    pub fn num_components(&self) -> usize {
        match self {
            FieldKind::Scalar => 1,
            FieldKind::Vector => 3,
            FieldKind::SymmetricRank2 => 6,
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Vector => "vector",
            FieldKind::SymmetricRank2 => "symmetric rank-2 tensor",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// An ordered list of uniquely named fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLayout {
    fields: Vec<FieldDescriptor>,
}

impl BatchLayout {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, BatchError> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|other| other.name == field.name) {
                return Err(BatchError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Result<usize, BatchError> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| BatchError::UnknownField(name.to_string()))
    }

    /// The total number of components of a row, i.e. of a single quadrature point.
    pub fn num_components(&self) -> usize {
        self.fields.iter().map(|field| field.kind.num_components()).sum()
    }

    /// The column at which the components of the given field start.
    pub fn column_offset(&self, field_index: usize) -> usize {
        self.fields[..field_index]
            .iter()
            .map(|field| field.kind.num_components())
            .sum()
    }
}

/// The value of a field at a quadrature point.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue<T: Scalar> {
    Scalar(T),
    Vector(Vector3<T>),
    SymmetricRank2(SymmetricRank2<T>),
}

impl<T: Scalar> FieldValue<T> {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Scalar(_) => FieldKind::Scalar,
            FieldValue::Vector(_) => FieldKind::Vector,
            FieldValue::SymmetricRank2(_) => FieldKind::SymmetricRank2,
        }
    }
}

/// Provides the values of the gathered fields at the quadrature points of each element.
pub trait QuadratureFieldSource<T: Scalar>: Sync {
    fn num_quadrature_points(&self, element: usize) -> usize;

    fn value(&self, element: usize, quadrature_point: usize, field: &FieldDescriptor) -> FieldValue<T>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The element was not part of the gathered batch.
    ElementNotFound { element: usize },
    /// The element was gathered with fewer quadrature points than requested.
    QuadraturePointOutOfRange {
        element: usize,
        quadrature_point: usize,
        num_points: usize,
    },
    RowOutOfRange { row: usize, batch_size: usize },
    UnknownField(String),
    DuplicateField(String),
    FieldKindMismatch {
        field: String,
        expected: FieldKind,
        actual: FieldKind,
    },
    /// The evaluator returned a batch whose shape does not match the gathered batch.
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// A derivative block does not have one $m \times n$ block per row of the batch.
    DerivativeShapeMismatch {
        output: String,
        input: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

impl Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::ElementNotFound { element } => write!(f, "Element {} not found in batch.", element),
            BatchError::QuadraturePointOutOfRange {
                element,
                quadrature_point,
                num_points,
            } => write!(
                f,
                "Quadrature point {} of element {} is out of range, the element has {} points in the batch.",
                quadrature_point, element, num_points
            ),
            BatchError::RowOutOfRange { row, batch_size } => {
                write!(f, "Row {} is out of range for a batch of size {}.", row, batch_size)
            }
            BatchError::UnknownField(name) => write!(f, "Unknown batch field \"{}\".", name),
            BatchError::DuplicateField(name) => write!(f, "Batch field \"{}\" is declared more than once.", name),
            BatchError::FieldKindMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Batch field \"{}\" expects a {} value, got a {} value.",
                field, expected, actual
            ),
            BatchError::ShapeMismatch { expected, actual } => write!(
                f,
                "Batch has shape {}x{}, expected {}x{}.",
                actual.0, actual.1, expected.0, expected.1
            ),
            BatchError::DerivativeShapeMismatch {
                output,
                input,
                expected,
                actual,
            } => write!(
                f,
                "Derivative of \"{}\" with respect to \"{}\" has shape {}x{}, expected {}x{}.",
                output, input, actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl Error for BatchError {}
