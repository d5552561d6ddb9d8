use crate::batch::{BatchError, BatchGather, BatchLayout, FieldKind, QuadratureFieldSource};
use crate::tensor::{SymmetricRank2, SymmetricRank4};
use crate::Real;
use eyre::WrapErr;
use log::debug;
use nalgebra::{DMatrix, SMatrix, SVector, Scalar};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The external evaluator of a batch.
pub trait BatchedEvaluator<T: Scalar>: Send + Sync {
    /// The layout of each row of the evaluator's outputs.
    fn output_layout(&self) -> &BatchLayout;

    /// Evaluates a batch with one row per quadrature point.
    ///
    /// The returned outputs must have one row per input row, in the same order.
    fn evaluate(&self, inputs: &DMatrix<T>, batch_size: usize) -> eyre::Result<BatchEvaluation<T>>;
}

/// Dense outputs of an evaluated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvaluation<T: Scalar> {
    /// One row per quadrature point, with the output fields' components as columns.
    pub outputs: DMatrix<T>,
    /// Derivatives of output fields with respect to input fields, keyed by
    /// `(output name, input name)`.
    ///
    /// For an output with $m$ components and an input with $n$ components, the block is a
    /// $(m \cdot \text{batch size}) \times n$ matrix whose rows $m r, \dots, m r + m - 1$ hold
    /// the derivative at row $r$.
    pub derivatives: FxHashMap<(String, String), DMatrix<T>>,
}

impl<T: Scalar> BatchEvaluation<T> {
    pub fn new(outputs: DMatrix<T>) -> Self {
        Self {
            outputs,
            derivatives: FxHashMap::default(),
        }
    }

    pub fn with_derivative(mut self, output: &str, input: &str, block: DMatrix<T>) -> Self {
        self.derivatives
            .insert((output.to_string(), input.to_string()), block);
        self
    }
}

/// The results of the most recent batch evaluation, shared with the models consuming them.
pub type SharedBatchOutput<T> = Arc<RwLock<BatchOutput<T>>>;

/// Results of a batch evaluation together with the element index of the batch.
///
/// The results are only meaningful once [`is_ready`](Self::is_ready) returns `true`. Consumers
/// must treat an output that is not ready as "no update", not as zero.
#[derive(Debug, Clone)]
pub struct BatchOutput<T: Scalar> {
    input_layout: BatchLayout,
    output_layout: BatchLayout,
    outputs: DMatrix<T>,
    derivatives: FxHashMap<(String, String), DMatrix<T>>,
    offsets: FxHashMap<usize, usize>,
    point_counts: FxHashMap<usize, usize>,
    ready: bool,
}

impl<T: Real> BatchOutput<T> {
    pub fn new(input_layout: BatchLayout, output_layout: BatchLayout) -> Self {
        Self {
            input_layout,
            output_layout,
            outputs: DMatrix::zeros(0, 0),
            derivatives: FxHashMap::default(),
            offsets: FxHashMap::default(),
            point_counts: FxHashMap::default(),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn batch_size(&self) -> usize {
        self.outputs.nrows()
    }

    /// Marks the output as stale until the next evaluation completes.
    pub fn invalidate(&mut self) {
        self.ready = false;
    }

    /// Stores the evaluation of a gathered batch and marks the output as ready.
    pub fn store(&mut self, gather: &BatchGather<T>, evaluation: BatchEvaluation<T>) -> Result<(), BatchError> {
        let expected = (gather.batch_size(), self.output_layout.num_components());
        let actual = evaluation.outputs.shape();
        if expected != actual {
            return Err(BatchError::ShapeMismatch { expected, actual });
        }
        for ((output, input), block) in &evaluation.derivatives {
            let m = field_components(&self.output_layout, output)?;
            let n = field_components(&self.input_layout, input)?;
            let expected = (m * gather.batch_size(), n);
            if block.shape() != expected {
                return Err(BatchError::DerivativeShapeMismatch {
                    output: output.clone(),
                    input: input.clone(),
                    expected,
                    actual: block.shape(),
                });
            }
        }

        self.outputs = evaluation.outputs;
        self.derivatives = evaluation.derivatives;
        self.offsets = gather.offsets().clone();
        self.point_counts = gather.point_counts().clone();
        self.ready = true;
        Ok(())
    }

    /// The batch row of the given quadrature point of the element.
    pub fn row(&self, element: usize, quadrature_point: usize) -> Result<usize, BatchError> {
        let offset = *self
            .offsets
            .get(&element)
            .ok_or(BatchError::ElementNotFound { element })?;
        let num_points = self.point_counts.get(&element).copied().unwrap_or(0);
        if quadrature_point >= num_points {
            return Err(BatchError::QuadraturePointOutOfRange {
                element,
                quadrature_point,
                num_points,
            });
        }
        Ok(offset + quadrature_point)
    }

    fn check_row(&self, row: usize) -> Result<(), BatchError> {
        if row < self.batch_size() {
            Ok(())
        } else {
            Err(BatchError::RowOutOfRange {
                row,
                batch_size: self.batch_size(),
            })
        }
    }

    fn output_columns(&self, field: &str, kind: FieldKind) -> Result<usize, BatchError> {
        let index = self.output_layout.field_index(field)?;
        let actual = self.output_layout.fields()[index].kind;
        if actual != kind {
            return Err(BatchError::FieldKindMismatch {
                field: field.to_string(),
                expected: kind,
                actual,
            });
        }
        Ok(self.output_layout.column_offset(index))
    }

    pub fn scalar(&self, field: &str, row: usize) -> Result<T, BatchError> {
        self.check_row(row)?;
        let column = self.output_columns(field, FieldKind::Scalar)?;
        Ok(self.outputs[(row, column)])
    }

    pub fn symmetric_rank2(&self, field: &str, row: usize) -> Result<SymmetricRank2<T>, BatchError> {
        self.check_row(row)?;
        let column = self.output_columns(field, FieldKind::SymmetricRank2)?;
        let values: SVector<T, 6> = self.outputs.fixed_view::<1, 6>(row, column).transpose();
        Ok(SymmetricRank2::from_mandel(values))
    }

    /// The derivative of an output field with respect to an input field at the given row.
    ///
    /// # Panics
    ///
    /// Panics if the evaluator did not provide the requested derivative or if the row is outside
    /// the batch.
    pub fn derivative(&self, output: &str, input: &str, row: usize) -> DMatrix<T> {
        let block = self
            .derivatives
            .get(&(output.to_string(), input.to_string()))
            .unwrap_or_else(|| panic!("Batch output has no derivative of \"{}\" with respect to \"{}\"", output, input));
        assert!(
            row < self.batch_size(),
            "Row {} is outside the batch of size {}",
            row,
            self.batch_size()
        );
        let m = block.nrows() / self.batch_size();
        block.rows(m * row, m).clone_owned()
    }

    /// The derivative of a symmetric rank-2 output with respect to a symmetric rank-2 input.
    ///
    /// # Panics
    ///
    /// Panics if the derivative is missing or the fields are not symmetric rank-2 tensors.
    pub fn symmetric_rank4_derivative(&self, output: &str, input: &str, row: usize) -> SymmetricRank4<T> {
        let is_rank2 = |layout: &BatchLayout, name: &str| {
            layout
                .field_index(name)
                .map(|i| layout.fields()[i].kind == FieldKind::SymmetricRank2)
                .unwrap_or(false)
        };
        assert!(
            is_rank2(&self.output_layout, output) && is_rank2(&self.input_layout, input),
            "Derivative of \"{}\" with respect to \"{}\" is not between symmetric rank-2 fields",
            output,
            input
        );
        let block = self.derivative(output, input, row);
        SymmetricRank4::from_mandel(SMatrix::<T, 6, 6>::from_fn(|i, j| block[(i, j)]))
    }
}

fn field_components(layout: &BatchLayout, name: &str) -> Result<usize, BatchError> {
    let index = layout.field_index(name)?;
    Ok(layout.fields()[index].kind.num_components())
}

/// Drives the gather, evaluation and publication of a batch for a set of elements.
pub struct BatchedMaterial<T: Scalar, E> {
    gather: BatchGather<T>,
    evaluator: E,
    output: SharedBatchOutput<T>,
}

impl<T, E> BatchedMaterial<T, E>
where
    T: Real,
    E: BatchedEvaluator<T>,
{
    pub fn new(input_layout: BatchLayout, evaluator: E) -> Self {
        let output = BatchOutput::new(input_layout.clone(), evaluator.output_layout().clone());
        Self {
            gather: BatchGather::new(input_layout),
            evaluator,
            output: Arc::new(RwLock::new(output)),
        }
    }

    /// The shared output, to be handed to the models consuming the results.
    pub fn output(&self) -> SharedBatchOutput<T> {
        Arc::clone(&self.output)
    }

    pub fn gather(&self) -> &BatchGather<T> {
        &self.gather
    }

    /// Gathers the given elements, evaluates the batch and publishes the results.
    ///
    /// The output is marked as not ready for the duration of the pass.
    pub fn execute<S>(&mut self, elements: &[usize], source: &S) -> eyre::Result<()>
    where
        S: ?Sized + QuadratureFieldSource<T>,
    {
        self.output.write().invalidate();

        let previous_batch_size = self.gather.batch_size();
        self.gather.initialize(previous_batch_size);
        self.gather
            .gather_par(elements, source)
            .wrap_err("failed to gather batch")?;
        self.gather.finalize();

        let batch_size = self.gather.batch_size();
        debug!("Evaluating batch of {} quadrature points", batch_size);
        let evaluation = self
            .evaluator
            .evaluate(&self.gather.to_matrix(), batch_size)
            .wrap_err("batched evaluation failed")?;

        self.output
            .write()
            .store(&self.gather, evaluation)
            .wrap_err("failed to store batch evaluation")?;
        Ok(())
    }
}
