use crate::batch::{BatchError, BatchLayout, FieldValue, QuadratureFieldSource};
use crate::Real;
use log::trace;
use nalgebra::DMatrix;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use thread_local::ThreadLocal;

/// Gathers field values of quadrature points into one contiguous buffer per field.
///
/// Elements are assigned the batch offset of their first quadrature point in the order they are
/// gathered.
#[derive(Debug, Clone)]
pub struct BatchGather<T> {
    layout: BatchLayout,
    buffers: Vec<Vec<T>>,
    offsets: FxHashMap<usize, usize>,
    point_counts: FxHashMap<usize, usize>,
    batch_size: usize,
}

impl<T: Real> BatchGather<T> {
    pub fn new(layout: BatchLayout) -> Self {
        let buffers = vec![Vec::new(); layout.fields().len()];
        Self {
            layout,
            buffers,
            offsets: FxHashMap::default(),
            point_counts: FxHashMap::default(),
            batch_size: 0,
        }
    }

    pub fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// The number of quadrature points gathered so far.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Clears the gathered data and sizes the buffers for the expected number of quadrature
    /// points.
    pub fn initialize(&mut self, expected_batch_size: usize) {
        self.offsets.clear();
        self.point_counts.clear();
        self.batch_size = 0;
        for (buffer, field) in self.buffers.iter_mut().zip(self.layout.fields()) {
            buffer.clear();
            buffer.resize(expected_batch_size * field.kind.num_components(), T::zero());
        }
    }

    /// Appends the values at all quadrature points of the element.
    pub fn gather_element<S>(&mut self, element: usize, source: &S) -> Result<(), BatchError>
    where
        S: ?Sized + QuadratureFieldSource<T>,
    {
        let num_points = source.num_quadrature_points(element);
        for (buffer, field) in self.buffers.iter_mut().zip(self.layout.fields()) {
            let num_components = field.kind.num_components();
            for q in 0..num_points {
                let value = source.value(element, q, field);
                if value.kind() != field.kind {
                    return Err(BatchError::FieldKindMismatch {
                        field: field.name.clone(),
                        expected: field.kind,
                        actual: value.kind(),
                    });
                }
                let start = (self.batch_size + q) * num_components;
                match value {
                    FieldValue::Scalar(x) => write_at(buffer, start, &[x]),
                    FieldValue::Vector(v) => write_at(buffer, start, v.as_slice()),
                    FieldValue::SymmetricRank2(a) => write_at(buffer, start, a.mandel().as_slice()),
                }
            }
        }

        self.offsets.insert(element, self.batch_size);
        self.point_counts.insert(element, num_points);
        self.batch_size += num_points;
        Ok(())
    }

    /// Gathers the given elements in parallel.
    ///
    /// Each thread gathers into its own partial batch, and the partial batches are joined into
    /// `self` once all elements have been visited.
    pub fn gather_par<S>(&mut self, elements: &[usize], source: &S) -> Result<(), BatchError>
    where
        T: Send,
        S: ?Sized + QuadratureFieldSource<T>,
    {
        let partials: ThreadLocal<RefCell<BatchGather<T>>> = ThreadLocal::new();
        let layout = &self.layout;
        elements.par_iter().try_for_each(|&element| {
            let partial = &mut *partials
                .get_or(|| RefCell::new(BatchGather::new(layout.clone())))
                .borrow_mut();
            partial.gather_element(element, source)
        })?;

        for partial in partials.into_iter() {
            self.join(partial.into_inner());
        }
        Ok(())
    }

    /// Appends the data of another gather, shifting its offsets by the current batch size.
    ///
    /// # Panics
    ///
    /// Panics if the layouts of the two gathers differ.
    pub fn join(&mut self, other: BatchGather<T>) {
        assert_eq!(self.layout, other.layout, "Cannot join batches with different layouts");
        trace!(
            "Joining batch of {} quadrature points at offset {}",
            other.batch_size,
            self.batch_size
        );

        for ((buffer, other_buffer), field) in self
            .buffers
            .iter_mut()
            .zip(&other.buffers)
            .zip(self.layout.fields())
        {
            let num_components = field.kind.num_components();
            let start = self.batch_size * num_components;
            let len = other.batch_size * num_components;
            write_at(buffer, start, &other_buffer[..len]);
        }

        let base = self.batch_size;
        self.offsets
            .extend(other.offsets.into_iter().map(|(element, offset)| (element, offset + base)));
        self.point_counts.extend(other.point_counts);
        self.batch_size += other.batch_size;
    }

    /// Trims the buffers to the number of gathered quadrature points.
    pub fn finalize(&mut self) {
        for (buffer, field) in self.buffers.iter_mut().zip(self.layout.fields()) {
            buffer.truncate(self.batch_size * field.kind.num_components());
        }
    }

    /// The batch offset of the first quadrature point of the element.
    pub fn lookup(&self, element: usize) -> Result<usize, BatchError> {
        self.offsets
            .get(&element)
            .copied()
            .ok_or(BatchError::ElementNotFound { element })
    }

    pub fn offsets(&self) -> &FxHashMap<usize, usize> {
        &self.offsets
    }

    /// The number of gathered quadrature points of each element.
    pub fn point_counts(&self) -> &FxHashMap<usize, usize> {
        &self.point_counts
    }

    /// The gathered components of the field, with the components of each quadrature point stored
    /// contiguously.
    pub fn field_data(&self, field_index: usize) -> &[T] {
        let len = self.batch_size * self.layout.fields()[field_index].kind.num_components();
        &self.buffers[field_index][..len]
    }

    /// The batch as a dense matrix with one row per quadrature point and the fields' components
    /// as columns, in layout order.
    pub fn to_matrix(&self) -> DMatrix<T> {
        let mut matrix = DMatrix::zeros(self.batch_size, self.layout.num_components());
        for (field_index, field) in self.layout.fields().iter().enumerate() {
            let num_components = field.kind.num_components();
            let column = self.layout.column_offset(field_index);
            let data = self.field_data(field_index);
            for (row, values) in data.chunks_exact(num_components).enumerate() {
                for (c, value) in values.iter().enumerate() {
                    matrix[(row, column + c)] = *value;
                }
            }
        }
        matrix
    }
}

/// Writes `values` at `start`, growing the buffer if necessary.
fn write_at<T: Copy>(buffer: &mut Vec<T>, start: usize, values: &[T]) {
    let overlap = buffer.len().saturating_sub(start).min(values.len());
    buffer[start..start + overlap].copy_from_slice(&values[..overlap]);
    buffer.extend_from_slice(&values[overlap..]);
}
