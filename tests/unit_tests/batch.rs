use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, Matrix3, SVector, Vector3};
use tensor_mechanics::batch::{
    BatchError, BatchEvaluation, BatchGather, BatchLayout, BatchedEvaluator, BatchedMaterial, FieldDescriptor,
    FieldKind, FieldValue, QuadratureFieldSource,
};
use tensor_mechanics::stress_update::{
    BatchedStressUpdate, MaterialPointInput, ModelInput, MultiModelSettings, MultiModelStressUpdate, QuadraturePoint,
    StressUpdateModel, TangentCalculation, TrialState,
};
use tensor_mechanics::tensor::{SymmetricRank2, SymmetricRank4};
use util::assert_mandel_approx_eq;

/// Elements with a fixed number of quadrature points and analytic field values.
struct Source {
    num_points: Vec<usize>,
}

fn strain(element: usize, q: usize) -> SymmetricRank2<f64> {
    let (e, q) = (element as f64, q as f64);
    SymmetricRank2::new(1e-3 * (e + 1.0), -2e-4 * q, 5e-4, 1e-4 * e, 0.0, 3e-4)
}

fn temperature(element: usize, q: usize) -> f64 {
    (10 * element + q) as f64
}

impl QuadratureFieldSource<f64> for Source {
    fn num_quadrature_points(&self, element: usize) -> usize {
        self.num_points[element]
    }

    fn value(&self, element: usize, q: usize, field: &FieldDescriptor) -> FieldValue<f64> {
        match field.kind {
            FieldKind::Scalar => FieldValue::Scalar(temperature(element, q)),
            FieldKind::Vector => FieldValue::Vector(Vector3::new(element as f64, q as f64, 0.0)),
            FieldKind::SymmetricRank2 => FieldValue::SymmetricRank2(strain(element, q)),
        }
    }
}

/// A source that returns scalars for every field.
struct ScalarSource;

impl QuadratureFieldSource<f64> for ScalarSource {
    fn num_quadrature_points(&self, _element: usize) -> usize {
        1
    }

    fn value(&self, _element: usize, _q: usize, _field: &FieldDescriptor) -> FieldValue<f64> {
        FieldValue::Scalar(1.0)
    }
}

fn input_layout() -> BatchLayout {
    BatchLayout::new(vec![
        FieldDescriptor::new("temperature", FieldKind::Scalar),
        FieldDescriptor::new("strain", FieldKind::SymmetricRank2),
    ])
    .unwrap()
}

fn source() -> Source {
    Source {
        num_points: (0..40).map(|e| e % 4 + 1).collect(),
    }
}

#[test]
fn layout_describes_columns() {
    let layout = input_layout();
    assert_eq!(layout.num_components(), 7);
    assert_eq!(layout.field_index("strain"), Ok(1));
    assert_eq!(layout.column_offset(0), 0);
    assert_eq!(layout.column_offset(1), 1);
    assert_eq!(
        layout.field_index("pressure"),
        Err(BatchError::UnknownField("pressure".to_string()))
    );
    assert_eq!(FieldKind::Vector.num_components(), 3);
}

#[test]
fn duplicate_fields_are_rejected() {
    let result = BatchLayout::new(vec![
        FieldDescriptor::new("strain", FieldKind::SymmetricRank2),
        FieldDescriptor::new("strain", FieldKind::Scalar),
    ]);
    assert_eq!(result, Err(BatchError::DuplicateField("strain".to_string())));
}

#[test]
fn elements_are_assigned_consecutive_offsets() {
    let source = Source {
        num_points: vec![0, 0, 0, 3, 0, 0, 0, 2],
    };
    let mut gather = BatchGather::new(input_layout());
    gather.initialize(0);
    gather.gather_element(7, &source).unwrap();
    gather.gather_element(3, &source).unwrap();

    assert_eq!(gather.batch_size(), 5);
    assert_eq!(gather.lookup(7), Ok(0));
    assert_eq!(gather.lookup(3), Ok(2));
    assert_eq!(gather.lookup(42), Err(BatchError::ElementNotFound { element: 42 }));
    assert_eq!(gather.field_data(0), &[70.0, 71.0, 30.0, 31.0, 32.0]);
    assert_eq!(&gather.field_data(1)[6..12], strain(7, 1).mandel().as_slice());
}

#[test]
fn joined_batches_are_rebased() {
    let source = Source {
        num_points: vec![2, 3, 4],
    };
    let mut gather = BatchGather::new(input_layout());
    gather.gather_element(0, &source).unwrap();
    gather.gather_element(1, &source).unwrap();

    let mut partial = BatchGather::new(input_layout());
    partial.gather_element(2, &source).unwrap();
    assert_eq!(partial.lookup(2), Ok(0));

    gather.join(partial);
    assert_eq!(gather.batch_size(), 9);
    assert_eq!(gather.lookup(0), Ok(0));
    assert_eq!(gather.lookup(1), Ok(2));
    assert_eq!(gather.lookup(2), Ok(5));
    assert_eq!(
        gather.field_data(0),
        &[0.0, 1.0, 10.0, 11.0, 12.0, 20.0, 21.0, 22.0, 23.0]
    );
}

#[test]
#[should_panic(expected = "different layouts")]
fn joining_different_layouts_panics() {
    let mut gather = BatchGather::<f64>::new(input_layout());
    let other = BatchGather::new(BatchLayout::new(vec![FieldDescriptor::new("strain", FieldKind::SymmetricRank2)]).unwrap());
    gather.join(other);
}

#[test]
fn initialize_discards_previous_batch() {
    let source = source();
    let mut gather = BatchGather::new(input_layout());
    gather.initialize(16);
    gather.gather_element(0, &source).unwrap();
    gather.gather_element(1, &source).unwrap();
    gather.finalize();
    assert_eq!(gather.batch_size(), 3);
    assert_eq!(gather.field_data(0).len(), 3);
    assert_eq!(gather.to_matrix().nrows(), 3);

    gather.initialize(3);
    assert_eq!(gather.batch_size(), 0);
    assert!(gather.lookup(0).is_err());
    gather.gather_element(2, &source).unwrap();
    assert_eq!(gather.lookup(2), Ok(0));
    assert_eq!(gather.field_data(0), &[20.0, 21.0, 22.0]);
}

#[test]
fn gathered_values_must_match_field_kind() {
    let layout = BatchLayout::new(vec![FieldDescriptor::new("velocity", FieldKind::Vector)]).unwrap();
    let mut gather = BatchGather::<f64>::new(layout);
    let expected = BatchError::FieldKindMismatch {
        field: "velocity".to_string(),
        expected: FieldKind::Vector,
        actual: FieldKind::Scalar,
    };
    assert_eq!(gather.gather_element(0, &ScalarSource), Err(expected.clone()));
    assert_eq!(gather.gather_par(&[0, 1, 2], &ScalarSource), Err(expected));
}

#[test]
fn parallel_gather_matches_element_values() {
    let source = source();
    let elements: Vec<usize> = (0..40).rev().collect();
    let mut gather = BatchGather::new(input_layout());
    gather.initialize(0);
    gather.gather_par(&elements, &source).unwrap();
    gather.finalize();

    let expected_size: usize = source.num_points.iter().sum();
    assert_eq!(gather.batch_size(), expected_size);
    assert_eq!(gather.offsets().len(), 40);

    let matrix = gather.to_matrix();
    assert_eq!(matrix.shape(), (expected_size, 7));
    let mut covered = vec![false; expected_size];
    for &element in &elements {
        let offset = gather.lookup(element).unwrap();
        for q in 0..source.num_points[element] {
            let row = offset + q;
            assert!(!covered[row], "row {} assigned twice", row);
            covered[row] = true;
            assert_eq!(matrix[(row, 0)], temperature(element, q));
            let gathered = SVector::<f64, 6>::from_fn(|i, _| matrix[(row, 1 + i)]);
            assert_eq!(&gathered, strain(element, q).mandel());
        }
    }
    assert!(covered.iter().all(|&c| c));
}

/// Evaluates a linear elastic law on the gathered strains.
struct LinearEvaluator {
    layout: BatchLayout,
    stiffness: SymmetricRank4<f64>,
    include_derivative: bool,
    extra_rows: usize,
    derivative_input: &'static str,
    missing_derivative_rows: usize,
}

impl LinearEvaluator {
    fn new(stiffness: SymmetricRank4<f64>) -> Self {
        Self {
            layout: BatchLayout::new(vec![FieldDescriptor::new("stress", FieldKind::SymmetricRank2)]).unwrap(),
            stiffness,
            include_derivative: true,
            extra_rows: 0,
            derivative_input: "strain",
            missing_derivative_rows: 0,
        }
    }
}

impl BatchedEvaluator<f64> for LinearEvaluator {
    fn output_layout(&self) -> &BatchLayout {
        &self.layout
    }

    fn evaluate(&self, inputs: &DMatrix<f64>, batch_size: usize) -> eyre::Result<BatchEvaluation<f64>> {
        assert_eq!(inputs.nrows(), batch_size);
        let mut outputs = DMatrix::zeros(batch_size + self.extra_rows, 6);
        let mut derivative = DMatrix::zeros(6 * batch_size, 6);
        for row in 0..batch_size {
            let strain = SVector::<f64, 6>::from_fn(|i, _| inputs[(row, 1 + i)]);
            let stress = self.stiffness.mandel() * strain;
            for i in 0..6 {
                outputs[(row, i)] = stress[i];
            }
            derivative
                .fixed_view_mut::<6, 6>(6 * row, 0)
                .copy_from(self.stiffness.mandel());
        }

        let evaluation = BatchEvaluation::new(outputs);
        if self.include_derivative {
            let rows = derivative.nrows() - self.missing_derivative_rows;
            let derivative = derivative.rows(0, rows).clone_owned();
            Ok(evaluation.with_derivative("stress", self.derivative_input, derivative))
        } else {
            Ok(evaluation)
        }
    }
}

fn softened_stiffness() -> SymmetricRank4<f64> {
    SymmetricRank4::isotropic_e_nu(500.0, 0.25)
}

#[test]
fn batched_material_publishes_evaluated_rows() {
    let source = source();
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    let output = material.output();
    assert!(!output.read().is_ready());

    let elements: Vec<usize> = (0..40).collect();
    material.execute(&elements, &source).unwrap();

    let output = output.read();
    assert!(output.is_ready());
    assert_eq!(output.batch_size(), material.gather().batch_size());
    for element in [0, 5, 39] {
        for q in 0..source.num_points[element] {
            let row = output.row(element, q).unwrap();
            let stress = output.symmetric_rank2("stress", row).unwrap();
            assert_mandel_approx_eq!(stress, softened_stiffness() * strain(element, q), abstol = 1e-12);
            let tangent = output.symmetric_rank4_derivative("stress", "strain", row);
            assert_mandel_approx_eq!(tangent, softened_stiffness(), abstol = 1e-12);
        }
    }
    assert!(matches!(
        output.scalar("stress", 0),
        Err(BatchError::FieldKindMismatch { .. })
    ));
}

#[test]
fn batched_material_only_exposes_latest_elements() {
    let source = source();
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    material.execute(&[0, 1, 2], &source).unwrap();
    material.execute(&[3], &source).unwrap();

    let output = material.output();
    let output = output.read();
    assert_eq!(output.row(3, 1), Ok(1));
    assert_eq!(output.row(0, 0), Err(BatchError::ElementNotFound { element: 0 }));
    assert_eq!(output.batch_size(), source.num_points[3]);
}

#[test]
fn evaluation_with_wrong_shape_is_rejected() {
    let mut evaluator = LinearEvaluator::new(softened_stiffness());
    evaluator.extra_rows = 1;
    let mut material = BatchedMaterial::new(input_layout(), evaluator);
    assert!(material.execute(&[0, 1], &source()).is_err());
    assert!(!material.output().read().is_ready());
}

#[test]
fn rows_are_bounded_by_the_gathered_point_count() {
    let source = Source { num_points: vec![2, 3] };
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    material.execute(&[0, 1], &source).unwrap();
    assert_eq!(material.gather().point_counts().get(&1), Some(&3));

    let output = material.output();
    let output = output.read();
    assert_eq!(output.batch_size(), 5);
    assert_eq!(output.row(0, 1), Ok(1));
    assert_eq!(output.row(1, 2), Ok(4));
    assert_eq!(
        output.row(0, 2),
        Err(BatchError::QuadraturePointOutOfRange {
            element: 0,
            quadrature_point: 2,
            num_points: 2
        })
    );
    assert_eq!(
        output.row(1, 7),
        Err(BatchError::QuadraturePointOutOfRange {
            element: 1,
            quadrature_point: 7,
            num_points: 3
        })
    );
    assert_eq!(
        output.symmetric_rank2("stress", 5),
        Err(BatchError::RowOutOfRange { row: 5, batch_size: 5 })
    );
}

#[test]
fn elements_without_points_have_no_rows() {
    let source = Source { num_points: vec![0, 2] };
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    material.execute(&[0, 1], &source).unwrap();

    let output = material.output();
    let output = output.read();
    assert!(matches!(
        output.row(0, 0),
        Err(BatchError::QuadraturePointOutOfRange { num_points: 0, .. })
    ));
    assert!(output.row(1, 1).is_ok());
}

#[test]
fn derivatives_with_wrong_shape_are_rejected() {
    let mut evaluator = LinearEvaluator::new(softened_stiffness());
    evaluator.missing_derivative_rows = 6;
    let mut material = BatchedMaterial::new(input_layout(), evaluator);
    let err = material.execute(&[0, 1], &source()).unwrap_err();
    let root = err.root_cause().downcast_ref::<BatchError>().unwrap();
    assert_eq!(
        root,
        &BatchError::DerivativeShapeMismatch {
            output: "stress".to_string(),
            input: "strain".to_string(),
            expected: (18, 6),
            actual: (12, 6),
        }
    );
    assert!(!material.output().read().is_ready());
}

#[test]
fn derivatives_with_respect_to_unknown_fields_are_rejected() {
    let mut evaluator = LinearEvaluator::new(softened_stiffness());
    evaluator.derivative_input = "displacement";
    let mut material = BatchedMaterial::new(input_layout(), evaluator);
    let err = material.execute(&[0], &source()).unwrap_err();
    let root = err.root_cause().downcast_ref::<BatchError>().unwrap();
    assert_eq!(root, &BatchError::UnknownField("displacement".to_string()));
    assert!(!material.output().read().is_ready());
}

#[test]
#[should_panic(expected = "no derivative")]
fn missing_derivative_panics() {
    let mut evaluator = LinearEvaluator::new(softened_stiffness());
    evaluator.include_derivative = false;
    let mut material = BatchedMaterial::new(input_layout(), evaluator);
    material.execute(&[0], &source()).unwrap();
    let _ = material.output().read().derivative("stress", "strain", 0);
}

#[test]
fn batched_model_passes_trial_state_through_until_ready() {
    let source = source();
    let c = SymmetricRank4::isotropic_e_nu(1000.0, 0.25);
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    let model = BatchedStressUpdate::new("surrogate", material.output(), "stress", "strain");
    assert_eq!(StressUpdateModel::<f64>::tangent_calculation(&model), TangentCalculation::Full);

    let point = QuadraturePoint { element: 5, index: 1 };
    let rotation = Matrix3::identity();
    let zero = SymmetricRank2::zeros();
    let input = ModelInput {
        point,
        dt: 1.0,
        rotation_increment: &rotation,
        elasticity_tensor: &c,
        elastic_strain_old: &zero,
        stress_old: &zero,
        compute_tangent: true,
        tangent_calculation: TangentCalculation::Full,
    };
    let trial = TrialState {
        stress: c * strain(5, 1),
        elastic_strain_increment: strain(5, 1),
    };

    let admissible = model.update_state(&input, &trial, &[], &mut []).unwrap();
    assert_eq!(admissible.stress, trial.stress);
    assert_eq!(admissible.inelastic_strain_increment, SymmetricRank2::zeros());
    assert_eq!(admissible.tangent, Some(c));

    let elements: Vec<usize> = (0..40).collect();
    material.execute(&elements, &source).unwrap();
    let admissible = model.update_state(&input, &trial, &[], &mut []).unwrap();
    let expected_stress = softened_stiffness() * strain(5, 1);
    assert_mandel_approx_eq!(admissible.stress, expected_stress, abstol = 1e-12);
    assert_mandel_approx_eq!(
        admissible.inelastic_strain_increment,
        c.inv_symm().unwrap() * (trial.stress - expected_stress),
        abstol = 1e-12
    );
    assert_mandel_approx_eq!(admissible.tangent.unwrap(), softened_stiffness(), abstol = 1e-12);

    // Points outside the batch are reported as failures
    let outside = ModelInput {
        point: QuadraturePoint { element: 99, index: 0 },
        ..input
    };
    assert!(model.update_state(&outside, &trial, &[], &mut []).is_err());
}

#[test]
fn batched_model_in_multi_model_update() {
    let source = source();
    let c = SymmetricRank4::isotropic_e_nu(1000.0, 0.25);
    let mut material = BatchedMaterial::new(input_layout(), LinearEvaluator::new(softened_stiffness()));
    let model: Box<dyn StressUpdateModel<f64>> =
        Box::new(BatchedStressUpdate::new("surrogate", material.output(), "stress", "strain"));
    // The batched model does not rely on isotropic elasticity
    let update = MultiModelStressUpdate::new(MultiModelSettings::default(), vec![model], false).unwrap();
    assert_eq!(update.tangent_calculation(), TangentCalculation::Full);

    let elements: Vec<usize> = (0..40).collect();
    material.execute(&elements, &source).unwrap();

    let point = QuadraturePoint { element: 12, index: 0 };
    let input = MaterialPointInput::new(point, 0, 1.0, strain(12, 0), c).with_jacobian();
    let result = update.update(&input, &update.initial_state()).unwrap();

    let expected_stress = softened_stiffness() * strain(12, 0);
    assert_mandel_approx_eq!(result.state.stress, expected_stress, abstol = 1e-12);
    assert_mandel_approx_eq!(result.jacobian.unwrap(), softened_stiffness(), abstol = 1e-12);
    let elastic_strain = c.inv_symm().unwrap() * expected_stress;
    assert_mandel_approx_eq!(result.state.elastic_strain, elastic_strain, abstol = 1e-12);
    assert_scalar_eq!(
        (result.state.elastic_strain + result.state.inelastic_strain - strain(12, 0)).l2_norm(),
        0.0,
        comp = abs,
        tol = 1e-14
    );
}
