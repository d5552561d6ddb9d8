use tensor_mechanics::stress_update::{
    ConfigurationError, ElasticStressUpdate, IsotropicPlasticityParameters, IsotropicPlasticityStressUpdate,
    ModelRegistry, MultiModelSettings, MultiModelStressUpdate, PowerLawCreepParameters, PowerLawCreepStressUpdate,
    ReturnMappingSettings, StressUpdateModel, TangentCalculation, TangentOperator,
};

fn registry() -> ModelRegistry<f64> {
    let mut registry = ModelRegistry::new();
    registry.register("elastic", || Ok(Box::new(ElasticStressUpdate::new("elastic")) as Box<dyn StressUpdateModel<f64>>));
    registry.register("plasticity", || {
        let parameters = IsotropicPlasticityParameters {
            yield_stress: 1.0,
            hardening_slope: 100.0,
        };
        let model = IsotropicPlasticityStressUpdate::new("plasticity", parameters, ReturnMappingSettings::default())?;
        Ok(Box::new(model) as Box<dyn StressUpdateModel<f64>>)
    });
    registry.register("creep", || {
        let parameters = PowerLawCreepParameters {
            coefficient: 1e-5,
            n_exponent: 3.0,
            activation_energy: 0.0,
            gas_constant: 8.314,
            temperature: 300.0,
        };
        let settings = ReturnMappingSettings {
            tangent_calculation: TangentCalculation::Full,
            ..ReturnMappingSettings::default()
        };
        let model = PowerLawCreepStressUpdate::new("creep", parameters, settings)?;
        Ok(Box::new(model) as Box<dyn StressUpdateModel<f64>>)
    });
    registry
}

#[test]
fn settings_take_defaults_for_missing_fields() {
    let settings: MultiModelSettings<f64> = serde_json::from_str(r#"{ "inelastic_models": ["plasticity"] }"#).unwrap();
    assert_eq!(
        settings,
        MultiModelSettings {
            inelastic_models: vec!["plasticity".to_string()],
            ..MultiModelSettings::default()
        }
    );
    assert_eq!(settings.max_iterations, 30);
    assert_eq!(settings.relative_tolerance, 1e-5);
    assert_eq!(settings.absolute_tolerance, 1e-5);
    assert_eq!(settings.tangent_operator, TangentOperator::Nonlinear);
    assert_eq!(settings.combined_inelastic_strain_weights, None);
    assert!(!settings.cycle_models);
    assert!(!settings.perform_finite_strain_rotations);
}

#[test]
fn settings_use_snake_case_names() {
    let json = r#"{
        "inelastic_models": ["creep", "plasticity"],
        "max_iterations": 50,
        "tangent_operator": "elastic",
        "combined_inelastic_strain_weights": [1.0, 0.5],
        "perform_finite_strain_rotations": true
    }"#;
    let settings: MultiModelSettings<f64> = serde_json::from_str(json).unwrap();
    assert_eq!(settings.max_iterations, 50);
    assert_eq!(settings.tangent_operator, TangentOperator::Elastic);
    assert_eq!(settings.combined_inelastic_strain_weights, Some(vec![1.0, 0.5]));
    assert!(settings.perform_finite_strain_rotations);

    let serialized = serde_json::to_value(&settings).unwrap();
    assert_eq!(serialized["tangent_operator"], "elastic");
    let round_trip: MultiModelSettings<f64> = serde_json::from_value(serialized).unwrap();
    assert_eq!(round_trip, settings);

    assert_eq!(serde_json::to_value(TangentCalculation::Partial).unwrap(), "partial");
    assert!(serde_json::from_str::<MultiModelSettings<f64>>(r#"{ "tangent_operator": "secant" }"#).is_err());
}

#[test]
fn return_mapping_settings_take_defaults() {
    let settings: ReturnMappingSettings<f64> = serde_json::from_str(r#"{ "tangent_calculation": "full" }"#).unwrap();
    assert_eq!(settings.tangent_calculation, TangentCalculation::Full);
    assert_eq!(settings.max_iterations, 30);
    assert_eq!(settings.max_inelastic_increment, 1e-4);
}

#[test]
fn registry_creates_models_by_name() {
    let registry = registry();
    assert_eq!(registry.names(), vec!["creep", "elastic", "plasticity"]);
    assert!(registry.contains("creep"));
    assert!(!registry.contains("damage"));

    let models = registry.create_all(&["plasticity", "elastic"]).unwrap();
    let names: Vec<_> = models.iter().map(|model| model.name()).collect();
    assert_eq!(names, vec!["plasticity", "elastic"]);

    let err = registry.create("viscoplasticity").err().unwrap();
    assert_eq!(
        err,
        ConfigurationError::UnknownModel {
            name: "viscoplasticity".to_string(),
            available: vec!["creep".to_string(), "elastic".to_string(), "plasticity".to_string()],
        }
    );
    assert!(err.to_string().contains("creep, elastic, plasticity"));
}

#[test]
fn multi_model_update_from_registry() {
    let settings = MultiModelSettings {
        inelastic_models: vec!["elastic".to_string(), "plasticity".to_string()],
        ..MultiModelSettings::default()
    };
    let update = MultiModelStressUpdate::from_registry(settings, &registry(), true).unwrap();
    assert_eq!(update.num_models(), 2);
    assert_eq!(update.model(1).name(), "plasticity");
    assert_eq!(update.tangent_calculation(), TangentCalculation::Partial);
    assert_eq!(update.weights(), &[1.0, 1.0]);
}

#[test]
fn unknown_models_are_reported_with_context() {
    let settings = MultiModelSettings {
        inelastic_models: vec!["plasticity".to_string(), "viscoplasticity".to_string()],
        ..MultiModelSettings::default()
    };
    let err = MultiModelStressUpdate::from_registry(settings, &registry(), true).unwrap_err();
    let root = err.root_cause().downcast_ref::<ConfigurationError>().unwrap();
    assert!(matches!(root, ConfigurationError::UnknownModel { name, .. } if name == "viscoplasticity"));
    assert!(format!("{:?}", err).contains("failed to create inelastic models"));
}

#[test]
fn incompatible_configurations_are_rejected() {
    let settings = MultiModelSettings {
        inelastic_models: vec!["creep".to_string(), "plasticity".to_string()],
        ..MultiModelSettings::default()
    };
    let err = MultiModelStressUpdate::from_registry(settings, &registry(), true).unwrap_err();
    let root = err.root_cause().downcast_ref::<ConfigurationError>().unwrap();
    assert_eq!(
        root,
        &ConfigurationError::IncompatibleTangentCalculation {
            partial_model: "plasticity".to_string(),
            full_model: "creep".to_string(),
        }
    );

    let settings = MultiModelSettings {
        inelastic_models: vec!["elastic".to_string(), "plasticity".to_string()],
        combined_inelastic_strain_weights: Some(vec![1.0, 0.5, 0.25]),
        ..MultiModelSettings::default()
    };
    let err = MultiModelStressUpdate::from_registry(settings, &registry(), true).unwrap_err();
    let root = err.root_cause().downcast_ref::<ConfigurationError>().unwrap();
    assert!(matches!(
        root,
        ConfigurationError::InvalidParameter {
            parameter: "combined_inelastic_strain_weights",
            ..
        }
    ));

    let settings = MultiModelSettings {
        inelastic_models: vec!["elastic".to_string()],
        relative_tolerance: -1.0,
        ..MultiModelSettings::default()
    };
    assert!(MultiModelStressUpdate::from_registry(settings, &registry(), true).is_err());
}
