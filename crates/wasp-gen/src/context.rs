//! Shared, read-only state of a fuzzing session.
//!
//! A `FuzzContext` is created once from a [`FuzzConfig`] and shared between
//! workers behind an `Arc`. It owns the environment catalog and the generator,
//! template and mutator tables with configured weights already applied.

use crate::generator::GeneratorSet;
use crate::generators;
use crate::mutation;
use crate::templates::{self, ProgramTemplate};
use crate::weighted::WeightedList;
use std::sync::Arc;
use tracing::debug;
use wasp_core::{FuzzConfig, Result, WeightTable};
use wasp_ir::Environment;

pub struct FuzzContext {
    pub environment: Arc<Environment>,
    pub config: FuzzConfig,
    /// Every generator; the default active set of a builder
    pub generators: Arc<GeneratorSet>,
    /// Generators run by `build_prefix`
    pub value_generators: Arc<GeneratorSet>,
    /// Generators used by the WebAssembly templates
    pub wasm_generators: Arc<GeneratorSet>,
    pub templates: WeightedList<ProgramTemplate>,
    pub mutator_weights: WeightTable,
}

impl FuzzContext {
    /// Resolve weight tables. Overrides naming an unknown component are a configuration error.
    pub fn new(config: FuzzConfig) -> Result<Self> {
        Self::with_environment(config, Environment::javascript())
    }

    pub fn with_environment(config: FuzzConfig, environment: Environment) -> Result<Self> {
        let mut generator_weights = generators::default_weights();
        generator_weights.apply_overrides(&config.weights.generators)?;

        let mut template_weights = templates::default_weights();
        template_weights.apply_overrides(&config.weights.templates)?;

        let mut mutator_weights = mutation::default_weights();
        mutator_weights.apply_overrides(&config.weights.mutators)?;

        debug!(
            "Resolved weights: {} generators, {} templates, {} mutators",
            generator_weights.len(),
            template_weights.len(),
            mutator_weights.len()
        );

        Ok(Self {
            environment: Arc::new(environment),
            generators: Arc::new(generators::weighted_set(generators::all_generators(), &generator_weights)),
            value_generators: Arc::new(generators::weighted_set(
                generators::value_generators(),
                &generator_weights,
            )),
            wasm_generators: Arc::new(generators::weighted_set(
                generators::wasm_generators(),
                &generator_weights,
            )),
            templates: WeightedList::from_items(templates::all_templates())
                .reweighted(&template_weights, |template| template.name),
            mutator_weights,
            config,
        })
    }
}

impl std::fmt::Debug for FuzzContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzContext")
            .field("generators", &self.generators.len())
            .field("templates", &self.templates.len())
            .finish()
    }
}
