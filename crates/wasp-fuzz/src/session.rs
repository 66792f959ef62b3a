//! Multi-worker generation session.
//!
//! Every worker owns its own builder, mutation engine and runner, seeded from
//! the session seed and its worker id, so a seed reproduces a session. One
//! iteration picks a template by weight, retries until the program embeds
//! WebAssembly, applies the configured mutation rounds, lifts the result and
//! runs every exported function of every embedded module.

use crate::storage::{Case, CaseReason, CaseStore, CaseSummary, ExportRecord};
use anyhow::Context;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;
use wasp_core::{Error, ExecutionOutcome, FuzzConfig, Result, TrapKind};
use wasp_gen::{FuzzContext, MutationEngine, ProgramBuilder};
use wasp_ir::Program;
use wasp_lift::JavaScriptLifter;
use wasp_runtime::{ExportOutcome, Runtime};

/// Counters of one worker, or of the whole session once merged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub programs: u64,
    pub generation_failures: u64,
    pub mutations: u64,
    pub failed_mutations: u64,
    pub modules: u64,
    pub exports: u64,
    pub traps: u64,
    pub execution_failures: u64,
    pub stored: u64,
}

impl SessionStats {
    pub fn merge(&mut self, other: &SessionStats) {
        self.programs += other.programs;
        self.generation_failures += other.generation_failures;
        self.mutations += other.mutations;
        self.failed_mutations += other.failed_mutations;
        self.modules += other.modules;
        self.exports += other.exports;
        self.traps += other.traps;
        self.execution_failures += other.execution_failures;
        self.stored += other.stored;
    }
}

/// Result of running the embedded modules of one program
#[derive(Debug, Default)]
struct Execution {
    outcomes: Vec<ExportOutcome>,
    error: Option<String>,
}

impl Execution {
    fn traps(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_trap()).count()
    }

    /// Running out of fuel is expected for generated loops and is not interesting
    fn reason(&self) -> Option<CaseReason> {
        if self.error.is_some() {
            return Some(CaseReason::ExecutionFailed);
        }
        self.outcomes
            .iter()
            .any(|o| o.outcome.is_trap() && o.outcome != ExecutionOutcome::Trapped(TrapKind::OutOfFuel))
            .then_some(CaseReason::Trapped)
    }
}

pub struct Worker {
    id: usize,
    builder: ProgramBuilder,
    mutator: MutationEngine,
    lifter: JavaScriptLifter,
    runtime: Option<Runtime>,
    store: Arc<CaseStore>,
    stop: Arc<AtomicBool>,
    stats: SessionStats,
}

impl Worker {
    pub fn new(id: usize, fuzz: Arc<FuzzContext>, store: Arc<CaseStore>, stop: Arc<AtomicBool>) -> Result<Self> {
        let config = fuzz.config.clone();
        let runtime = if config.session.execute_modules {
            Some(Runtime::with_environment(config.runtime.clone(), Arc::clone(&fuzz.environment))?)
        } else {
            None
        };

        Ok(Self {
            id,
            mutator: MutationEngine::new(&fuzz),
            lifter: JavaScriptLifter::with_environment(config.lifting.clone(), Arc::clone(&fuzz.environment)),
            builder: ProgramBuilder::new(fuzz, worker_seed(config.session.seed, id)),
            runtime,
            store,
            stop,
            stats: SessionStats::default(),
        })
    }

    fn config(&self) -> &FuzzConfig {
        &self.builder.fuzz_context().config
    }

    /// Run up to `iterations` iterations, stopping early when the session is stopped
    pub fn run(mut self, iterations: u64) -> SessionStats {
        info!("Worker {} started", self.id);
        for iteration in 0..iterations {
            if self.stop.load(Ordering::Relaxed) {
                info!("Worker {} stopped after {} iterations", self.id, iteration);
                break;
            }
            if let Err(e) = self.iteration(iteration) {
                error!("Worker {} iteration {} failed: {}", self.id, iteration, e);
            }
        }
        self.stats
    }

    #[instrument(skip(self), fields(worker = self.id))]
    pub fn iteration(&mut self, iteration: u64) -> Result<()> {
        let start = Instant::now();

        let (template, generated) = match self.generate() {
            Ok(generated) => generated,
            Err(e) => {
                self.stats.generation_failures += 1;
                return Err(e);
            }
        };
        let program = self.mutate(generated);
        self.stats.programs += 1;

        let script = self.lifter.lift(&program)?;
        let execution = self.execute(&program);
        self.stats.modules += program.num_wasm_modules() as u64;
        self.stats.exports += execution.outcomes.len() as u64;
        self.stats.traps += execution.traps() as u64;
        if execution.error.is_some() {
            self.stats.execution_failures += 1;
        }

        let reason = match execution.reason() {
            Some(reason) => Some(reason),
            None if self.config().session.store_all => Some(CaseReason::StoreAll),
            None => None,
        };
        if let Some(reason) = reason {
            let dir = self.store.store(&Case {
                program: &program,
                script: &script,
                summary: summarize(self.id, iteration, template, &program, reason, execution),
            })?;
            self.stats.stored += 1;
            crate::record_counter!("cases_stored", 1u64, worker = self.id);
            debug!("Stored {:?} case at {}", reason, dir.display());
        }

        crate::record_histogram!(
            "iteration_duration_seconds",
            start.elapsed().as_secs_f64(),
            worker = self.id,
            template = template
        );
        crate::record_histogram!("program_instructions", program.len(), worker = self.id);
        Ok(())
    }

    /// A freshly generated program that embeds at least one module
    fn generate(&mut self) -> Result<(&'static str, Program)> {
        let fuzz = Arc::clone(self.builder.fuzz_context());
        let attempts = fuzz.config.session.module_generation_attempts;
        let instructions = fuzz.config.session.instructions;

        for attempt in 1..=attempts {
            let template = fuzz
                .templates
                .choose(self.builder.rng())
                .ok_or_else(|| Error::Config("every template has weight 0".to_string()))?;

            template.run(&mut self.builder);
            let missing = instructions.saturating_sub(self.builder.len());
            if missing > 0 {
                self.builder.build(missing);
            }

            match self.builder.finalize() {
                Ok(program) if program.contains_wasm() => {
                    debug!("{} produced a program on attempt {}", template.name, attempt);
                    return Ok((template.name, program));
                }
                Ok(_) => trace!("{} produced no WebAssembly", template.name),
                Err(e) => warn!("Discarding program from {}: {}", template.name, e),
            }
        }

        Err(Error::InvalidState(format!(
            "no program with WebAssembly after {} attempts",
            attempts
        )))
    }

    /// Apply the configured mutation rounds. Mutants that lose every module are dropped.
    fn mutate(&mut self, mut program: Program) -> Program {
        for round in 0..self.config().session.mutation_rounds {
            match self.mutator.mutate(&program, &mut self.builder) {
                Ok(mutant) if mutant.contains_wasm() => {
                    self.stats.mutations += 1;
                    program = mutant;
                }
                Ok(_) => {
                    self.stats.failed_mutations += 1;
                    trace!("Mutation round {} removed every module", round);
                }
                Err(e) => {
                    self.stats.failed_mutations += 1;
                    debug!("Mutation round {} failed: {}", round, e);
                }
            }
        }
        program
    }

    fn execute(&self, program: &Program) -> Execution {
        let Some(runtime) = &self.runtime else {
            return Execution::default();
        };
        match runtime.execute_program(program) {
            Ok(outcomes) => Execution { outcomes, error: None },
            Err(e) => {
                warn!("Executing program failed: {}", e);
                Execution {
                    outcomes: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn worker_seed(seed: u64, worker: usize) -> u64 {
    seed.wrapping_add((worker as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

fn summarize(
    worker: usize,
    iteration: u64,
    template: &str,
    program: &Program,
    reason: CaseReason,
    execution: Execution,
) -> CaseSummary {
    CaseSummary {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        worker,
        iteration,
        template: template.to_string(),
        instructions: program.len(),
        modules: program.num_wasm_modules(),
        reason,
        outcomes: execution
            .outcomes
            .into_iter()
            .map(|o| ExportRecord {
                module: o.module,
                export: o.export,
                outcome: o.outcome,
            })
            .collect(),
        error: execution.error,
    }
}

pub struct Session {
    fuzz: Arc<FuzzContext>,
    store: Arc<CaseStore>,
    stop: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: FuzzConfig) -> anyhow::Result<Self> {
        let store = CaseStore::new(&config.session.output_dir)
            .with_context(|| format!("Failed to create output directory {}", config.session.output_dir))?;
        let fuzz = FuzzContext::new(config).context("Failed to resolve weights")?;

        Ok(Self {
            fuzz: Arc::new(fuzz),
            store: Arc::new(store),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked by every worker between iterations
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[instrument(skip(self), fields(workers = self.fuzz.config.session.workers))]
    pub async fn run(&self) -> anyhow::Result<SessionStats> {
        let session = &self.fuzz.config.session;
        info!(
            "Running {} worker(s), {} iterations each, seed {}",
            session.workers, session.iterations, session.seed
        );

        let workers = (0..session.workers)
            .map(|id| {
                Worker::new(
                    id,
                    Arc::clone(&self.fuzz),
                    Arc::clone(&self.store),
                    Arc::clone(&self.stop),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let iterations = session.iterations;
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| tokio::task::spawn_blocking(move || worker.run(iterations)))
            .collect();

        let start = Instant::now();
        let mut total = SessionStats::default();
        for result in futures::future::join_all(handles).await {
            total.merge(&result.context("Worker task panicked")?);
        }

        info!(
            "Session finished in {:.2}s: {} programs, {} traps, {} stored in {}",
            start.elapsed().as_secs_f64(),
            total.programs,
            total.traps,
            total.stored,
            self.store.root().display()
        );
        crate::record_counter!("programs_generated", total.programs);
        crate::record_counter!("traps_observed", total.traps);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn test_config(name: &str) -> (FuzzConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("wasp-session-{}-{}", name, Uuid::new_v4()));
        let mut config = FuzzConfig::default();
        config.session.output_dir = dir.to_string_lossy().into_owned();
        config.session.iterations = 3;
        config.session.instructions = 20;
        config.session.mutation_rounds = 2;
        (config, dir)
    }

    fn worker(config: FuzzConfig) -> Worker {
        let store = Arc::new(CaseStore::new(&config.session.output_dir).unwrap());
        let fuzz = Arc::new(FuzzContext::new(config).unwrap());
        Worker::new(0, fuzz, store, Arc::new(AtomicBool::new(false))).unwrap()
    }

    #[test]
    fn test_worker_seeds_differ() {
        assert_eq!(worker_seed(7, 0), 7);
        assert_ne!(worker_seed(7, 1), worker_seed(7, 2));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = SessionStats {
            programs: 2,
            traps: 1,
            ..Default::default()
        };
        total.merge(&SessionStats {
            programs: 3,
            stored: 4,
            ..Default::default()
        });
        assert_eq!(total.programs, 5);
        assert_eq!(total.traps, 1);
        assert_eq!(total.stored, 4);
    }

    #[test]
    fn test_fuel_exhaustion_is_not_interesting() {
        let out_of_fuel = Execution {
            outcomes: vec![ExportOutcome {
                module: 0,
                export: "function0".to_string(),
                outcome: ExecutionOutcome::Trapped(TrapKind::OutOfFuel),
            }],
            error: None,
        };
        assert_eq!(out_of_fuel.traps(), 1);
        assert_eq!(out_of_fuel.reason(), None);

        let failed = Execution {
            outcomes: Vec::new(),
            error: Some("compile error".to_string()),
        };
        assert_eq!(failed.reason(), Some(CaseReason::ExecutionFailed));
    }

    #[test]
    fn test_generated_programs_embed_wasm() {
        let (config, dir) = test_config("generate");
        let mut worker = worker(config);
        for _ in 0..3 {
            let (template, program) = worker.generate().unwrap();
            assert!(!template.is_empty());
            assert!(program.contains_wasm());
            let mutated = worker.mutate(program);
            assert!(mutated.contains_wasm());
        }
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_no_wasm_templates_exhaust_attempts() {
        let (mut config, dir) = test_config("exhaust");
        for name in wasp_gen::templates::all_templates().iter().map(|(t, _)| t.name) {
            let weight = if name == "Codegen50" { 1 } else { 0 };
            config.weights.templates.insert(name.to_string(), weight);
        }
        for (generator, _) in wasp_gen::generators::all_generators() {
            if generator.name.contains("Wasm") {
                config.weights.generators.insert(generator.name.to_string(), 0);
            }
        }
        config.session.module_generation_attempts = 2;
        let mut worker = worker(config);

        assert!(matches!(worker.generate(), Err(Error::InvalidState(_))));
        assert!(worker.iteration(0).is_err());
        assert_eq!(worker.stats.generation_failures, 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_store_all_keeps_every_program() {
        let (mut config, dir) = test_config("store-all");
        config.session.store_all = true;
        let stats = worker(config).run(2);

        assert_eq!(stats.programs + stats.generation_failures, 2);
        assert_eq!(stats.stored, stats.programs);
        let cases = std::fs::read_dir(&dir).unwrap().count() as u64;
        assert_eq!(cases, stats.stored);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_same_seed_generates_same_programs() {
        let (config, dir) = test_config("seed");
        let mut first = worker(config.clone());
        let mut second = worker(config);
        for _ in 0..2 {
            let (_, a) = first.generate().unwrap();
            let (_, b) = second.generate().unwrap();
            assert_eq!(a, b);
        }
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_session_runs_all_workers() {
        let (mut config, dir) = test_config("session");
        config.session.workers = 2;
        config.session.iterations = 2;
        let session = Session::new(config).unwrap();

        let stats = session.run().await.unwrap();
        assert_eq!(stats.programs + stats.generation_failures, 4);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_stopped_session_does_nothing() {
        let (config, dir) = test_config("stopped");
        let session = Session::new(config).unwrap();
        session.stop_handle().store(true, Ordering::Relaxed);

        let stats = session.run().await.unwrap();
        assert_eq!(stats, SessionStats::default());
        std::fs::remove_dir_all(dir).ok();
    }

    proptest! {
        #[test]
        fn prop_workers_of_a_session_get_distinct_seeds(seed in any::<u64>(), a in 0usize..4096, b in 0usize..4096) {
            prop_assume!(a != b);
            prop_assert_ne!(worker_seed(seed, a), worker_seed(seed, b));
        }
    }
}
