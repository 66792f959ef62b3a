//! On-disk storage of interesting programs.
//!
//! Every stored case gets its own directory holding the lifted script, the
//! serialized program and a JSON summary of how its modules behaved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use wasp_core::{ExecutionOutcome, Result};
use wasp_ir::Program;

pub const SCRIPT_FILE: &str = "program.js";
pub const PROGRAM_FILE: &str = "program.wasp";
pub const TEXT_FILE: &str = "program.il";
pub const SUMMARY_FILE: &str = "summary.json";

/// Why a case was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseReason {
    Trapped,
    ExecutionFailed,
    StoreAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub module: usize,
    pub export: String,
    pub outcome: ExecutionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub worker: usize,
    pub iteration: u64,
    pub template: String,
    pub instructions: usize,
    pub modules: usize,
    pub reason: CaseReason,
    pub outcomes: Vec<ExportRecord>,
    pub error: Option<String>,
}

/// A program ready to be written out
pub struct Case<'a> {
    pub program: &'a Program,
    pub script: &'a str,
    pub summary: CaseSummary,
}

pub struct CaseStore {
    root: PathBuf,
}

impl CaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a case into a fresh directory and return its path
    pub fn store(&self, case: &Case<'_>) -> Result<PathBuf> {
        let dir = self.root.join(case_dir_name(&case.summary));
        fs::create_dir_all(&dir)?;

        fs::write(dir.join(SCRIPT_FILE), case.script)?;
        fs::write(dir.join(PROGRAM_FILE), case.program.to_bytes()?)?;
        fs::write(dir.join(TEXT_FILE), case.program.to_string())?;
        fs::write(dir.join(SUMMARY_FILE), serde_json::to_string_pretty(&case.summary)?)?;

        debug!("Stored case {} in {}", case.summary.id, dir.display());
        Ok(dir)
    }
}

/// `<timestamp>-w<worker>-i<iteration>-<short id>`, sortable by creation time
fn case_dir_name(summary: &CaseSummary) -> String {
    let id = summary.id.simple().to_string();
    format!(
        "{}-w{}-i{}-{}",
        summary.created_at.format("%Y%m%dT%H%M%S%.3f"),
        summary.worker,
        summary.iteration,
        &id[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use wasp_core::TrapKind;
    use wasp_ir::{Instruction, Operation, Variable};

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wasp-storage-{}-{}", name, Uuid::new_v4()))
    }

    fn summary() -> CaseSummary {
        CaseSummary {
            id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            worker: 2,
            iteration: 17,
            template: "WasmFuzzer".to_string(),
            instructions: 1,
            modules: 0,
            reason: CaseReason::Trapped,
            outcomes: vec![ExportRecord {
                module: 0,
                export: "function0".to_string(),
                outcome: ExecutionOutcome::Trapped(TrapKind::Unreachable),
            }],
            error: None,
        }
    }

    #[test]
    fn test_case_dir_name() {
        let summary = summary();
        let name = case_dir_name(&summary);
        assert!(name.starts_with("20240301T123005.000-w2-i17-"));
        assert_eq!(name.len(), "20240301T123005.000-w2-i17-".len() + 8);
    }

    #[test]
    fn test_store_writes_every_file() {
        let root = temp_root("files");
        let store = CaseStore::new(&root).unwrap();
        let program = Program::with_instructions(vec![Instruction::new(
            Operation::LoadInteger { value: 7 },
            vec![],
            vec![Variable(0)],
            vec![],
        )]);

        let dir = store
            .store(&Case {
                program: &program,
                script: "const v0 = 7;\n",
                summary: summary(),
            })
            .unwrap();

        assert!(dir.starts_with(store.root()));
        assert_eq!(fs::read_to_string(dir.join(SCRIPT_FILE)).unwrap(), "const v0 = 7;\n");
        assert_eq!(Program::from_bytes(&fs::read(dir.join(PROGRAM_FILE)).unwrap()).unwrap(), program);
        assert!(!fs::read_to_string(dir.join(TEXT_FILE)).unwrap().is_empty());

        let stored: CaseSummary =
            serde_json::from_str(&fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(stored.iteration, 17);
        assert_eq!(stored.reason, CaseReason::Trapped);

        fs::remove_dir_all(root).unwrap();
    }

    proptest! {
        #[test]
        fn prop_dir_names_sort_by_creation_time(a in 0i64..4_000_000_000_000, b in 0i64..4_000_000_000_000) {
            prop_assume!(a != b);
            let name_at = |millis: i64| {
                let mut summary = summary();
                summary.created_at = Utc.timestamp_millis_opt(millis).unwrap();
                case_dir_name(&summary)
            };
            prop_assert_eq!(a < b, name_at(a) < name_at(b));
        }
    }
}
