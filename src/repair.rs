use std::fmt::{Display, Formatter};
use std::path::Path;

use itertools::Itertools;
use tracing::{error, info};

use crate::bytecode::{BytecodeOutcome, BytecodePatch};
use crate::error::Error;
use crate::resource::{public_table, ExistenceIndex, Family, ReconcileOutcome, Reconciler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairConfig {
    pub families: Vec<Family>,
    /// `None` skips the bytecode step.
    pub bytecode: Option<BytecodePatch>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            families: vec![Family::ANIM],
            bytecode: Some(BytecodePatch::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Declarations(Family),
    PublicSymbols(Family),
    Bytecode,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::Declarations(family) => write!(f, "{family} declarations"),
            Self::PublicSymbols(family) => write!(f, "{family} public symbols"),
            Self::Bytecode => write!(f, "bytecode patch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    Succeeded,
    /// Something was skipped, but the tree is no worse than before.
    Partial,
    Failed,
}

#[derive(Debug, Default, PartialEq)]
pub struct RepairReport {
    pub declaration_patched: usize,
    pub public_patched: usize,
    pub bytecode: Option<BytecodeOutcome>,
    pub errors: Vec<(Step, Error)>,
}

impl RepairReport {
    fn record(&mut self, step: Step, outcome: ReconcileOutcome) {
        match step {
            Step::Declarations(_) => self.declaration_patched += outcome.patched_count,
            Step::PublicSymbols(_) => self.public_patched += outcome.patched_count,
            Step::Bytecode => {}
        }
        if let Some(error) = outcome.error {
            self.errors.push((step, error));
        }
    }

    pub fn status(&self) -> RepairStatus {
        if self.errors.iter().any(|(step, _)| *step == Step::Bytecode) {
            RepairStatus::Failed
        } else if !self.errors.is_empty()
            || self.bytecode == Some(BytecodeOutcome::MethodNotFound)
        {
            RepairStatus::Partial
        } else {
            RepairStatus::Succeeded
        }
    }
}

impl Display for RepairReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{} declarations and {} public symbols commented out, bytecode {}",
            self.declaration_patched,
            self.public_patched,
            match self.bytecode {
                Some(BytecodeOutcome::Patched) => "patched",
                Some(BytecodeOutcome::AlreadyPatched) => "already patched",
                Some(BytecodeOutcome::MethodNotFound) => "method not found",
                None if self.errors.iter().any(|(step, _)| *step == Step::Bytecode) => "failed",
                None => "skipped",
            }
        )?;
        if !self.errors.is_empty() {
            write!(
                f,
                "; errors: {}",
                self.errors
                    .iter()
                    .map(|(step, error)| format!("{step}: {error}"))
                    .join("; ")
            )?;
        }
        Ok(())
    }
}

/// Runs all repair steps on an unpacked package, in order. Steps don't depend
/// on each other's success and nothing is rolled back, every step is safe to
/// run again.
pub fn repair(package_dir: &Path, config: &RepairConfig) -> RepairReport {
    info!(
        package = %package_dir.display(),
        families = %config.families.iter().join(", "),
        "repairing unpacked package"
    );

    let mut report = RepairReport::default();
    let public_table = public_table(package_dir);
    for &family in &config.families {
        let index = ExistenceIndex::build(package_dir, family);

        let outcome = Reconciler::declarations(family)
            .reconcile(&family.declaration_file(package_dir), &index);
        report.record(Step::Declarations(family), outcome);

        let outcome = Reconciler::public_symbols(family).reconcile(&public_table, &index);
        report.record(Step::PublicSymbols(family), outcome);
    }

    if let Some(patch) = &config.bytecode {
        match patch.apply(package_dir) {
            Ok(outcome) => report.bytecode = Some(outcome),
            Err(e) => {
                error!(error = %e, "bytecode patch failed");
                report.errors.push((Step::Bytecode, e));
            }
        }
    }

    report
}
