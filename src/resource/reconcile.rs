use std::ops::Range;
use std::path::Path;

use tracing::{debug, info, warn};

use super::entry::{neutralize, Comments, EntryGrammar};
use super::{ExistenceIndex, Family};
use crate::error::Error;
use crate::scanner::Scanner;

#[derive(Debug, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub patched_count: usize,
    pub error: Option<Error>,
}

/// Comments out the entries of one resource table that reference resources
/// missing from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    grammar: EntryGrammar,
    family: Family,
}

impl Reconciler {
    pub fn declarations(family: Family) -> Self {
        Self {
            grammar: EntryGrammar::DECLARATION,
            family,
        }
    }

    pub fn public_symbols(family: Family) -> Self {
        Self {
            grammar: EntryGrammar::PUBLIC_SYMBOL,
            family,
        }
    }

    /// Never fails: errors are logged and reported in the outcome, the file is
    /// left as it was.
    pub fn reconcile(&self, path: &Path, index: &ExistenceIndex) -> ReconcileOutcome {
        match self.try_reconcile(path, index) {
            Ok(patched_count) => ReconcileOutcome {
                patched_count,
                error: None,
            },
            Err(error) => {
                warn!(file = %path.display(), %error, "skipping resource table");
                ReconcileOutcome {
                    patched_count: 0,
                    error: Some(error),
                }
            }
        }
    }

    fn try_reconcile(&self, path: &Path, index: &ExistenceIndex) -> Result<usize, Error> {
        if !path.exists() {
            debug!(file = %path.display(), "resource table not present");
            return Ok(0);
        }

        let input = Scanner::from_file(path)?;
        let missing = self.missing_entries(&input, index);
        if missing.is_empty() {
            return Ok(0);
        }

        input.replace_source(&neutralize(input.source(), &missing))?;

        info!(
            file = %path.display(),
            family = %self.family,
            patched = missing.len(),
            "commented out entries of missing resources"
        );
        Ok(missing.len())
    }

    fn missing_entries(&self, input: &Scanner, index: &ExistenceIndex) -> Vec<Range<usize>> {
        let comments = Comments::scan(input);
        self.grammar
            .entries(input)
            .into_iter()
            .filter(|entry| entry.attribute("type") == Some(self.family.name()))
            .filter(|entry| !comments.touch(&entry.span))
            .filter_map(|entry| {
                let name = entry.attribute("name")?;
                if index.exists(name) {
                    None
                } else {
                    debug!(name, family = %self.family, "resource missing");
                    Some(entry.span)
                }
            })
            .collect()
    }
}
