use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::engine::SequenceExecutor;
use super::error::ActionError;
use super::injector::{EnigoInjector, SequenceLookup, SystemClipboard};
use crate::model::SequenceFile;

/// Maximum nesting depth for sequence invocation (to protect against cycles
/// between sequences that invoke each other through JSON directives).
const MAX_DEPTH: usize = 16;

/// Runs named sequences from a loaded [`SequenceFile`].
///
/// Each invocation instantiates the sequence (cloned actions, fresh seeded
/// store), wires up its own collaborators and executes it on the calling
/// thread. Nested invocations share the cancellation token, so one cancel
/// request stops the whole tree.
pub struct SequenceLibrary {
    file: SequenceFile,
    dry_run: bool,
    cancel: CancellationToken,
    depth: usize,
}

impl SequenceLibrary {
    pub fn new(file: SequenceFile, dry_run: bool, cancel: CancellationToken) -> Self {
        Self {
            file,
            dry_run,
            cancel,
            depth: 0,
        }
    }

    /// Run a named sequence, injecting `extra_vars` over the file-seeded
    /// store before the first action executes.
    pub fn run(
        &mut self,
        name: &str,
        extra_vars: &BTreeMap<String, String>,
    ) -> Result<(), ActionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ActionError::DepthExceeded(MAX_DEPTH));
        }
        let mut sequence = self
            .file
            .instantiate(name)
            .ok_or_else(|| ActionError::SequenceNotFound(name.to_string()))?;
        for (key, value) in extra_vars {
            sequence.vars.set(key, value, None);
        }

        let mut injector = EnigoInjector::new(self.dry_run);
        let mut clipboard = SystemClipboard::new();
        let mut nested = Self {
            file: self.file.clone(),
            dry_run: self.dry_run,
            cancel: self.cancel.clone(),
            depth: self.depth + 1,
        };
        let mut executor = SequenceExecutor::new(
            &mut injector,
            &mut clipboard,
            &mut nested,
            self.cancel.clone(),
        );
        executor.run_sequence(&mut sequence)
    }
}

impl SequenceLookup for SequenceLibrary {
    fn run_by_name(&mut self, name: &str) -> bool {
        self.run_with_variables(name, &BTreeMap::new())
    }

    fn run_with_variables(&mut self, name: &str, variables: &BTreeMap<String, String>) -> bool {
        match self.run(name, variables) {
            Ok(()) => true,
            Err(err) if err.is_cancelled() => {
                // The caller observes the shared token itself; reporting
                // false here only ends the current attempt.
                warn!(target: "replaykit::engine", sequence = %name, "Nested sequence cancelled");
                false
            }
            Err(err) => {
                error!(target: "replaykit::engine", sequence = %name, error = %err, "Nested sequence failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionKind};

    fn library_with(name: &str, actions: Vec<Action>) -> SequenceLibrary {
        let mut file = SequenceFile::default();
        file.sequences.insert(name.to_string(), actions);
        SequenceLibrary::new(file, true, CancellationToken::new())
    }

    #[test]
    fn test_run_missing_sequence() {
        let mut library = library_with("known", vec![]);
        let err = library.run("unknown", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ActionError::SequenceNotFound(n) if n == "unknown"));
    }

    #[test]
    fn test_run_variable_only_sequence() {
        // Variable and wait actions never touch the OS, so a dry-run library
        // executes them without any input backend.
        let actions = vec![
            Action::from_kind(ActionKind::Variable {
                op: crate::model::VariableOp::Set {
                    variable: "x".into(),
                    value: "1".into(),
                    hint: None,
                },
            }),
            Action::from_kind(ActionKind::Wait { ms: 1 }),
        ];
        let mut library = library_with("tiny", actions);
        library.run("tiny", &BTreeMap::new()).unwrap();
        assert!(library.run_by_name("tiny"));
    }

    #[test]
    fn test_depth_guard_trips() {
        let mut library = library_with("s", vec![]);
        library.depth = MAX_DEPTH;
        let err = library.run("s", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ActionError::DepthExceeded(_)));
    }
}
