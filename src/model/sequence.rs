use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::Action;
use super::variables::VariableStore;

/// An ordered list of actions with an associated variable store.
///
/// The store is runtime state: it is never persisted and never shared mutably
/// between two sequences. Duplicating a sequence clones the action list
/// value-wise and starts from an empty store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Sequence {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(skip)]
    pub vars: VariableStore,
}

impl Sequence {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            actions,
            vars: VariableStore::new(),
        }
    }
}

/// On-disk document holding named sequences plus initial variable values.
///
/// `variables` are seeded into each sequence's store when it is instantiated,
/// without overriding values injected for that particular run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SequenceFile {
    #[serde(default)]
    pub sequences: BTreeMap<String, Vec<Action>>,

    /// Initial variable values, types inferred on load.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl SequenceFile {
    /// Build a runnable sequence by name: actions are cloned value-wise and
    /// the store is seeded from the file-level `variables`.
    pub fn instantiate(&self, name: &str) -> Option<Sequence> {
        let actions = self.sequences.get(name)?.clone();
        let mut sequence = Sequence::new(name, actions);
        sequence.vars.seed(&self.variables);
        Some(sequence)
    }

    /// Name of the first sequence in the file, if any.
    pub fn first_sequence_name(&self) -> Option<&str> {
        self.sequences.keys().next().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action::ActionKind;
    use crate::model::variables::VarValue;

    #[test]
    fn test_instantiate_seeds_variables() {
        let mut file = SequenceFile::default();
        file.sequences.insert(
            "s".into(),
            vec![Action::from_kind(ActionKind::Wait { ms: 1 })],
        );
        file.variables.insert("x".into(), "5".into());

        let seq = file.instantiate("s").unwrap();
        assert_eq!(seq.actions.len(), 1);
        assert_eq!(seq.vars.find("x"), Some(&VarValue::Number(5)));
        assert!(file.instantiate("missing").is_none());
    }
}
