use anyhow::{Context, Result, bail};
use schemars::{Schema, schema_for};
use serde_json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::action::{Action, ActionKind, KeyboardMode};
use super::sequence::SequenceFile;

/// Load a sequence file from a string slice.
pub fn load_from_str(s: &str) -> Result<SequenceFile> {
    let file: SequenceFile =
        serde_json::from_str(s).context("Failed to parse JSON string into a sequence file")?;
    validate_file(&file)?;
    Ok(file)
}

/// Load a sequence file from any reader.
pub fn load_from_reader<R: Read>(reader: R) -> Result<SequenceFile> {
    let file: SequenceFile =
        serde_json::from_reader(reader).context("Failed to parse JSON sequence file from reader")?;
    validate_file(&file)?;
    Ok(file)
}

/// Load a sequence file from a path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<SequenceFile> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open sequence file {}", path_ref.display()))?;
    let parsed = load_from_reader(file)?;
    debug!("Loaded sequence file from {}", path_ref.display());
    Ok(parsed)
}

/// Load a sequence file from a path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<SequenceFile> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read sequence file {}", path_ref.display()))?;
    let parsed: SequenceFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON sequence file {}", path_ref.display()))?;
    validate_file(&parsed)?;
    debug!("Loaded sequence file from {}", path_ref.display());
    Ok(parsed)
}

/// Write a sequence file to a path (pretty-printed), e.g. from the recorder.
pub fn save_to_path<P: AsRef<Path>>(file: &SequenceFile, path: P) -> Result<()> {
    let path_ref = path.as_ref();
    let json =
        serde_json::to_string_pretty(file).context("Failed to serialize sequence file")?;
    std::fs::write(path_ref, json)
        .with_context(|| format!("Failed to write sequence file {}", path_ref.display()))?;
    debug!("Saved sequence file to {}", path_ref.display());
    Ok(())
}

/// Generate the JSON Schema for the sequence file format.
pub fn generate_schema() -> Schema {
    schema_for!(SequenceFile)
}

/// Write the JSON Schema to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Perform basic sanity checks on a loaded file.
/// - Key-based keyboard actions must carry at least one key.
/// - Browser actions must carry a URL.
/// - Variable operations must name a variable.
/// Checks recurse into `Loop` and `If` bodies.
pub fn validate_file(file: &SequenceFile) -> Result<()> {
    for (name, actions) in &file.sequences {
        if name.is_empty() {
            bail!("A sequence with an empty name is not addressable");
        }
        for (idx, action) in actions.iter().enumerate() {
            validate_action(action)
                .with_context(|| format!("Invalid action in sequence '{name}' at step {idx}"))?;
        }
    }
    Ok(())
}

fn validate_action(action: &Action) -> Result<()> {
    match &action.kind {
        ActionKind::Keyboard { mode, keys, .. } => {
            let needs_keys = matches!(
                mode,
                KeyboardMode::KeyPress | KeyboardMode::KeyCombination | KeyboardMode::Hotkey
            );
            if needs_keys && keys.is_empty() {
                bail!("Keyboard action in {:?} mode has no keys", mode);
            }
            if keys.iter().any(|k| k.is_empty()) {
                bail!("Keyboard action contains an empty key name");
            }
        }
        ActionKind::Browser { url } => {
            if url.is_empty() {
                bail!("Browser action has an empty URL");
            }
        }
        ActionKind::Variable { op } => {
            use super::action::VariableOp::*;
            let variable = match op {
                Set { variable, .. }
                | Increment { variable, .. }
                | AppendItem { variable, .. }
                | RemoveAt { variable, .. }
                | Clear { variable }
                | AppendTableRow { variable, .. } => variable,
            };
            if variable.is_empty() {
                bail!("Variable action does not name a variable");
            }
        }
        ActionKind::Loop { actions, .. } => {
            for (idx, child) in actions.iter().enumerate() {
                validate_action(child)
                    .with_context(|| format!("Invalid action in loop body at step {idx}"))?;
            }
        }
        ActionKind::If {
            then_actions,
            else_actions,
            condition,
        } => {
            if condition.variable.is_empty() {
                bail!("If condition does not name a variable");
            }
            for (idx, child) in then_actions.iter().chain(else_actions.iter()).enumerate() {
                validate_action(child)
                    .with_context(|| format!("Invalid action in branch body at step {idx}"))?;
            }
        }
        ActionKind::Mouse { .. }
        | ActionKind::Wait { .. }
        | ActionKind::Clipboard { .. }
        | ActionKind::Json { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_file() {
        let file = load_from_str(
            r#"{
                "sequences": {
                    "demo": [
                        {"type": "wait", "ms": 100},
                        {"type": "mouse", "x": 5, "y": 6, "click": "left"}
                    ]
                },
                "variables": {"user": "alice"}
            }"#,
        )
        .unwrap();
        assert_eq!(file.sequences["demo"].len(), 2);
        assert_eq!(file.variables["user"], "alice");
    }

    #[test]
    fn test_validation_rejects_keyless_combination() {
        let err = load_from_str(
            r#"{"sequences": {"s": [{"type": "keyboard", "mode": "key_combination"}]}}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("no keys"));
    }

    #[test]
    fn test_validation_recurses_into_loop_bodies() {
        let err = load_from_str(
            r#"{"sequences": {"s": [
                {"type": "loop", "count": 2, "actions": [
                    {"type": "browser", "url": ""}
                ]}
            ]}}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("empty URL"));
    }

    #[test]
    fn test_schema_generates() {
        let schema = generate_schema();
        let json = serde_json::to_value(&schema).unwrap();
        assert!(json.get("$schema").is_some() || json.get("title").is_some());
    }
}
