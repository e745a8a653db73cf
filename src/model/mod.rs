//! Data model for replaykit.
//!
//! This module wires together the action model, the variable store, the
//! sequence/file types and their loading/validation helpers. Import from here
//! for a convenient, stable API.
//!
//! Example:
//! use replaykit::model::{SequenceFile, load_from_path};
//!
//! let file = load_from_path("sequences/login.json")?;

pub mod action;
pub mod loader;
pub mod sequence;
pub mod surface;
pub mod variables;

// Re-export core data models
pub use action::{
    Action, ActionKind, ClipboardOp, CompareOp, Condition, KeyboardMode, MouseButton,
    MouseClickKind, VariableOp,
};
pub use sequence::{Sequence, SequenceFile};
pub use surface::EditorSurface;
pub use variables::{LIST_SEPARATOR, VarHint, VarValue, VariableStore};

// Re-export loader utilities
pub use loader::{
    generate_schema, load_from_path, load_from_path_async, load_from_reader, load_from_str,
    save_to_path, validate_file, write_schema_to_writer,
};
