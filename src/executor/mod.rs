#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for replaykit.

This module wires together:
- `error`: the failure taxonomy observed by the executor
- `injector`: collaborator traits (input, clipboard, sequence lookup) and
  their Enigo/arboard-backed implementations with dry-run support
- `engine`: the sequence executor (delays, branches, loops, retries,
  cooperative cancellation)
- `library`: a `SequenceLookup` over a loaded sequence file

Typical usage:
- Load a `SequenceFile` and wrap it in a `SequenceLibrary`.
- Call `SequenceLibrary::run` with a sequence name, or drive a
  `SequenceExecutor` directly with your own collaborators (e.g. fakes in
  tests).

Public re-exports:
- `SequenceExecutor`: interprets action lists.
- `SequenceLibrary`: runs named sequences from a file.
- `EnigoInjector` / `SystemClipboard`: default OS-backed collaborators.
*/

pub mod engine;
pub mod error;
pub mod injector;
pub mod library;

// Re-exports for convenient access from `replaykit::executor::*`
pub use engine::SequenceExecutor;
pub use error::ActionError;
pub use injector::{
    ClipboardAccess, EnigoInjector, InputInjector, SequenceLookup, SystemClipboard, parse_key,
};
pub use library::SequenceLibrary;
