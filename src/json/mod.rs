/*!
Resilient JSON subsystem.

This module turns arbitrary noisy text (typically clipboard content) into an
executable payload:

- `extractor`: finds a balanced JSON object or array, escapes raw control
  characters inside its string literals, parses with tolerance for comments
  and trailing commas, and falls back to targeted single-character repair at
  the parser's reported failure position.
- `directive`: recognizes the three payload directives (sequence invocation,
  click, wait) inside a parsed document.

The extractor holds no state across calls; each extraction is one pass over
one input.
*/

pub mod directive;
pub mod extractor;

pub use directive::{ClickDirective, DirectiveError, Directives, SequenceCall, parse_directives};
pub use extractor::{ExtractError, extract_document, locate, parse_tolerant, sanitize};
