/*!
Keystroke capture for the recording feature.

- `hook`: rdev-backed global listener pushing `{key, down|up, timestamp}`
  events into a channel.
- `aggregator`: state machine turning that serialized stream into keyboard
  actions (text runs, single key presses, combinations) with replay-accurate
  delays.
- `keymap`: key-to-character and key-to-canonical-name mapping shared by the
  aggregator.

All per-session state lives in the aggregator and is reset when a recording
starts and fully flushed when it stops.
*/

pub mod aggregator;
pub mod hook;
pub mod keymap;

pub use aggregator::{KeyCaptureAggregator, KeyDirection, KeyEvent};
pub use hook::KeyHook;
pub use keymap::{key_name, key_to_char, modifier_kind};
