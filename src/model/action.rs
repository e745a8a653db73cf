use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::variables::VarHint;

/// One step of an automation sequence.
///
/// Common fields live on this struct; kind-specific fields live in the
/// [`ActionKind`] payload selected by the flattened `type` tag. Fields that a
/// given kind does not use are tolerated during deserialization and ignored
/// during execution (sequences written by older builds stay loadable).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Action {
    /// Display name; often auto-derived from content via [`Action::recompute_display`].
    #[serde(default)]
    pub name: String,

    /// Free-form user note.
    #[serde(default)]
    pub description: String,

    /// Milliseconds slept before the action runs. The sleep is cancellable.
    #[serde(default)]
    pub delay_ms: u64,

    /// Disabled actions are skipped entirely: no delay, no dispatch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// When true, a failure is logged and the executor advances to the next
    /// sibling instead of halting the sequence.
    #[serde(default)]
    pub error_tolerant: bool,

    #[serde(flatten)]
    pub kind: ActionKind,
}

fn default_true() -> bool {
    true
}

/// Kind-specific payload of an [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Pointer movement, clicks and wheel scrolling at absolute coordinates.
    Mouse {
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
        /// Wheel detents; only meaningful for `click: wheel`.
        #[serde(default)]
        wheel_delta: i32,
        #[serde(default)]
        click: MouseClickKind,
    },

    /// Text typing, single key presses, chords and hotkey replays.
    Keyboard {
        #[serde(default)]
        mode: KeyboardMode,
        /// Text for `type_text` mode; supports `{{var}}` interpolation.
        #[serde(default)]
        text: String,
        /// Canonical key names ("ctrl", "alt", "f5", "a", ...).
        #[serde(default)]
        keys: Vec<String>,
        /// Per-character pause while typing.
        #[serde(default)]
        inter_char_delay_ms: u64,
        /// Type long text by writing it to the clipboard and pasting.
        #[serde(default)]
        use_clipboard: bool,
    },

    /// Cancellable fixed pause.
    Wait { ms: u64 },

    /// Mutate the sequence's variable store.
    Variable {
        #[serde(flatten)]
        op: VariableOp,
    },

    /// Read or write the system clipboard, with a retry budget.
    Clipboard {
        #[serde(flatten)]
        op: ClipboardOp,
        #[serde(default)]
        retry_count: u32,
        #[serde(default)]
        retry_wait_ms: u64,
    },

    /// Extract a JSON payload from the clipboard and execute its directives
    /// (sequence invocation, click, wait).
    Json {
        /// Added to a click directive's coordinates.
        #[serde(default)]
        offset_x: i32,
        #[serde(default)]
        offset_y: i32,
        #[serde(default)]
        retry_count: u32,
        #[serde(default)]
        retry_wait_ms: u64,
    },

    /// Open a URL in the default browser.
    Browser { url: String },

    /// Repeat the child list a fixed number of times, or while a variable
    /// holds a truthy value.
    Loop {
        #[serde(default)]
        count: u64,
        #[serde(default)]
        while_variable: Option<String>,
        #[serde(default)]
        actions: Vec<Action>,
    },

    /// Evaluate a condition against the variable store and run one branch.
    If {
        condition: Condition,
        #[serde(default)]
        then_actions: Vec<Action>,
        #[serde(default)]
        else_actions: Vec<Action>,
    },
}

/// Mouse button enumeration, as handed to the input injector.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// What a `Mouse` action does at its coordinates.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MouseClickKind {
    /// Move the pointer only.
    Move,
    #[default]
    Left,
    Double,
    Right,
    Middle,
    /// Scroll by `wheel_delta` detents.
    Wheel,
}

/// Which keyboard behavior a `Keyboard` action performs.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardMode {
    #[default]
    TypeText,
    /// Press and release the first key of `keys`.
    KeyPress,
    /// Hold every key of `keys` and release in reverse order.
    KeyCombination,
    /// Replay of a registered hotkey binding; executes like a combination
    /// but is kept distinct so recorded sequences can tell them apart.
    Hotkey,
}

/// Variable store mutation carried by a `Variable` action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum VariableOp {
    /// Create-or-overwrite from a raw string value (interpolated).
    Set {
        variable: String,
        value: String,
        #[serde(default)]
        hint: Option<VarHint>,
    },
    /// Add `delta` to a number variable, creating it when missing.
    Increment {
        variable: String,
        #[serde(default = "default_delta")]
        delta: i64,
    },
    AppendItem { variable: String, value: String },
    RemoveAt { variable: String, index: usize },
    Clear { variable: String },
    AppendTableRow { variable: String, cells: Vec<String> },
}

fn default_delta() -> i64 {
    1
}

/// Clipboard operation carried by a `Clipboard` action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClipboardOp {
    /// Write literal text (interpolated) to the clipboard.
    Write { text: String },
    /// Read clipboard text into a variable; retried while the clipboard is
    /// empty or unavailable.
    ReadToVariable { variable: String },
    /// Write a variable's display value to the clipboard.
    WriteFromVariable { variable: String },
}

/// Condition of an `If` action, evaluated against the variable store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Condition {
    pub variable: String,
    #[serde(default)]
    pub op: CompareOp,
    /// Right-hand side (interpolated). Unused for `is_true`.
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Equals,
    NotEquals,
    Contains,
    IsTrue,
}

impl Action {
    /// Build an action with default common fields and a derived name.
    pub fn from_kind(kind: ActionKind) -> Self {
        let mut action = Self {
            name: String::new(),
            description: String::new(),
            delay_ms: 0,
            enabled: true,
            error_tolerant: false,
            kind,
        };
        action.recompute_display();
        action
    }

    /// Deterministic one-line summary derived purely from current fields.
    /// Used for auto-naming during recording and for display.
    pub fn describe(&self) -> String {
        match &self.kind {
            ActionKind::Mouse {
                x,
                y,
                wheel_delta,
                click,
            } => match click {
                MouseClickKind::Move => format!("Move mouse to ({x}, {y})"),
                MouseClickKind::Left => format!("Left click at ({x}, {y})"),
                MouseClickKind::Double => format!("Double click at ({x}, {y})"),
                MouseClickKind::Right => format!("Right click at ({x}, {y})"),
                MouseClickKind::Middle => format!("Middle click at ({x}, {y})"),
                MouseClickKind::Wheel => format!("Scroll {wheel_delta} at ({x}, {y})"),
            },
            ActionKind::Keyboard {
                mode, text, keys, ..
            } => match mode {
                KeyboardMode::TypeText => format!("Type \"{}\"", ellipsize(text, 32)),
                KeyboardMode::KeyPress => {
                    format!("Press {}", keys.first().map(String::as_str).unwrap_or("?"))
                }
                KeyboardMode::KeyCombination => format!("Press {}", keys.join("+")),
                KeyboardMode::Hotkey => format!("Hotkey {}", keys.join("+")),
            },
            ActionKind::Wait { ms } => format!("Wait {ms} ms"),
            ActionKind::Variable { op } => match op {
                VariableOp::Set { variable, .. } => format!("Set {variable}"),
                VariableOp::Increment { variable, delta } => {
                    format!("Increment {variable} by {delta}")
                }
                VariableOp::AppendItem { variable, .. } => format!("Append to {variable}"),
                VariableOp::RemoveAt { variable, index } => {
                    format!("Remove item {index} from {variable}")
                }
                VariableOp::Clear { variable } => format!("Clear {variable}"),
                VariableOp::AppendTableRow { variable, .. } => format!("Append row to {variable}"),
            },
            ActionKind::Clipboard { op, .. } => match op {
                ClipboardOp::Write { .. } => "Write text to clipboard".to_string(),
                ClipboardOp::ReadToVariable { variable } => {
                    format!("Read clipboard into {variable}")
                }
                ClipboardOp::WriteFromVariable { variable } => {
                    format!("Write {variable} to clipboard")
                }
            },
            ActionKind::Json { .. } => "Run clipboard JSON directives".to_string(),
            ActionKind::Browser { url } => format!("Open {}", ellipsize(url, 48)),
            ActionKind::Loop {
                count,
                while_variable,
                actions,
            } => match while_variable {
                Some(var) => format!("Repeat while {var} ({} actions)", actions.len()),
                None => format!("Repeat {count} times ({} actions)", actions.len()),
            },
            ActionKind::If { condition, .. } => match condition.op {
                CompareOp::Equals => format!("If {} = {}", condition.variable, condition.value),
                CompareOp::NotEquals => format!("If {} != {}", condition.variable, condition.value),
                CompareOp::Contains => {
                    format!("If {} contains {}", condition.variable, condition.value)
                }
                CompareOp::IsTrue => format!("If {}", condition.variable),
            },
        }
    }

    /// Recompute the derived display name from the current fields.
    ///
    /// Called explicitly by editors and the recorder after a field mutation;
    /// it never runs from inside a setter, so the update cannot recurse.
    /// The user-owned `description` is left untouched.
    pub fn recompute_display(&mut self) {
        self.name = self.describe();
    }
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}
