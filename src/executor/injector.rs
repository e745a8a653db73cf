use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Axis, Button as EButton, Coordinate, Direction, Enigo, Key, Settings};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tracing::{info, trace, warn};

use super::error::ActionError;
use crate::model::MouseButton;

/// OS input synthesis as seen by the executor. Implementations are assumed
/// synchronous; failures propagate as [`ActionError::InjectionFailed`].
pub trait InputInjector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError>;
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<(), ActionError>;
    fn scroll(&mut self, x: i32, y: i32, delta: i32) -> Result<(), ActionError>;
    fn press_key(&mut self, key: &str) -> Result<(), ActionError>;
    fn press_combination(&mut self, keys: &[String]) -> Result<(), ActionError>;
    fn type_text(&mut self, text: &str, inter_char_delay_ms: u64) -> Result<(), ActionError>;
    fn open_url(&mut self, url: &str) -> Result<(), ActionError>;
}

/// System clipboard as seen by the executor.
pub trait ClipboardAccess {
    /// Current clipboard text; None when empty or unavailable.
    fn read_text(&mut self) -> Option<String>;
    fn write_text(&mut self, text: &str) -> Result<(), ActionError>;
}

/// Sequence invocation service used by the JSON directive. Returns false
/// when the named sequence does not exist or did not complete.
pub trait SequenceLookup {
    fn run_by_name(&mut self, name: &str) -> bool;
    fn run_with_variables(
        &mut self,
        name: &str,
        variables: &BTreeMap<String, String>,
    ) -> bool;
}

/// Enigo-backed injector with optional dry-run mode.
/// In dry-run mode, actions are only logged and no real input is simulated.
pub struct EnigoInjector {
    dry_run: bool,
    enigo: Option<Enigo>,
}

impl EnigoInjector {
    /// Create a new injector.
    /// - dry_run: when true, only logs instead of simulating real input.
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            enigo: None,
        }
    }

    /// Returns whether the injector is currently in dry-run mode.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Enable or disable dry-run mode dynamically.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo, ActionError> {
        if self.enigo.is_none() {
            trace!(target: "replaykit::inject", "Initializing Enigo");
            let enigo = Enigo::new(&Settings::default())
                .map_err(|err| ActionError::InjectionFailed(format!("enigo init: {err}")))?;
            self.enigo = Some(enigo);
        }
        Ok(self.enigo.as_mut().expect("Enigo must be initialized"))
    }
}

impl InputInjector for EnigoInjector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", x, y, "DRY-RUN move_to");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", x, y, "move_to");
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection_error)
    }

    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", x, y, ?button, "DRY-RUN click");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", x, y, ?button, "click");
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection_error)?;
        enigo
            .button(map_mouse_button(button), Direction::Click)
            .map_err(injection_error)
    }

    fn scroll(&mut self, x: i32, y: i32, delta: i32) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", x, y, delta, "DRY-RUN scroll");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", x, y, delta, "scroll");
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(injection_error)?;
        enigo.scroll(delta, Axis::Vertical).map_err(injection_error)
    }

    fn press_key(&mut self, key: &str) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", %key, "DRY-RUN press_key");
            return Ok(());
        }
        let parsed = parse_key(key)?;
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", %key, "press_key");
        enigo.key(parsed, Direction::Click).map_err(injection_error)
    }

    fn press_combination(&mut self, keys: &[String]) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", ?keys, "DRY-RUN press_combination");
            return Ok(());
        }
        let parsed = keys
            .iter()
            .map(|name| parse_key(name))
            .collect::<Result<Vec<_>, _>>()?;
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", ?keys, "press_combination");
        for key in &parsed {
            enigo.key(*key, Direction::Press).map_err(injection_error)?;
        }
        for key in parsed.iter().rev() {
            enigo
                .key(*key, Direction::Release)
                .map_err(injection_error)?;
        }
        Ok(())
    }

    fn type_text(&mut self, text: &str, inter_char_delay_ms: u64) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", %text, inter_char_delay_ms, "DRY-RUN type_text");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "replaykit::inject", %text, inter_char_delay_ms, "type_text");
        if inter_char_delay_ms == 0 {
            return enigo.text(text).map_err(injection_error);
        }
        let mut buf = [0u8; 4];
        for c in text.chars() {
            enigo
                .text(c.encode_utf8(&mut buf))
                .map_err(injection_error)?;
            thread::sleep(Duration::from_millis(inter_char_delay_ms));
        }
        Ok(())
    }

    fn open_url(&mut self, url: &str) -> Result<(), ActionError> {
        if self.dry_run {
            info!(target: "replaykit::inject", %url, "DRY-RUN open_url");
            return Ok(());
        }
        trace!(target: "replaykit::inject", %url, "open_url");
        spawn_opener(url)
            .map(|_| ())
            .map_err(|err| ActionError::InjectionFailed(format!("failed to open '{url}': {err}")))
    }
}

/// Arboard-backed system clipboard with lazy initialization.
#[derive(Default)]
pub struct SystemClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_clipboard(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            match arboard::Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(err) => {
                    warn!(target: "replaykit::inject", error = %err, "clipboard unavailable");
                    return None;
                }
            }
        }
        self.clipboard.as_mut()
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&mut self) -> Option<String> {
        let clipboard = self.ensure_clipboard()?;
        clipboard.get_text().ok().filter(|text| !text.is_empty())
    }

    fn write_text(&mut self, text: &str) -> Result<(), ActionError> {
        let clipboard = self
            .ensure_clipboard()
            .ok_or(ActionError::ClipboardUnavailable)?;
        clipboard
            .set_text(text.to_string())
            .map_err(|err| ActionError::InjectionFailed(format!("clipboard write: {err}")))
    }
}

/// Resolve a canonical key name (as produced by the recorder or written in a
/// sequence file) to an Enigo key.
pub fn parse_key(name: &str) -> Result<Key, ActionError> {
    let key = match name.to_lowercase().as_str() {
        // Modifier keys
        "ctrl" | "control" => Some(Key::Control),
        "alt" | "option" => Some(Key::Alt),
        "shift" => Some(Key::Shift),
        "meta" | "win" | "cmd" | "super" => Some(Key::Meta),

        // Function keys
        "f1" => Some(Key::F1),
        "f2" => Some(Key::F2),
        "f3" => Some(Key::F3),
        "f4" => Some(Key::F4),
        "f5" => Some(Key::F5),
        "f6" => Some(Key::F6),
        "f7" => Some(Key::F7),
        "f8" => Some(Key::F8),
        "f9" => Some(Key::F9),
        "f10" => Some(Key::F10),
        "f11" => Some(Key::F11),
        "f12" => Some(Key::F12),

        // Navigation keys
        "up" | "uparrow" => Some(Key::UpArrow),
        "down" | "downarrow" => Some(Key::DownArrow),
        "left" | "leftarrow" => Some(Key::LeftArrow),
        "right" | "rightarrow" => Some(Key::RightArrow),
        "home" => Some(Key::Home),
        "end" => Some(Key::End),
        "pageup" | "pgup" => Some(Key::PageUp),
        "pagedown" | "pgdn" => Some(Key::PageDown),

        // Special keys
        "return" | "enter" => Some(Key::Return),
        "escape" | "esc" => Some(Key::Escape),
        "tab" => Some(Key::Tab),
        "backspace" | "back" => Some(Key::Backspace),
        "delete" | "del" => Some(Key::Delete),
        "space" | " " => Some(Key::Space),
        "capslock" | "caps" => Some(Key::CapsLock),

        // Single characters map to unicode keys
        _ if name.chars().count() == 1 => name.chars().next().map(Key::Unicode),

        _ => None,
    };
    key.ok_or_else(|| ActionError::InjectionFailed(format!("unknown key '{name}'")))
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Middle => EButton::Middle,
        MouseButton::Right => EButton::Right,
    }
}

fn injection_error(err: enigo::InputError) -> ActionError {
    ActionError::InjectionFailed(err.to_string())
}

#[cfg(target_os = "windows")]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
    std::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .spawn()
}

#[cfg(target_os = "macos")]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
    std::process::Command::new("open").arg(url).spawn()
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn spawn_opener(url: &str) -> std::io::Result<std::process::Child> {
    std::process::Command::new("xdg-open").arg(url).spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_aliases() {
        assert_eq!(parse_key("ctrl").unwrap(), Key::Control);
        assert_eq!(parse_key("Control").unwrap(), Key::Control);
        assert_eq!(parse_key("ENTER").unwrap(), Key::Return);
        assert_eq!(parse_key("f5").unwrap(), Key::F5);
        assert_eq!(parse_key("a").unwrap(), Key::Unicode('a'));
    }

    #[test]
    fn test_parse_key_unknown() {
        assert!(parse_key("no-such-key").is_err());
        assert!(parse_key("").is_err());
    }

    #[test]
    fn test_dry_run_injector_never_touches_the_os() {
        let mut injector = EnigoInjector::new(true);
        injector.click(1, 2, MouseButton::Left).unwrap();
        injector.type_text("hello", 0).unwrap();
        injector
            .press_combination(&["ctrl".into(), "c".into()])
            .unwrap();
        assert!(injector.enigo.is_none());
    }
}
