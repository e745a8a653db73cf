use rdev::Key;

/// Modifier tracked by the capture aggregator.
///
/// Only Ctrl, Alt and Shift are tracked; combination routing additionally
/// gates on Ctrl/Alt alone, so Shift+letter stays buffered text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
}

/// Classify a key as one of the tracked modifiers.
pub fn modifier_kind(key: Key) -> Option<Modifier> {
    match key {
        Key::ControlLeft | Key::ControlRight => Some(Modifier::Ctrl),
        Key::Alt | Key::AltGr => Some(Modifier::Alt),
        Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
        _ => None,
    }
}

/// Convert a key-down into the character it types, honoring the shift flag.
/// Returns None for non-printable keys. Shifted punctuation follows the US
/// layout.
pub fn key_to_char(key: Key, shift: bool) -> Option<char> {
    let (plain, shifted) = match key {
        Key::KeyA => ('a', 'A'),
        Key::KeyB => ('b', 'B'),
        Key::KeyC => ('c', 'C'),
        Key::KeyD => ('d', 'D'),
        Key::KeyE => ('e', 'E'),
        Key::KeyF => ('f', 'F'),
        Key::KeyG => ('g', 'G'),
        Key::KeyH => ('h', 'H'),
        Key::KeyI => ('i', 'I'),
        Key::KeyJ => ('j', 'J'),
        Key::KeyK => ('k', 'K'),
        Key::KeyL => ('l', 'L'),
        Key::KeyM => ('m', 'M'),
        Key::KeyN => ('n', 'N'),
        Key::KeyO => ('o', 'O'),
        Key::KeyP => ('p', 'P'),
        Key::KeyQ => ('q', 'Q'),
        Key::KeyR => ('r', 'R'),
        Key::KeyS => ('s', 'S'),
        Key::KeyT => ('t', 'T'),
        Key::KeyU => ('u', 'U'),
        Key::KeyV => ('v', 'V'),
        Key::KeyW => ('w', 'W'),
        Key::KeyX => ('x', 'X'),
        Key::KeyY => ('y', 'Y'),
        Key::KeyZ => ('z', 'Z'),
        Key::Num0 => ('0', ')'),
        Key::Num1 => ('1', '!'),
        Key::Num2 => ('2', '@'),
        Key::Num3 => ('3', '#'),
        Key::Num4 => ('4', '$'),
        Key::Num5 => ('5', '%'),
        Key::Num6 => ('6', '^'),
        Key::Num7 => ('7', '&'),
        Key::Num8 => ('8', '*'),
        Key::Num9 => ('9', '('),
        Key::Kp0 => ('0', '0'),
        Key::Kp1 => ('1', '1'),
        Key::Kp2 => ('2', '2'),
        Key::Kp3 => ('3', '3'),
        Key::Kp4 => ('4', '4'),
        Key::Kp5 => ('5', '5'),
        Key::Kp6 => ('6', '6'),
        Key::Kp7 => ('7', '7'),
        Key::Kp8 => ('8', '8'),
        Key::Kp9 => ('9', '9'),
        Key::Space => (' ', ' '),
        Key::Comma => (',', '<'),
        Key::Dot => ('.', '>'),
        Key::Slash => ('/', '?'),
        Key::SemiColon => (';', ':'),
        Key::Quote => ('\'', '"'),
        Key::LeftBracket => ('[', '{'),
        Key::RightBracket => (']', '}'),
        Key::Minus => ('-', '_'),
        Key::Equal => ('=', '+'),
        Key::BackQuote => ('`', '~'),
        Key::BackSlash => ('\\', '|'),
        Key::KpMinus => ('-', '-'),
        Key::KpPlus => ('+', '+'),
        Key::KpMultiply => ('*', '*'),
        Key::KpDivide => ('/', '/'),
        _ => return None,
    };
    Some(if shift { shifted } else { plain })
}

/// Canonical name for a key, matching what the injector's key parser
/// accepts on replay.
pub fn key_name(key: Key) -> String {
    if let Some(c) = key_to_char(key, false) {
        if c == ' ' {
            return "space".to_string();
        }
        return c.to_string();
    }
    let name = match key {
        Key::ControlLeft | Key::ControlRight => "ctrl",
        Key::Alt | Key::AltGr => "alt",
        Key::ShiftLeft | Key::ShiftRight => "shift",
        Key::MetaLeft | Key::MetaRight => "meta",
        Key::Return | Key::KpReturn => "enter",
        Key::Escape => "esc",
        Key::Tab => "tab",
        Key::Backspace => "backspace",
        Key::Delete | Key::KpDelete => "delete",
        Key::CapsLock => "capslock",
        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",
        Key::Home => "home",
        Key::End => "end",
        Key::PageUp => "pageup",
        Key::PageDown => "pagedown",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        other => return format!("{other:?}").to_lowercase(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::parse_key;

    #[test]
    fn test_letters_honor_shift() {
        assert_eq!(key_to_char(Key::KeyA, false), Some('a'));
        assert_eq!(key_to_char(Key::KeyA, true), Some('A'));
    }

    #[test]
    fn test_us_layout_shifted_punctuation() {
        assert_eq!(key_to_char(Key::Num2, true), Some('@'));
        assert_eq!(key_to_char(Key::SemiColon, true), Some(':'));
        assert_eq!(key_to_char(Key::Slash, false), Some('/'));
    }

    #[test]
    fn test_non_printable_keys_have_no_char() {
        assert_eq!(key_to_char(Key::F5, false), None);
        assert_eq!(key_to_char(Key::Return, true), None);
        assert_eq!(key_to_char(Key::ControlLeft, false), None);
    }

    #[test]
    fn test_names_round_trip_through_the_injector_parser() {
        for key in [
            Key::ControlLeft,
            Key::Alt,
            Key::ShiftRight,
            Key::Return,
            Key::Escape,
            Key::F5,
            Key::KeyC,
            Key::Num7,
            Key::Space,
            Key::UpArrow,
        ] {
            let name = key_name(key);
            assert!(parse_key(&name).is_ok(), "'{name}' did not parse");
        }
    }
}
