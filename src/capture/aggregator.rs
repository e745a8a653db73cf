use rdev::Key;
use std::time::{Duration, Instant};
use tracing::trace;

use super::keymap::{Modifier, key_name, key_to_char, modifier_kind};
use crate::model::{Action, ActionKind, KeyboardMode};

/// Direction of a raw key event.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One raw event as delivered by the hook adapter's channel.
#[derive(Debug, Copy, Clone)]
pub struct KeyEvent {
    pub key: Key,
    pub direction: KeyDirection,
    pub at: Instant,
}

/// Aggregates a serialized stream of key events into keyboard actions.
///
/// Runs of printable characters are buffered into a single type-text action,
/// flushed by a quiet interval, a non-printable key, a Ctrl/Alt chord or the
/// end of the recording. Every emitted action's delay is the wall-clock gap
/// since the previous emission, so replay reproduces the original pacing.
///
/// Each key-down produces at most one flush plus one emission; key-ups only
/// clear modifier flags. Combination routing gates on Ctrl/Alt; Shift alone
/// types uppercase text instead of forming a chord.
pub struct KeyCaptureAggregator {
    ctrl: bool,
    alt: bool,
    shift: bool,
    buffer: String,
    buffering: bool,
    buffer_started: Option<Instant>,
    last_keydown: Option<Instant>,
    last_emission: Option<Instant>,
    session_started: Instant,
    quiet_interval: Duration,
}

impl KeyCaptureAggregator {
    pub fn new(quiet_interval: Duration, now: Instant) -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: false,
            buffer: String::new(),
            buffering: false,
            buffer_started: None,
            last_keydown: None,
            last_emission: None,
            session_started: now,
            quiet_interval,
        }
    }

    /// Reset all per-session state. Called at the start of a recording.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.quiet_interval, now);
    }

    /// Consume one raw event. Returns zero, one or two actions: a flushed
    /// text run and/or the event's own emission.
    pub fn handle(&mut self, event: KeyEvent) -> Vec<Action> {
        match event.direction {
            KeyDirection::Up => {
                self.set_modifier(event.key, false);
                Vec::new()
            }
            KeyDirection::Down => self.handle_down(event.key, event.at),
        }
    }

    /// Flush the pending text run if no key-down arrived for the configured
    /// quiet interval. Drive this from the channel consumer's recv timeout.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<Action> {
        let last = self.last_keydown?;
        if self.buffering && now.duration_since(last) >= self.quiet_interval {
            return self.flush();
        }
        None
    }

    /// Force-flush any pending text regardless of timer state. Called at
    /// the end of a recording; afterwards no buffered text remains.
    pub fn finish(&mut self) -> Option<Action> {
        let flushed = self.flush();
        self.ctrl = false;
        self.alt = false;
        self.shift = false;
        flushed
    }

    fn handle_down(&mut self, key: Key, at: Instant) -> Vec<Action> {
        self.last_keydown = Some(at);

        if let Some(modifier) = modifier_kind(key) {
            trace!(target: "replaykit::capture", ?modifier, "modifier down");
            self.set_flag(modifier, true);
            return Vec::new();
        }

        let mut out = Vec::new();

        // Ctrl/Alt gate the chord path; Shift alone keeps buffering text.
        if self.ctrl || self.alt {
            out.extend(self.flush());
            out.push(self.emit_combination(key, at));
            return out;
        }

        if let Some(c) = key_to_char(key, self.shift) {
            if !self.buffering {
                self.buffering = true;
                self.buffer_started = Some(at);
            }
            self.buffer.push(c);
            return out;
        }

        // Non-printable, non-modifier: close the run, emit a key press.
        out.extend(self.flush());
        out.push(self.emit_key_press(key, at));
        out
    }

    fn flush(&mut self) -> Option<Action> {
        if !self.buffering || self.buffer.is_empty() {
            self.buffering = false;
            self.buffer.clear();
            self.buffer_started = None;
            return None;
        }
        let started = self.buffer_started.take().unwrap_or(self.session_started);
        let text = std::mem::take(&mut self.buffer);
        self.buffering = false;
        trace!(target: "replaykit::capture", chars = text.len(), "flushing text run");

        let mut action = Action::from_kind(ActionKind::Keyboard {
            mode: KeyboardMode::TypeText,
            text,
            keys: Vec::new(),
            inter_char_delay_ms: 0,
            use_clipboard: false,
        });
        action.delay_ms = self.gap_before(started);
        self.last_emission = Some(started);
        Some(action)
    }

    fn emit_combination(&mut self, key: Key, at: Instant) -> Action {
        let mut keys = Vec::new();
        if self.ctrl {
            keys.push("ctrl".to_string());
        }
        if self.alt {
            keys.push("alt".to_string());
        }
        if self.shift {
            keys.push("shift".to_string());
        }
        keys.push(key_name(key));

        let mut action = Action::from_kind(ActionKind::Keyboard {
            mode: KeyboardMode::KeyCombination,
            text: String::new(),
            keys,
            inter_char_delay_ms: 0,
            use_clipboard: false,
        });
        action.delay_ms = self.gap_before(at);
        self.last_emission = Some(at);
        action
    }

    fn emit_key_press(&mut self, key: Key, at: Instant) -> Action {
        let mut action = Action::from_kind(ActionKind::Keyboard {
            mode: KeyboardMode::KeyPress,
            text: String::new(),
            keys: vec![key_name(key)],
            inter_char_delay_ms: 0,
            use_clipboard: false,
        });
        action.delay_ms = self.gap_before(at);
        self.last_emission = Some(at);
        action
    }

    /// Wall-clock gap between the previous emission (or session start) and
    /// the moment this action began.
    fn gap_before(&self, at: Instant) -> u64 {
        let reference = self.last_emission.unwrap_or(self.session_started);
        at.saturating_duration_since(reference).as_millis() as u64
    }

    fn set_modifier(&mut self, key: Key, down: bool) {
        if let Some(modifier) = modifier_kind(key) {
            self.set_flag(modifier, down);
        }
    }

    fn set_flag(&mut self, modifier: Modifier, down: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = down,
            Modifier::Alt => self.alt = down,
            Modifier::Shift => self.shift = down,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down(key: Key, at: Instant) -> KeyEvent {
        KeyEvent {
            key,
            direction: KeyDirection::Down,
            at,
        }
    }

    fn up(key: Key, at: Instant) -> KeyEvent {
        KeyEvent {
            key,
            direction: KeyDirection::Up,
            at,
        }
    }

    fn aggregator(t0: Instant) -> KeyCaptureAggregator {
        KeyCaptureAggregator::new(Duration::from_millis(800), t0)
    }

    fn feed(agg: &mut KeyCaptureAggregator, events: &[KeyEvent]) -> Vec<Action> {
        let mut out = Vec::new();
        for event in events {
            out.extend(agg.handle(*event));
        }
        out
    }

    fn text_of(action: &Action) -> &str {
        match &action.kind {
            ActionKind::Keyboard { text, .. } => text,
            other => panic!("not a keyboard action: {other:?}"),
        }
    }

    #[test]
    fn test_plain_letters_buffer_into_one_type_text() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::KeyA, t0),
                down(Key::KeyB, t0 + Duration::from_millis(50)),
                up(Key::KeyB, t0 + Duration::from_millis(60)),
                up(Key::KeyA, t0 + Duration::from_millis(70)),
            ],
        );
        assert!(emitted.is_empty());

        let flushed = agg.finish().unwrap();
        assert_eq!(text_of(&flushed), "ab");
        match flushed.kind {
            ActionKind::Keyboard { mode, .. } => assert_eq!(mode, KeyboardMode::TypeText),
            _ => unreachable!(),
        }
        assert!(agg.finish().is_none());
    }

    #[test]
    fn test_ctrl_chord_emits_exactly_one_combination() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::ControlLeft, t0),
                down(Key::KeyC, t0 + Duration::from_millis(10)),
                up(Key::KeyC, t0 + Duration::from_millis(20)),
                up(Key::ControlLeft, t0 + Duration::from_millis(30)),
            ],
        );
        assert_eq!(emitted.len(), 1);
        match &emitted[0].kind {
            ActionKind::Keyboard { mode, keys, .. } => {
                assert_eq!(*mode, KeyboardMode::KeyCombination);
                assert_eq!(keys, &["ctrl", "c"]);
            }
            _ => unreachable!(),
        }
        // No text was buffered, so nothing else comes out at the end.
        assert!(agg.finish().is_none());
    }

    #[test]
    fn test_shift_letter_buffers_uppercase_text() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::ShiftLeft, t0),
                down(Key::KeyA, t0 + Duration::from_millis(5)),
                up(Key::KeyA, t0 + Duration::from_millis(10)),
                up(Key::ShiftLeft, t0 + Duration::from_millis(15)),
                down(Key::KeyB, t0 + Duration::from_millis(20)),
            ],
        );
        assert!(emitted.is_empty());
        assert_eq!(text_of(&agg.finish().unwrap()), "Ab");
    }

    #[test]
    fn test_chord_after_text_flushes_run_first() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::KeyH, t0),
                down(Key::KeyI, t0 + Duration::from_millis(40)),
                down(Key::ControlLeft, t0 + Duration::from_millis(100)),
                down(Key::KeyS, t0 + Duration::from_millis(120)),
            ],
        );
        assert_eq!(emitted.len(), 2);
        assert_eq!(text_of(&emitted[0]), "hi");
        match &emitted[1].kind {
            ActionKind::Keyboard { mode, keys, .. } => {
                assert_eq!(*mode, KeyboardMode::KeyCombination);
                assert_eq!(keys, &["ctrl", "s"]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_non_printable_key_flushes_then_emits_key_press() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::KeyO, t0),
                down(Key::KeyK, t0 + Duration::from_millis(30)),
                down(Key::Return, t0 + Duration::from_millis(60)),
            ],
        );
        assert_eq!(emitted.len(), 2);
        assert_eq!(text_of(&emitted[0]), "ok");
        match &emitted[1].kind {
            ActionKind::Keyboard { mode, keys, .. } => {
                assert_eq!(*mode, KeyboardMode::KeyPress);
                assert_eq!(keys, &["enter"]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_quiet_interval_flushes_buffer() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        feed(&mut agg, &[down(Key::KeyX, t0)]);

        // Not quiet for long enough yet.
        assert!(agg.poll_timeout(t0 + Duration::from_millis(100)).is_none());

        let flushed = agg.poll_timeout(t0 + Duration::from_millis(900)).unwrap();
        assert_eq!(text_of(&flushed), "x");
        assert!(agg.poll_timeout(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_delays_reflect_gaps_between_emissions() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::F5, t0 + Duration::from_millis(200)),
                down(Key::F6, t0 + Duration::from_millis(700)),
            ],
        );
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].delay_ms, 200);
        assert_eq!(emitted[1].delay_ms, 500);
    }

    #[test]
    fn test_text_run_delay_uses_first_character_time() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[
                down(Key::F5, t0),
                down(Key::KeyA, t0 + Duration::from_millis(300)),
                down(Key::KeyB, t0 + Duration::from_millis(350)),
                down(Key::Return, t0 + Duration::from_millis(400)),
            ],
        );
        // F5 press, then the flushed "ab" run, then the enter press.
        assert_eq!(emitted.len(), 3);
        assert_eq!(emitted[1].delay_ms, 300);
        assert_eq!(text_of(&emitted[1]), "ab");
        assert_eq!(emitted[2].delay_ms, 100);
    }

    #[test]
    fn test_emitted_actions_are_auto_named() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        let emitted = feed(
            &mut agg,
            &[down(Key::ControlLeft, t0), down(Key::KeyC, t0)],
        );
        assert_eq!(emitted[0].name, "Press ctrl+c");
    }

    #[test]
    fn test_reset_clears_pending_state() {
        let t0 = Instant::now();
        let mut agg = aggregator(t0);
        feed(&mut agg, &[down(Key::KeyA, t0), down(Key::ControlLeft, t0)]);
        agg.reset(t0 + Duration::from_secs(1));
        assert!(agg.finish().is_none());
        // The cleared ctrl flag must not turn the next letter into a chord.
        let emitted = feed(&mut agg, &[down(Key::KeyB, t0 + Duration::from_secs(2))]);
        assert!(emitted.is_empty());
        assert_eq!(text_of(&agg.finish().unwrap()), "b");
    }
}
