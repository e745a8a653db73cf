use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::error::ActionError;
use super::injector::{ClipboardAccess, InputInjector, SequenceLookup};
use crate::json::{extract_document, parse_directives};
use crate::model::{
    Action, ActionKind, ClipboardOp, CompareOp, Condition, KeyboardMode, MouseButton,
    MouseClickKind, Sequence, VarValue, VariableOp, VariableStore,
};
use crate::utils::interpolation::interpolate_string;

/// Cancellation is polled at most this far apart during any wait.
const CANCEL_POLL_MS: u64 = 100;

/// Interprets an ordered list of actions, including branch and loop nodes.
///
/// The executor runs as blocking code on one dedicated worker; every wait it
/// performs (delay-before, retry backoff, JSON wait directive) is sliced so
/// the cancellation token is observed within [`CANCEL_POLL_MS`]. Side effects
/// flow exclusively through the collaborator traits, never through direct OS
/// calls in this layer.
pub struct SequenceExecutor<'e> {
    injector: &'e mut dyn InputInjector,
    clipboard: &'e mut dyn ClipboardAccess,
    lookup: &'e mut dyn SequenceLookup,
    cancel: CancellationToken,
}

impl<'e> SequenceExecutor<'e> {
    pub fn new(
        injector: &'e mut dyn InputInjector,
        clipboard: &'e mut dyn ClipboardAccess,
        lookup: &'e mut dyn SequenceLookup,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            injector,
            clipboard,
            lookup,
            cancel,
        }
    }

    /// Run a whole sequence against its own variable store.
    pub fn run_sequence(&mut self, sequence: &mut Sequence) -> Result<(), ActionError> {
        info!(
            target: "replaykit::engine",
            sequence = %sequence.name,
            steps = sequence.actions.len(),
            "Starting sequence"
        );
        let result = self.run_actions(&sequence.actions, &mut sequence.vars);
        match &result {
            Ok(()) => info!(target: "replaykit::engine", sequence = %sequence.name, "Sequence completed"),
            Err(err) if err.is_cancelled() => {
                info!(target: "replaykit::engine", sequence = %sequence.name, "Sequence cancelled")
            }
            Err(err) => {
                error!(target: "replaykit::engine", sequence = %sequence.name, error = %err, "Sequence failed")
            }
        }
        result
    }

    /// Run a flat action list. Loop/If nodes recurse back into this method
    /// with their child lists.
    pub fn run_actions(
        &mut self,
        actions: &[Action],
        vars: &mut VariableStore,
    ) -> Result<(), ActionError> {
        for action in actions {
            if self.cancel.is_cancelled() {
                return Err(ActionError::Cancelled);
            }
            if !action.enabled {
                debug!(target: "replaykit::engine", action = %label(action), "Skipping disabled action");
                continue;
            }
            self.cancellable_sleep(action.delay_ms)?;
            trace!(target: "replaykit::engine", action = %label(action), "Dispatching");
            match self.dispatch(action, vars) {
                Ok(()) => {}
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) if action.error_tolerant => {
                    warn!(
                        target: "replaykit::engine",
                        action = %label(action), error = %err,
                        "Action failed; continuing (error tolerant)"
                    );
                }
                Err(err) => {
                    error!(
                        target: "replaykit::engine",
                        action = %label(action), error = %err,
                        "Action failed; halting sequence"
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, action: &Action, vars: &mut VariableStore) -> Result<(), ActionError> {
        match &action.kind {
            ActionKind::Mouse {
                x,
                y,
                wheel_delta,
                click,
            } => match click {
                MouseClickKind::Move => self.injector.move_to(*x, *y),
                MouseClickKind::Left => self.injector.click(*x, *y, MouseButton::Left),
                MouseClickKind::Double => {
                    self.injector.click(*x, *y, MouseButton::Left)?;
                    self.injector.click(*x, *y, MouseButton::Left)
                }
                MouseClickKind::Right => self.injector.click(*x, *y, MouseButton::Right),
                MouseClickKind::Middle => self.injector.click(*x, *y, MouseButton::Middle),
                MouseClickKind::Wheel => self.injector.scroll(*x, *y, *wheel_delta),
            },

            ActionKind::Keyboard {
                mode,
                text,
                keys,
                inter_char_delay_ms,
                use_clipboard,
            } => match mode {
                KeyboardMode::TypeText => {
                    let rendered = interpolate_string(text, vars);
                    if *use_clipboard {
                        self.clipboard.write_text(&rendered)?;
                        self.injector
                            .press_combination(&["ctrl".to_string(), "v".to_string()])
                    } else {
                        self.injector.type_text(&rendered, *inter_char_delay_ms)
                    }
                }
                KeyboardMode::KeyPress => self
                    .injector
                    .press_key(keys.first().map(String::as_str).unwrap_or_default()),
                KeyboardMode::KeyCombination | KeyboardMode::Hotkey => {
                    self.injector.press_combination(keys)
                }
            },

            ActionKind::Wait { ms } => self.cancellable_sleep(*ms),

            ActionKind::Variable { op } => {
                self.apply_variable_op(op, vars);
                Ok(())
            }

            ActionKind::Clipboard {
                op,
                retry_count,
                retry_wait_ms,
            } => self.run_with_retry(&label(action), *retry_count, *retry_wait_ms, |engine| {
                engine.clipboard_once(op, vars)
            }),

            ActionKind::Json {
                offset_x,
                offset_y,
                retry_count,
                retry_wait_ms,
            } => {
                let (dx, dy) = (*offset_x, *offset_y);
                self.run_with_retry(&label(action), *retry_count, *retry_wait_ms, |engine| {
                    engine.json_once(dx, dy)
                })
            }

            ActionKind::Browser { url } => {
                let rendered = interpolate_string(url, vars);
                self.injector.open_url(&rendered)
            }

            ActionKind::Loop {
                count,
                while_variable,
                actions,
            } => match while_variable {
                Some(variable) => {
                    let mut iteration = 0u64;
                    loop {
                        if self.cancel.is_cancelled() {
                            return Err(ActionError::Cancelled);
                        }
                        let proceed = vars.find(variable).is_some_and(VarValue::is_truthy);
                        if !proceed {
                            break;
                        }
                        trace!(target: "replaykit::engine", %variable, iteration, "While-loop iteration");
                        self.run_actions(actions, vars)?;
                        iteration += 1;
                    }
                    Ok(())
                }
                None => {
                    for iteration in 0..*count {
                        if self.cancel.is_cancelled() {
                            return Err(ActionError::Cancelled);
                        }
                        trace!(target: "replaykit::engine", iteration, of = count, "Loop iteration");
                        self.run_actions(actions, vars)?;
                    }
                    Ok(())
                }
            },

            ActionKind::If {
                condition,
                then_actions,
                else_actions,
            } => {
                let holds = evaluate(condition, vars);
                debug!(
                    target: "replaykit::engine",
                    variable = %condition.variable, holds,
                    "Condition evaluated"
                );
                if holds {
                    self.run_actions(then_actions, vars)
                } else {
                    self.run_actions(else_actions, vars)
                }
            }
        }
    }

    fn apply_variable_op(&mut self, op: &VariableOp, vars: &mut VariableStore) {
        match op {
            VariableOp::Set {
                variable,
                value,
                hint,
            } => {
                let rendered = interpolate_string(value, vars);
                vars.set(variable, &rendered, *hint);
            }
            VariableOp::Increment { variable, delta } => {
                // Type mismatches are absorbed: a non-number cell is replaced
                // by a fresh number seeded with the delta.
                if !vars.increment(variable, *delta) {
                    vars.set_value(variable, VarValue::Number(*delta));
                }
            }
            VariableOp::AppendItem { variable, value } => {
                let rendered = interpolate_string(value, vars);
                vars.append_item(variable, &rendered);
            }
            VariableOp::RemoveAt { variable, index } => {
                if !vars.remove_at(variable, *index) {
                    warn!(
                        target: "replaykit::engine",
                        %variable, index,
                        "RemoveAt had no effect"
                    );
                }
            }
            VariableOp::Clear { variable } => vars.clear(variable),
            VariableOp::AppendTableRow { variable, cells } => {
                let rendered: Vec<String> = cells
                    .iter()
                    .map(|cell| interpolate_string(cell, vars))
                    .collect();
                vars.append_table_row(variable, &rendered);
            }
        }
    }

    fn clipboard_once(
        &mut self,
        op: &ClipboardOp,
        vars: &mut VariableStore,
    ) -> Result<(), ActionError> {
        match op {
            ClipboardOp::Write { text } => {
                let rendered = interpolate_string(text, vars);
                self.clipboard.write_text(&rendered)
            }
            ClipboardOp::ReadToVariable { variable } => match self.clipboard.read_text() {
                Some(text) => {
                    vars.set(variable, &text, None);
                    Ok(())
                }
                None => Err(ActionError::ClipboardUnavailable),
            },
            ClipboardOp::WriteFromVariable { variable } => {
                let value = match vars.find(variable) {
                    Some(value) => value.display(),
                    None => {
                        warn!(target: "replaykit::engine", %variable, "Variable not set; writing empty text");
                        String::new()
                    }
                };
                self.clipboard.write_text(&value)
            }
        }
    }

    /// One pass of the JSON action: read the clipboard, extract a document,
    /// execute its directives. A sequence directive falls through to the
    /// others; a click or wait directive ends processing of the document.
    fn json_once(&mut self, offset_x: i32, offset_y: i32) -> Result<(), ActionError> {
        let text = self
            .clipboard
            .read_text()
            .ok_or(ActionError::ClipboardUnavailable)?;
        let doc = extract_document(&text)?;
        let directives = parse_directives(&doc)?;

        if let Some(call) = &directives.sequence {
            info!(
                target: "replaykit::engine",
                sequence = %call.name, variables = call.variables.len(),
                "JSON directive: invoking sequence"
            );
            if !self.lookup.run_with_variables(&call.name, &call.variables) {
                return Err(ActionError::SequenceNotFound(call.name.clone()));
            }
        }
        if let Some(click) = directives.click {
            self.injector.click(
                click.x + offset_x,
                click.y + offset_y,
                MouseButton::Left,
            )?;
            return Ok(());
        }
        if let Some(ms) = directives.wait_ms {
            self.cancellable_sleep(ms)?;
            return Ok(());
        }
        Ok(())
    }

    /// Retry sub-protocol: attempts = retry_count + 1, with a cancellable
    /// backoff between attempts. Cancellation aborts the whole loop at once;
    /// exhaustion raises an error naming the attempt count.
    fn run_with_retry<F>(
        &mut self,
        action: &str,
        retry_count: u32,
        retry_wait_ms: u64,
        mut attempt_fn: F,
    ) -> Result<(), ActionError>
    where
        F: FnMut(&mut Self) -> Result<(), ActionError>,
    {
        let attempts = retry_count + 1;
        let mut last_err = None;
        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return Err(ActionError::Cancelled);
            }
            match attempt_fn(self) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(
                        target: "replaykit::engine",
                        %action, attempt, attempts, error = %err,
                        "Attempt failed"
                    );
                    last_err = Some(err);
                    if attempt < attempts {
                        self.cancellable_sleep(retry_wait_ms)?;
                    }
                }
            }
        }
        if self.cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }
        Err(ActionError::RetriesExhausted {
            action: action.to_string(),
            attempts,
            source: Box::new(last_err.expect("at least one attempt ran")),
        })
    }

    /// Sleep `ms` in slices, observing the cancellation token at each slice
    /// boundary.
    fn cancellable_sleep(&self, ms: u64) -> Result<(), ActionError> {
        let mut remaining = ms;
        while remaining > 0 {
            if self.cancel.is_cancelled() {
                return Err(ActionError::Cancelled);
            }
            let slice = remaining.min(CANCEL_POLL_MS);
            thread::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }
        if ms > 0 && self.cancel.is_cancelled() {
            return Err(ActionError::Cancelled);
        }
        Ok(())
    }
}

fn label(action: &Action) -> String {
    if action.name.is_empty() {
        action.describe()
    } else {
        action.name.clone()
    }
}

fn evaluate(condition: &Condition, vars: &VariableStore) -> bool {
    let current = vars.find(&condition.variable);
    match condition.op {
        CompareOp::IsTrue => current.is_some_and(VarValue::is_truthy),
        op => {
            let lhs = current.map(VarValue::display).unwrap_or_default();
            let rhs = interpolate_string(&condition.value, vars);
            match op {
                CompareOp::Equals => lhs == rhs,
                CompareOp::NotEquals => lhs != rhs,
                CompareOp::Contains => lhs.contains(&rhs),
                CompareOp::IsTrue => unreachable!("handled above"),
            }
        }
    }
}
