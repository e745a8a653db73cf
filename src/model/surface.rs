use super::action::Action;

/// Three-verb protocol every action editor surface implements.
///
/// The core never depends on UI toolkit types: a presentation layer adapts
/// whatever widgets it owns to this contract and the engine/model side only
/// ever sees `Action` values moving across it.
pub trait EditorSurface {
    /// One-time setup for a freshly selected action.
    fn initialize(&mut self, action: &Action);

    /// Push current model state into the view (after external mutation,
    /// e.g. a `recompute_display` pass).
    fn refresh_view_from(&mut self, action: &Action);

    /// Pull edited view state back into the model. Callers are expected to
    /// follow up with [`Action::recompute_display`].
    fn commit_view_into(&self, action: &mut Action);
}
