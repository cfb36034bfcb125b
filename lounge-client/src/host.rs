use std::time::{Duration, Instant};

/// The boundary to the embedded player the host renders media with.
///
/// The reconciler only ever observes what the player reports and issues the
/// commands below; everything else about the player is out of scope.
pub trait Player: Send + Sync {
    /// Whether the player has media loaded and can report positions
    fn is_ready(&self) -> bool;
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn is_playing(&self) -> bool;

    fn play(&self);
    fn pause(&self);
    fn load(&self, external_id: &str);
    fn seek(&self, seconds: f64);
}

/// How long the player's own event feedback is ignored after a remote
/// command was applied to it.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_millis(400);

/// Tracks the window after an inbound command during which the player's
/// event feedback must not be echoed back to the server.
///
/// Programmatically pausing or loading makes the embedded player fire the
/// same events a user interaction would. Without the window, a `video ended`
/// event raised while switching videos would emit a spurious `NEXT_VIDEO`.
#[derive(Debug, Default)]
pub struct CommandGate {
    suppress_until: Option<Instant>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the suppression window. Called whenever an inbound command is
    /// applied to the player.
    pub fn mark(&mut self) {
        self.mark_at(Instant::now());
    }

    /// Returns true while player events must be swallowed.
    pub fn is_suppressed(&self) -> bool {
        self.is_suppressed_at(Instant::now())
    }

    fn mark_at(&mut self, now: Instant) {
        self.suppress_until = Some(now + SUPPRESSION_WINDOW);
    }

    fn is_suppressed_at(&self, now: Instant) -> bool {
        self.suppress_until.map(|until| now < until).unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_pass_through_without_a_recent_command() {
        let gate = CommandGate::new();
        assert!(!gate.is_suppressed());
    }

    #[test]
    fn events_are_swallowed_inside_the_window() {
        let mut gate = CommandGate::new();
        let now = Instant::now();

        gate.mark_at(now);

        assert!(gate.is_suppressed_at(now));
        assert!(gate.is_suppressed_at(now + SUPPRESSION_WINDOW - Duration::from_millis(1)));
    }

    #[test]
    fn the_window_closes_after_the_deadline() {
        let mut gate = CommandGate::new();
        let now = Instant::now();

        gate.mark_at(now);

        assert!(!gate.is_suppressed_at(now + SUPPRESSION_WINDOW));
        assert!(!gate.is_suppressed_at(now + SUPPRESSION_WINDOW + Duration::from_millis(1)));
    }

    #[test]
    fn a_new_command_reopens_the_window() {
        let mut gate = CommandGate::new();
        let now = Instant::now();

        gate.mark_at(now);
        gate.mark_at(now + SUPPRESSION_WINDOW);

        assert!(gate.is_suppressed_at(now + SUPPRESSION_WINDOW + Duration::from_millis(100)));
    }
}
