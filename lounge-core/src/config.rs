use std::time::Duration;

/// The configuration of the coordination system.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long host position reports may not overwrite the playing bit
    /// after an explicit play or pause command.
    ///
    /// Embedded players take a moment to transition between playing and
    /// paused, and reports sent during that window still carry the old bit.
    pub playback_cooldown: Duration,
    /// The minimum interval between durable writes of a room's playback
    /// position. Position reports arrive every couple of seconds, which is
    /// far more often than the position is worth persisting.
    pub position_persist_interval: Duration,
    /// The timeout applied to every upstream metadata request.
    pub lookup_timeout: Duration,
    /// Upstream metadata providers, tried in order.
    pub lookup_providers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playback_cooldown: Duration::from_millis(3000),
            position_persist_interval: Duration::from_secs(5),
            lookup_timeout: Duration::from_secs(8),
            lookup_providers: vec![
                "https://inv.nadeko.net".to_string(),
                "https://yewtu.be".to_string(),
            ],
        }
    }
}
