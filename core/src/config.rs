use std::time::Duration;

/// What to do when a qualification stream closes without ever emitting a
/// terminal `complete` event.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TerminationMode {
    /// A cleanly closed connection counts as an ordinary completion with
    /// whatever summary the stream supplied. Matches the backend's
    /// observed behavior.
    #[default]
    Lenient,
    /// Treat the silent close as a transport failure, so truncated
    /// responses surface instead of masquerading as success.
    Strict,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SessionConfig {
    pub termination: TerminationMode,
}

#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// How many times to try opening the job event stream before
    /// degrading to polling.
    pub stream_attempts: u32,

    /// Fixed delay between status polls.
    pub poll_interval: Duration,

    /// Polls (including failed ones) before the tracker gives up and
    /// leaves the job in its last observed status.
    pub max_poll_attempts: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stream_attempts: 2,
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 150,
        }
    }
}
