use std::time::Duration;

/// First retry delay after a failed authority check.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(60);

/// Upper bound for the retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(15 * 60);

/// Exponential retry delay for authority checks.
///
/// Lives only in process memory; a restart starts again from
/// [`INITIAL_BACKOFF`].
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            current: INITIAL_BACKOFF,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay the next retry will use.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the delay for this retry and double the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(MAX_BACKOFF);
        self.current = (delay * 2).min(MAX_BACKOFF);
        delay
    }

    pub fn reset(&mut self) {
        self.current = INITIAL_BACKOFF;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_doubles_then_caps() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![60, 120, 240, 480, 900, 900, 900]);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_secs(240));

        backoff.reset();
        assert_eq!(backoff.next_delay(), INITIAL_BACKOFF);
    }
}
