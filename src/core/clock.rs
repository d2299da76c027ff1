//! Wall-clock source for `SourceState::last_update`

use time::OffsetDateTime;

/// Wall-clock time in Unix milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// System UTC clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        u64::try_from(nanos / 1_000_000).unwrap_or(0)
    }
}
