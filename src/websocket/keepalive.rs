use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::types::ClientFrame;

/// Default interval between keep-alive pings
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Fire-and-forget liveness pings for an open connection
///
/// The first ping is due one full interval after the connection opens. The
/// timer stops when the value is dropped; no PONG is expected, dead peers are
/// detected by the socket closing.
pub(crate) struct KeepAlive {
    interval: Interval,
}

impl KeepAlive {
    pub(crate) fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next tick and build the ping to send
    pub(crate) async fn tick(&mut self) -> ClientFrame {
        self.interval.tick().await;
        ClientFrame::ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::start(Duration::from_secs(30));

        let frame = keep_alive.tick().await;
        assert!(matches!(frame, ClientFrame::Ping(_)));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));

        keep_alive.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
    }
}
