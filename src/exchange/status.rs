// Vehicle status: written by the controller every cycle, polled by the overlay

use std::time::Duration;

use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::error::{ExchangeError, Result};
use super::mailbox::Mailbox;
use crate::config::{FAILURE_THRESHOLD, POLL_INTERVAL};
use crate::messages::{Gear, Kinematics, VehicleStatus, normalize_heading};

/// Publishes the controller's view of the vehicle. Every record carries a
/// fresh timestamp so readers can tell a live writer from a stale file.
pub struct StatusWriter<M, C = SystemClock> {
    mailbox: M,
    clock: C,
    last: VehicleStatus,
}

impl<M: Mailbox> StatusWriter<M> {
    pub fn new(mailbox: M) -> Self {
        Self::with_clock(mailbox, SystemClock)
    }
}

impl<M: Mailbox, C: Clock> StatusWriter<M, C> {
    pub fn with_clock(mailbox: M, clock: C) -> Self {
        Self {
            mailbox,
            clock,
            last: VehicleStatus::default(),
        }
    }

    /// Last record handed to the mailbox
    pub fn last(&self) -> &VehicleStatus {
        &self.last
    }

    /// Write one status record.
    ///
    /// With no sensor reading the record goes out with `connected = false`
    /// and the previous kinematic fields; the write is never skipped.
    pub async fn publish(&mut self, reading: Option<Kinematics>, gear: Gear) -> Result<()> {
        match reading {
            Some(k) => {
                if !self.last.connected {
                    info!("Sensors online, publishing to {}", self.mailbox.describe());
                }
                self.last.position = k.position;
                self.last.speed = k.speed_kmh.abs();
                self.last.heading = normalize_heading(k.heading_deg);
                self.last.connected = true;
            }
            None => {
                if self.last.connected {
                    warn!("Sensors unavailable, reporting disconnected");
                }
                self.last.connected = false;
            }
        }
        self.last.gear = gear;
        self.last.timestamp = (self.clock.now_millis() as f64).max(self.last.timestamp + 1.0);

        let json = serde_json::to_vec(&self.last)?;
        self.mailbox.write(&json).await
    }
}

/// Whether the overlay is currently hearing from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Polls status records and keeps the state shown to the user
pub struct StatusReader<M> {
    mailbox: M,
    displayed: VehicleStatus,
    consecutive_failures: u32,
    failure_threshold: u32,
    read_timeout: Duration,
    link: LinkState,
    last_timestamp: Option<f64>,
}

impl<M: Mailbox> StatusReader<M> {
    pub fn new(mailbox: M) -> Self {
        Self::with_settings(mailbox, FAILURE_THRESHOLD, POLL_INTERVAL)
    }

    /// `read_timeout` bounds each poll; it should not exceed the poll period
    pub fn with_settings(mailbox: M, failure_threshold: u32, read_timeout: Duration) -> Self {
        Self {
            mailbox,
            displayed: VehicleStatus::default(),
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            read_timeout,
            link: LinkState::Disconnected,
            last_timestamp: None,
        }
    }

    pub fn displayed(&self) -> &VehicleStatus {
        &self.displayed
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Link is up and the controller reports live sensors
    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected && self.displayed.connected
    }

    /// Run one poll cycle. Failures never propagate; they only count.
    ///
    /// A record whose timestamp has not moved since the last read counts as
    /// a failure, so a writer that stops leaves the link to drop. Records
    /// without a timestamp (zero) are always taken as fresh.
    pub async fn poll(&mut self) -> LinkState {
        match self.fetch().await {
            Ok(status) => {
                if self.link != LinkState::Connected {
                    info!("Status link up ({})", self.mailbox.describe());
                }
                self.displayed = status;
                self.consecutive_failures = 0;
                self.link = LinkState::Connected;
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                debug!(
                    "Status read failed ({} in a row): {}",
                    self.consecutive_failures, e
                );
                if self.consecutive_failures >= self.failure_threshold
                    && self.link == LinkState::Connected
                {
                    warn!(
                        "Status link lost after {} failed reads: {}",
                        self.consecutive_failures, e
                    );
                    self.link = LinkState::Disconnected;
                }
            }
        }
        self.link
    }

    async fn fetch(&mut self) -> Result<VehicleStatus> {
        let bytes = tokio::time::timeout(self.read_timeout, self.mailbox.read())
            .await
            .map_err(|_| ExchangeError::Timeout(self.read_timeout))??
            .ok_or_else(|| ExchangeError::Missing(self.mailbox.describe()))?;
        let status: VehicleStatus = serde_json::from_slice(&bytes)?;

        if status.timestamp > 0.0 {
            if let Some(last) = self.last_timestamp {
                if status.timestamp <= last {
                    return Err(ExchangeError::Stale(last));
                }
            }
            self.last_timestamp = Some(status.timestamp);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ManualClock, MemoryMailbox};

    fn reading(x: f64, speed: f64, heading: f64) -> Kinematics {
        Kinematics {
            position: (x, 0.0),
            speed_kmh: speed,
            heading_deg: heading,
        }
    }

    async fn stored(mailbox: &MemoryMailbox) -> VehicleStatus {
        let bytes = mailbox.read().await.unwrap().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_writer_normalizes_fields() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        writer
            .publish(Some(reading(3.0, -12.0, -90.0)), Gear::Reverse)
            .await
            .unwrap();

        let status = stored(&mailbox).await;
        assert_eq!(status.speed, 12.0);
        assert_eq!(status.heading, 270.0);
        assert_eq!(status.gear, Gear::Reverse);
        assert!(status.connected);
    }

    #[tokio::test]
    async fn test_writer_keeps_last_known_fields_when_offline() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        writer
            .publish(Some(reading(10.0, 20.0, 45.0)), Gear::Drive)
            .await
            .unwrap();
        writer.publish(None, Gear::Drive).await.unwrap();

        let status = stored(&mailbox).await;
        assert!(!status.connected);
        assert_eq!(status.position, (10.0, 0.0));
        assert_eq!(status.speed, 20.0);
        assert_eq!(status.heading, 45.0);
    }

    #[tokio::test]
    async fn test_writer_offline_before_first_reading() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        writer.publish(None, Gear::Park).await.unwrap();
        assert!(stored(&mailbox).await.same_state(&VehicleStatus::default()));
    }

    #[tokio::test]
    async fn test_reader_starts_disconnected_on_missing_record() {
        let mut reader = StatusReader::new(MemoryMailbox::new());
        assert_eq!(reader.poll().await, LinkState::Disconnected);
        assert_eq!(reader.consecutive_failures(), 1);
        assert!(!reader.is_connected());
    }

    #[tokio::test]
    async fn test_corrupt_record_counts_once_and_keeps_state() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        let mut reader = StatusReader::new(mailbox.clone());

        writer
            .publish(Some(reading(1.0, 5.0, 10.0)), Gear::Drive)
            .await
            .unwrap();
        reader.poll().await;
        let before = reader.displayed().clone();

        // Truncated mid-write
        mailbox.write(br#"{"position":[1.0,0.0],"spe"#).await.unwrap();
        reader.poll().await;

        assert_eq!(reader.consecutive_failures(), 1);
        assert_eq!(reader.displayed(), &before);
        assert_eq!(reader.link(), LinkState::Connected);
    }

    #[tokio::test]
    async fn test_threshold_then_recovery() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        let mut reader = StatusReader::with_settings(mailbox.clone(), 5, POLL_INTERVAL);

        writer
            .publish(Some(reading(0.0, 0.0, 0.0)), Gear::Park)
            .await
            .unwrap();
        assert_eq!(reader.poll().await, LinkState::Connected);
        assert!(reader.is_connected());

        mailbox.write(b"garbage").await.unwrap();
        for _ in 0..4 {
            assert_eq!(reader.poll().await, LinkState::Connected);
        }
        assert_eq!(reader.poll().await, LinkState::Disconnected);
        assert_eq!(reader.consecutive_failures(), 5);
        assert!(!reader.is_connected());

        // A single good read restores the link
        writer
            .publish(Some(reading(2.0, 1.0, 0.0)), Gear::Drive)
            .await
            .unwrap();
        assert_eq!(reader.poll().await, LinkState::Connected);
        assert_eq!(reader.consecutive_failures(), 0);
        assert_eq!(reader.displayed().position, (2.0, 0.0));
    }

    #[tokio::test]
    async fn test_offline_sensors_show_disconnected_over_live_link() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        let mut reader = StatusReader::new(mailbox);

        writer.publish(None, Gear::Park).await.unwrap();
        assert_eq!(reader.poll().await, LinkState::Connected);
        assert!(!reader.is_connected());
    }

    #[tokio::test]
    async fn test_timestamps_advance_on_frozen_clock() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::with_clock(mailbox.clone(), ManualClock::starting_at(500));
        writer.publish(None, Gear::Park).await.unwrap();
        let first = stored(&mailbox).await.timestamp;
        writer.publish(None, Gear::Park).await.unwrap();
        let second = stored(&mailbox).await.timestamp;
        assert_eq!(first, 500.0);
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_silent_writer_drops_link() {
        let mailbox = MemoryMailbox::new();
        let mut writer = StatusWriter::new(mailbox.clone());
        let mut reader = StatusReader::with_settings(mailbox.clone(), 5, POLL_INTERVAL);

        writer
            .publish(Some(reading(1.0, 5.0, 0.0)), Gear::Drive)
            .await
            .unwrap();
        assert_eq!(reader.poll().await, LinkState::Connected);

        // Controller stops writing; the last record stays in place
        for _ in 0..4 {
            assert_eq!(reader.poll().await, LinkState::Connected);
        }
        assert_eq!(reader.poll().await, LinkState::Disconnected);
        assert_eq!(reader.consecutive_failures(), 5);
        assert_eq!(reader.displayed().position, (1.0, 0.0));

        // Writer resumes
        writer
            .publish(Some(reading(2.0, 5.0, 0.0)), Gear::Drive)
            .await
            .unwrap();
        assert_eq!(reader.poll().await, LinkState::Connected);
        assert_eq!(reader.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_unstamped_records_always_fresh() {
        let mailbox = MemoryMailbox::new();
        let mut reader = StatusReader::with_settings(mailbox.clone(), 2, POLL_INTERVAL);
        mailbox
            .write(br#"{"position":[0.0,0.0],"speed":0.0,"heading":0.0,"gear":"P","connected":true}"#)
            .await
            .unwrap();
        for _ in 0..5 {
            assert_eq!(reader.poll().await, LinkState::Connected);
        }
        assert_eq!(reader.consecutive_failures(), 0);
    }

    struct SlowMailbox;

    impl Mailbox for SlowMailbox {
        async fn write(&self, _record: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn read(&self) -> Result<Option<Vec<u8>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    #[tokio::test]
    async fn test_read_is_bounded_by_timeout() {
        let mut reader = StatusReader::with_settings(SlowMailbox, 5, Duration::from_millis(20));
        let started = std::time::Instant::now();
        reader.poll().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(reader.consecutive_failures(), 1);
    }
}
