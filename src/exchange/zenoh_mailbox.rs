// Zenoh-backed mailbox: the same records carried over a key-value channel
//
// `write` puts the record on the key. `read` drains every sample that arrived
// since the last read and keeps only the newest, so the slot behaves like the
// file transport (last writer wins). A reader that joins late sees nothing
// until the next put.

use std::sync::Mutex;

use tracing::{debug, info};
use zenoh::Session;
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

use super::error::{ExchangeError, Result};
use super::mailbox::Mailbox;

pub struct ZenohMailbox {
    session: Session,
    key: String,
    subscriber: Subscriber<FifoChannelHandler<Sample>>,
    latest: Mutex<Option<Vec<u8>>>,
}

impl ZenohMailbox {
    /// Bind a mailbox to `key` on an open session
    pub async fn declare(session: &Session, key: &str) -> Result<Self> {
        let subscriber = session
            .declare_subscriber(key.to_string())
            .await
            .map_err(transport_error)?;
        info!("Subscribed to: {}", key);

        Ok(Self {
            session: session.clone(),
            key: key.to_string(),
            subscriber,
            latest: Mutex::new(None),
        })
    }
}

fn transport_error(e: zenoh::Error) -> ExchangeError {
    ExchangeError::Transport(e.to_string())
}

impl Mailbox for ZenohMailbox {
    async fn write(&self, record: &[u8]) -> Result<()> {
        self.session
            .put(self.key.as_str(), record.to_vec())
            .await
            .map_err(transport_error)
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        let mut latest = self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drain all pending samples (non-blocking), keep latest
        while let Ok(Some(sample)) = self.subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            debug!("Sample on {}: {} bytes", self.key, payload.len());
            *latest = Some(payload.into_owned());
        }

        Ok(latest.clone())
    }

    fn describe(&self) -> String {
        format!("zenoh:{}", self.key)
    }
}
