//! Message publisher implementations

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::domain::result::{Error, Result};
use crate::ports::MessagePublisher;

/// A message as handed to a publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: JsonValue,
}

/// Keeps published messages in memory
#[derive(Default)]
pub struct InMemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl MessagePublisher for InMemoryPublisher {
    fn publish(&self, topic: &str, payload: &JsonValue) -> Result<()> {
        self.messages
            .lock()
            .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))?
            .push(PublishedMessage {
                topic: topic.to_string(),
                payload: payload.clone(),
            });
        Ok(())
    }
}

/// One line of a JSON lines event log
#[derive(Debug, Serialize, Deserialize)]
pub struct EventLogLine {
    pub topic: String,
    pub payload: JsonValue,
    pub published_at: String,
}

/// Appends each message as one JSON object per line
pub struct JsonLinesPublisher {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessagePublisher for JsonLinesPublisher {
    fn publish(&self, topic: &str, payload: &JsonValue) -> Result<()> {
        let line = serde_json::to_string(&EventLogLine {
            topic: topic.to_string(),
            payload: payload.clone(),
            published_at: Utc::now().to_rfc3339(),
        })?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| Error::persistence(format!("lock poisoned: {}", e)))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Number of attempts a [`RetryingPublisher`] makes by default
pub const DEFAULT_PUBLISH_ATTEMPTS: u32 = 3;

/// First retry delay in milliseconds, doubled on every attempt
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Retries a failing publisher with exponential backoff
pub struct RetryingPublisher<P> {
    inner: P,
    attempts: u32,
    initial_delay: Duration,
}

impl<P: MessagePublisher> RetryingPublisher<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            attempts: DEFAULT_PUBLISH_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
        }
    }

    /// Total attempts, at least one
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: MessagePublisher> MessagePublisher for RetryingPublisher<P> {
    fn publish(&self, topic: &str, payload: &JsonValue) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.inner.publish(topic, payload) {
                Ok(()) => return Ok(()),
                Err(err) if attempt + 1 < self.attempts => {
                    let delay = self.initial_delay * 2u32.pow(attempt);
                    warn!(
                        topic,
                        attempt = attempt + 1,
                        max = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "publish failed, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
