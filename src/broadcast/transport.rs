//! # Broadcast Transports
//!
//! A transport moves raw JSON messages between every listener of a named
//! channel, the sender's own listeners included. Validation and `is_self`
//! classification happen in the bus, never here.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::errors::{BroadcastError, BroadcastResult};
use crate::observability::{log_event_with_fields, Event};

/// Callback invoked with each raw message on a channel
pub type RawListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Moves messages between contexts sharing a channel name
pub trait BroadcastTransport: Send + Sync + fmt::Debug {
    /// Publish a message to every listener of `channel`
    fn post(&self, channel: &str, message: Value) -> BroadcastResult<()>;

    /// Register a listener until `cancel` fires
    fn listen(
        &self,
        channel: &str,
        listener: RawListener,
        cancel: CancellationToken,
    ) -> BroadcastResult<()>;

    /// Short transport name for logs
    fn name(&self) -> &'static str;
}

struct Registration {
    listener: RawListener,
    cancel: CancellationToken,
}

/// In-process registry of channel listeners.
///
/// Delivery is synchronous on the posting thread, so a sender observes its
/// own message before `post` returns. Each test or embedding owns its
/// registry; nothing is process-global.
#[derive(Default)]
pub struct InProcessTransport {
    channels: RwLock<HashMap<String, Vec<Registration>>>,
}

impl InProcessTransport {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live listeners on a channel
    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .map(|channels| {
                channels
                    .get(channel)
                    .map(|regs| regs.iter().filter(|r| !r.cancel.is_cancelled()).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Drop every listener on every channel
    pub fn dispose(&self) {
        if let Ok(mut channels) = self.channels.write() {
            channels.clear();
        }
    }
}

impl fmt::Debug for InProcessTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<String> = self
            .channels
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("InProcessTransport")
            .field("channels", &channels)
            .finish()
    }
}

impl BroadcastTransport for InProcessTransport {
    fn post(&self, channel: &str, message: Value) -> BroadcastResult<()> {
        // Listeners run outside the lock so they may post or listen themselves
        let targets: Vec<(RawListener, CancellationToken)> = {
            let mut channels = self
                .channels
                .write()
                .map_err(|_| BroadcastError::Internal("Lock poisoned".into()))?;

            match channels.get_mut(channel) {
                Some(regs) => {
                    regs.retain(|r| !r.cancel.is_cancelled());
                    regs.iter()
                        .map(|r| (Arc::clone(&r.listener), r.cancel.clone()))
                        .collect()
                }
                None => Vec::new(),
            }
        };

        for (listener, cancel) in targets {
            if !cancel.is_cancelled() {
                listener(message.clone());
            }
        }

        Ok(())
    }

    fn listen(
        &self,
        channel: &str,
        listener: RawListener,
        cancel: CancellationToken,
    ) -> BroadcastResult<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let mut channels = self
            .channels
            .write()
            .map_err(|_| BroadcastError::Internal("Lock poisoned".into()))?;
        channels
            .entry(channel.to_string())
            .or_default()
            .push(Registration { listener, cancel });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

/// Default period at which native listeners look for new messages
pub const DEFAULT_NATIVE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A channel log is restarted once it grows past this many bytes
pub const DEFAULT_NATIVE_LOG_LIMIT: u64 = 1024 * 1024;

/// Cross-process transport over append-only channel logs.
///
/// Every channel is one file of JSON lines under a shared directory. `post`
/// appends a line; each listener tails the file from where it was when it
/// started listening. Any process opening the same directory takes part,
/// the poster's own listeners included. Delivery is asynchronous and needs
/// a running tokio runtime.
///
/// Once a log passes the size limit the next poster truncates it. Listeners
/// notice the shorter file and restart from its beginning; messages posted
/// around a restart may be missed, which hint receivers tolerate.
#[derive(Debug)]
pub struct NativeTransport {
    dir: PathBuf,
    poll_interval: Duration,
    log_limit: u64,
    // Serializes appends from this process
    append: Mutex<()>,
}

impl NativeTransport {
    /// Open (creating if needed) the channel directory
    pub fn open(dir: impl Into<PathBuf>) -> BroadcastResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            BroadcastError::TransportUnavailable(format!("{}: {}", dir.display(), e))
        })?;

        Ok(Self {
            dir,
            poll_interval: DEFAULT_NATIVE_POLL_INTERVAL,
            log_limit: DEFAULT_NATIVE_LOG_LIMIT,
            append: Mutex::new(()),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_log_limit(mut self, log_limit: u64) -> Self {
        self.log_limit = log_limit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, channel: &str) -> PathBuf {
        let file_name: String = channel
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.log", file_name))
    }

    fn append_line(&self, path: &Path, line: &[u8]) -> io::Result<bool> {
        let oversized = match fs::metadata(path) {
            Ok(metadata) => metadata.len() >= self.log_limit,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };
        if oversized {
            fs::File::create(path)?;
        }

        // One write call per message keeps concurrent appenders from interleaving
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line)?;
        Ok(oversized)
    }
}

impl BroadcastTransport for NativeTransport {
    fn post(&self, channel: &str, message: Value) -> BroadcastResult<()> {
        let mut line =
            serde_json::to_vec(&message).map_err(|e| BroadcastError::Serialization(e.to_string()))?;
        line.push(b'\n');

        let path = self.log_path(channel);
        let truncated = {
            let _guard = self
                .append
                .lock()
                .map_err(|_| BroadcastError::Internal("Lock poisoned".into()))?;
            self.append_line(&path, &line)
                .map_err(|e| BroadcastError::TransportUnavailable(format!("{}: {}", path.display(), e)))?
        };

        if truncated {
            log_event_with_fields(Event::BroadcastLogRestarted, &[("channel", channel)]);
        }
        Ok(())
    }

    fn listen(
        &self,
        channel: &str,
        listener: RawListener,
        cancel: CancellationToken,
    ) -> BroadcastResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BroadcastError::TransportUnavailable(e.to_string()))?;

        let path = self.log_path(channel);
        // Only messages posted from now on
        let mut tail = LogTail {
            offset: fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
            partial: Vec::new(),
        };
        let channel = channel.to_string();
        let poll_interval = self.poll_interval;

        runtime.spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let lines = match tail.read_new(&path).await {
                    Ok(lines) => lines,
                    Err(e) => {
                        log_event_with_fields(
                            Event::BroadcastTailFailed,
                            &[("channel", channel.as_str()), ("error", e.to_string().as_str())],
                        );
                        continue;
                    }
                };

                for line in lines {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match serde_json::from_slice::<Value>(&line) {
                        Ok(message) => listener(message),
                        Err(e) => log_event_with_fields(
                            Event::BroadcastMessageDropped,
                            &[("channel", channel.as_str()), ("reason", e.to_string().as_str())],
                        ),
                    }
                }
            }
        });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Read position of one listener in a channel log
struct LogTail {
    offset: u64,
    // Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
}

impl LogTail {
    /// Complete lines appended since the last call, newlines stripped
    async fn read_new(&mut self, path: &Path) -> io::Result<Vec<Vec<u8>>> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            // Restarted by a poster
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut appended = Vec::new();
        file.take(len - self.offset).read_to_end(&mut appended).await?;
        self.offset += appended.len() as u64;
        self.partial.extend_from_slice(&appended);

        let mut lines = Vec::new();
        while let Some(end) = self.partial.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=end).collect();
            line.pop();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}
