//! The single active-listener slot fed by the transport reader task.
//!
//! Inbound chunks are routed to whichever listener currently occupies the
//! slot:
//!
//! ```text
//! reader task ──► ListenerSlot ──┬─► Idle           (chunk discarded, warn)
//!                                ├─► Collecting     (ResponseCollector → oneshot)
//!                                └─► Streaming      (StreamSink, persistent)
//! ```
//!
//! A pending response holds a [`PendingResponse`] guard. Dropping the guard
//! (success, error, timeout, or a cancelled future) returns the slot to
//! `Idle`, so a stale collector never leaks into the next operation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

use crate::error::{DeviceError, Result};
use crate::protocol::ResponseCollector;
use crate::stream::StreamSink;

enum Listener {
    Idle,
    Collecting {
        collector: ResponseCollector,
        done: oneshot::Sender<Bytes>,
    },
    Streaming(Box<dyn StreamSink>),
}

struct SlotState {
    listener: Listener,
    closed: bool,
}

/// Shared between the connection and its reader task.
pub(crate) struct ListenerSlot {
    state: Mutex<SlotState>,
}

impl ListenerSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState {
                listener: Listener::Idle,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A panicking sink must not wedge the connection.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach a collector for `expected` bytes.
    ///
    /// Must be called before writing the request so that no early byte is
    /// lost.
    pub(crate) fn attach(self: &Arc<Self>, expected: usize) -> Result<PendingResponse> {
        let mut state = self.lock();
        if state.closed {
            return Err(DeviceError::ConnectionClosed);
        }
        match state.listener {
            Listener::Idle => {}
            Listener::Streaming(_) => return Err(DeviceError::StreamingActive),
            Listener::Collecting { .. } => {
                // Unreachable through `&mut Connection`; guards always detach.
                return Err(DeviceError::InvalidArgument(
                    "Another operation is already pending".to_string(),
                ));
            }
        }

        let (done, rx) = oneshot::channel();
        state.listener = Listener::Collecting {
            collector: ResponseCollector::new(expected),
            done,
        };

        Ok(PendingResponse {
            slot: Arc::clone(self),
            rx: Some(rx),
        })
    }

    /// Install the persistent stream sink.
    pub(crate) fn attach_stream(&self, sink: Box<dyn StreamSink>) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(DeviceError::ConnectionClosed);
        }
        match state.listener {
            Listener::Idle => {
                state.listener = Listener::Streaming(sink);
                Ok(())
            }
            _ => Err(DeviceError::StreamingActive),
        }
    }

    /// Remove the stream sink (used when `BEGIN_STREAM` could not be written).
    pub(crate) fn detach_stream(&self) {
        let mut state = self.lock();
        if matches!(state.listener, Listener::Streaming(_)) {
            state.listener = Listener::Idle;
        }
    }

    fn detach_collector(&self) {
        let mut state = self.lock();
        if matches!(state.listener, Listener::Collecting { .. }) {
            state.listener = Listener::Idle;
        }
    }

    /// Route one inbound chunk to the active listener.
    pub(crate) fn dispatch(&self, chunk: Bytes) {
        let mut guard = self.lock();
        let state = &mut *guard;

        match &mut state.listener {
            Listener::Idle => {
                tracing::warn!("Discarding {} unsolicited bytes", chunk.len());
            }
            Listener::Streaming(sink) => sink.on_chunk(chunk),
            Listener::Collecting { collector, .. } => {
                let surplus = collector.push(&chunk);
                if surplus > 0 {
                    tracing::warn!("Discarding {} bytes beyond expected response", surplus);
                }
                if !collector.is_complete() {
                    return;
                }

                let finished = std::mem::replace(&mut state.listener, Listener::Idle);
                if let Listener::Collecting { collector, done } = finished {
                    // Receiver gone means the caller was cancelled; nothing to do.
                    let _ = done.send(collector.into_bytes());
                }
            }
        }
    }

    /// Mark the transport as closed and wake any pending waiter.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        if matches!(state.listener, Listener::Collecting { .. }) {
            // Dropping the sender fails the waiter with ConnectionClosed.
            state.listener = Listener::Idle;
        }
    }

    /// Whether the reader task has seen the transport end.
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.lock().listener {
            Listener::Idle => "Idle",
            Listener::Collecting { .. } => "Collecting",
            Listener::Streaming(_) => "Streaming",
        }
    }
}

/// Guard for the one outstanding response.
pub(crate) struct PendingResponse {
    slot: Arc<ListenerSlot>,
    rx: Option<oneshot::Receiver<Bytes>>,
}

impl PendingResponse {
    /// Wait for the collector to fill, optionally bounded by `timeout`.
    pub(crate) async fn wait(mut self, timeout: Option<Duration>) -> Result<Bytes> {
        let rx = self.rx.take().ok_or(DeviceError::ConnectionClosed)?;

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| DeviceError::ResponseTimeout(limit))?,
            None => rx.await,
        };

        received.map_err(|_| DeviceError::ConnectionClosed)
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.slot.detach_collector();
    }
}

/// Read loop: forwards every chunk read from the transport into the slot.
///
/// Chunks are at most `buffer_size` bytes. Returns when the transport
/// reaches EOF or fails; the slot is closed either way.
pub(crate) async fn read_loop<R>(mut reader: R, slot: Arc<ListenerSlot>, buffer_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Transport closed by peer");
                break;
            }
            Ok(n) => slot.dispatch(Bytes::copy_from_slice(&buf[..n])),
            Err(e) => {
                tracing::error!("Transport read error: {}", e);
                break;
            }
        }
    }

    slot.close();
}
