//! Event emission towards the replication writer

use crate::ChangeEvent;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The emitter was asked to stop while (or before) handing over an event
    #[error("Interrupted while emitting an event")]
    Interrupted,
}

/// Sink for normalized events.
///
/// `emit` may block to apply backpressure. It is only ever called from the
/// single processing thread.
pub trait EventEmitter: Send {
    fn emit(&self, event: ChangeEvent) -> Result<(), EmitError>;
}

impl<E: EventEmitter + ?Sized> EventEmitter for Box<E> {
    fn emit(&self, event: ChangeEvent) -> Result<(), EmitError> {
        (**self).emit(event)
    }
}

impl<E: EventEmitter + Sync + ?Sized> EventEmitter for Arc<E> {
    fn emit(&self, event: ChangeEvent) -> Result<(), EmitError> {
        (**self).emit(event)
    }
}

/// Emitter backed by a bounded queue. A full queue blocks the caller.
pub struct QueueEmitter {
    tx: Sender<ChangeEvent>,
    wake: Receiver<()>,
    // keeps the wake channel connected after every StopHandle is dropped
    _wake_tx: Sender<()>,
    stopped: Arc<AtomicBool>,
}

/// Interrupts pending and future `emit` calls of a [`QueueEmitter`]
#[derive(Clone)]
pub struct StopHandle {
    wake: Sender<()>,
    stopped: Arc<AtomicBool>,
}

/// Receiving end of a [`QueueEmitter`]
pub struct EventQueue {
    rx: Receiver<ChangeEvent>,
}

impl QueueEmitter {
    pub fn bounded(capacity: usize) -> (QueueEmitter, EventQueue, StopHandle) {
        let (tx, rx) = channel::bounded(capacity);
        let (wake_tx, wake_rx) = channel::bounded(1);
        let stopped = Arc::new(AtomicBool::new(false));

        let emitter = QueueEmitter {
            tx,
            wake: wake_rx,
            _wake_tx: wake_tx.clone(),
            stopped: stopped.clone(),
        };
        let handle = StopHandle {
            wake: wake_tx,
            stopped,
        };
        (emitter, EventQueue { rx }, handle)
    }
}

impl EventEmitter for QueueEmitter {
    fn emit(&self, event: ChangeEvent) -> Result<(), EmitError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(EmitError::Interrupted);
        }

        crossbeam::select! {
            send(self.tx, event) -> res => res.map_err(|_| {
                debug!("Event queue receiver dropped");
                EmitError::Interrupted
            }),
            recv(self.wake) -> _ => Err(EmitError::Interrupted),
        }
    }
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.wake.try_send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl EventQueue {
    /// Block until the next event, `None` once the emitter is gone
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.rx.recv().ok()
    }

    /// Everything currently queued, without blocking
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl IntoIterator for EventQueue {
    type Item = ChangeEvent;
    type IntoIter = channel::IntoIter<ChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}
