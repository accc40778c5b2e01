use std::sync::{Arc, Mutex, MutexGuard};

use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use super::Variant;

/// One outgoing bus signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Emitting object
    pub path: String,
    /// Interface declaring the signal
    pub interface: &'static str,
    /// Signal name
    pub member: &'static str,
    /// Arguments in order
    pub args: Vec<Variant>,
}

impl Signal {
    /// Signal without arguments.
    pub fn new(path: impl Into<String>, interface: &'static str, member: &'static str) -> Self {
        Self {
            path: path.into(),
            interface,
            member,
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn with_arg(mut self, arg: impl Into<Variant>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `interface.member`, the name listeners subscribe with.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.interface, self.member)
    }
}

/// Destination for emitted signals.
pub trait SignalSink: Send + Sync {
    /// Deliver one signal. Must not block.
    fn send(&self, signal: Signal);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Keeps every signal in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Signal> {
        std::mem::take(&mut *lock(&self.signals))
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<Signal> {
        lock(&self.signals).clone()
    }

    /// Recorded signals named `member`.
    pub fn named(&self, member: &str) -> Vec<Signal> {
        lock(&self.signals)
            .iter()
            .filter(|s| s.member == member)
            .cloned()
            .collect()
    }

    /// Number of recorded signals.
    pub fn len(&self) -> usize {
        lock(&self.signals).len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.signals).is_empty()
    }
}

impl SignalSink for RecordingSink {
    fn send(&self, signal: Signal) {
        lock(&self.signals).push(signal);
    }
}

/// Fans signals out to any number of async subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Signal>,
}

impl BroadcastSink {
    /// Sink buffering up to `capacity` signals per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Raw receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Stream of signals emitted from now on.
    ///
    /// A subscriber that falls behind skips the signals it missed.
    pub fn signals(&self) -> impl Stream<Item = Signal> + Send + 'static {
        let mut rx = self.tx.subscribe();
        stream! {
            loop {
                match rx.recv().await {
                    Ok(signal) => yield signal,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "signal subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

impl SignalSink for BroadcastSink {
    fn send(&self, signal: Signal) {
        if self.tx.send(signal).is_err() {
            trace!("signal dropped, no subscribers");
        }
    }
}

/// Delivers every signal to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn SignalSink>>,
}

impl FanoutSink {
    /// Fan out to `sinks`.
    pub fn new(sinks: Vec<Arc<dyn SignalSink>>) -> Self {
        Self { sinks }
    }
}

impl SignalSink for FanoutSink {
    fn send(&self, signal: Signal) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.send(signal.clone());
            }
            last.send(signal);
        }
    }
}
