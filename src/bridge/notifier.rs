//! Change-only signal emission.

use std::sync::Arc;

use tracing::trace;

use crate::bus::{Signal, SignalSink, Variant};

/// Last value announced for one observable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    value: T,
}

impl<T: PartialEq> Cached<T> {
    /// Start from the value the entity had when its proxy was built.
    pub fn new(initial: T) -> Self {
        Self { value: initial }
    }

    /// Last announced value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Store `new` if it differs. Returns whether it did.
    pub fn replace(&mut self, new: T) -> bool {
        if self.value == new {
            return false;
        }
        self.value = new;
        true
    }
}

/// Emits bus signals for observed changes.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn SignalSink>,
}

impl Notifier {
    /// Notifier writing to `sink`.
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        Self { sink }
    }

    /// Emit a signal unconditionally.
    pub fn emit(&self, signal: Signal) {
        trace!(path = %signal.path, signal = %signal.qualified_name(), "emit");
        self.sink.send(signal);
    }

    /// Compare `new` with the cached value; on a difference update the cache
    /// and emit `member` with the encoded new value. Returns whether a signal
    /// went out.
    pub fn apply<T, F>(
        &self,
        path: &str,
        interface: &'static str,
        member: &'static str,
        cache: &mut Cached<T>,
        new: T,
        encode: F,
    ) -> bool
    where
        T: PartialEq,
        F: FnOnce(&T) -> Variant,
    {
        if !cache.replace(new) {
            return false;
        }
        self.emit(Signal::new(path, interface, member).with_arg(encode(cache.get())));
        true
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingSink;

    #[test]
    fn apply_emits_only_on_change() {
        let sink = RecordingSink::new();
        let notifier = Notifier::new(Arc::new(sink.clone()));
        let mut mute = Cached::new(false);

        assert!(!notifier.apply("/o", "x.Y", "MuteUpdated", &mut mute, false, |m| (*m).into()));
        assert!(notifier.apply("/o", "x.Y", "MuteUpdated", &mut mute, true, |m| (*m).into()));
        assert!(!notifier.apply("/o", "x.Y", "MuteUpdated", &mut mute, true, |m| (*m).into()));

        let signals = sink.take();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].args, vec![Variant::Bool(true)]);
        assert!(*mute.get());
    }
}
