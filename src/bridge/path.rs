//! Object path layout.

use crate::server::{DeviceKind, StreamKind};

/// Path of the core object; every other object lives below it.
pub const CORE_PATH: &str = "/org/pulseaudio/core1";

/// Type tag of card objects.
pub const CARD_TAG: &str = "card";
/// Type tag of card profile objects.
pub const PROFILE_TAG: &str = "profile";
/// Type tag of sink objects.
pub const SINK_TAG: &str = "sink";
/// Type tag of source objects.
pub const SOURCE_TAG: &str = "source";
/// Type tag of device port objects.
pub const PORT_TAG: &str = "port";
/// Type tag of playback stream objects.
pub const PLAYBACK_STREAM_TAG: &str = "playback_stream";
/// Type tag of record stream objects.
pub const RECORD_STREAM_TAG: &str = "record_stream";
/// Type tag of sample objects.
pub const SAMPLE_TAG: &str = "sample";
/// Type tag of module objects.
pub const MODULE_TAG: &str = "module";
/// Type tag of client objects.
pub const CLIENT_TAG: &str = "client";

/// `{parent}/{tag}{index}`.
pub fn object_path(parent: &str, tag: &str, index: u32) -> String {
    format!("{parent}/{tag}{index}")
}

/// Tag for a device kind.
pub fn device_tag(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Sink => SINK_TAG,
        DeviceKind::Source => SOURCE_TAG,
    }
}

/// Tag for a stream kind.
pub fn stream_tag(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Playback => PLAYBACK_STREAM_TAG,
        StreamKind::Record => RECORD_STREAM_TAG,
    }
}

/// Per-parent child numbering. Numbers are never reused, even after the
/// child they named is gone.
#[derive(Debug, Default)]
pub struct ChildCounter {
    next: u32,
}

impl ChildCounter {
    /// Take the next number and build the child path from it.
    pub fn allocate(&mut self, parent: &str, tag: &str) -> (u32, String) {
        let index = self.next;
        self.next += 1;
        (index, object_path(parent, tag, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_paths() {
        assert_eq!(
            object_path(CORE_PATH, device_tag(DeviceKind::Sink), 3),
            "/org/pulseaudio/core1/sink3"
        );
        assert_eq!(
            object_path(CORE_PATH, stream_tag(StreamKind::Record), 0),
            "/org/pulseaudio/core1/record_stream0"
        );
    }

    #[test]
    fn child_numbers_are_not_reused() {
        let parent = "/org/pulseaudio/core1/card0";
        let mut counter = ChildCounter::default();

        let (first, first_path) = counter.allocate(parent, PROFILE_TAG);
        let (second, _) = counter.allocate(parent, PROFILE_TAG);

        assert_eq!((first, second), (0, 1));
        assert_eq!(first_path, "/org/pulseaudio/core1/card0/profile0");
        assert_eq!(counter.allocate(parent, PROFILE_TAG).0, 2);
    }
}
