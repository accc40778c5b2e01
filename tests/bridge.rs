//! Integration tests for the object registry and change notification.

#![allow(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use pulsebridge::{
    bridge::{
        Bridge, CORE_PATH, EntityKind, InvariantViolation, Notifier, Registry,
        interface::{
            CARD_INTERFACE, CLIENT_INTERFACE, CORE_INTERFACE, DEVICE_INTERFACE,
            DEVICE_PORT_INTERFACE, MODULE_INTERFACE, SAMPLE_INTERFACE, STREAM_INTERFACE,
        },
        registry::NewEntity,
    },
    bus::{Caller, ErrorKind, ListenerRegistry, RecordingSink, Signal, Variant},
    config::BridgeConfig,
    server::{
        ChannelMap, CoreEvent, DeviceId, DeviceKind, Hook, NewCard, NewClient, NewDevice,
        NewStream, PortAvailable, PortData, ProfileData, Proplist, SampleContents, SampleSpec,
        ServerCore, ServerInfo, StreamId, StreamKind, UpdateMode, volume::VOLUME_NORM,
    },
};

fn core() -> ServerCore {
    ServerCore::new(ServerInfo::local("pulseaudio", "8.0"))
}

fn setup_bridge_with(config: BridgeConfig) -> (Bridge, RecordingSink) {
    let signals = RecordingSink::new();
    let bridge = Bridge::new(core(), config, Arc::new(signals.clone()));
    (bridge, signals)
}

fn setup_bridge() -> (Bridge, RecordingSink) {
    setup_bridge_with(BridgeConfig::default())
}

fn caller() -> Caller {
    Caller::anonymous(":1.42")
}

fn sink(name: &str) -> NewDevice {
    NewDevice {
        name: name.to_string(),
        driver: "test".to_string(),
        ..Default::default()
    }
}

fn add_sink(bridge: &mut Bridge, name: &str) -> u32 {
    bridge
        .mutate(|core| core.add_device(DeviceKind::Sink, sink(name)))
        .unwrap()
}

fn profile(name: &str) -> ProfileData {
    ProfileData {
        name: name.to_string(),
        description: name.to_string(),
        sinks: 1,
        sources: 0,
        priority: 100,
        available: true,
    }
}

fn add_card(bridge: &mut Bridge, profiles: &[&str]) -> u32 {
    let new = NewCard {
        name: "alsa_card.test".to_string(),
        driver: "test".to_string(),
        profiles: profiles.iter().map(|name| profile(name)).collect(),
        active_profile: profiles.first().map(|name| (*name).to_string()),
        ..Default::default()
    };
    bridge.mutate(|core| core.add_card(new)).unwrap()
}

fn members(signals: &[Signal]) -> Vec<&'static str> {
    signals.iter().map(|s| s.member).collect()
}

fn path_arg(signal: &Signal) -> &str {
    signal.args[0].as_object_path().unwrap()
}

fn sink_path(index: u32) -> String {
    format!("{CORE_PATH}/sink{index}")
}

fn property_names(values: &[(String, Variant)]) -> Vec<&str> {
    values.iter().map(|(name, _)| name.as_str()).collect()
}

mod lifecycle {
    use super::*;

    #[test]
    fn first_sink_announces_itself_its_monitor_and_fallbacks() {
        let (mut bridge, signals) = setup_bridge();

        add_sink(&mut bridge, "out");

        let emitted = signals.take();
        assert_eq!(
            members(&emitted),
            [
                "NewSource",
                "FallbackSourceUpdated",
                "NewSink",
                "FallbackSinkUpdated"
            ]
        );
        assert!(emitted.iter().all(|s| s.path == CORE_PATH));
        assert_eq!(path_arg(&emitted[0]), format!("{CORE_PATH}/source0"));
        assert_eq!(path_arg(&emitted[2]), sink_path(0));
        assert_eq!(path_arg(&emitted[3]), sink_path(0));
    }

    #[test]
    fn removing_last_sink_unsets_fallbacks() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_sink(&mut bridge, "out");
        signals.take();

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(index)))
            .unwrap();

        let emitted = signals.take();
        assert_eq!(
            members(&emitted),
            [
                "SinkRemoved",
                "SourceRemoved",
                "FallbackSourceUnset",
                "FallbackSinkUnset"
            ]
        );
        assert_eq!(path_arg(&emitted[0]), sink_path(0));
        assert!(emitted[3].args.is_empty());
    }

    #[test]
    fn removing_default_sink_moves_fallback_to_next() {
        let (mut bridge, signals) = setup_bridge();
        let first = add_sink(&mut bridge, "a");
        add_sink(&mut bridge, "b");
        signals.take();

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(first)))
            .unwrap();

        let updated = signals.named("FallbackSinkUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(path_arg(&updated[0]), sink_path(1));
        assert!(signals.named("FallbackSinkUnset").is_empty());
    }

    #[test]
    fn fourth_sink_is_reachable_by_index_and_path() {
        let (mut bridge, _signals) = setup_bridge();
        for name in ["a", "b", "c", "d"] {
            add_sink(&mut bridge, name);
        }

        let kind = EntityKind::Device(DeviceKind::Sink);
        let registry = bridge.registry();
        let proxy = registry.lookup_by_index(kind, 3).unwrap();
        assert_eq!(proxy.path(), sink_path(3));
        let by_path = registry.lookup_by_path(kind, &sink_path(3)).unwrap();
        assert_eq!(by_path.index(), 3);
        assert_eq!(by_path.path(), proxy.path());

        let listed = bridge
            .get_property(&caller(), CORE_PATH, CORE_INTERFACE, "Sinks")
            .unwrap();
        assert_eq!(listed.as_path_array().map(<[String]>::len), Some(4));
    }

    #[test]
    fn lookup_of_missing_sink_names_the_key() {
        let (mut bridge, _signals) = setup_bridge();
        add_sink(&mut bridge, "a");

        let kind = EntityKind::Device(DeviceKind::Sink);
        let missing = bridge.registry().lookup_by_path(kind, &sink_path(9)).unwrap_err();

        assert_eq!(
            missing.to_string(),
            "/org/pulseaudio/core1/sink9: No such sink."
        );
        assert!(bridge.registry().lookup_by_index(kind, 9).is_err());
    }

    #[test]
    fn proxy_releases_entity_after_removal() {
        let (mut bridge, _signals) = setup_bridge();
        let index = add_sink(&mut bridge, "out");
        let entity = bridge.core().device(DeviceId::sink(index)).unwrap().clone();
        assert!(entity.ref_count() > 2);

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(index)))
            .unwrap();

        assert_eq!(entity.ref_count(), 1);
        assert!(bridge.registry().path_of(EntityKind::Device(DeviceKind::Sink), index).is_none());
    }

    #[test]
    fn shutdown_releases_every_hook_silently() {
        let (mut bridge, signals) = setup_bridge();
        add_card(&mut bridge, &["a"]);
        add_sink(&mut bridge, "out");
        let before = signals.len();

        let core = bridge.shutdown();

        assert_eq!(core.hooks().slot_count(), 0);
        assert_eq!(signals.len(), before);
        assert_eq!(core.devices(DeviceKind::Sink).count(), 1);
    }
}

mod ordering {
    use super::*;

    fn add_playback(bridge: &mut Bridge, device: u32) -> u32 {
        bridge
            .mutate(|core| {
                core.add_stream(
                    StreamKind::Playback,
                    NewStream {
                        driver: "test".to_string(),
                        device,
                        ..Default::default()
                    },
                )
            })
            .unwrap()
    }

    fn signals_named<'a>(signals: &'a [Signal], member: &str) -> Vec<&'a Signal> {
        signals.iter().filter(|s| s.member == member).collect()
    }

    #[test]
    fn removed_sink_is_never_named_again() {
        let (mut bridge, signals) = setup_bridge();
        let gone = add_sink(&mut bridge, "a");
        let kept = add_sink(&mut bridge, "b");
        add_playback(&mut bridge, gone);
        signals.take();

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(gone)))
            .unwrap();

        let emitted = signals.take();
        let removed_at = emitted
            .iter()
            .position(|s| s.member == "SinkRemoved")
            .unwrap();
        let gone_path = Variant::path(sink_path(gone));
        assert_eq!(emitted[removed_at].args, vec![gone_path.clone()]);

        let stream_removed_at = emitted
            .iter()
            .position(|s| s.member == "PlaybackStreamRemoved")
            .unwrap();
        assert!(stream_removed_at < removed_at);

        for later in &emitted[removed_at + 1..] {
            assert_ne!(later.path, sink_path(gone), "{} came from a removed sink", later.member);
            assert!(
                !later.args.contains(&gone_path),
                "{} names a removed sink",
                later.member
            );
        }
        let fallback = signals_named(&emitted, "FallbackSinkUpdated");
        assert_eq!(fallback.len(), 1);
        assert_eq!(path_arg(fallback[0]), sink_path(kept));
    }
}

mod properties {
    use super::*;

    #[test]
    fn identical_volume_writes_signal_once() {
        let (mut bridge, signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));
        let volume = Variant::U32Array(vec![50, 50]);

        for _ in 0..2 {
            bridge
                .set_property(&caller(), &path, DEVICE_INTERFACE, "Volume", &volume)
                .unwrap();
        }

        let updated = signals.named("VolumeUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].path, path);
        assert_eq!(updated[0].args, vec![volume]);
    }

    #[test]
    fn single_volume_value_applies_to_every_channel() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        bridge
            .set_property(
                &caller(),
                &path,
                DEVICE_INTERFACE,
                "Volume",
                &Variant::U32Array(vec![1000]),
            )
            .unwrap();

        let volume = bridge
            .get_property(&caller(), &path, DEVICE_INTERFACE, "Volume")
            .unwrap();
        assert_eq!(volume, Variant::U32Array(vec![1000, 1000]));
    }

    #[test]
    fn empty_volume_is_rejected_and_leaves_volume_alone() {
        let (mut bridge, signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        let error = bridge
            .set_property(
                &caller(),
                &path,
                DEVICE_INTERFACE,
                "Volume",
                &Variant::U32Array(Vec::new()),
            )
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidArgs);
        let volume = bridge
            .get_property(&caller(), &path, DEVICE_INTERFACE, "Volume")
            .unwrap();
        assert_eq!(volume, Variant::U32Array(vec![VOLUME_NORM, VOLUME_NORM]));
        assert!(signals.named("VolumeUpdated").is_empty());
    }

    #[test]
    fn mismatched_channel_count_is_rejected() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        let error = bridge
            .set_property(
                &caller(),
                &path,
                DEVICE_INTERFACE,
                "Volume",
                &Variant::U32Array(vec![1, 2, 3]),
            )
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidArgs);
    }

    #[test]
    fn read_only_property_write_is_denied() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        let error = bridge
            .set_property(
                &caller(),
                &path,
                DEVICE_INTERFACE,
                "Name",
                &Variant::from("renamed"),
            )
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::AccessDenied);
        assert_eq!(
            error.message,
            "org.PulseAudio.Core1.Device.Name: Property not settable"
        );
    }

    #[test]
    fn wrongly_typed_write_is_rejected() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        let error = bridge
            .set_property(&caller(), &path, DEVICE_INTERFACE, "Mute", &Variant::U32(1))
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidArgs);
    }

    #[test]
    fn unknown_members_are_reported_by_layer() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));
        let get = |path: &str, interface: &str, property: &str| {
            bridge
                .get_property(&caller(), path, interface, property)
                .unwrap_err()
                .kind
        };

        assert_eq!(get(&sink_path(7), DEVICE_INTERFACE, "Name"), ErrorKind::UnknownObject);
        assert_eq!(get(&path, "org.example.Nope", "Name"), ErrorKind::UnknownInterface);
        assert_eq!(get(&path, DEVICE_INTERFACE, "Loudness"), ErrorKind::UnknownProperty);
    }

    #[test]
    fn empty_interface_searches_every_interface() {
        let (mut bridge, _signals) = setup_bridge();
        let path = sink_path(add_sink(&mut bridge, "out"));

        let monitor = bridge
            .get_property(&caller(), &path, "", "MonitorSource")
            .unwrap();

        assert_eq!(monitor.as_object_path(), Some("/org/pulseaudio/core1/source0"));
    }

    #[test]
    fn fallback_sink_follows_writes() {
        let (mut bridge, signals) = setup_bridge();
        add_sink(&mut bridge, "a");
        add_sink(&mut bridge, "b");
        signals.take();

        bridge
            .set_property(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "FallbackSink",
                &Variant::path(sink_path(1)),
            )
            .unwrap();

        assert_eq!(bridge.core().default_sink(), Some(1));
        let updated = signals.named("FallbackSinkUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(path_arg(&updated[0]), sink_path(1));

        let error = bridge
            .set_property(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "FallbackSink",
                &Variant::path(sink_path(5)),
            )
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[test]
    fn fallback_sink_is_unavailable_without_sinks() {
        let (bridge, _signals) = setup_bridge();

        let error = bridge
            .get_property(&caller(), CORE_PATH, CORE_INTERFACE, "FallbackSink")
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn property_list_signal_fires_only_on_difference() {
        let (mut bridge, signals) = setup_bridge();
        let index = bridge
            .mutate(|core| {
                core.add_device(
                    DeviceKind::Sink,
                    NewDevice {
                        proplist: Proplist::new().with_str("device.icon_name", "audio-card"),
                        ..sink("out")
                    },
                )
            })
            .unwrap();
        let update = Proplist::new().with_str("device.description", "Speakers");
        let full = Proplist::new()
            .with_str("device.icon_name", "audio-card")
            .with_str("device.description", "Speakers");

        for _ in 0..2 {
            bridge
                .mutate(|core| {
                    core.update_device_proplist(DeviceId::sink(index), UpdateMode::Replace, &update)
                })
                .unwrap();
        }

        let updated = signals.named("PropertyListUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].path, sink_path(index));
        assert_eq!(updated[0].args, vec![Variant::from(&full)]);
    }

    #[test]
    fn my_client_needs_a_backing_client() {
        let (bridge, _signals) = setup_bridge();

        let error = bridge
            .get_property(&caller(), CORE_PATH, CORE_INTERFACE, "MyClient")
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Unavailable);
    }
}

mod cards {
    use super::*;

    #[test]
    fn profile_paths_are_never_reused() {
        let (mut bridge, signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a"]);
        let card_path = format!("{CORE_PATH}/card{card}");

        bridge
            .mutate(|core| core.add_card_profile(card, profile("b")))
            .unwrap();
        bridge
            .mutate(|core| core.remove_card_profile(card, "b"))
            .unwrap();
        bridge
            .mutate(|core| core.add_card_profile(card, profile("c")))
            .unwrap();

        let added = signals.named("NewProfile");
        assert_eq!(path_arg(&added[0]), format!("{card_path}/profile1"));
        assert_eq!(path_arg(&added[1]), format!("{card_path}/profile2"));
        let removed = signals.named("ProfileRemoved");
        assert_eq!(path_arg(&removed[0]), format!("{card_path}/profile1"));

        let profiles = bridge
            .get_property(&caller(), &card_path, CARD_INTERFACE, "Profiles")
            .unwrap();
        assert_eq!(
            profiles,
            Variant::PathArray(vec![
                format!("{card_path}/profile0"),
                format!("{card_path}/profile2"),
            ])
        );
    }

    #[test]
    fn initial_profiles_take_the_first_numbers() {
        let (mut bridge, _signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a", "b", "c"]);
        let card_path = format!("{CORE_PATH}/card{card}");

        bridge
            .mutate(|core| core.add_card_profile(card, profile("d")))
            .unwrap();

        let reply = bridge
            .call_method(
                &caller(),
                &card_path,
                CARD_INTERFACE,
                "GetProfileByName",
                &[Variant::from("d")],
            )
            .unwrap();
        assert_eq!(
            reply,
            vec![Variant::path(format!("{card_path}/profile3"))]
        );
    }

    #[test]
    fn active_profile_write_signals_once() {
        let (mut bridge, signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a", "off"]);
        let card_path = format!("{CORE_PATH}/card{card}");
        let off = Variant::path(format!("{card_path}/profile1"));

        for _ in 0..2 {
            bridge
                .set_property(&caller(), &card_path, CARD_INTERFACE, "ActiveProfile", &off)
                .unwrap();
        }

        let updated = signals.named("ActiveProfileUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].args, vec![off]);
    }

    #[test]
    fn removing_active_profile_is_refused() {
        let (mut bridge, signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a"]);

        let result = bridge.mutate(|core| core.remove_card_profile(card, "a"));

        assert!(result.is_err());
        assert!(signals.named("ProfileRemoved").is_empty());
    }

    #[test]
    fn get_all_tracks_attached_devices() {
        let (mut bridge, _signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a"]);
        let card_path = format!("{CORE_PATH}/card{card}");
        let index = bridge
            .mutate(|core| {
                core.add_device(
                    DeviceKind::Sink,
                    NewDevice {
                        card: Some(card),
                        ..sink("out")
                    },
                )
            })
            .unwrap();

        let before = bridge.get_all(&caller(), &card_path, CARD_INTERFACE).unwrap();
        let sinks = before.iter().find(|(name, _)| name == "Sinks").unwrap();
        assert_eq!(sinks.1, Variant::PathArray(vec![sink_path(index)]));
        assert!(!property_names(&before).contains(&"OwnerModule"));

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(index)))
            .unwrap();

        let after = bridge.get_all(&caller(), &card_path, CARD_INTERFACE).unwrap();
        for (name, value) in &after {
            if name == "Sinks" || name == "Sources" {
                assert_eq!(*value, Variant::PathArray(Vec::new()));
            }
        }
        assert_eq!(property_names(&before), property_names(&after));
    }

    fn card_sinks(bridge: &Bridge, card_path: &str) -> Vec<String> {
        let all = bridge.get_all(&caller(), card_path, CARD_INTERFACE).unwrap();
        let (_, sinks) = all.into_iter().find(|(name, _)| name == "Sinks").unwrap();
        sinks.as_path_array().unwrap().to_vec()
    }

    fn card_sink(name: &str, card: u32) -> NewDevice {
        NewDevice {
            card: Some(card),
            ..sink(name)
        }
    }

    #[test]
    fn get_all_lists_only_live_devices_around_a_removal() {
        let (mut bridge, _signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a"]);
        let card_path = format!("{CORE_PATH}/card{card}");
        let first = bridge
            .mutate(|core| core.add_device(DeviceKind::Sink, card_sink("first", card)))
            .unwrap();
        let second = bridge
            .mutate(|core| core.add_device(DeviceKind::Sink, card_sink("second", card)))
            .unwrap();

        let before = card_sinks(&bridge, &card_path);
        assert_eq!(before, [sink_path(first), sink_path(second)]);
        for path in &before {
            assert!(bridge.get_property(&caller(), path, DEVICE_INTERFACE, "Name").is_ok());
        }

        bridge
            .mutate(|core| core.remove_device(DeviceId::sink(first)))
            .unwrap();

        let after = card_sinks(&bridge, &card_path);
        assert_eq!(after, [sink_path(second)]);
        for path in &after {
            assert!(bridge.get_property(&caller(), path, DEVICE_INTERFACE, "Name").is_ok());
        }
        let error = bridge
            .get_property(&caller(), &sink_path(first), DEVICE_INTERFACE, "Name")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownObject);
    }

    #[test]
    fn introspection_lists_profiles_relative_to_card() {
        let (mut bridge, _signals) = setup_bridge();
        let card = add_card(&mut bridge, &["a", "b"]);

        let xml = bridge.introspect(&format!("{CORE_PATH}/card{card}")).unwrap();

        assert!(xml.contains("<node name=\"profile0\"/>"));
        assert!(xml.contains("<node name=\"profile1\"/>"));
        assert!(xml.contains(CARD_INTERFACE));
    }
}

mod samples {
    use super::*;

    fn upload_args(format: u32, rate: u32, data: Vec<u8>) -> Vec<Variant> {
        vec![
            Variant::from("bell"),
            Variant::U32(format),
            Variant::U32(rate),
            Variant::U32Array(vec![0, 1]),
            Variant::U32Array(Vec::new()),
            Variant::Proplist(BTreeMap::new()),
            Variant::Bytes(data),
        ]
    }

    fn upload(bridge: &mut Bridge, args: &[Variant]) -> Result<Vec<Variant>, String> {
        bridge
            .call_method(&caller(), CORE_PATH, CORE_INTERFACE, "UploadSample", args)
            .map_err(|e| e.message)
    }

    #[test]
    fn upload_checks_format_before_data() {
        let (mut bridge, _signals) = setup_bridge();

        assert_eq!(
            upload(&mut bridge, &upload_args(99, 44_100, Vec::new())),
            Err("Invalid sample format: 99".to_string())
        );
        assert_eq!(
            upload(&mut bridge, &upload_args(3, 0, Vec::new())),
            Err("Invalid sample rate: 0".to_string())
        );
        assert_eq!(
            upload(&mut bridge, &upload_args(3, 44_100, Vec::new())),
            Err("Empty data.".to_string())
        );
        assert_eq!(
            upload(&mut bridge, &upload_args(3, 44_100, vec![0; 3])),
            Err("The sample length in bytes doesn't divide with the frame size.".to_string())
        );
    }

    #[test]
    fn reupload_under_same_name_keeps_the_object() {
        let (mut bridge, signals) = setup_bridge();

        let first = upload(&mut bridge, &upload_args(3, 44_100, vec![0; 8])).unwrap();
        let second = upload(&mut bridge, &upload_args(3, 44_100, vec![0; 16])).unwrap();

        assert_eq!(first, vec![Variant::path(format!("{CORE_PATH}/sample0"))]);
        assert_eq!(first, second);
        assert_eq!(signals.named("NewSample").len(), 1);

        let bytes = bridge
            .get_property(&caller(), &format!("{CORE_PATH}/sample0"), SAMPLE_INTERFACE, "Bytes")
            .unwrap();
        assert_eq!(bytes, Variant::U32(16));
    }

    #[test]
    fn lazy_sample_hides_unloaded_properties() {
        let (mut bridge, _signals) = setup_bridge();
        let index =
            bridge.mutate(|core| core.add_lazy_sample("bell", "/usr/share/sounds/bell.wav"));
        let path = format!("{CORE_PATH}/sample{index}");

        let error = bridge
            .get_property(&caller(), &path, SAMPLE_INTERFACE, "SampleFormat")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unavailable);
        assert_eq!(error.message, format!("{path} is not loaded."));

        let all = bridge.get_all(&caller(), &path, SAMPLE_INTERFACE).unwrap();
        let names = property_names(&all);
        assert!(names.contains(&"Name"));
        for hidden in ["SampleFormat", "SampleRate", "Channels", "Duration", "Bytes"] {
            assert!(!names.contains(&hidden), "{hidden} should be hidden");
        }
    }

    #[test]
    fn loading_lazy_sample_exposes_its_format() {
        let (mut bridge, _signals) = setup_bridge();
        let index = bridge.mutate(|core| core.add_lazy_sample("bell", "bell.wav"));
        let contents = SampleContents {
            sample_spec: SampleSpec::default(),
            channel_map: ChannelMap::stereo(),
            data: vec![0; 8],
        };

        bridge
            .mutate(|core| core.load_lazy_sample(index, contents))
            .unwrap();

        let format = bridge
            .get_property(
                &caller(),
                &format!("{CORE_PATH}/sample{index}"),
                SAMPLE_INTERFACE,
                "SampleFormat",
            )
            .unwrap();
        assert_eq!(format, Variant::U32(3));
    }
}

mod core_methods {
    use super::*;

    fn load_module(bridge: &mut Bridge) -> Result<Vec<Variant>, ErrorKind> {
        bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "LoadModule",
                &[
                    Variant::from("module-null-sink"),
                    Variant::StrDict(BTreeMap::new()),
                ],
            )
            .map_err(|e| e.kind)
    }

    #[test]
    fn load_module_replies_with_new_path() {
        let (mut bridge, signals) = setup_bridge();

        let reply = load_module(&mut bridge).unwrap();

        assert_eq!(reply, vec![Variant::path(format!("{CORE_PATH}/module0"))]);
        assert_eq!(signals.named("NewModule").len(), 1);
    }

    #[test]
    fn load_module_can_be_disabled() {
        let (mut bridge, signals) = setup_bridge_with(BridgeConfig {
            disallow_module_loading: true,
            ..Default::default()
        });

        assert_eq!(load_module(&mut bridge), Err(ErrorKind::AccessDenied));
        assert!(signals.named("NewModule").is_empty());
    }

    #[test]
    fn exit_can_be_disabled() {
        let (mut bridge, _signals) = setup_bridge_with(BridgeConfig {
            disallow_exit: true,
            ..Default::default()
        });

        let error = bridge
            .call_method(&caller(), CORE_PATH, CORE_INTERFACE, "Exit", &[])
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::AccessDenied);
        assert!(!bridge.core().exit_requested());
    }

    #[test]
    fn exit_requests_shutdown() {
        let (mut bridge, _signals) = setup_bridge();

        bridge
            .call_method(&caller(), CORE_PATH, CORE_INTERFACE, "Exit", &[])
            .unwrap();

        assert!(bridge.core().exit_requested());
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        let (mut bridge, _signals) = setup_bridge();

        let error = bridge
            .call_method(&caller(), CORE_PATH, CORE_INTERFACE, "GetSinkByName", &[])
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidArgs);
    }

    #[test]
    fn unknown_method_is_reported() {
        let (mut bridge, _signals) = setup_bridge();

        let error = bridge
            .call_method(&caller(), CORE_PATH, CORE_INTERFACE, "Reboot", &[])
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::UnknownMethod);
    }

    #[test]
    fn sink_by_name_resolves_to_path() {
        let (mut bridge, _signals) = setup_bridge();
        add_sink(&mut bridge, "a");
        add_sink(&mut bridge, "b");

        let reply = bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "GetSinkByName",
                &[Variant::from("b")],
            )
            .unwrap();
        assert_eq!(reply, vec![Variant::path(sink_path(1))]);

        let error = bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "GetSinkByName",
                &[Variant::from("missing")],
            )
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[test]
    fn listen_for_signal_filters_by_object() {
        let (mut bridge, _signals) = setup_bridge();
        add_sink(&mut bridge, "a");
        add_sink(&mut bridge, "b");
        let name = "org.PulseAudio.Core1.Device.VolumeUpdated";

        bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "ListenForSignal",
                &[Variant::from(name), Variant::PathArray(vec![sink_path(0)])],
            )
            .unwrap();

        let watched = Signal::new(sink_path(0), DEVICE_INTERFACE, "VolumeUpdated");
        let other = Signal::new(sink_path(1), DEVICE_INTERFACE, "VolumeUpdated");
        {
            let listeners = bridge.listeners().lock().unwrap();
            assert!(listeners.wants(":1.42", &watched));
            assert!(!listeners.wants(":1.42", &other));
        }

        bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "StopListeningForSignal",
                &[Variant::from(name)],
            )
            .unwrap();
        assert!(!bridge.listeners().lock().unwrap().wants(":1.42", &watched));
    }

    #[test]
    fn root_introspection_lists_top_level_objects() {
        let (mut bridge, _signals) = setup_bridge();
        add_sink(&mut bridge, "out");

        let xml = bridge.introspect(CORE_PATH).unwrap();

        assert!(xml.contains("<node name=\"sink0\"/>"));
        assert!(xml.contains("<node name=\"source0\"/>"));
        assert!(xml.contains(CORE_INTERFACE));
    }
}

mod streams {
    use super::*;

    fn add_playback(bridge: &mut Bridge, device: u32) -> u32 {
        bridge
            .mutate(|core| {
                core.add_stream(
                    StreamKind::Playback,
                    NewStream {
                        driver: "test".to_string(),
                        device,
                        ..Default::default()
                    },
                )
            })
            .unwrap()
    }

    fn playback_path(index: u32) -> String {
        format!("{CORE_PATH}/playback_stream{index}")
    }

    #[test]
    fn move_announces_the_new_device_once() {
        let (mut bridge, signals) = setup_bridge();
        let origin = add_sink(&mut bridge, "a");
        let target = add_sink(&mut bridge, "b");
        let path = playback_path(add_playback(&mut bridge, origin));
        signals.take();

        for _ in 0..2 {
            bridge
                .call_method(
                    &caller(),
                    &path,
                    STREAM_INTERFACE,
                    "Move",
                    &[Variant::path(sink_path(target))],
                )
                .unwrap();
        }

        let updated = signals.named("DeviceUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].path, path);
        assert_eq!(updated[0].args, vec![Variant::path(sink_path(target))]);
        let device = bridge
            .get_property(&caller(), &path, STREAM_INTERFACE, "Device")
            .unwrap();
        assert_eq!(device, Variant::path(sink_path(target)));
    }

    #[test]
    fn move_to_a_source_or_missing_sink_is_not_found() {
        let (mut bridge, signals) = setup_bridge();
        let origin = add_sink(&mut bridge, "a");
        let path = playback_path(add_playback(&mut bridge, origin));
        signals.take();

        for target in [format!("{CORE_PATH}/source0"), sink_path(9)] {
            let error = bridge
                .call_method(&caller(), &path, STREAM_INTERFACE, "Move", &[Variant::path(target)])
                .unwrap_err();
            assert_eq!(error.kind, ErrorKind::NotFound);
        }

        assert!(signals.is_empty());
        let device = bridge
            .get_property(&caller(), &path, STREAM_INTERFACE, "Device")
            .unwrap();
        assert_eq!(device, Variant::path(sink_path(origin)));
    }

    #[test]
    fn record_stream_without_volume_hides_volume_and_mute() {
        let (mut bridge, signals) = setup_bridge();
        let source = bridge
            .mutate(|core| core.add_device(DeviceKind::Source, sink("mic")))
            .unwrap();
        let index = bridge
            .mutate(|core| {
                core.add_stream(
                    StreamKind::Record,
                    NewStream {
                        driver: "test".to_string(),
                        device: source,
                        has_volume: false,
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        let path = format!("{CORE_PATH}/record_stream{index}");
        signals.take();

        for property in ["Volume", "Mute"] {
            let error = bridge
                .get_property(&caller(), &path, STREAM_INTERFACE, property)
                .unwrap_err();
            assert_eq!(error.kind, ErrorKind::Unavailable);
            assert_eq!(error.message, format!("{path} doesn't have volume."));
        }
        let error = bridge
            .set_property(&caller(), &path, STREAM_INTERFACE, "Mute", &Variant::Bool(true))
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unavailable);
        assert!(signals.is_empty());

        let all = bridge.get_all(&caller(), &path, STREAM_INTERFACE).unwrap();
        let names = property_names(&all);
        assert!(names.contains(&"Device"));
        assert!(!names.contains(&"Volume"));
        assert!(!names.contains(&"Mute"));
    }

    #[test]
    fn stream_event_carries_name_and_properties() {
        let (mut bridge, signals) = setup_bridge();
        let device = add_sink(&mut bridge, "a");
        let stream = add_playback(&mut bridge, device);
        let data = Proplist::new().with_str("event.id", "request-cork");

        bridge
            .mutate(|core| {
                core.send_stream_event(StreamId::playback(stream), "request-cork", data.clone())
            })
            .unwrap();

        let events = signals.named("StreamEvent");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, playback_path(stream));
        assert_eq!(
            events[0].args,
            vec![Variant::from("request-cork"), Variant::from(&data)]
        );
    }
}

mod ports {
    use super::*;

    fn port(name: &str) -> PortData {
        PortData {
            name: name.to_string(),
            description: name.to_string(),
            priority: 100,
            available: PortAvailable::Unknown,
        }
    }

    fn add_sink_with_ports(bridge: &mut Bridge, name: &str, ports: &[&str]) -> u32 {
        let new = NewDevice {
            ports: ports.iter().map(|name| port(name)).collect(),
            active_port: ports.first().map(|name| (*name).to_string()),
            ..sink(name)
        };
        bridge
            .mutate(|core| core.add_device(DeviceKind::Sink, new))
            .unwrap()
    }

    #[test]
    fn active_port_write_signals_once() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_sink_with_ports(&mut bridge, "out", &["speaker", "headphones"]);
        let path = sink_path(index);
        let headphones = Variant::path(format!("{path}/port1"));
        signals.take();

        for _ in 0..2 {
            bridge
                .set_property(&caller(), &path, DEVICE_INTERFACE, "ActivePort", &headphones)
                .unwrap();
        }

        let updated = signals.named("ActivePortUpdated");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].path, path);
        assert_eq!(updated[0].args, vec![headphones.clone()]);
        let active = bridge
            .get_property(&caller(), &path, DEVICE_INTERFACE, "ActivePort")
            .unwrap();
        assert_eq!(active, headphones);
    }

    #[test]
    fn unknown_port_write_is_not_found() {
        let (mut bridge, signals) = setup_bridge();
        let path = sink_path(add_sink_with_ports(&mut bridge, "out", &["speaker"]));
        signals.take();

        let error = bridge
            .set_property(
                &caller(),
                &path,
                DEVICE_INTERFACE,
                "ActivePort",
                &Variant::path(format!("{path}/port7")),
            )
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::NotFound);
        assert!(signals.is_empty());
    }

    #[test]
    fn availability_change_reaches_only_the_owning_port() {
        let (mut bridge, signals) = setup_bridge();
        let first = add_sink_with_ports(&mut bridge, "a", &["speaker"]);
        let second = add_sink_with_ports(&mut bridge, "b", &["speaker"]);
        signals.take();

        bridge
            .mutate(|core| {
                core.set_port_available(DeviceId::sink(second), "speaker", PortAvailable::Yes)
            })
            .unwrap();

        let changed = signals.take();
        assert_eq!(members(&changed), ["AvailableChanged"]);
        assert_eq!(changed[0].path, format!("{}/port0", sink_path(second)));
        assert_eq!(changed[0].args, vec![Variant::U32(PortAvailable::Yes.code())]);

        let untouched = bridge
            .get_property(
                &caller(),
                &format!("{}/port0", sink_path(first)),
                DEVICE_PORT_INTERFACE,
                "Available",
            )
            .unwrap();
        assert_eq!(untouched, Variant::U32(PortAvailable::Unknown.code()));
    }
}

mod clients {
    use super::*;

    fn add_client(bridge: &mut Bridge) -> u32 {
        bridge.mutate(|core| {
            core.add_client(NewClient {
                driver: "test".to_string(),
                proplist: Proplist::new().with_str("application.name", "player"),
                ..Default::default()
            })
        })
    }

    fn client_path(index: u32) -> String {
        format!("{CORE_PATH}/client{index}")
    }

    fn client_proplist(bridge: &Bridge, index: u32) -> Proplist {
        bridge.core().client(index).unwrap().read().proplist.clone()
    }

    fn update(bridge: &mut Bridge, index: u32, list: Variant, mode: u32) -> Result<(), ErrorKind> {
        bridge
            .call_method(
                &caller(),
                &client_path(index),
                CLIENT_INTERFACE,
                "UpdateProperties",
                &[list, Variant::U32(mode)],
            )
            .map(|_| ())
            .map_err(|e| e.kind)
    }

    #[test]
    fn update_modes_combine_lists() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_client(&mut bridge);
        let other = Proplist::new()
            .with_str("application.name", "other")
            .with_str("media.role", "music");

        update(&mut bridge, index, Variant::from(&other), 1).unwrap();
        let merged = client_proplist(&bridge, index);
        assert_eq!(merged.get_str("application.name"), Some("player"));
        assert_eq!(merged.get_str("media.role"), Some("music"));

        update(&mut bridge, index, Variant::from(&other), 2).unwrap();
        assert_eq!(client_proplist(&bridge, index), other);

        let only = Proplist::new().with_str("media.role", "game");
        update(&mut bridge, index, Variant::from(&only), 0).unwrap();
        assert_eq!(client_proplist(&bridge, index), only);

        let updated = signals.named("PropertyListUpdated");
        assert_eq!(updated.len(), 3);
        assert_eq!(updated[2].args, vec![Variant::from(&only)]);
    }

    #[test]
    fn unknown_update_mode_is_rejected() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_client(&mut bridge);
        let list = Proplist::new().with_str("media.role", "music");

        assert_eq!(
            update(&mut bridge, index, Variant::from(&list), 3),
            Err(ErrorKind::InvalidArgs)
        );
        assert!(signals.named("PropertyListUpdated").is_empty());
    }

    #[test]
    fn invalid_keys_are_rejected_before_any_change() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_client(&mut bridge);
        let original = client_proplist(&bridge, index);
        let list = Variant::Proplist(BTreeMap::from([
            (String::new(), b"x\0".to_vec()),
            ("bad\u{1}key".to_string(), b"y\0".to_vec()),
            ("media.role".to_string(), b"music\0".to_vec()),
        ]));

        assert_eq!(update(&mut bridge, index, list, 2), Err(ErrorKind::InvalidArgs));

        assert_eq!(client_proplist(&bridge, index), original);
        let read = bridge
            .get_property(&caller(), &client_path(index), CLIENT_INTERFACE, "PropertyList")
            .unwrap();
        assert_eq!(read, Variant::from(&original));
        assert!(signals.named("PropertyListUpdated").is_empty());

        // The announced list is still the original one.
        update(&mut bridge, index, Variant::from(&original), 2).unwrap();
        assert!(signals.named("PropertyListUpdated").is_empty());
    }

    #[test]
    fn remove_properties_drops_present_keys() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_client(&mut bridge);
        let original = client_proplist(&bridge, index);
        let extra = Proplist::new().with_str("media.role", "music");
        update(&mut bridge, index, Variant::from(&extra), 2).unwrap();

        bridge
            .call_method(
                &caller(),
                &client_path(index),
                CLIENT_INTERFACE,
                "RemoveProperties",
                &[Variant::StrArray(vec![
                    "media.role".to_string(),
                    "missing".to_string(),
                ])],
            )
            .unwrap();

        assert_eq!(client_proplist(&bridge, index), original);
        let updated = signals.named("PropertyListUpdated");
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1].args, vec![Variant::from(&original)]);
    }

    #[test]
    fn client_event_carries_name_and_properties() {
        let (mut bridge, signals) = setup_bridge();
        let index = add_client(&mut bridge);
        let data = Proplist::new().with_str("event.id", "focus");

        bridge
            .mutate(|core| core.send_client_event(index, "focus", data.clone()))
            .unwrap();

        let events = signals.named("ClientEvent");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, client_path(index));
        assert_eq!(events[0].args, vec![Variant::from("focus"), Variant::from(&data)]);
    }
}

mod modules {
    use super::*;

    fn load(bridge: &mut Bridge, arguments: &[(&str, &str)]) -> String {
        let arguments = arguments
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let reply = bridge
            .call_method(
                &caller(),
                CORE_PATH,
                CORE_INTERFACE,
                "LoadModule",
                &[Variant::from("module-null-sink"), Variant::StrDict(arguments)],
            )
            .unwrap();
        reply[0].as_object_path().unwrap().to_string()
    }

    #[test]
    fn arguments_survive_the_argument_string() {
        let (mut bridge, _signals) = setup_bridge();
        let path = load(
            &mut bridge,
            &[("sink_name", "demo"), ("description", "Null \"Output\"")],
        );

        let arguments = bridge
            .get_property(&caller(), &path, MODULE_INTERFACE, "Arguments")
            .unwrap();

        assert_eq!(
            arguments,
            Variant::StrDict(BTreeMap::from([
                ("description".to_string(), "Null \"Output\"".to_string()),
                ("sink_name".to_string(), "demo".to_string()),
            ]))
        );
        let stored = bridge.core().module(0).unwrap().read().arguments.clone();
        assert_eq!(stored, r#"description="Null \"Output\"" sink_name="demo""#);
    }

    #[test]
    fn unload_removes_the_object() {
        let (mut bridge, signals) = setup_bridge();
        let path = load(&mut bridge, &[]);
        signals.take();

        bridge
            .call_method(&caller(), &path, MODULE_INTERFACE, "Unload", &[])
            .unwrap();

        let removed = signals.named("ModuleRemoved");
        assert_eq!(removed.len(), 1);
        assert_eq!(path_arg(&removed[0]), path);
        assert!(bridge.core().module(0).is_none());
        let error = bridge
            .get_property(&caller(), &path, MODULE_INTERFACE, "Name")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownObject);
    }
}

mod invariants {
    use super::*;

    fn registry() -> (ServerCore, Registry) {
        let mut core = core();
        let registry = Registry::new(&mut core, Notifier::new(Arc::new(RecordingSink::new())));
        (core, registry)
    }

    #[test]
    fn event_without_subscriber_is_an_orphan() {
        let (mut core, mut registry) = registry();

        let result = registry.handle_event(&mut core, CoreEvent::SampleChanged(99));

        assert_eq!(
            result,
            Err(InvariantViolation::OrphanEvent {
                hook: Hook::SampleChanged
            })
        );
    }

    #[test]
    fn second_creation_is_a_duplicate() {
        let (mut core, mut registry) = registry();
        let index = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
        let device = core.device(DeviceId::sink(index)).unwrap().clone();

        registry
            .on_entity_created(&mut core, NewEntity::Device(device.clone()))
            .unwrap();
        let again = registry.on_entity_created(&mut core, NewEntity::Device(device));

        assert_eq!(
            again,
            Err(InvariantViolation::DuplicateProxy {
                kind: EntityKind::Device(DeviceKind::Sink),
                index,
            })
        );
    }

    #[test]
    fn removal_without_proxy_is_missing() {
        let (mut core, mut registry) = registry();

        let result = registry.on_entity_removed(&mut core, EntityKind::Card, 7);

        assert_eq!(
            result,
            Err(InvariantViolation::MissingProxy {
                kind: EntityKind::Card,
                index: 7,
            })
        );
    }

    #[test]
    fn registry_adopts_existing_entities_without_signals() {
        let mut core = core();
        core.add_device(DeviceKind::Sink, sink("out")).unwrap();
        let signals = RecordingSink::new();

        let registry = Registry::new(&mut core, Notifier::new(Arc::new(signals.clone())));

        assert_eq!(registry.len(), 2);
        assert!(signals.is_empty());
    }
}

mod handle {
    use futures::StreamExt;
    use pulsebridge::bridge::BridgeHandle;

    use super::*;

    #[tokio::test]
    async fn handle_serves_requests_and_streams_signals() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let (handle, task) =
            BridgeHandle::spawn(core(), BridgeConfig::default(), listeners, Vec::new());
        let signals = handle.signals();
        futures::pin_mut!(signals);

        let index = handle
            .mutate(|core| core.add_device(DeviceKind::Sink, sink("out")))
            .await
            .unwrap()
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(signals.next().await.unwrap().member);
        }
        assert_eq!(
            seen,
            [
                "NewSource",
                "FallbackSourceUpdated",
                "NewSink",
                "FallbackSinkUpdated"
            ]
        );

        let name = handle
            .get_property(caller(), &sink_path(index), DEVICE_INTERFACE, "Name")
            .await
            .unwrap();
        assert_eq!(name, Variant::from("out"));

        handle
            .set_property(
                caller(),
                &sink_path(index),
                DEVICE_INTERFACE,
                "Mute",
                Variant::Bool(true),
            )
            .await
            .unwrap();
        assert_eq!(signals.next().await.unwrap().member, "MuteUpdated");

        let core = handle.shutdown().await.unwrap();
        assert_eq!(core.devices(DeviceKind::Sink).count(), 1);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn requests_fail_once_the_task_has_stopped() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let (handle, task) =
            BridgeHandle::spawn(core(), BridgeConfig::default(), listeners, Vec::new());
        let other = handle.clone();

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let error = other.introspect(CORE_PATH).await.unwrap_err();
        assert_eq!(error.kind, ErrorKind::Failed);
    }
}
