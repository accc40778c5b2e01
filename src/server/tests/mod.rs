//! Unit tests for the core model
//!
//! Entity bookkeeping, default device selection and hook queuing.

#![allow(clippy::panic)]

use super::*;

fn core() -> ServerCore {
    ServerCore::new(ServerInfo::local("pulseaudio", "8.0"))
}

fn listen_all(core: &mut ServerCore, hooks: &[Hook]) {
    for &hook in hooks {
        core.hooks_mut().connect(hook);
    }
}

fn drain(core: &mut ServerCore) -> Vec<CoreEvent> {
    std::iter::from_fn(|| core.hooks_mut().next_event()).collect()
}

fn sink(name: &str) -> NewDevice {
    NewDevice {
        name: name.to_string(),
        driver: "test".to_string(),
        ..Default::default()
    }
}

#[test]
fn sink_brings_monitor_source_and_becomes_default() {
    let mut core = core();
    listen_all(&mut core, &[Hook::DevicePut, Hook::DefaultSinkChanged]);

    let index = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
    let monitor = core.device(DeviceId::sink(index)).unwrap().read().monitor.unwrap();

    assert_eq!(core.default_sink(), Some(index));
    assert_eq!(core.default_source(), Some(monitor));
    assert_eq!(
        core.device(DeviceId::source(monitor)).unwrap().read().name,
        "out.monitor"
    );

    let events = drain(&mut core);
    assert!(matches!(&events[0], CoreEvent::DevicePut(d) if d.read().kind == DeviceKind::Source));
    assert!(matches!(&events[1], CoreEvent::DevicePut(d) if d.read().kind == DeviceKind::Sink));
    assert!(matches!(events[2], CoreEvent::DefaultSinkChanged));
}

#[test]
fn duplicate_names_get_suffixes() {
    let mut core = core();
    let a = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
    let b = core.add_device(DeviceKind::Sink, sink("out")).unwrap();

    assert_eq!(core.device(DeviceId::sink(a)).unwrap().read().name, "out");
    assert_eq!(core.device(DeviceId::sink(b)).unwrap().read().name, "out.2");
    assert_eq!(core.device_by_name(DeviceKind::Sink, "out.2"), Some(b));
}

#[test]
fn removing_default_sink_falls_back_and_drops_streams() {
    let mut core = core();
    let first = core.add_device(DeviceKind::Sink, sink("a")).unwrap();
    let second = core.add_device(DeviceKind::Sink, sink("b")).unwrap();
    let stream = core
        .add_stream(
            StreamKind::Playback,
            NewStream {
                device: first,
                ..Default::default()
            },
        )
        .unwrap();

    listen_all(&mut core, &[Hook::StreamUnlink, Hook::DeviceUnlink]);
    core.remove_device(DeviceId::sink(first)).unwrap();

    assert_eq!(core.default_sink(), Some(second));
    assert!(core.stream(StreamId::playback(stream)).is_none());

    let events = drain(&mut core);
    assert!(matches!(events[0], CoreEvent::StreamUnlink(id) if id == StreamId::playback(stream)));
    assert!(matches!(events[1], CoreEvent::DeviceUnlink(id) if id == DeviceId::sink(first)));
    assert!(matches!(events[2], CoreEvent::DeviceUnlink(id) if id.kind == DeviceKind::Source));
}

#[test]
fn default_change_fires_only_on_change() {
    let mut core = core();
    let index = core.add_device(DeviceKind::Sink, sink("a")).unwrap();
    listen_all(&mut core, &[Hook::DefaultSinkChanged]);

    core.set_default_sink(Some(index)).unwrap();
    assert!(drain(&mut core).is_empty());

    core.set_default_sink(None).unwrap();
    assert_eq!(drain(&mut core).len(), 1);

    assert!(core.set_default_sink(Some(99)).is_err());
}

#[test]
fn card_profiles_lifecycle() {
    let mut core = core();
    let profile = |name: &str| ProfileData {
        name: name.to_string(),
        description: name.to_string(),
        sinks: 1,
        sources: 0,
        priority: 10,
        available: true,
    };
    let card = core
        .add_card(NewCard {
            name: "card".to_string(),
            profiles: vec![profile("a"), profile("b")],
            active_profile: Some("a".to_string()),
            ..Default::default()
        })
        .unwrap();

    listen_all(
        &mut core,
        &[
            Hook::CardProfileChanged,
            Hook::CardProfileRemoved,
            Hook::CardProfileAvailableChanged,
        ],
    );

    core.set_card_profile(card, "a").unwrap();
    assert!(drain(&mut core).is_empty());

    core.set_card_profile(card, "b").unwrap();
    assert!(matches!(drain(&mut core)[..], [CoreEvent::CardProfileChanged(c)] if c == card));

    assert_eq!(
        core.remove_card_profile(card, "b"),
        Err(CoreError::ProfileInUse("b".to_string()))
    );
    core.remove_card_profile(card, "a").unwrap();

    core.set_profile_available(card, "b", true).unwrap();
    core.set_profile_available(card, "b", false).unwrap();

    let events = drain(&mut core);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        CoreEvent::CardProfileRemoved { profile, .. } if profile.read().name == "a"
    ));
    assert!(matches!(
        &events[1],
        CoreEvent::CardProfileAvailableChanged(p) if !p.read().available
    ));
}

#[test]
fn removing_card_removes_its_devices() {
    let mut core = core();
    let card = core
        .add_card(NewCard {
            name: "card".to_string(),
            ..Default::default()
        })
        .unwrap();
    let owned = core
        .add_device(
            DeviceKind::Sink,
            NewDevice {
                card: Some(card),
                ..sink("owned")
            },
        )
        .unwrap();
    let other = core.add_device(DeviceKind::Sink, sink("other")).unwrap();

    core.remove_card(card).unwrap();

    assert!(core.device(DeviceId::sink(owned)).is_none());
    assert!(core.device(DeviceId::sink(other)).is_some());
    assert!(core.card(card).is_none());
}

#[test]
fn uploading_same_name_replaces_contents() {
    let mut core = core();
    let contents = |len: usize| SampleContents {
        sample_spec: SampleSpec::default(),
        channel_map: ChannelMap::stereo(),
        data: vec![0; len],
    };
    let first = core.add_sample(NewSample {
        name: "bell".to_string(),
        contents: contents(4),
        default_volume: None,
        proplist: Proplist::new(),
    });
    listen_all(&mut core, &[Hook::SampleChanged, Hook::SamplePut]);

    let second = core.add_sample(NewSample {
        name: "bell".to_string(),
        contents: contents(8),
        default_volume: None,
        proplist: Proplist::new(),
    });

    assert_eq!(first, second);
    assert!(matches!(drain(&mut core)[..], [CoreEvent::SampleChanged(i)] if i == first));
    let sample = core.sample(first).unwrap().read();
    assert_eq!(sample.contents.as_ref().unwrap().data.len(), 8);
}

#[test]
fn play_sample_needs_loaded_contents_and_a_sink() {
    let mut core = core();
    let lazy = core.add_lazy_sample("click", "/usr/share/sounds/click.wav");

    assert_eq!(
        core.play_sample(lazy, None, 100, Proplist::new()),
        Err(CoreError::SampleNotLoaded(lazy))
    );

    core.load_lazy_sample(
        lazy,
        SampleContents {
            sample_spec: SampleSpec::default(),
            channel_map: ChannelMap::stereo(),
            data: vec![0; 4],
        },
    )
    .unwrap();
    assert_eq!(
        core.play_sample(lazy, None, 100, Proplist::new()),
        Err(CoreError::NoSinks)
    );

    let out = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
    core.play_sample(lazy, None, 100, Proplist::new()).unwrap();
    assert_eq!(core.playbacks()[0].sink, out);
}

#[test]
fn module_loading_validates_name_and_arguments() {
    let mut core = core();
    assert!(core.load_module("module-null-sink", "sink_name=\"x\"").is_ok());
    assert!(matches!(
        core.load_module("null-sink", ""),
        Err(CoreError::ModuleLoadFailed(_))
    ));
    assert!(matches!(
        core.load_module("module-null-sink", "broken"),
        Err(CoreError::InvalidModuleArguments(_))
    ));
}

#[test]
fn removing_client_kills_its_streams() {
    let mut core = core();
    let out = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
    let client = core.add_client(NewClient::default());
    let stream = core
        .add_stream(
            StreamKind::Playback,
            NewStream {
                device: out,
                client: Some(client),
                ..Default::default()
            },
        )
        .unwrap();

    core.remove_client(client).unwrap();
    assert!(core.stream(StreamId::playback(stream)).is_none());
    assert!(core.client(client).is_none());
}

#[test]
fn stream_volume_rules() {
    let mut core = core();
    let out = core.add_device(DeviceKind::Sink, sink("out")).unwrap();
    let source = core.default_source().unwrap();
    let playback = core
        .add_stream(
            StreamKind::Playback,
            NewStream {
                device: out,
                ..Default::default()
            },
        )
        .unwrap();
    let record = core
        .add_stream(
            StreamKind::Record,
            NewStream {
                device: source,
                has_volume: false,
                ..Default::default()
            },
        )
        .unwrap();

    let mono = ChannelVolumes::new(vec![100]).unwrap();
    assert!(matches!(
        core.set_stream_volume(StreamId::playback(playback), mono.clone()),
        Err(CoreError::Volume(_))
    ));
    assert_eq!(
        core.set_stream_volume(StreamId::record(record), mono),
        Err(CoreError::NoVolume(record))
    );
    assert!(core.move_stream(StreamId::playback(playback), 42).is_err());
}
