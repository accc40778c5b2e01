//! Pulsebridge - runs the object registry over an in-process server core.
//!
//! `demo` populates a small core, drives a few bus requests through the
//! bridge and prints every signal they produce.

use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use clap::{Parser, Subcommand};
use futures::StreamExt;
use pulsebridge::{
    bridge::{BridgeHandle, CORE_PATH},
    bus::{Caller, ListenerRegistry, SignalSink, Variant, ZbusSignalSink},
    config::{Config, ConfigPaths},
    server::{
        CoreError, DeviceKind, NewCard, NewClient, NewDevice, NewStream, PortAvailable,
        PortData, ProfileData, Proplist, ServerCore, ServerInfo, StreamKind, volume::VOLUME_NORM,
    },
    tracing_config,
};
use tracing::{Level, info, instrument, span};

#[derive(Parser)]
#[command(name = "pulsebridge")]
#[command(about = "PulseAudio-style object registry over a message bus")]
struct Cli {
    /// Configuration file; defaults to the XDG location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate an in-process core and print the signals it produces
    Demo {
        /// Also forward signals to the session bus
        #[arg(long)]
        session_bus: bool,
    },
    /// Print the configuration JSON schema
    Schema,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Demo { session_bus } => {
            let config = load_config(cli.config.as_deref())?;
            tracing_config::init(&config.general.log_level)?;
            let _span = span!(Level::INFO, "pulsebridge_demo").entered();
            run_demo(config, session_bus).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => ConfigPaths::main_config()?,
    };
    Ok(Config::load(&path)?)
}

#[instrument(skip_all)]
async fn run_demo(config: Config, session_bus: bool) -> Result<(), Box<dyn Error>> {
    let core = ServerCore::new(ServerInfo::local(
        config.bridge.server_name.clone(),
        config.bridge.server_version.clone(),
    ));
    let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));

    let mut sinks: Vec<Arc<dyn SignalSink>> = Vec::new();
    if session_bus {
        let connection = zbus::Connection::session().await?;
        info!(name = ?connection.unique_name(), "connected to session bus");
        let (zbus_sink, _task) = ZbusSignalSink::spawn(connection, listeners.clone());
        sinks.push(Arc::new(zbus_sink));
    }

    let (handle, task) = BridgeHandle::spawn(core, config.bridge, listeners, sinks);
    let printer = {
        let signals = handle.signals();
        tokio::spawn(async move {
            futures::pin_mut!(signals);
            while let Some(signal) = signals.next().await {
                println!("signal {} {} {:?}", signal.path, signal.qualified_name(), signal.args);
            }
        })
    };

    let (card, sink) = handle.mutate(populate).await??;
    let caller = Caller::anonymous(":1.1");
    let card_path = format!("{CORE_PATH}/card{card}");
    let sink_path = format!("{CORE_PATH}/sink{sink}");

    handle
        .set_property(
            caller.clone(),
            &sink_path,
            "org.PulseAudio.Core1.Device",
            "Volume",
            Variant::U32Array(vec![VOLUME_NORM / 2]),
        )
        .await?;
    handle
        .set_property(
            caller.clone(),
            &sink_path,
            "org.PulseAudio.Core1.Device",
            "Mute",
            Variant::Bool(true),
        )
        .await?;

    let profile = handle
        .call_method(
            caller.clone(),
            &card_path,
            "org.PulseAudio.Core1.Card",
            "GetProfileByName",
            vec![Variant::Str("off".to_string())],
        )
        .await?;
    if let Some(path) = profile.first().and_then(Variant::as_object_path) {
        handle
            .set_property(
                caller.clone(),
                &card_path,
                "org.PulseAudio.Core1.Card",
                "ActiveProfile",
                Variant::path(path),
            )
            .await?;
    }

    let module = handle
        .call_method(
            caller.clone(),
            CORE_PATH,
            "org.PulseAudio.Core1",
            "LoadModule",
            vec![
                Variant::Str("module-null-sink".to_string()),
                Variant::StrDict([("sink_name".to_string(), "demo".to_string())].into()),
            ],
        )
        .await?;
    println!("loaded module {module:?}");

    for (name, value) in handle
        .get_all(caller.clone(), &sink_path, "org.PulseAudio.Core1.Device")
        .await?
    {
        println!("{sink_path} {name} = {value:?}");
    }
    println!("{}", handle.introspect(CORE_PATH).await?);

    let core = handle.shutdown().await?;
    info!(exit_requested = core.exit_requested(), "demo finished");
    task.await?;
    printer.await?;
    Ok(())
}

fn populate(core: &mut ServerCore) -> Result<(u32, u32), CoreError> {
    let profile = |name: &str, sinks: u32| ProfileData {
        name: name.to_string(),
        description: name.to_string(),
        sinks,
        sources: 0,
        priority: sinks * 100,
        available: true,
    };
    let card = core.add_card(NewCard {
        name: "alsa_card.demo".to_string(),
        driver: "module-alsa-card.c".to_string(),
        profiles: vec![profile("output:analog-stereo", 1), profile("off", 0)],
        active_profile: Some("output:analog-stereo".to_string()),
        proplist: Proplist::new().with_str("device.description", "Demo card"),
        ..Default::default()
    })?;
    let sink = core.add_device(
        DeviceKind::Sink,
        NewDevice {
            name: "alsa_output.demo".to_string(),
            driver: "module-alsa-card.c".to_string(),
            card: Some(card),
            ports: vec![PortData {
                name: "analog-output-speaker".to_string(),
                description: "Speakers".to_string(),
                priority: 100,
                available: PortAvailable::Yes,
            }],
            active_port: Some("analog-output-speaker".to_string()),
            ..Default::default()
        },
    )?;
    let client = core.add_client(NewClient {
        driver: "protocol-native.c".to_string(),
        proplist: Proplist::new().with_str("application.name", "demo"),
        ..Default::default()
    });
    core.add_stream(
        StreamKind::Playback,
        NewStream {
            driver: "protocol-native.c".to_string(),
            client: Some(client),
            device: sink,
            ..Default::default()
        },
    )?;
    Ok((card, sink))
}
