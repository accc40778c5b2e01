//! Static descriptions of the interfaces the bridge exports.
//!
//! Dispatch uses these tables to reject unknown members, check write access
//! and argument signatures, and to render introspection data.

/// Core interface.
pub const CORE_INTERFACE: &str = "org.PulseAudio.Core1";
/// Card interface.
pub const CARD_INTERFACE: &str = "org.PulseAudio.Core1.Card";
/// Card profile interface.
pub const CARD_PROFILE_INTERFACE: &str = "org.PulseAudio.Core1.CardProfile";
/// Interface shared by sinks and sources.
pub const DEVICE_INTERFACE: &str = "org.PulseAudio.Core1.Device";
/// Sink specific interface.
pub const SINK_INTERFACE: &str = "org.PulseAudio.Core1.Sink";
/// Source specific interface.
pub const SOURCE_INTERFACE: &str = "org.PulseAudio.Core1.Source";
/// Device port interface.
pub const DEVICE_PORT_INTERFACE: &str = "org.PulseAudio.Core1.DevicePort";
/// Stream interface.
pub const STREAM_INTERFACE: &str = "org.PulseAudio.Core1.Stream";
/// Sample cache entry interface.
pub const SAMPLE_INTERFACE: &str = "org.PulseAudio.Core1.Sample";
/// Module interface.
pub const MODULE_INTERFACE: &str = "org.PulseAudio.Core1.Module";
/// Client interface.
pub const CLIENT_INTERFACE: &str = "org.PulseAudio.Core1.Client";

/// Write access of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable only
    Read,
    /// Readable and writable
    ReadWrite,
}

/// One property of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    /// Member name
    pub name: &'static str,
    /// D-Bus type signature
    pub signature: &'static str,
    /// Write access
    pub access: Access,
}

/// Named, typed method or signal argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arg {
    /// Argument name
    pub name: &'static str,
    /// D-Bus type signature
    pub signature: &'static str,
}

/// One method of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    /// Member name
    pub name: &'static str,
    /// Input arguments in order
    pub inputs: &'static [Arg],
    /// Output arguments in order
    pub outputs: &'static [Arg],
}

/// One signal of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSpec {
    /// Member name
    pub name: &'static str,
    /// Arguments in order
    pub args: &'static [Arg],
}

/// Complete description of one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// Interface name
    pub name: &'static str,
    /// Properties
    pub properties: &'static [PropertySpec],
    /// Methods
    pub methods: &'static [MethodSpec],
    /// Signals
    pub signals: &'static [SignalSpec],
}

impl InterfaceSpec {
    /// Property named `name`.
    pub fn property(&self, name: &str) -> Option<&'static PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Method named `name`.
    pub fn method(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Signal named `name`.
    pub fn signal(&self, name: &str) -> Option<&'static SignalSpec> {
        self.signals.iter().find(|s| s.name == name)
    }
}

pub(crate) const fn ro(name: &'static str, signature: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        signature,
        access: Access::Read,
    }
}

pub(crate) const fn rw(name: &'static str, signature: &'static str) -> PropertySpec {
    PropertySpec {
        name,
        signature,
        access: Access::ReadWrite,
    }
}

pub(crate) const fn arg(name: &'static str, signature: &'static str) -> Arg {
    Arg { name, signature }
}

pub(crate) const fn method(
    name: &'static str,
    inputs: &'static [Arg],
    outputs: &'static [Arg],
) -> MethodSpec {
    MethodSpec {
        name,
        inputs,
        outputs,
    }
}

pub(crate) const fn signal(name: &'static str, args: &'static [Arg]) -> SignalSpec {
    SignalSpec { name, args }
}

const PROPERTY_LIST_ARG: &[Arg] = &[arg("property_list", "a{say}")];

/// `PropertyListUpdated(a{say})`, emitted by most interfaces.
pub(crate) const PROPERTY_LIST_UPDATED: SignalSpec =
    signal("PropertyListUpdated", PROPERTY_LIST_ARG);

/// Render introspection XML for an object.
pub fn introspection_xml(interfaces: &[&InterfaceSpec], children: &[String]) -> String {
    let mut xml = String::from(
        "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\
         \"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n<node>\n",
    );
    xml.push_str(
        " <interface name=\"org.freedesktop.DBus.Introspectable\">\n  \
         <method name=\"Introspect\">\n   <arg name=\"data\" type=\"s\" direction=\"out\"/>\n  \
         </method>\n </interface>\n",
    );
    xml.push_str(
        " <interface name=\"org.freedesktop.DBus.Properties\">\n  \
         <method name=\"Get\">\n   <arg name=\"interface_name\" type=\"s\" direction=\"in\"/>\n   \
         <arg name=\"property_name\" type=\"s\" direction=\"in\"/>\n   \
         <arg name=\"value\" type=\"v\" direction=\"out\"/>\n  </method>\n  \
         <method name=\"Set\">\n   <arg name=\"interface_name\" type=\"s\" direction=\"in\"/>\n   \
         <arg name=\"property_name\" type=\"s\" direction=\"in\"/>\n   \
         <arg name=\"value\" type=\"v\" direction=\"in\"/>\n  </method>\n  \
         <method name=\"GetAll\">\n   \
         <arg name=\"interface_name\" type=\"s\" direction=\"in\"/>\n   \
         <arg name=\"props\" type=\"a{sv}\" direction=\"out\"/>\n  </method>\n </interface>\n",
    );

    for interface in interfaces {
        xml.push_str(&format!(" <interface name=\"{}\">\n", interface.name));
        for m in interface.methods {
            xml.push_str(&format!("  <method name=\"{}\">\n", m.name));
            for a in m.inputs {
                xml.push_str(&format!(
                    "   <arg name=\"{}\" type=\"{}\" direction=\"in\"/>\n",
                    a.name, a.signature
                ));
            }
            for a in m.outputs {
                xml.push_str(&format!(
                    "   <arg name=\"{}\" type=\"{}\" direction=\"out\"/>\n",
                    a.name, a.signature
                ));
            }
            xml.push_str("  </method>\n");
        }
        for s in interface.signals {
            xml.push_str(&format!("  <signal name=\"{}\">\n", s.name));
            for a in s.args {
                xml.push_str(&format!(
                    "   <arg name=\"{}\" type=\"{}\"/>\n",
                    a.name, a.signature
                ));
            }
            xml.push_str("  </signal>\n");
        }
        for p in interface.properties {
            let access = match p.access {
                Access::Read => "read",
                Access::ReadWrite => "readwrite",
            };
            xml.push_str(&format!(
                "  <property name=\"{}\" type=\"{}\" access=\"{access}\"/>\n",
                p.name, p.signature
            ));
        }
        xml.push_str(" </interface>\n");
    }

    for child in children {
        xml.push_str(&format!(" <node name=\"{child}\"/>\n"));
    }
    xml.push_str("</node>\n");
    xml
}
