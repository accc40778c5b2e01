//! Generic property and method handling on top of the interface tables.
//!
//! Everything that can be decided from the tables alone happens here: unknown
//! objects and members, write access, argument count and types. Handlers only
//! see requests that passed these checks.

use super::{
    interface::{Access, InterfaceSpec, MethodSpec, PropertySpec, introspection_xml},
    proxy::{BusObject, CallContext, MethodReply, ReadContext},
    registry::Registry,
};
use crate::bus::{BusError, ErrorKind, Variant};

fn resolve<'a>(registry: &'a Registry, path: &str) -> Result<&'a dyn BusObject, BusError> {
    registry
        .resolve(path)
        .ok_or_else(|| BusError::new(ErrorKind::UnknownObject, format!("{path}: No such object")))
}

fn interface_of(
    object: &dyn BusObject,
    interface: &str,
) -> Result<&'static InterfaceSpec, BusError> {
    object
        .interfaces()
        .iter()
        .copied()
        .find(|spec| spec.name == interface)
        .ok_or_else(|| {
            BusError::new(
                ErrorKind::UnknownInterface,
                format!("{}: No such interface {interface}", object.path()),
            )
        })
}

/// Find a property; an empty interface name searches every interface.
fn property_of(
    object: &dyn BusObject,
    interface: &str,
    property: &str,
) -> Result<(&'static InterfaceSpec, &'static PropertySpec), BusError> {
    let unknown = || {
        BusError::new(
            ErrorKind::UnknownProperty,
            format!("{}: No such property {property}", object.path()),
        )
    };
    if interface.is_empty() {
        return object
            .interfaces()
            .iter()
            .copied()
            .find_map(|spec| spec.property(property).map(|p| (spec, p)))
            .ok_or_else(unknown);
    }
    let spec = interface_of(object, interface)?;
    let prop = spec.property(property).ok_or_else(unknown)?;
    Ok((spec, prop))
}

fn method_of(
    object: &dyn BusObject,
    interface: &str,
    method: &str,
) -> Result<(&'static InterfaceSpec, &'static MethodSpec), BusError> {
    let unknown = || {
        BusError::new(
            ErrorKind::UnknownMethod,
            format!("{}: No such method {method}", object.path()),
        )
    };
    if interface.is_empty() {
        return object
            .interfaces()
            .iter()
            .copied()
            .find_map(|spec| spec.method(method).map(|m| (spec, m)))
            .ok_or_else(unknown);
    }
    let spec = interface_of(object, interface)?;
    let found = spec.method(method).ok_or_else(unknown)?;
    Ok((spec, found))
}

fn check_args(spec: &MethodSpec, args: &[Variant]) -> Result<(), BusError> {
    if args.len() != spec.inputs.len() {
        return Err(BusError::invalid_args(format!(
            "{} expects {} arguments, got {}.",
            spec.name,
            spec.inputs.len(),
            args.len()
        )));
    }
    for (expected, actual) in spec.inputs.iter().zip(args) {
        if expected.signature != actual.signature() {
            return Err(BusError::invalid_args(format!(
                "Argument '{}' of {} has type {}, expected {}.",
                expected.name,
                spec.name,
                actual.signature(),
                expected.signature
            )));
        }
    }
    Ok(())
}

/// Read one property.
///
/// # Errors
/// Returns error if the object, interface or property is unknown, or the
/// property has no value.
pub fn get_property(
    ctx: &ReadContext<'_>,
    path: &str,
    interface: &str,
    property: &str,
) -> Result<Variant, BusError> {
    let object = resolve(ctx.registry, path)?;
    let (spec, prop) = property_of(object, interface, property)?;
    object.get(spec, prop.name, ctx)
}

/// Read every property of one interface, skipping those without a value.
///
/// # Errors
/// Returns error if the object or interface is unknown, or a property read
/// fails for a reason other than having no value.
pub fn get_all(
    ctx: &ReadContext<'_>,
    path: &str,
    interface: &str,
) -> Result<Vec<(String, Variant)>, BusError> {
    let object = resolve(ctx.registry, path)?;
    let spec = interface_of(object, interface)?;
    let mut values = Vec::with_capacity(spec.properties.len());
    for prop in spec.properties {
        match object.get(spec, prop.name, ctx) {
            Ok(value) => values.push((prop.name.to_string(), value)),
            Err(e) if e.kind == ErrorKind::Unavailable => {}
            Err(e) => return Err(e),
        }
    }
    Ok(values)
}

/// Write one property.
///
/// # Errors
/// Returns error if the property is unknown or read-only, the value has the
/// wrong type, or the handler rejects it.
pub fn set_property(
    ctx: &mut CallContext<'_>,
    path: &str,
    interface: &str,
    property: &str,
    value: &Variant,
) -> Result<(), BusError> {
    let registry = ctx.registry;
    let object = resolve(registry, path)?;
    let (spec, prop) = property_of(object, interface, property)?;
    if prop.access == Access::Read {
        return Err(BusError::read_only(spec.name, prop.name));
    }
    if value.signature() != prop.signature {
        return Err(BusError::invalid_args(format!(
            "{}.{} has type {}, got {}.",
            spec.name,
            prop.name,
            prop.signature,
            value.signature()
        )));
    }
    object.set(spec, prop.name, value, ctx)
}

/// Invoke one method.
///
/// # Errors
/// Returns error if the method is unknown, the arguments do not match its
/// signature, or the handler fails.
pub fn call_method(
    ctx: &mut CallContext<'_>,
    path: &str,
    interface: &str,
    method: &str,
    args: &[Variant],
) -> Result<MethodReply, BusError> {
    let registry = ctx.registry;
    let object = resolve(registry, path)?;
    let (spec, found) = method_of(object, interface, method)?;
    check_args(found, args)?;
    object.call(spec, found.name, args, ctx)
}

/// Introspection XML for the object at `path`.
///
/// # Errors
/// Returns error if nothing lives at `path`.
pub fn introspect(registry: &Registry, path: &str) -> Result<String, BusError> {
    let object = resolve(registry, path)?;
    let prefix = format!("{path}/");
    let children: Vec<String> = registry
        .children_of(path)
        .into_iter()
        .filter_map(|child| child.strip_prefix(&prefix).map(str::to_string))
        .collect();
    Ok(introspection_xml(object.interfaces(), &children))
}
