use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, proplist_variant,
    unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{InterfaceSpec, MODULE_INTERFACE, PROPERTY_LIST_UPDATED, method, ro},
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CORE_PATH, MODULE_TAG, object_path},
    },
    bus::{BusError, Variant},
    server::{CoreEvent, EntityRef, Hook, HookTable, ModuleData, Proplist, modargs},
};

static MODULE: InterfaceSpec = InterfaceSpec {
    name: MODULE_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("Arguments", "a{ss}"),
        ro("UsageCounter", "u"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[method("Unload", &[], &[])],
    signals: &[PROPERTY_LIST_UPDATED],
};

static MODULE_INTERFACES: [&InterfaceSpec; 1] = [&MODULE];

const MODULE_HOOKS: &[Hook] = &[Hook::ModuleProplistChanged];

/// Bus object of one loaded module.
#[derive(Debug)]
pub struct ModuleProxy {
    index: u32,
    path: String,
    module: EntityRef<ModuleData>,
    slots: HookSlots,
    proplist: Cached<Proplist>,
}

impl ModuleProxy {
    /// Proxy for `module`, subscribed to its change hook.
    pub fn new(module: EntityRef<ModuleData>, hooks: &mut HookTable) -> Self {
        let (index, proplist) = {
            let data = module.read();
            (data.index, data.proplist.clone())
        };
        Self {
            index,
            path: object_path(CORE_PATH, MODULE_TAG, index),
            module,
            slots: HookSlots::connect(hooks, MODULE_HOOKS),
            proplist: Cached::new(proplist),
        }
    }

    /// Core index of the module.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl BusObject for ModuleProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &MODULE_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        _ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.module.read();
        Ok(match property {
            "Index" => self.index.into(),
            "Name" => data.name.as_str().into(),
            "Arguments" => {
                let arguments = modargs::parse(&data.arguments).map_err(|e| {
                    BusError::failed(format!("{}: unparsable arguments: {e}", self.path))
                })?;
                Variant::StrDict(arguments)
            }
            "UsageCounter" => data.usage_counter.map(Variant::U32).ok_or_else(|| {
                BusError::unavailable(format!("{} doesn't have a usage counter.", self.path))
            })?,
            "PropertyList" => proplist_variant(&data.proplist),
            _ => return Err(unknown_property(interface, property)),
        })
    }

    fn call(
        &self,
        interface: &'static InterfaceSpec,
        method: &str,
        _args: &[Variant],
        ctx: &mut CallContext<'_>,
    ) -> Result<MethodReply, BusError> {
        match method {
            "Unload" => {
                ctx.core.unload_module(self.index)?;
                Ok(MethodReply::Empty)
            }
            _ => Err(unknown_method(interface, method)),
        }
    }
}

impl Subscriber for ModuleProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::ModuleProplistChanged(index) if *index == self.index => {
                let proplist = self.module.read().proplist.clone();
                notifier.apply(
                    &self.path,
                    MODULE_INTERFACE,
                    "PropertyListUpdated",
                    &mut self.proplist,
                    proplist,
                    proplist_variant,
                );
                true
            }
            _ => false,
        }
    }

    fn release(&mut self, table: &mut HookTable) -> Result<(), InvariantViolation> {
        self.slots.release(table)
    }
}
