use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{
    BusObject, CallContext, HookSlots, MethodReply, ReadContext, Subscriber, input, owner_module,
    proplist_variant, unknown_method, unknown_property,
};
use crate::{
    bridge::{
        interface::{
            CARD_INTERFACE, CARD_PROFILE_INTERFACE, InterfaceSpec, PROPERTY_LIST_UPDATED, arg,
            method, ro, rw, signal,
        },
        invariant::InvariantViolation,
        notifier::{Cached, Notifier},
        path::{CARD_TAG, CORE_PATH, ChildCounter, PROFILE_TAG, object_path},
    },
    bus::{BusError, Signal, Variant},
    server::{
        CardData, CoreEvent, DeviceKind, EntityRef, Hook, HookTable, ProfileData, Proplist,
    },
};

static CARD: InterfaceSpec = InterfaceSpec {
    name: CARD_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("Driver", "s"),
        ro("OwnerModule", "o"),
        ro("Sinks", "ao"),
        ro("Sources", "ao"),
        ro("Profiles", "ao"),
        rw("ActiveProfile", "o"),
        ro("PropertyList", "a{say}"),
    ],
    methods: &[method(
        "GetProfileByName",
        &[arg("name", "s")],
        &[arg("profile", "o")],
    )],
    signals: &[
        signal("ActiveProfileUpdated", &[arg("profile", "o")]),
        signal("NewProfile", &[arg("profile", "o")]),
        signal("ProfileRemoved", &[arg("profile", "o")]),
        PROPERTY_LIST_UPDATED,
    ],
};

static CARD_PROFILE: InterfaceSpec = InterfaceSpec {
    name: CARD_PROFILE_INTERFACE,
    properties: &[
        ro("Index", "u"),
        ro("Name", "s"),
        ro("Description", "s"),
        ro("Sinks", "u"),
        ro("Sources", "u"),
        ro("Priority", "u"),
        ro("Available", "b"),
    ],
    methods: &[],
    signals: &[signal("AvailableChanged", &[arg("available", "b")])],
};

static CARD_INTERFACES: [&InterfaceSpec; 1] = [&CARD];
static PROFILE_INTERFACES: [&InterfaceSpec; 1] = [&CARD_PROFILE];

const CARD_HOOKS: &[Hook] = &[
    Hook::CardProfileChanged,
    Hook::CardProfileAdded,
    Hook::CardProfileRemoved,
    Hook::CardProfileAvailableChanged,
    Hook::CardProplistChanged,
];

/// Bus object of one card profile.
#[derive(Debug)]
pub struct ProfileProxy {
    index: u32,
    path: String,
    profile: EntityRef<ProfileData>,
    available: Cached<bool>,
}

impl ProfileProxy {
    fn new(profile: EntityRef<ProfileData>, counter: &mut ChildCounter, card_path: &str) -> Self {
        let (index, path) = counter.allocate(card_path, PROFILE_TAG);
        let available = Cached::new(profile.read().available);
        Self {
            index,
            path,
            profile,
            available,
        }
    }

    /// Number of the profile below its card.
    pub fn index(&self) -> u32 {
        self.index
    }

    fn on_available_changed(&mut self, notifier: &Notifier) {
        let available = self.profile.read().available;
        notifier.apply(
            &self.path,
            CARD_PROFILE_INTERFACE,
            "AvailableChanged",
            &mut self.available,
            available,
            |a| Variant::Bool(*a),
        );
    }
}

impl BusObject for ProfileProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &PROFILE_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        _ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.profile.read();
        Ok(match property {
            "Index" => self.index.into(),
            "Name" => data.name.as_str().into(),
            "Description" => data.description.as_str().into(),
            "Sinks" => data.sinks.into(),
            "Sources" => data.sources.into(),
            "Priority" => data.priority.into(),
            "Available" => data.available.into(),
            _ => return Err(unknown_property(interface, property)),
        })
    }
}

/// Bus object of one card, parent of its profile objects.
#[derive(Debug)]
pub struct CardProxy {
    index: u32,
    path: String,
    card: EntityRef<CardData>,
    slots: HookSlots,
    profiles: IndexMap<String, ProfileProxy>,
    profile_counter: ChildCounter,
    active_profile: Cached<Option<String>>,
    proplist: Cached<Proplist>,
}

impl CardProxy {
    /// Proxy for `card`, subscribed to its change hooks.
    pub fn new(card: EntityRef<CardData>, hooks: &mut HookTable) -> Self {
        let (index, active, proplist, profiles) = {
            let data = card.read();
            (
                data.index,
                data.active_profile.clone(),
                data.proplist.clone(),
                data.profiles.clone(),
            )
        };
        let path = object_path(CORE_PATH, CARD_TAG, index);
        let mut profile_counter = ChildCounter::default();
        let profiles = profiles
            .into_iter()
            .map(|profile| {
                let name = profile.read().name.clone();
                (name, ProfileProxy::new(profile, &mut profile_counter, &path))
            })
            .collect();

        Self {
            index,
            card,
            slots: HookSlots::connect(hooks, CARD_HOOKS),
            profiles,
            profile_counter,
            active_profile: Cached::new(active),
            proplist: Cached::new(proplist),
            path,
        }
    }

    /// Core index of the card.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Profile object at `path`.
    pub fn profile_at(&self, path: &str) -> Option<&ProfileProxy> {
        self.profiles.values().find(|p| p.path == path)
    }

    /// Profile object for the profile named `name`.
    pub fn profile_named(&self, name: &str) -> Option<&ProfileProxy> {
        self.profiles.get(name)
    }

    fn profile_path_of(&self, name: Option<&str>) -> Option<String> {
        name.and_then(|n| self.profiles.get(n)).map(|p| p.path.clone())
    }

    fn on_profile_changed(&mut self, notifier: &Notifier) {
        let active = self.card.read().active_profile.clone();
        let path = self.profile_path_of(active.as_deref());
        if self.active_profile.replace(active) {
            if let Some(path) = path {
                notifier.emit(
                    Signal::new(&self.path, CARD_INTERFACE, "ActiveProfileUpdated")
                        .with_arg(Variant::path(path)),
                );
            }
        }
    }

    fn on_profile_added(&mut self, profile: &EntityRef<ProfileData>, notifier: &Notifier) {
        if self.profiles.values().any(|p| p.profile.ptr_eq(profile)) {
            warn!(card = self.index, "profile announced twice");
            return;
        }
        let name = profile.read().name.clone();
        let proxy = ProfileProxy::new(profile.clone(), &mut self.profile_counter, &self.path);
        let path = proxy.path.clone();
        self.profiles.insert(name, proxy);
        debug!(%path, "profile object added");
        notifier.emit(
            Signal::new(&self.path, CARD_INTERFACE, "NewProfile").with_arg(Variant::path(path)),
        );
    }

    fn on_profile_removed(&mut self, profile: &EntityRef<ProfileData>, notifier: &Notifier) {
        let Some(position) = self
            .profiles
            .values()
            .position(|p| p.profile.ptr_eq(profile))
        else {
            warn!(card = self.index, "removal of unknown profile");
            return;
        };
        if let Some((_, proxy)) = self.profiles.shift_remove_index(position) {
            debug!(path = %proxy.path, "profile object removed");
            notifier.emit(
                Signal::new(&self.path, CARD_INTERFACE, "ProfileRemoved")
                    .with_arg(Variant::path(proxy.path)),
            );
        }
    }
}

impl BusObject for CardProxy {
    fn path(&self) -> &str {
        &self.path
    }

    fn interfaces(&self) -> &'static [&'static InterfaceSpec] {
        &CARD_INTERFACES
    }

    fn get(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        ctx: &ReadContext<'_>,
    ) -> Result<Variant, BusError> {
        let data = self.card.read();
        Ok(match property {
            "Index" => self.index.into(),
            "Name" => data.name.as_str().into(),
            "Driver" => data.driver.as_str().into(),
            "OwnerModule" => return owner_module(ctx, data.owner_module, &self.path),
            "Sinks" => Variant::PathArray(ctx.registry.card_devices(self.index, DeviceKind::Sink)),
            "Sources" => {
                Variant::PathArray(ctx.registry.card_devices(self.index, DeviceKind::Source))
            }
            "Profiles" => Variant::PathArray(self.children()),
            "ActiveProfile" => self
                .profile_path_of(data.active_profile.as_deref())
                .map(Variant::path)
                .ok_or_else(|| {
                    BusError::unavailable(format!("{} has no active profile.", self.path))
                })?,
            "PropertyList" => proplist_variant(&data.proplist),
            _ => return Err(unknown_property(interface, property)),
        })
    }

    fn set(
        &self,
        interface: &'static InterfaceSpec,
        property: &str,
        value: &Variant,
        ctx: &mut CallContext<'_>,
    ) -> Result<(), BusError> {
        match property {
            "ActiveProfile" => {
                let path = value.as_object_path().unwrap_or_default();
                let name = self
                    .profile_at(path)
                    .map(|p| p.profile.read().name.clone())
                    .ok_or_else(|| BusError::not_found(format!("{path}: No such profile.")))?;
                ctx.core.set_card_profile(self.index, &name)?;
                Ok(())
            }
            _ => Err(BusError::read_only(interface.name, property)),
        }
    }

    fn call(
        &self,
        interface: &'static InterfaceSpec,
        method: &str,
        args: &[Variant],
        _ctx: &mut CallContext<'_>,
    ) -> Result<MethodReply, BusError> {
        match method {
            "GetProfileByName" => {
                let name = input::str(args, 0)?;
                let profile = self
                    .profile_named(name)
                    .ok_or_else(|| BusError::not_found(format!("{name}: No such profile.")))?;
                Ok(MethodReply::value(Variant::path(&profile.path)))
            }
            _ => Err(unknown_method(interface, method)),
        }
    }

    fn children(&self) -> Vec<String> {
        self.profiles.values().map(|p| p.path.clone()).collect()
    }
}

impl Subscriber for CardProxy {
    fn slots(&self) -> &HookSlots {
        &self.slots
    }

    fn handle(&mut self, event: &CoreEvent, notifier: &Notifier) -> bool {
        match event {
            CoreEvent::CardProfileChanged(index) if *index == self.index => {
                self.on_profile_changed(notifier);
                true
            }
            CoreEvent::CardProfileAdded { card, profile } if *card == self.index => {
                self.on_profile_added(profile, notifier);
                true
            }
            CoreEvent::CardProfileRemoved { card, profile } if *card == self.index => {
                self.on_profile_removed(profile, notifier);
                true
            }
            CoreEvent::CardProfileAvailableChanged(profile) => {
                match self
                    .profiles
                    .values_mut()
                    .find(|p| p.profile.ptr_eq(profile))
                {
                    Some(proxy) => {
                        proxy.on_available_changed(notifier);
                        true
                    }
                    None => false,
                }
            }
            CoreEvent::CardProplistChanged(index) if *index == self.index => {
                let proplist = self.card.read().proplist.clone();
                notifier.apply(
                    &self.path,
                    CARD_INTERFACE,
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
