use tracing::debug;

use super::{
    CoreError, CoreEvent, DeviceId, DeviceKind, EntityRef, Proplist, ServerCore, UpdateMode,
    take_next,
    types::{CardData, ProfileData},
};

/// Description of a card to create.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    /// Requested name, made unique on collision
    pub name: String,
    /// Implementing driver
    pub driver: String,
    /// Module creating the card
    pub owner_module: Option<u32>,
    /// Profiles in declaration order
    pub profiles: Vec<ProfileData>,
    /// Initially active profile
    pub active_profile: Option<String>,
    /// Properties
    pub proplist: Proplist,
}

impl ServerCore {
    fn card_ref(&self, index: u32) -> Result<&EntityRef<CardData>, CoreError> {
        self.cards
            .get(&index)
            .ok_or(CoreError::NoSuchEntity { kind: "card", index })
    }

    /// Create a card and fire [`CoreEvent::CardPut`].
    ///
    /// # Errors
    /// Returns error if the active profile is not one of the card's profiles.
    pub fn add_card(&mut self, new: NewCard) -> Result<u32, CoreError> {
        if let Some(active) = &new.active_profile {
            if !new.profiles.iter().any(|p| &p.name == active) {
                return Err(CoreError::NoSuchProfile(active.clone()));
            }
        }

        let name = self.unique_name(&new.name, |n| self.card_by_name(n).is_some());
        let index = take_next(&mut self.counters.card);
        let card = EntityRef::new(CardData {
            index,
            name,
            driver: new.driver,
            owner_module: new.owner_module,
            profiles: new.profiles.into_iter().map(EntityRef::new).collect(),
            active_profile: new.active_profile,
            proplist: new.proplist,
        });

        debug!(index, "card added");
        self.cards.insert(index, card.clone());
        self.fire(CoreEvent::CardPut(card));
        Ok(index)
    }

    /// Remove a card together with the devices it owns.
    ///
    /// # Errors
    /// Returns error if the card does not exist.
    pub fn remove_card(&mut self, index: u32) -> Result<(), CoreError> {
        self.card_ref(index)?;

        for kind in [DeviceKind::Sink, DeviceKind::Source] {
            let owned: Vec<u32> = self
                .devices(kind)
                .filter(|device| device.read().card == Some(index))
                .map(|device| device.read().index)
                .collect();
            for device in owned {
                if self.device(DeviceId { kind, index: device }).is_some() {
                    self.remove_device(DeviceId { kind, index: device })?;
                }
            }
        }

        self.cards.shift_remove(&index);
        debug!(index, "card removed");
        self.fire(CoreEvent::CardUnlink(index));
        Ok(())
    }

    /// Switch the active profile.
    ///
    /// # Errors
    /// Returns error if the card or profile does not exist.
    pub fn set_card_profile(&mut self, index: u32, profile: &str) -> Result<(), CoreError> {
        let card = self.card_ref(index)?.clone();
        {
            let mut data = card.write();
            if !data.profiles.iter().any(|p| p.read().name == profile) {
                return Err(CoreError::NoSuchProfile(profile.to_string()));
            }
            if data.active_profile.as_deref() == Some(profile) {
                return Ok(());
            }
            data.active_profile = Some(profile.to_string());
        }
        self.fire(CoreEvent::CardProfileChanged(index));
        Ok(())
    }

    /// Add a profile to a live card.
    ///
    /// # Errors
    /// Returns error if the card does not exist or already has a profile with
    /// that name.
    pub fn add_card_profile(&mut self, index: u32, profile: ProfileData) -> Result<(), CoreError> {
        let card = self.card_ref(index)?.clone();
        let profile = {
            let mut data = card.write();
            if data.profiles.iter().any(|p| p.read().name == profile.name) {
                return Err(CoreError::DuplicateName(profile.name));
            }
            let profile = EntityRef::new(profile);
            data.profiles.push(profile.clone());
            profile
        };
        self.fire(CoreEvent::CardProfileAdded {
            card: index,
            profile,
        });
        Ok(())
    }

    /// Remove an inactive profile from a live card.
    ///
    /// # Errors
    /// Returns error if the card or profile does not exist or the profile is
    /// active.
    pub fn remove_card_profile(&mut self, index: u32, profile: &str) -> Result<(), CoreError> {
        let card = self.card_ref(index)?.clone();
        let removed = {
            let mut data = card.write();
            if data.active_profile.as_deref() == Some(profile) {
                return Err(CoreError::ProfileInUse(profile.to_string()));
            }
            let position = data
                .profiles
                .iter()
                .position(|p| p.read().name == profile)
                .ok_or_else(|| CoreError::NoSuchProfile(profile.to_string()))?;
            data.profiles.remove(position)
        };
        self.fire(CoreEvent::CardProfileRemoved {
            card: index,
            profile: removed,
        });
        Ok(())
    }

    /// Mark a profile available or unavailable.
    ///
    /// # Errors
    /// Returns error if the card or profile does not exist.
    pub fn set_profile_available(
        &mut self,
        index: u32,
        profile: &str,
        available: bool,
    ) -> Result<(), CoreError> {
        let card = self.card_ref(index)?;
        let target = card
            .read()
            .profiles
            .iter()
            .find(|p| p.read().name == profile)
            .cloned()
            .ok_or_else(|| CoreError::NoSuchProfile(profile.to_string()))?;

        if target.read().available == available {
            return Ok(());
        }
        target.write().available = available;
        self.fire(CoreEvent::CardProfileAvailableChanged(target));
        Ok(())
    }

    /// Update card properties.
    ///
    /// # Errors
    /// Returns error if the card does not exist.
    pub fn update_card_proplist(
        &mut self,
        index: u32,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.card_ref(index)?.write().proplist.update(mode, proplist);
        self.fire(CoreEvent::CardProplistChanged(index));
        Ok(())
    }
}
