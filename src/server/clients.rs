use tracing::debug;

use super::{
    CoreError, CoreEvent, EntityRef, Proplist, ServerCore, StreamId, StreamKind, UpdateMode,
    take_next,
    types::ClientData,
};

/// Description of a client to connect.
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    /// Implementing driver
    pub driver: String,
    /// Module that accepted the client
    pub owner_module: Option<u32>,
    /// Properties
    pub proplist: Proplist,
}

impl ServerCore {
    fn client_ref(&self, index: u32) -> Result<&EntityRef<ClientData>, CoreError> {
        self.clients.get(&index).ok_or(CoreError::NoSuchEntity {
            kind: "client",
            index,
        })
    }

    /// Connect a client.
    pub fn add_client(&mut self, new: NewClient) -> u32 {
        let index = take_next(&mut self.counters.client);
        let client = EntityRef::new(ClientData {
            index,
            driver: new.driver,
            owner_module: new.owner_module,
            proplist: new.proplist,
        });
        debug!(index, "client added");
        self.clients.insert(index, client.clone());
        self.fire(CoreEvent::ClientPut(client));
        index
    }

    /// Disconnect a client, removing its streams first.
    ///
    /// # Errors
    /// Returns error if the client does not exist.
    pub fn remove_client(&mut self, index: u32) -> Result<(), CoreError> {
        self.client_ref(index)?;

        for kind in [StreamKind::Playback, StreamKind::Record] {
            let owned: Vec<u32> = self
                .streams(kind)
                .filter(|stream| stream.read().client == Some(index))
                .map(|stream| stream.read().index)
                .collect();
            for stream in owned {
                self.remove_stream(StreamId {
                    kind,
                    index: stream,
                })?;
            }
        }

        self.clients.shift_remove(&index);
        debug!(index, "client removed");
        self.fire(CoreEvent::ClientUnlink(index));
        Ok(())
    }

    /// Update client properties.
    ///
    /// # Errors
    /// Returns error if the client does not exist.
    pub fn update_client_proplist(
        &mut self,
        index: u32,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.client_ref(index)?
            .write()
            .proplist
            .update(mode, proplist);
        self.fire(CoreEvent::ClientProplistChanged(index));
        Ok(())
    }

    /// Remove client properties by key. Missing keys are ignored.
    ///
    /// # Errors
    /// Returns error if the client does not exist.
    pub fn remove_client_properties(
        &mut self,
        index: u32,
        keys: &[String],
    ) -> Result<(), CoreError> {
        {
            let mut data = self.client_ref(index)?.write();
            for key in keys {
                data.proplist.remove(key);
            }
        }
        self.fire(CoreEvent::ClientProplistChanged(index));
        Ok(())
    }

    /// Deliver a named event from a client.
    ///
    /// # Errors
    /// Returns error if the client does not exist.
    pub fn send_client_event(
        &mut self,
        index: u32,
        name: impl Into<String>,
        data: Proplist,
    ) -> Result<(), CoreError> {
        self.client_ref(index)?;
        self.fire(CoreEvent::ClientEvent {
            client: index,
            name: name.into(),
            data,
        });
        Ok(())
    }
}
