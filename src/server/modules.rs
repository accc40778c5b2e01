use tracing::{debug, warn};

use super::{
    CoreError, CoreEvent, EntityRef, Proplist, ServerCore, UpdateMode, modargs, take_next,
    types::ModuleData,
};

const MODULE_PREFIX: &str = "module-";

impl ServerCore {
    fn module_ref(&self, index: u32) -> Result<&EntityRef<ModuleData>, CoreError> {
        self.modules.get(&index).ok_or(CoreError::NoSuchEntity {
            kind: "module",
            index,
        })
    }

    /// Load a module by name with an argument string.
    ///
    /// # Errors
    /// Returns error if the name is not a module name or the arguments do not
    /// parse.
    pub fn load_module(&mut self, name: &str, arguments: &str) -> Result<u32, CoreError> {
        if !name.starts_with(MODULE_PREFIX) || name.len() == MODULE_PREFIX.len() {
            warn!(name, "refusing to load unknown module");
            return Err(CoreError::ModuleLoadFailed(name.to_string()));
        }
        modargs::parse(arguments)?;

        let index = take_next(&mut self.counters.module);
        let module = EntityRef::new(ModuleData {
            index,
            name: name.to_string(),
            arguments: arguments.to_string(),
            usage_counter: None,
            proplist: Proplist::new(),
        });
        debug!(index, name, "module loaded");
        self.modules.insert(index, module.clone());
        self.fire(CoreEvent::ModulePut(module));
        Ok(index)
    }

    /// Unload a module.
    ///
    /// # Errors
    /// Returns error if the module is not loaded.
    pub fn unload_module(&mut self, index: u32) -> Result<(), CoreError> {
        self.module_ref(index)?;
        self.modules.shift_remove(&index);
        debug!(index, "module unloaded");
        self.fire(CoreEvent::ModuleUnlink(index));
        Ok(())
    }

    /// Set or clear the reference count a module reports.
    ///
    /// # Errors
    /// Returns error if the module is not loaded.
    pub fn set_module_usage_counter(
        &mut self,
        index: u32,
        counter: Option<u32>,
    ) -> Result<(), CoreError> {
        self.module_ref(index)?.write().usage_counter = counter;
        Ok(())
    }

    /// Update module properties.
    ///
    /// # Errors
    /// Returns error if the module is not loaded.
    pub fn update_module_proplist(
        &mut self,
        index: u32,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.module_ref(index)?
            .write()
            .proplist
            .update(mode, proplist);
        self.fire(CoreEvent::ModuleProplistChanged(index));
        Ok(())
    }
}
