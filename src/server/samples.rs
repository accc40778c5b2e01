use tracing::debug;

use super::{
    ChannelVolumes, CoreError, CoreEvent, EntityRef, Proplist, ServerCore, UpdateMode, take_next,
    types::{SampleContents, SampleData},
};

/// Description of a sample cache entry to upload.
#[derive(Debug, Clone)]
pub struct NewSample {
    /// Entry name; an existing entry with the same name is replaced
    pub name: String,
    /// Decoded audio
    pub contents: SampleContents,
    /// Volume applied on playback
    pub default_volume: Option<ChannelVolumes>,
    /// Properties
    pub proplist: Proplist,
}

/// Record of one sample playback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlayback {
    /// Sample cache entry
    pub sample: u32,
    /// Sink it played on
    pub sink: u32,
    /// Requested volume
    pub volume: u32,
    /// Playback properties
    pub proplist: Proplist,
}

impl ServerCore {
    fn sample_ref(&self, index: u32) -> Result<&EntityRef<SampleData>, CoreError> {
        self.samples.get(&index).ok_or(CoreError::NoSuchEntity {
            kind: "sample",
            index,
        })
    }

    /// Store a sample.
    ///
    /// Uploading under an existing name replaces that entry's contents and
    /// fires [`CoreEvent::SampleChanged`] instead of creating a new entry.
    pub fn add_sample(&mut self, new: NewSample) -> u32 {
        if let Some(index) = self.sample_by_name(&new.name) {
            if let Some(existing) = self.samples.get(&index) {
                let mut data = existing.write();
                data.contents = Some(new.contents);
                data.default_volume = new.default_volume;
                data.lazy_file = None;
                data.proplist = new.proplist;
            }
            self.fire(CoreEvent::SampleChanged(index));
            return index;
        }

        let index = take_next(&mut self.counters.sample);
        let sample = EntityRef::new(SampleData {
            index,
            name: new.name,
            contents: Some(new.contents),
            default_volume: new.default_volume,
            lazy_file: None,
            proplist: new.proplist,
        });
        debug!(index, "sample added");
        self.samples.insert(index, sample.clone());
        self.fire(CoreEvent::SamplePut(sample));
        index
    }

    /// Register a sample that is loaded from `file` on first use.
    pub fn add_lazy_sample(&mut self, name: impl Into<String>, file: impl Into<String>) -> u32 {
        let index = take_next(&mut self.counters.sample);
        let sample = EntityRef::new(SampleData {
            index,
            name: name.into(),
            contents: None,
            default_volume: None,
            lazy_file: Some(file.into()),
            proplist: Proplist::new(),
        });
        debug!(index, "lazy sample added");
        self.samples.insert(index, sample.clone());
        self.fire(CoreEvent::SamplePut(sample));
        index
    }

    /// Fill in the contents of a lazy sample.
    ///
    /// # Errors
    /// Returns error if the sample does not exist.
    pub fn load_lazy_sample(
        &mut self,
        index: u32,
        contents: SampleContents,
    ) -> Result<(), CoreError> {
        self.sample_ref(index)?.write().contents = Some(contents);
        self.fire(CoreEvent::SampleChanged(index));
        Ok(())
    }

    /// Update sample properties.
    ///
    /// # Errors
    /// Returns error if the sample does not exist.
    pub fn update_sample_proplist(
        &mut self,
        index: u32,
        mode: UpdateMode,
        proplist: &Proplist,
    ) -> Result<(), CoreError> {
        self.sample_ref(index)?
            .write()
            .proplist
            .update(mode, proplist);
        self.fire(CoreEvent::SampleChanged(index));
        Ok(())
    }

    /// Remove a sample.
    ///
    /// # Errors
    /// Returns error if the sample does not exist.
    pub fn remove_sample(&mut self, index: u32) -> Result<(), CoreError> {
        self.sample_ref(index)?;
        self.samples.shift_remove(&index);
        debug!(index, "sample removed");
        self.fire(CoreEvent::SampleUnlink(index));
        Ok(())
    }

    /// Play a sample on `sink`, or on the default sink when `None`.
    ///
    /// # Errors
    /// Returns error if the sample or sink does not exist, there is no default
    /// sink, or a lazy sample has not been loaded.
    pub fn play_sample(
        &mut self,
        index: u32,
        sink: Option<u32>,
        volume: u32,
        proplist: Proplist,
    ) -> Result<(), CoreError> {
        if self.sample_ref(index)?.read().contents.is_none() {
            return Err(CoreError::SampleNotLoaded(index));
        }
        let sink = match sink {
            Some(sink) if self.sinks.contains_key(&sink) => sink,
            Some(sink) => {
                return Err(CoreError::NoSuchEntity {
                    kind: "sink",
                    index: sink,
                });
            }
            None => self.default_sink.ok_or(CoreError::NoSinks)?,
        };
        debug!(index, sink, volume, "sample played");
        self.playbacks.push(SamplePlayback {
            sample: index,
            sink,
            volume,
            proplist,
        });
        Ok(())
    }

    /// Every playback requested so far, oldest first.
    pub fn playbacks(&self) -> &[SamplePlayback] {
        &self.playbacks
    }
}
