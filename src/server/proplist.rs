use std::collections::BTreeMap;

/// Well-known property keys.
pub mod keys {
    /// Human readable stream name
    pub const MEDIA_NAME: &str = "media.name";
    /// Application owning a client
    pub const APPLICATION_NAME: &str = "application.name";
    /// Human readable device description
    pub const DEVICE_DESCRIPTION: &str = "device.description";
    /// Event identifier carried by stream and client events
    pub const EVENT_ID: &str = "event.id";
}

/// How [`Proplist::update`] combines two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Replace the whole list
    Set,
    /// Only add keys that are not present yet
    Merge,
    /// Overwrite keys that appear in the update, keep the rest
    Replace,
}

impl UpdateMode {
    /// Decode the wire mode number.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Set),
            1 => Some(Self::Merge),
            2 => Some(Self::Replace),
            _ => None,
        }
    }
}

/// Key to byte-value property map.
///
/// Equality is map equality, so two lists built in different orders compare
/// equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proplist(BTreeMap<String, Vec<u8>>);

impl Proplist {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is usable as a property key.
    pub fn key_valid(key: &str) -> bool {
        !key.is_empty() && key.is_ascii() && !key.bytes().any(|b| b.is_ascii_control())
    }

    /// Store raw bytes under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    /// Store a string value, NUL terminated as string properties are on the wire.
    pub fn set_str(&mut self, key: impl Into<String>, value: &str) {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.0.insert(key.into(), bytes);
    }

    /// Chainable [`Proplist::set_str`].
    pub fn with_str(mut self, key: impl Into<String>, value: &str) -> Self {
        self.set_str(key, value);
        self
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// String value of `key`, if it holds valid NUL terminated UTF-8.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let bytes = self.get(key)?;
        let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        std::str::from_utf8(bytes).ok()
    }

    /// Remove `key`; returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Combine `other` into this list.
    pub fn update(&mut self, mode: UpdateMode, other: &Proplist) {
        match mode {
            UpdateMode::Set => self.0.clone_from(&other.0),
            UpdateMode::Merge => {
                for (key, value) in &other.0 {
                    self.0.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            UpdateMode::Replace => {
                for (key, value) in &other.0 {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Owned copy of the underlying map.
    pub fn to_map(&self) -> BTreeMap<String, Vec<u8>> {
        self.0.clone()
    }
}

impl From<BTreeMap<String, Vec<u8>>> for Proplist {
    fn from(map: BTreeMap<String, Vec<u8>>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Vec<u8>)> for Proplist {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
