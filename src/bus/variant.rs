use std::collections::{BTreeMap, HashMap};

use zbus::zvariant::{self, ObjectPath, Value};

use crate::server::Proplist;

/// Owned bus value exchanged with property and method handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    /// `b`
    Bool(bool),
    /// `u`
    U32(u32),
    /// `t`
    U64(u64),
    /// `s`
    Str(String),
    /// `o`
    ObjectPath(String),
    /// `ay`
    Bytes(Vec<u8>),
    /// `au`
    U32Array(Vec<u32>),
    /// `as`
    StrArray(Vec<String>),
    /// `ao`
    PathArray(Vec<String>),
    /// `a{say}`
    Proplist(BTreeMap<String, Vec<u8>>),
    /// `a{ss}`
    StrDict(BTreeMap<String, String>),
    /// `a{sv}`
    Dict(Vec<(String, Variant)>),
}

impl Variant {
    /// D-Bus type signature.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Bool(_) => "b",
            Self::U32(_) => "u",
            Self::U64(_) => "t",
            Self::Str(_) => "s",
            Self::ObjectPath(_) => "o",
            Self::Bytes(_) => "ay",
            Self::U32Array(_) => "au",
            Self::StrArray(_) => "as",
            Self::PathArray(_) => "ao",
            Self::Proplist(_) => "a{say}",
            Self::StrDict(_) => "a{ss}",
            Self::Dict(_) => "a{sv}",
        }
    }

    /// `b` payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// `u` payload.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// `t` payload.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// `s` payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// `o` payload.
    pub fn as_object_path(&self) -> Option<&str> {
        match self {
            Self::ObjectPath(v) => Some(v),
            _ => None,
        }
    }

    /// `ay` payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// `au` payload.
    pub fn as_u32_array(&self) -> Option<&[u32]> {
        match self {
            Self::U32Array(v) => Some(v),
            _ => None,
        }
    }

    /// `as` payload.
    pub fn as_str_array(&self) -> Option<&[String]> {
        match self {
            Self::StrArray(v) => Some(v),
            _ => None,
        }
    }

    /// `ao` payload.
    pub fn as_path_array(&self) -> Option<&[String]> {
        match self {
            Self::PathArray(v) => Some(v),
            _ => None,
        }
    }

    /// `a{say}` payload.
    pub fn as_proplist(&self) -> Option<Proplist> {
        match self {
            Self::Proplist(v) => Some(Proplist::from(v.clone())),
            _ => None,
        }
    }

    /// `a{ss}` payload.
    pub fn as_str_dict(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::StrDict(v) => Some(v),
            _ => None,
        }
    }

    /// Object path value.
    pub fn path(path: impl Into<String>) -> Self {
        Self::ObjectPath(path.into())
    }

    /// Convert to a wire value.
    ///
    /// # Errors
    /// Returns error if an object path is not a valid D-Bus object path.
    pub fn to_value(&self) -> Result<Value<'static>, zvariant::Error> {
        let value = match self {
            Self::Bool(v) => Value::from(*v),
            Self::U32(v) => Value::from(*v),
            Self::U64(v) => Value::from(*v),
            Self::Str(v) => Value::from(v.clone()),
            Self::ObjectPath(v) => Value::from(ObjectPath::try_from(v.clone())?),
            Self::Bytes(v) => Value::from(v.clone()),
            Self::U32Array(v) => Value::from(v.clone()),
            Self::StrArray(v) => Value::from(v.clone()),
            Self::PathArray(v) => {
                let paths = v
                    .iter()
                    .map(|p| ObjectPath::try_from(p.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::from(paths)
            }
            Self::Proplist(v) => Value::from(
                v.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<String, Vec<u8>>>(),
            ),
            Self::StrDict(v) => Value::from(
                v.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<String, String>>(),
            ),
            Self::Dict(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_value()?);
                }
                Value::from(map)
            }
        };
        Ok(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<Vec<u32>> for Variant {
    fn from(value: Vec<u32>) -> Self {
        Self::U32Array(value)
    }
}

impl From<&Proplist> for Variant {
    fn from(value: &Proplist) -> Self {
        Self::Proplist(value.to_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(Variant::from(true).signature(), "b");
        assert_eq!(Variant::path("/a").signature(), "o");
        assert_eq!(Variant::from(&Proplist::new()).signature(), "a{say}");
        assert_eq!(Variant::Dict(Vec::new()).signature(), "a{sv}");
    }

    #[test]
    fn accessors_reject_other_shapes() {
        assert_eq!(Variant::from(3u32).as_u32(), Some(3));
        assert_eq!(Variant::from(3u32).as_bool(), None);
        assert_eq!(Variant::path("/x").as_str(), None);
        assert_eq!(Variant::path("/x").as_object_path(), Some("/x"));
    }

    #[test]
    fn wire_conversion_checks_paths() {
        assert!(Variant::path("/org/pulseaudio/core1").to_value().is_ok());
        assert!(Variant::path("not a path").to_value().is_err());
        assert!(
            Variant::PathArray(vec!["/ok".to_string(), "bad".to_string()])
                .to_value()
                .is_err()
        );
    }
}
