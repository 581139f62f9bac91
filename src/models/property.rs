//! Typed connection properties.
//!
//! A `PropertyKey<T>` is a `static` token. Keys compare by identity (the
//! address of the static), never by name: two keys that happen to share a
//! name address different entries.

use std::fmt;

/// Connect deadline in seconds.
pub static TIMEOUT: PropertyKey<u32> = PropertyKey::new("connect timeout", Some(10));

/// Reconnect transparently before the next statement after the link broke.
pub static AUTO_RECONNECT: PropertyKey<bool> = PropertyKey::new("autoReconnect", Some(false));

/// Character set requested for the session.
pub static CHARACTER_ENCODING: PropertyKey<String> = PropertyKey::new("characterEncoding", None);

/// Type-erased view of a registered key.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredKey {
    pub id: KeyId,
    pub name: &'static str,
    pub has_default: bool,
}

/// Every key known to the crate, in declaration order.
pub fn registered() -> [RegisteredKey; 3] {
    [
        TIMEOUT.registration(),
        AUTO_RECONNECT.registration(),
        CHARACTER_ENCODING.registration(),
    ]
}

/// Registered keys that carry a default value.
pub fn with_defaults() -> Vec<RegisteredKey> {
    registered().into_iter().filter(|k| k.has_default).collect()
}

/// Identity of a key: the address of its static.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(usize);

pub struct PropertyKey<T> {
    name: &'static str,
    default: Option<T>,
}

impl<T> PropertyKey<T> {
    pub(crate) const fn new(name: &'static str, default: Option<T>) -> Self {
        Self { name, default }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }

    pub fn id(&'static self) -> KeyId {
        KeyId(std::ptr::from_ref(self) as usize)
    }

    fn registration(&'static self) -> RegisteredKey {
        RegisteredKey {
            id: self.id(),
            name: self.name,
            has_default: self.default.is_some(),
        }
    }
}

impl<T> fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyKey")
            .field("name", &self.name)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Stored property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Int(u32),
    Bool(bool),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Value types a property key may carry.
pub trait PropertyType: Clone + Sized {
    fn into_value(self) -> PropertyValue;
    fn from_value(value: &PropertyValue) -> Option<Self>;
}

impl PropertyType for u32 {
    fn into_value(self) -> PropertyValue {
        PropertyValue::Int(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyType for bool {
    fn into_value(self) -> PropertyValue {
        PropertyValue::Bool(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyType for String {
    fn into_value(self) -> PropertyValue {
        PropertyValue::Text(self)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: KeyId,
    name: &'static str,
    value: PropertyValue,
}

/// Insertion-ordered property bag keyed by key identity.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<Entry>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`; `None` removes the entry. Replacing an
    /// existing value keeps its position.
    pub fn set<T: PropertyType>(&mut self, key: &'static PropertyKey<T>, value: Option<T>) {
        let id = key.id();
        match value {
            None => self.entries.retain(|e| e.id != id),
            Some(value) => {
                let value = value.into_value();
                match self.entries.iter_mut().find(|e| e.id == id) {
                    Some(entry) => entry.value = value,
                    None => self.entries.push(Entry {
                        id,
                        name: key.name,
                        value,
                    }),
                }
            }
        }
    }

    /// Stored value only, without falling back to the key's default.
    pub fn get_explicit<T: PropertyType>(&self, key: &'static PropertyKey<T>) -> Option<T> {
        let id = key.id();
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| T::from_value(&e.value))
    }

    /// Stored value, else the key's default.
    pub fn get<T: PropertyType>(&self, key: &'static PropertyKey<T>) -> Option<T> {
        self.get_explicit(key)
            .or_else(|| key.default_value().cloned())
    }

    pub fn contains<T>(&self, key: &'static PropertyKey<T>) -> bool {
        let id = key.id();
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PropertyValue)> {
        self.entries.iter().map(|e| (e.name, &e.value))
    }
}
