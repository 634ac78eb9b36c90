//! Lookup tables keyed by integer id and optional name.
//!
//! Apps, SIMs and GPIO pins are all addressed this way. A lookup that matches
//! more than one entry is an error rather than a silent first match.

use std::fmt;
use std::str::FromStr;

use crate::error::{ModemError, Result};

/// A registry lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Match by id.
    Id(u32),
    /// Match by name. Ids are never compared.
    Name(String),
}

impl From<u32> for Key {
    fn from(id: u32) -> Self {
        Key::Id(id)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

/// Parses decimal text as an id and anything else as a name.
impl FromStr for Key {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<u32>() {
            Ok(id) => Key::Id(id),
            Err(_) => Key::Name(s.to_string()),
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{}", id),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Something that can live in a [`Registry`].
pub trait Entry {
    /// The stable integer id.
    fn id(&self) -> u32;

    /// The optional name.
    fn name(&self) -> Option<&str>;

    /// Whether `key` refers to this entry.
    fn matches(&self, key: &Key) -> bool {
        match key {
            Key::Id(id) => self.id() == *id,
            Key::Name(name) => self.name() == Some(name.as_str()),
        }
    }
}

/// An ordered set of entries addressed by [`Key`].
#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: &'static str,
    entries: Vec<T>,
}

impl<T: Entry> Registry<T> {
    /// Create a registry. `kind` names the entries in lookup errors.
    pub fn new(kind: &'static str, entries: Vec<T>) -> Self {
        Registry { kind, entries }
    }

    /// The index of the single entry matching `key`.
    pub fn position(&self, key: &Key) -> Result<usize> {
        let mut matches = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.matches(key))
            .map(|(index, _)| index);

        let first = matches.next().ok_or_else(|| ModemError::NotFound {
            kind: self.kind,
            key: key.to_string(),
        })?;

        if matches.next().is_some() {
            return Err(ModemError::Ambiguous {
                kind: self.kind,
                key: key.to_string(),
            });
        }

        Ok(first)
    }

    /// The single entry matching `key`.
    pub fn find(&self, key: &Key) -> Result<&T> {
        let index = self.position(key)?;
        Ok(&self.entries[index])
    }

    /// The entry at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// The entry at `index`, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.entries.get_mut(index)
    }

    /// All entries, in registration order.
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Thing {
        id: u32,
        name: Option<&'static str>,
    }

    impl Entry for Thing {
        fn id(&self) -> u32 {
            self.id
        }

        fn name(&self) -> Option<&str> {
            self.name
        }
    }

    fn registry() -> Registry<Thing> {
        Registry::new(
            "thing",
            vec![
                Thing { id: 0, name: Some("alpha") },
                Thing { id: 1, name: Some("beta") },
                Thing { id: 2, name: None },
                Thing { id: 7, name: Some("1") },
            ],
        )
    }

    #[test]
    fn test_find_by_id_and_name() {
        let things = registry();
        assert_eq!(things.find(&Key::Id(0)).unwrap().id, 0);
        assert_eq!(things.find(&"beta".into()).unwrap().id, 1);
        assert_eq!(things.find(&"2".parse().unwrap()).unwrap().id, 2);
    }

    #[test]
    fn test_numeric_name_matches_names_only() {
        let things = registry();
        // "1" names id 7; the entry with id 1 is not considered
        assert_eq!(things.find(&Key::Name("1".to_string())).unwrap().id, 7);
        assert_eq!(things.find(&Key::Id(1)).unwrap().name, Some("beta"));

        let err = things.find(&Key::Name("2".to_string())).unwrap_err();
        assert!(matches!(err, ModemError::NotFound { .. }));
    }

    #[test]
    fn test_missing_key() {
        let err = registry().find(&"gamma".into()).unwrap_err();
        assert!(matches!(err, ModemError::NotFound { kind: "thing", .. }));
    }

    #[test]
    fn test_ambiguous_key() {
        let things = Registry::new(
            "thing",
            vec![
                Thing { id: 0, name: Some("twin") },
                Thing { id: 1, name: Some("twin") },
            ],
        );
        let err = things.find(&"twin".into()).unwrap_err();
        assert!(matches!(err, ModemError::Ambiguous { .. }));
        assert_eq!(things.find(&Key::Id(1)).unwrap().id, 1);
    }
}
