//! Ordered field map (field id -> field) for one datasheet

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::field::Field;

/// Ordered mapping from field id to [`Field`], scoped to one datasheet.
///
/// An entry may be *vacant*: the id is known but has no definition. Vacant
/// entries read back as [`Field::placeholder`].
///
/// With the `serde` feature a map reads either a list of fields or an object
/// keyed by id whose `null` values are vacant entries. It writes a list unless
/// it has vacant entries.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: Vec<Entry>,
    index: AHashMap<String, usize>,
}

#[derive(Debug, Clone)]
struct Entry {
    field: Field,
    vacant: bool,
}

impl FieldMap {
    /// Create an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a field map from fields, rejecting duplicate ids
    pub fn from_fields<I: IntoIterator<Item = Field>>(fields: I) -> Result<Self> {
        let mut map = Self::new();
        for field in fields {
            map.insert(field)?;
        }
        Ok(map)
    }

    /// Add a field at the end of the map
    pub fn insert(&mut self, field: Field) -> Result<()> {
        self.push(field, false)
    }

    /// Register an id with no definition
    pub fn insert_vacant(&mut self, id: impl Into<String>) -> Result<()> {
        self.push(Field::placeholder(id), true)
    }

    fn push(&mut self, field: Field, vacant: bool) -> Result<()> {
        if self.index.contains_key(&field.id) {
            return Err(Error::DuplicateField(field.id));
        }
        self.index.insert(field.id.clone(), self.entries.len());
        self.entries.push(Entry { field, vacant });
        Ok(())
    }

    /// Look up a field by id
    pub fn get(&self, id: &str) -> Option<&Field> {
        self.index.get(id).map(|&i| &self.entries[i].field)
    }

    /// Look up a field by id, failing with [`Error::FieldNotFound`]
    pub fn require(&self, id: &str) -> Result<&Field> {
        self.get(id)
            .ok_or_else(|| Error::FieldNotFound(id.to_string()))
    }

    /// Check if an id is present (defined or vacant)
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Check if an id is present but has no definition
    pub fn is_vacant(&self, id: &str) -> bool {
        self.index
            .get(id)
            .map_or(false, |&i| self.entries[i].vacant)
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Field> + '_ {
        self.entries.iter().map(|e| &e.field)
    }

    /// Number of entries (defined and vacant)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<Field>> for FieldMap {
    type Error = Error;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        Self::from_fields(fields)
    }
}

impl From<FieldMap> for Vec<Field> {
    fn from(map: FieldMap) -> Self {
        map.entries.into_iter().map(|e| e.field).collect()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::fmt;

    use serde::de::{self, MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FieldMap;
    use crate::field::Field;

    impl Serialize for FieldMap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.entries.iter().any(|e| e.vacant) {
                serializer.collect_map(
                    self.entries
                        .iter()
                        .map(|e| (&e.field.id, (!e.vacant).then_some(&e.field))),
                )
            } else {
                serializer.collect_seq(self.iter())
            }
        }
    }

    /// Id-keyed entries in document order
    struct Entries(Vec<(String, Option<Field>)>);

    impl<'de> Deserialize<'de> for Entries {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct EntriesVisitor;

            impl<'de> Visitor<'de> for EntriesVisitor {
                type Value = Entries;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("an object from field id to field or null")
                }

                fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entries, A::Error> {
                    let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                    while let Some(entry) = access.next_entry::<String, Option<Field>>()? {
                        entries.push(entry);
                    }
                    Ok(Entries(entries))
                }
            }

            deserializer.deserialize_map(EntriesVisitor)
        }
    }

    impl<'de> Deserialize<'de> for FieldMap {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Helper {
                List(Vec<Field>),
                ById(Entries),
            }

            match Helper::deserialize(deserializer)? {
                Helper::List(fields) => FieldMap::from_fields(fields).map_err(de::Error::custom),
                Helper::ById(Entries(entries)) => {
                    let mut map = FieldMap::new();
                    for (id, field) in entries {
                        let inserted = match field {
                            Some(field) if field.id != id => {
                                return Err(de::Error::custom(format!(
                                    "field under key '{}' has id '{}'",
                                    id, field.id
                                )))
                            }
                            Some(field) => map.insert(field),
                            None => map.insert_vacant(id),
                        };
                        inserted.map_err(de::Error::custom)?;
                    }
                    Ok(map)
                }
            }
        }
    }
}
