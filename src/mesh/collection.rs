//! Named mesh collections.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::trimesh::Mesh;

/// Meshes keyed by structure name, in insertion order.
///
/// Serializes as a JSON object whose keys keep the order in which
/// structures were added, which is the label table order for pipeline
/// output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshCollection {
    entries: Vec<(String, Mesh)>,
}

impl MeshCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mesh, replacing any existing mesh with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, mesh: Mesh) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = mesh;
        } else {
            self.entries.push((name, mesh));
        }
    }

    /// Look up a mesh by structure name.
    pub fn get(&self, name: &str) -> Option<&Mesh> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Number of meshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection has no meshes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, mesh)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mesh)> + '_ {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Structure names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Build a new collection by applying `f` to every mesh.
    pub fn map<F>(&self, mut f: F) -> MeshCollection
    where
        F: FnMut(&str, &Mesh) -> Mesh,
    {
        MeshCollection {
            entries: self
                .entries
                .iter()
                .map(|(n, m)| (n.clone(), f(n, m)))
                .collect(),
        }
    }

    /// Total vertex count over all meshes.
    pub fn total_vertices(&self) -> usize {
        self.entries.iter().map(|(_, m)| m.num_vertices()).sum()
    }

    /// Total face count over all meshes.
    pub fn total_faces(&self) -> usize {
        self.entries.iter().map(|(_, m)| m.num_faces()).sum()
    }
}

impl<S: Into<String>> FromIterator<(S, Mesh)> for MeshCollection {
    fn from_iter<T: IntoIterator<Item = (S, Mesh)>>(iter: T) -> Self {
        let mut collection = MeshCollection::new();
        for (name, mesh) in iter {
            collection.insert(name, mesh);
        }
        collection
    }
}

impl IntoIterator for MeshCollection {
    type Item = (String, Mesh);
    type IntoIter = std::vec::IntoIter<(String, Mesh)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for MeshCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, mesh) in &self.entries {
            map.serialize_entry(name, mesh)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MeshCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CollectionVisitor;

        impl<'de> Visitor<'de> for CollectionVisitor {
            type Value = MeshCollection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of structure names to meshes")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut collection = MeshCollection::new();
                while let Some((name, mesh)) = access.next_entry::<String, Mesh>()? {
                    collection.insert(name, mesh);
                }
                Ok(collection)
            }
        }

        deserializer.deserialize_map(CollectionVisitor)
    }
}
