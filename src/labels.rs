//! Label tables mapping atlas label ids to structure names.
//!
//! The pipeline never hard-codes a labelling scheme: it takes a
//! [`LabelTable`] as input. [`LabelTable::freesurfer_subcortical`] provides
//! the FreeSurfer `aseg` subcortical structures; other schemes can be loaded
//! from JSON (`{"10": "Left-Thalamus", …}`) or from a FreeSurfer colour
//! lookup table (`id name r g b a` per line).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AtlasError, Result};

/// Ordered mapping from label id to structure name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<(i32, String)>,
}

impl LabelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// FreeSurfer `aseg` subcortical structures.
    pub fn freesurfer_subcortical() -> Self {
        [
            (10, "Left-Thalamus"),
            (11, "Left-Caudate"),
            (12, "Left-Putamen"),
            (13, "Left-Pallidum"),
            (17, "Left-Hippocampus"),
            (18, "Left-Amygdala"),
            (26, "Left-Accumbens"),
            (49, "Right-Thalamus"),
            (50, "Right-Caudate"),
            (51, "Right-Putamen"),
            (52, "Right-Pallidum"),
            (53, "Right-Hippocampus"),
            (54, "Right-Amygdala"),
            (58, "Right-Accumbens"),
        ]
        .into_iter()
        .collect()
    }

    /// Add or rename a label. New labels go to the end.
    pub fn insert(&mut self, id: i32, name: impl Into<String>) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(i, _)| *i == id) {
            slot.1 = name;
        } else {
            self.entries.push((id, name));
        }
    }

    /// Look up a structure name.
    pub fn name(&self, id: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, n)| n.as_str())
    }

    /// Whether the table has an entry for `id`.
    pub fn contains(&self, id: i32) -> bool {
        self.entries.iter().any(|(i, _)| *i == id)
    }

    /// Iterate over `(id, name)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> + '_ {
        self.entries.iter().map(|(i, n)| (*i, n.as_str()))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the labels for which `keep` returns true.
    pub fn filtered<F: Fn(i32) -> bool>(&self, keep: F) -> LabelTable {
        LabelTable {
            entries: self
                .entries
                .iter()
                .filter(|(i, _)| keep(*i))
                .cloned()
                .collect(),
        }
    }

    /// Placeholder table for up to `limit` non-zero labels, named
    /// `Unknown_Structure_<id>`.
    pub fn placeholders<I: IntoIterator<Item = i32>>(labels: I, limit: usize) -> LabelTable {
        labels
            .into_iter()
            .filter(|&l| l != 0)
            .take(limit)
            .map(|l| (l, format!("Unknown_Structure_{}", l)))
            .collect()
    }

    /// First structure name carried by more than one label id.
    ///
    /// Meshes are keyed by name, so such a table cannot be built without
    /// losing a structure.
    pub fn duplicate_name(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .iter()
            .map(|(_, name)| name.as_str())
            .find(|name| !seen.insert(*name))
    }

    /// Parse a FreeSurfer colour lookup table.
    ///
    /// Blank lines and `#` comments are ignored; each remaining line must
    /// start with an integer id followed by a name. Colour columns are
    /// ignored.
    pub fn parse_lut(text: &str) -> std::result::Result<LabelTable, String> {
        let mut table = LabelTable::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let id = fields
                .next()
                .and_then(|f| f.parse::<i32>().ok())
                .ok_or_else(|| format!("line {}: expected an integer label id", lineno + 1))?;
            let name = fields
                .next()
                .ok_or_else(|| format!("line {}: missing structure name", lineno + 1))?;
            table.insert(id, name);
        }
        Ok(table)
    }

    /// Load a table from a `.json` file or a FreeSurfer LUT text file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<LabelTable> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let table = if is_json {
            serde_json::from_str(&text).map_err(|e| AtlasError::LabelTable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            LabelTable::parse_lut(&text).map_err(|message| AtlasError::LabelTable {
                path: path.to_path_buf(),
                message,
            })?
        };

        if table.is_empty() {
            return Err(AtlasError::LabelTable {
                path: path.to_path_buf(),
                message: "no labels defined".to_string(),
            });
        }
        if let Some(name) = table.duplicate_name() {
            return Err(AtlasError::LabelTable {
                path: path.to_path_buf(),
                message: format!("structure name {:?} is used by more than one label", name),
            });
        }
        Ok(table)
    }
}

impl<S: Into<String>> FromIterator<(i32, S)> for LabelTable {
    fn from_iter<T: IntoIterator<Item = (i32, S)>>(iter: T) -> Self {
        let mut table = LabelTable::new();
        for (id, name) in iter {
            table.insert(id, name);
        }
        table
    }
}

impl From<BTreeMap<i32, String>> for LabelTable {
    fn from(map: BTreeMap<i32, String>) -> Self {
        map.into_iter().collect()
    }
}

impl Serialize for LabelTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, name) in &self.entries {
            map.serialize_entry(&id.to_string(), name)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = LabelTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of integer label ids to structure names")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut table = LabelTable::new();
                while let Some((key, name)) = access.next_entry::<String, String>()? {
                    let id = key.trim().parse::<i32>().map_err(|_| {
                        serde::de::Error::custom(format!("label id {:?} is not an integer", key))
                    })?;
                    table.insert(id, name);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}
