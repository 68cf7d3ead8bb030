use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use reqflow_core::{DomainError, PartNumber};

/// Static reference data for one stocked part.
///
/// All stock-policy fields are optional; spreadsheets routinely leave them blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub part_number: PartNumber,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    /// Reorder level.
    #[serde(default)]
    pub rol: Option<i64>,
    /// Reorder quantity.
    #[serde(default)]
    pub roq: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub gl_code: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
}

impl CatalogEntry {
    pub fn new(part_number: PartNumber, description: impl Into<String>) -> Self {
        Self {
            part_number,
            description: description.into(),
            min: None,
            max: None,
            rol: None,
            roq: None,
            location: None,
            category: None,
            gl_code: None,
            cost_center: None,
        }
    }
}

/// Read-only product catalog keyed by canonical part number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CatalogEntry>", into = "Vec<CatalogEntry>")]
pub struct Catalog {
    entries: BTreeMap<PartNumber, CatalogEntry>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate part numbers.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Result<Self, DomainError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let key = entry.part_number.clone();
            if map.insert(key.clone(), entry).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate catalog part number {key}"
                )));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, part_number: &PartNumber) -> Option<&CatalogEntry> {
        self.entries.get(part_number)
    }

    pub fn contains(&self, part_number: &PartNumber) -> bool {
        self.entries.contains_key(part_number)
    }

    /// Entries in part-number order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<CatalogEntry>> for Catalog {
    type Error = DomainError;

    fn try_from(value: Vec<CatalogEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(value)
    }
}

impl From<Catalog> for Vec<CatalogEntry> {
    fn from(value: Catalog) -> Self {
        value.entries.into_values().collect()
    }
}
