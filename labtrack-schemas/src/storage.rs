use serde::{Deserialize, Serialize};

/// Kinds of node in the physical storage hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageLocationType {
    Freezer,
    Refrigerator,
    Shelf,
    Rack,
    Box,
    Slot,
    /// Pseudo-location for vessels stored directly in a physical location.
    Loose,
}

impl StorageLocationType {
    /// Whether a vessel may point at a location of this type directly.
    pub fn is_leaf_capable(&self) -> bool {
        matches!(
            self,
            StorageLocationType::Slot | StorageLocationType::Box | StorageLocationType::Loose
        )
    }

    /// Whether a loose bucket may be synthesized under a location of this type.
    pub fn allows_loose(&self) -> bool {
        !matches!(self, StorageLocationType::Slot | StorageLocationType::Loose)
    }

    /// Parses a type name from an external system, ignoring case and separators.
    pub fn from_name(name: &str) -> Option<StorageLocationType> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "freezer" => Some(StorageLocationType::Freezer),
            "refrigerator" | "fridge" => Some(StorageLocationType::Refrigerator),
            "shelf" => Some(StorageLocationType::Shelf),
            "rack" => Some(StorageLocationType::Rack),
            "box" => Some(StorageLocationType::Box),
            "slot" => Some(StorageLocationType::Slot),
            "loose" => Some(StorageLocationType::Loose),
            _ => None,
        }
    }
}

/// One row from an external storage system export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageImportRecord {
    pub external_id: String,
    pub parent_external_id: Option<String>,
    pub name: String,
    pub type_name: String,
}
