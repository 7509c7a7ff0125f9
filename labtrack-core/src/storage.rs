//! The physical storage hierarchy: freezers down to slots.
//!
//! Nodes live in an arena owned by [`StorageTree`]; a parent owns its children. New
//! nodes can only be attached below existing ones and [`StorageTree::move_location`]
//! refuses moves into a node's own subtree, so the tree can never contain a cycle.

use crate::error::{LabError, Result};
use labtrack_schemas::storage::{StorageImportRecord, StorageLocationType};
use log::{debug, info};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StorageId(usize);

#[derive(Debug, Clone)]
pub struct StorageLocation {
    id: StorageId,
    name: String,
    location_type: StorageLocationType,
    parent: Option<StorageId>,
    children: Vec<StorageId>,
    external_id: Option<String>,
    loose: Option<StorageId>,
}

impl StorageLocation {
    pub fn id(&self) -> StorageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location_type(&self) -> StorageLocationType {
        self.location_type
    }

    pub fn parent(&self) -> Option<StorageId> {
        self.parent
    }

    pub fn children(&self) -> &[StorageId] {
        &self.children
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

/// Counts from a storage import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageImportReport {
    pub created: usize,
    pub already_present: usize,
    pub passes: usize,
}

#[derive(Debug, Default, Clone)]
pub struct StorageTree {
    nodes: Vec<StorageLocation>,
    by_external_id: HashMap<String, StorageId>,
}

impl StorageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: StorageId) -> Option<&StorageLocation> {
        self.nodes.get(id.0)
    }

    fn node(&self, id: StorageId) -> Result<&StorageLocation> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| LabError::StorageLocationNotFound(format!("{:?}", id)))
    }

    pub fn by_external_id(&self, external_id: &str) -> Option<StorageId> {
        self.by_external_id.get(external_id).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = &StorageLocation> {
        self.nodes.iter().filter(|n| n.parent.is_none())
    }

    pub fn find_root(&self, name: &str) -> Option<StorageId> {
        self.roots().find(|n| n.name == name).map(|n| n.id)
    }

    /// Creates a location. With a parent, the node is registered as one of its children.
    ///
    /// `Loose` locations are never created directly; asking for one returns the
    /// parent's loose bucket.
    pub fn add_location(
        &mut self,
        parent: Option<StorageId>,
        name: &str,
        location_type: StorageLocationType,
    ) -> Result<StorageId> {
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        if location_type == StorageLocationType::Loose {
            return match parent {
                Some(parent) => self.get_or_create_loose(parent),
                None => Err(LabError::NotLeafCapable(name.to_string())),
            };
        }
        Ok(self.push(parent, name, location_type))
    }

    fn push(
        &mut self,
        parent: Option<StorageId>,
        name: &str,
        location_type: StorageLocationType,
    ) -> StorageId {
        let id = StorageId(self.nodes.len());
        self.nodes.push(StorageLocation {
            id,
            name: name.to_string(),
            location_type,
            parent,
            children: Vec::new(),
            external_id: None,
            loose: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn children(&self, id: StorageId) -> Result<Vec<&StorageLocation>> {
        Ok(self.node(id)?.children.iter().map(|c| &self.nodes[c.0]).collect())
    }

    /// Breadth-first search below `root` for a node called `name`; nearer nodes win.
    pub fn find_descendant_by_name(&self, root: StorageId, name: &str) -> Option<StorageId> {
        let mut queue: VecDeque<StorageId> = self.get(root)?.children.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.0];
            if node.name == name {
                return Some(id);
            }
            queue.extend(node.children.iter().copied());
        }
        None
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: StorageId) -> Vec<StorageId> {
        let mut ancestors = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.nodes[parent.0].parent;
        }
        ancestors
    }

    pub fn is_ancestor(&self, ancestor: StorageId, of: StorageId) -> bool {
        self.ancestors(of).contains(&ancestor)
    }

    /// Human readable path, e.g. `Freezer 1 > Shelf 2 > Slot 3`.
    pub fn path(&self, id: StorageId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .iter()
            .rev()
            .map(|a| self.nodes[a.0].name.as_str())
            .collect();
        if let Some(node) = self.get(id) {
            names.push(&node.name);
        }
        names.join(" > ")
    }

    /// The single loose bucket under a physical location, created on first use.
    pub fn get_or_create_loose(&mut self, location: StorageId) -> Result<StorageId> {
        let node = self.node(location)?;
        if let Some(loose) = node.loose {
            return Ok(loose);
        }
        if !node.location_type.allows_loose() {
            return Err(LabError::NotLeafCapable(node.name.clone()));
        }
        let name = format!("{} Loose", node.name);
        let loose = self.push(Some(location), &name, StorageLocationType::Loose);
        self.nodes[location.0].loose = Some(loose);
        debug!("Created loose bucket '{}'", name);
        Ok(loose)
    }

    /// Where a vessel placed at `location` actually ends up: the location itself when it
    /// can hold vessels, otherwise its loose bucket.
    pub fn leaf_for_vessel(&mut self, location: StorageId) -> Result<StorageId> {
        let node = self.node(location)?;
        if node.location_type.is_leaf_capable() {
            Ok(location)
        } else {
            self.get_or_create_loose(location)
        }
    }

    /// Re-parents a location. Moving a node under itself or one of its descendants
    /// is refused.
    pub fn move_location(&mut self, id: StorageId, new_parent: StorageId) -> Result<()> {
        self.node(id)?;
        self.node(new_parent)?;
        if id == new_parent || self.is_ancestor(id, new_parent) {
            return Err(LabError::StorageCycle {
                location: self.nodes[id.0].name.clone(),
                new_parent: self.nodes[new_parent.0].name.clone(),
            });
        }
        if let Some(old_parent) = self.nodes[id.0].parent {
            self.nodes[old_parent.0].children.retain(|c| *c != id);
        }
        self.nodes[id.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(id);
        Ok(())
    }

    /// Builds locations from an external export.
    ///
    /// Records may arrive in any order: each pass takes every record whose parent is
    /// already known, and passes repeat until nothing is left or no progress is made.
    /// The whole batch is checked before the first node is created, so a failed import
    /// leaves the tree untouched.
    pub fn import(&mut self, records: &[StorageImportRecord]) -> Result<StorageImportReport> {
        let mut report = StorageImportReport::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for record in records {
            if !seen.insert(record.external_id.as_str()) {
                return Err(LabError::DuplicateStorageId(record.external_id.clone()));
            }
            if self.by_external_id.contains_key(&record.external_id) {
                report.already_present += 1;
                continue;
            }
            let location_type = StorageLocationType::from_name(&record.type_name)
                .ok_or_else(|| LabError::UnknownStorageType(record.type_name.clone()))?;
            pending.push((record, location_type));
        }

        let mut known: HashMap<&str, StorageLocationType> = self
            .by_external_id
            .iter()
            .map(|(external_id, id)| (external_id.as_str(), self.nodes[id.0].location_type))
            .collect();
        let mut plan = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            report.passes += 1;
            let mut deferred = Vec::new();
            let before = pending.len();
            for (record, location_type) in pending {
                let parent_type = match &record.parent_external_id {
                    None => None,
                    Some(parent_id) => match known.get(parent_id.as_str()) {
                        Some(parent_type) => Some(*parent_type),
                        None => {
                            deferred.push((record, location_type));
                            continue;
                        }
                    },
                };
                if location_type == StorageLocationType::Loose
                    && !parent_type.map_or(false, |t| t.allows_loose())
                {
                    return Err(LabError::NotLeafCapable(record.name.clone()));
                }
                known.insert(record.external_id.as_str(), location_type);
                plan.push((record, location_type));
            }
            if deferred.len() == before {
                let mut unresolved: Vec<String> =
                    deferred.iter().map(|(r, _)| r.external_id.clone()).collect();
                unresolved.sort();
                return Err(LabError::UnresolvedStorageParents(unresolved));
            }
            pending = deferred;
        }

        for (record, location_type) in plan {
            let parent = record
                .parent_external_id
                .as_ref()
                .and_then(|parent_id| self.by_external_id.get(parent_id).copied());
            let id = self.add_location(parent, &record.name, location_type)?;
            self.nodes[id.0].external_id = Some(record.external_id.clone());
            self.by_external_id.insert(record.external_id.clone(), id);
            report.created += 1;
        }

        info!(
            "Imported {} storage locations in {} passes ({} already present)",
            report.created, report.passes, report.already_present
        );
        Ok(report)
    }
}

/// Reads a storage export CSV with `external_id,parent_external_id,name,type_name`
/// columns. An empty parent marks a root.
pub fn read_storage_export(path: &str) -> Result<Vec<StorageImportRecord>> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| LabError::CsvError(path.to_string(), e))?;
    reader
        .deserialize()
        .map(|result| result.map_err(|e| LabError::CsvError(path.to_string(), e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, parent: Option<&str>, name: &str, type_name: &str) -> StorageImportRecord {
        StorageImportRecord {
            external_id: id.to_string(),
            parent_external_id: parent.map(str::to_string),
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    fn freezer_with_shelf() -> (StorageTree, StorageId, StorageId) {
        let mut tree = StorageTree::new();
        let freezer = tree.add_location(None, "Freezer 1", StorageLocationType::Freezer).unwrap();
        let shelf = tree
            .add_location(Some(freezer), "Shelf 1", StorageLocationType::Shelf)
            .unwrap();
        (tree, freezer, shelf)
    }

    #[test]
    fn children_are_registered_with_their_parent() {
        let (mut tree, freezer, shelf) = freezer_with_shelf();
        let slot = tree.add_location(Some(shelf), "Slot A", StorageLocationType::Slot).unwrap();
        let names: Vec<&str> = tree.children(freezer).unwrap().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Shelf 1"]);
        assert_eq!(tree.get(slot).unwrap().parent(), Some(shelf));
        assert_eq!(tree.find_descendant_by_name(freezer, "Slot A"), Some(slot));
        assert_eq!(tree.find_descendant_by_name(shelf, "Shelf 1"), None);
        assert_eq!(tree.path(slot), "Freezer 1 > Shelf 1 > Slot A");
    }

    #[test]
    fn loose_bucket_is_a_reused_singleton() {
        let (mut tree, _, shelf) = freezer_with_shelf();
        let first = tree.get_or_create_loose(shelf).unwrap();
        let second = tree.leaf_for_vessel(shelf).unwrap();
        let third = tree.add_location(Some(shelf), "anything", StorageLocationType::Loose).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(tree.children(shelf).unwrap().len(), 1);
        assert!(tree.get_or_create_loose(first).is_err());
    }

    #[test]
    fn leaf_capable_locations_hold_vessels_directly() {
        let (mut tree, _, shelf) = freezer_with_shelf();
        let slot = tree.add_location(Some(shelf), "Slot A", StorageLocationType::Slot).unwrap();
        assert_eq!(tree.leaf_for_vessel(slot).unwrap(), slot);
        assert!(tree.leaf_for_vessel(slot).is_ok());
        assert!(tree.get_or_create_loose(slot).is_err());
    }

    #[test]
    fn moves_into_own_subtree_are_refused() {
        let (mut tree, freezer, shelf) = freezer_with_shelf();
        let rack = tree.add_location(Some(shelf), "Rack 1", StorageLocationType::Rack).unwrap();
        assert!(matches!(
            tree.move_location(freezer, rack),
            Err(LabError::StorageCycle { .. })
        ));
        assert!(matches!(
            tree.move_location(shelf, shelf),
            Err(LabError::StorageCycle { .. })
        ));

        let other = tree.add_location(None, "Freezer 2", StorageLocationType::Freezer).unwrap();
        tree.move_location(shelf, other).unwrap();
        assert!(tree.children(freezer).unwrap().is_empty());
        assert_eq!(tree.path(rack), "Freezer 2 > Shelf 1 > Rack 1");
    }

    #[test]
    fn import_resolves_parents_listed_after_children() {
        let mut tree = StorageTree::new();
        let records = vec![
            record("3", Some("2"), "Slot 1", "SLOT"),
            record("2", Some("1"), "Shelf 1", "shelf"),
            record("1", None, "Freezer -80", "Freezer"),
        ];
        let report = tree.import(&records).unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(report.passes, 3);
        let slot = tree.by_external_id("3").unwrap();
        assert_eq!(tree.path(slot), "Freezer -80 > Shelf 1 > Slot 1");

        let again = tree.import(&records).unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.already_present, 3);
    }

    #[test]
    fn import_reports_orphans() {
        let mut tree = StorageTree::new();
        let records = vec![
            record("1", None, "Freezer", "Freezer"),
            record("9", Some("404"), "Orphan", "Shelf"),
        ];
        match tree.import(&records) {
            Err(LabError::UnresolvedStorageParents(ids)) => assert_eq!(ids, vec!["9".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            StorageTree::new().import(&[record("1", None, "Tank", "cryo-tank")]),
            Err(LabError::UnknownStorageType(_))
        ));
        assert!(tree.is_empty());
    }

    #[test]
    fn failed_imports_create_nothing() {
        let mut tree = StorageTree::new();
        let records = vec![
            record("1", None, "Freezer", "freezer"),
            record("2", Some("1"), "Shelf", "shelf"),
            record("3", Some("2"), "Tank", "cryo-tank"),
        ];
        assert!(matches!(tree.import(&records), Err(LabError::UnknownStorageType(_))));
        assert!(tree.is_empty());
        assert_eq!(tree.by_external_id("1"), None);

        let loose_root = vec![record("1", None, "Freezer", "freezer"), record("2", None, "Bin", "loose")];
        assert!(matches!(tree.import(&loose_root), Err(LabError::NotLeafCapable(_))));
        assert!(tree.is_empty());
    }

    #[test]
    fn repeated_ids_in_one_batch_are_refused() {
        let mut tree = StorageTree::new();
        let records = vec![
            record("1", None, "Freezer A", "freezer"),
            record("1", None, "Freezer B", "freezer"),
        ];
        match tree.import(&records) {
            Err(LabError::DuplicateStorageId(id)) => assert_eq!(id, "1"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(tree.is_empty());

        tree.import(&records[..1]).unwrap();
        let report = tree.import(&records[..1]).unwrap();
        assert_eq!(report.already_present, 1);
        assert_eq!(tree.len(), 1);
    }
}
