use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use labtrack_core::{
    event::LabEventBuilder,
    geometry::{VesselGeometry, VesselPosition},
    indexing::{InMemorySchemeStore, IndexingSchemeResolver, MolecularIndexingScheme},
    store::LabStore,
    vessel::VesselId,
    LabError,
};
use labtrack_schemas::{
    event::LabEventRecord,
    file_formats::{IndexingSchemeFile, LabEventFile, StorageFile, VesselFile},
    storage::StorageImportRecord,
    vessel::{VesselRecord, VesselType},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_FILE: &str = "labtrack.yaml";
pub const SCHEMA_VERSION: &str = "1.0";

/// Settings read from `labtrack.yaml`. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
    /// `0` means no bound.
    pub default_hop_limit: u32,
    pub traversal_deadline_ms: Option<u64>,
    pub schema_version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/lab"),
            report_dir: PathBuf::from("./data/reports"),
            default_hop_limit: 0,
            traversal_deadline_ms: None,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the given config file, or `labtrack.yaml` in the working directory when
    /// present. Without either, defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))?;
        Ok(config)
    }
}

/// Everything loaded from a dataset directory: the vessel and event graph with its
/// storage tree, plus the known molecular indexing schemes.
pub struct LabDataset {
    pub store: LabStore,
    pub schemes: IndexingSchemeResolver<InMemorySchemeStore>,
}

impl LabDataset {
    /// Loads `storage/`, `vessels/`, `events/` and `indexing/` from `base_path`, in that
    /// order. Missing subdirectories are treated as empty.
    pub fn load(base_path: &Path, schema_version: &str) -> Result<Self> {
        info!("Loading lab dataset from {:?}", base_path);
        let mut store = LabStore::new();

        let locations = load_yaml_records(
            base_path.join("storage"),
            schema_version,
            |file: StorageFile| (file.schema_version, file.locations),
        )?;
        store.storage_mut().import(&locations)?;

        let vessels = load_yaml_records(
            base_path.join("vessels"),
            schema_version,
            |file: VesselFile| (file.schema_version, file.vessels),
        )?;
        load_vessels(&mut store, &vessels)?;

        let mut events = load_yaml_records(
            base_path.join("events"),
            schema_version,
            |file: LabEventFile| (file.schema_version, file.events),
        )?;
        events.sort_by_key(|e| (e.timestamp, e.disambiguator));
        for record in &events {
            let event = event_from_record(&store, record)?;
            store.import_event(event)?;
        }

        let scheme_records = load_yaml_records(
            base_path.join("indexing"),
            schema_version,
            |file: IndexingSchemeFile| (file.schema_version, file.schemes),
        )?;
        let mut schemes = IndexingSchemeResolver::new(InMemorySchemeStore::new());
        schemes.load_records(&scheme_records)?;

        info!(
            "Dataset loaded: {} vessels, {} events, {} indexing schemes, {} storage locations",
            store.vessels().len(),
            store.events().len(),
            schemes.store().schemes().len(),
            store.storage().len()
        );
        Ok(Self { store, schemes })
    }

    /// Saves schemes created by an upload under `indexing/`, so the next load sees them.
    /// Returns the file written, or `None` when there was nothing to save.
    pub fn save_indexing_schemes(
        base_path: &Path,
        schema_version: &str,
        schemes: &[MolecularIndexingScheme],
    ) -> Result<Option<PathBuf>> {
        if schemes.is_empty() {
            return Ok(None);
        }
        let file = IndexingSchemeFile {
            schema_version: schema_version.to_string(),
            schemes: schemes.iter().map(|s| s.to_record()).collect(),
        };
        write_yaml_records(&base_path.join("indexing"), "upload", &file).map(Some)
    }

    /// Saves imported storage locations under `storage/`.
    pub fn save_storage_locations(
        base_path: &Path,
        schema_version: &str,
        locations: Vec<StorageImportRecord>,
    ) -> Result<Option<PathBuf>> {
        if locations.is_empty() {
            return Ok(None);
        }
        let file = StorageFile {
            schema_version: schema_version.to_string(),
            locations,
        };
        write_yaml_records(&base_path.join("storage"), "import", &file).map(Some)
    }
}

/// Generic helper to load every YAML file in a directory and concatenate their records.
///
/// Files are read in name order so loading is repeatable.
fn load_yaml_records<P, F, E, T>(dir_path: P, schema_version: &str, extract_vec: E) -> Result<Vec<T>>
where
    P: AsRef<Path>,
    F: for<'de> Deserialize<'de>, // The file wrapper struct (e.g., VesselFile)
    E: Fn(F) -> (String, Vec<T>),
{
    let dir_path = dir_path.as_ref();
    if !dir_path.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read directory: {:?}", dir_path))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |s| s == "yaml" || s == "yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let file_wrapper: F = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML from {:?}", path))?;
        let (version, items) = extract_vec(file_wrapper);
        if version != schema_version {
            warn!(
                "{:?} declares schema version {}, expected {}",
                path, version, schema_version
            );
        }
        records.extend(items);
    }
    Ok(records)
}

/// Writes `file` as a new YAML file in `dir_path`. Existing files are left alone.
fn write_yaml_records<T: Serialize>(dir_path: &Path, prefix: &str, file: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir_path)
        .with_context(|| format!("Failed to create directory: {:?}", dir_path))?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir_path.join(format!("{}_{}.yaml", prefix, stamp));
    let mut suffix = 1;
    while path.exists() {
        path = dir_path.join(format!("{}_{}_{}.yaml", prefix, stamp, suffix));
        suffix += 1;
    }
    let yaml_content = serde_yaml::to_string(file)?;
    fs::write(&path, yaml_content).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote {:?}", path);
    Ok(path)
}

fn load_vessels(store: &mut LabStore, records: &[VesselRecord]) -> Result<()> {
    let mut racks = Vec::new();
    for record in records {
        let created_on = record.created_on.unwrap_or_else(Utc::now);
        let id = match record.vessel_type {
            VesselType::BarcodedTube => store.add_tube(&record.label, created_on)?,
            VesselType::StaticPlate => {
                let plate_type = record
                    .plate_type
                    .ok_or_else(|| anyhow!("Plate '{}' has no plate_type", record.label))?;
                store.add_plate(&record.label, plate_type, created_on)?
            }
            VesselType::RackOfTubes => {
                let rack_type = record
                    .rack_type
                    .ok_or_else(|| anyhow!("Rack '{}' has no rack_type", record.label))?;
                let id = store.add_rack(&record.label, rack_type, created_on)?;
                racks.push((id, record));
                id
            }
            VesselType::PlateWell | VesselType::TubeFormation => bail!(
                "'{}': {:?} vessels are derived and cannot be listed in a dataset",
                record.label,
                record.vessel_type
            ),
        };
        for sample in &record.samples {
            store.add_sample(id, sample)?;
        }
        for metric in &record.metrics {
            store.add_metric(id, metric.clone())?;
        }
        for reagent in &record.reagents {
            store.add_reagent(id, reagent.clone())?;
        }
        if let Some(external_id) = &record.storage_location {
            let location = store.storage().by_external_id(external_id).ok_or_else(|| {
                LabError::StorageLocationNotFound(external_id.clone())
            })?;
            store.store_vessel(id, location)?;
        }
    }

    // Racks reference tubes by label, so their formations are built once every tube exists.
    for (rack, record) in racks {
        if record.tubes.is_empty() {
            continue;
        }
        let rack_type = record
            .rack_type
            .ok_or_else(|| anyhow!("Rack '{}' has no rack_type", record.label))?;
        let geometry = VesselGeometry::of(rack_type.geometry());
        let mut placements = Vec::with_capacity(record.tubes.len());
        for placement in &record.tubes {
            let position = geometry.parse_position(&record.label, &placement.position)?;
            placements.push((position, store.require(&placement.tube)?));
        }
        let created_on = record.created_on.unwrap_or_else(Utc::now);
        let formation = store.add_tube_formation(rack_type, &placements, created_on)?;
        store.place_formation_on_rack(rack, formation)?;
    }
    Ok(())
}

fn parse_position(name: &str) -> Result<VesselPosition> {
    VesselPosition::parse(name).ok_or_else(|| anyhow!("'{}' is not a position name", name))
}

fn container_for(store: &LabStore, label: &str) -> Result<VesselId> {
    Ok(store.transfer_container(store.require(label)?)?)
}

fn event_from_record(store: &LabStore, record: &LabEventRecord) -> Result<LabEventBuilder> {
    let timestamp: DateTime<Utc> = record.timestamp;
    let mut event = LabEventBuilder::new(record.event_type, timestamp)
        .location(&record.location)
        .operator(&record.operator)
        .disambiguator(record.disambiguator);
    for transfer in &record.section_transfers {
        event = event.section_transfer(
            container_for(store, &transfer.source)?,
            transfer.source_section,
            container_for(store, &transfer.target)?,
            transfer.target_section,
        );
    }
    for pick in &record.cherry_picks {
        event = event.cherry_pick(
            container_for(store, &pick.source)?,
            parse_position(&pick.source_position)?,
            container_for(store, &pick.target)?,
            parse_position(&pick.target_position)?,
        );
    }
    for transfer in &record.vessel_transfers {
        event = event.vessel_transfer(store.require(&transfer.source)?, store.require(&transfer.target)?);
    }
    Ok(event)
}
