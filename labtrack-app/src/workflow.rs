use crate::config::LabDataset;
use anyhow::{Context, Result};
use labtrack_core::{
    geometry::VesselPosition,
    indexing::{
        read_index_upload, IndexingSchemeResolver, IndexingSchemeStore, MolecularIndexingScheme,
    },
    logger::TraversalLogger,
    provenance,
    storage::{read_storage_export, StorageImportReport, StorageTree},
    store::LabStore,
    traversal::{
        criteria::{TraceCriteria, TraceRow},
        HopLimit, TraversalBuilder, TraversalDirection, TraversalOutcome,
    },
};
use labtrack_schemas::{event::LabEventType, storage::StorageImportRecord, vessel::VesselType};
use log::{info, warn};
use std::{collections::BTreeMap, path::Path, time::Duration};

/// What to trace and how far.
#[derive(Debug, Clone)]
pub struct TraceRequest {
    pub label: String,
    pub position: Option<String>,
    pub direction: TraversalDirection,
    pub hop_limit: HopLimit,
    pub start_event_type: Option<LabEventType>,
    pub deadline: Option<Duration>,
    pub include_empty_positions: bool,
}

/// Walks the graph from a vessel (or one of its positions) and optionally writes the
/// visited nodes to a CSV report.
pub fn run_trace(
    dataset: &LabDataset,
    request: &TraceRequest,
    report_path: Option<&Path>,
) -> Result<TraversalOutcome<Vec<TraceRow>>> {
    let store = &dataset.store;
    let vessel = store.require(&request.label)?;

    let mut builder = TraversalBuilder::new(store)
        .direction(request.direction)
        .hop_limit(request.hop_limit);
    builder = match &request.position {
        Some(name) => {
            let position = VesselPosition::parse(name)
                .with_context(|| format!("'{}' is not a position name", name))?;
            builder.from_position(vessel, position)
        }
        None => builder.from_vessel(vessel),
    };
    if let Some(event_type) = request.start_event_type {
        builder = builder.start_event_type(event_type);
    }
    if let Some(deadline) = request.deadline {
        builder = builder.deadline(deadline);
    }

    let outcome = builder.build()?.evaluate_criteria(&TraceCriteria {
        include_empty_positions: request.include_empty_positions,
    })?;
    if outcome.truncated {
        warn!(
            "Trace from '{}' stopped at the hop limit; more history exists",
            request.label
        );
    }

    if let Some(path) = report_path {
        let mut logger = TraversalLogger::new(path_str(path)?)
            .with_context(|| format!("Failed to create report file: {:?}", path))?;
        logger.log_trace(&outcome.output)?;
        info!("Wrote {} trace rows to {:?}", outcome.output.len(), path);
    }
    Ok(outcome)
}

/// Labels of the plates directly upstream (or downstream) of a plate.
pub fn plate_neighbours(dataset: &LabDataset, label: &str, children: bool) -> Result<Vec<String>> {
    let store = &dataset.store;
    let plate = store.require(label)?;
    let plates = if children {
        provenance::immediate_plate_children(store, plate)?
    } else {
        provenance::immediate_plate_parents(store, plate)?
    };
    Ok(plates.into_iter().map(|p| store.label(p).to_string()).collect())
}

/// A row of an upload file that could not be turned into a scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// One-based data row number, not counting the header.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndexUploadReport {
    /// Scheme names resolved for each accepted row, in file order.
    pub schemes: Vec<String>,
    /// Schemes the upload introduced. On a dry run these were not stored.
    pub created: Vec<MolecularIndexingScheme>,
    pub errors: Vec<RowError>,
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid UTF-8: {:?}", path))
}

/// Reads an index upload CSV whose headers are index position names and resolves every
/// row to a scheme. Bad rows are reported and skipped; the rest are still processed.
pub fn import_indexes<S: IndexingSchemeStore>(
    resolver: &mut IndexingSchemeResolver<S>,
    csv_path: &Path,
    persist: bool,
) -> Result<IndexUploadReport> {
    let rows = read_index_upload(path_str(csv_path)?)?;
    let mut report = IndexUploadReport::default();

    for upload_row in &rows {
        let resolved = upload_row.pairs().and_then(|pairs| {
            let is_new = resolver.find_indexing_scheme(&pairs).is_err();
            resolver
                .find_or_create_indexing_scheme(&pairs, persist)
                .map(|scheme| (scheme, is_new))
        });
        match resolved {
            Ok((scheme, is_new)) => {
                report.schemes.push(scheme.name().to_string());
                if is_new && !report.created.iter().any(|s| s.name() == scheme.name()) {
                    report.created.push(scheme);
                }
            }
            Err(e) => {
                warn!("Skipping index upload row {}: {}", upload_row.row, e);
                report.errors.push(RowError {
                    row: upload_row.row,
                    message: e.to_string(),
                });
            }
        }
    }
    info!(
        "Index upload {:?}: {} rows resolved, {} new schemes, {} rejected",
        csv_path,
        report.schemes.len(),
        report.created.len(),
        report.errors.len()
    );
    Ok(report)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StorageUploadReport {
    pub counts: StorageImportReport,
    /// Records that created a location, for saving back into the dataset.
    pub created: Vec<StorageImportRecord>,
}

/// Loads a storage export CSV into the storage tree.
pub fn import_storage(tree: &mut StorageTree, csv_path: &Path) -> Result<StorageUploadReport> {
    let records = read_storage_export(path_str(csv_path)?)?;
    let created: Vec<StorageImportRecord> = records
        .iter()
        .filter(|r| tree.by_external_id(&r.external_id).is_none())
        .cloned()
        .collect();
    let counts = tree.import(&records)?;
    Ok(StorageUploadReport { counts, created })
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DatasetSummary {
    pub vessels_by_type: BTreeMap<String, usize>,
    pub events: usize,
    pub indexing_schemes: usize,
    pub storage_locations: usize,
}

pub fn summarize<S: IndexingSchemeStore>(
    store: &LabStore,
    schemes: &IndexingSchemeResolver<S>,
) -> DatasetSummary {
    let mut summary = DatasetSummary {
        events: store.events().len(),
        indexing_schemes: schemes.store().len(),
        storage_locations: store.storage().len(),
        ..Default::default()
    };
    for vessel in store.vessels() {
        let name = match vessel.vessel_type() {
            VesselType::BarcodedTube => "barcoded_tube",
            VesselType::StaticPlate => "static_plate",
            VesselType::PlateWell => "plate_well",
            VesselType::RackOfTubes => "rack_of_tubes",
            VesselType::TubeFormation => "tube_formation",
        };
        *summary.vessels_by_type.entry(name.to_string()).or_insert(0) += 1;
    }
    summary
}

pub fn print_summary_report(summary: &DatasetSummary) {
    println!("\n--- Dataset Summary ---");
    for (vessel_type, count) in &summary.vessels_by_type {
        println!("{:<16} {:>6}", vessel_type, count);
    }
    println!("{:<16} {:>6}", "events", summary.events);
    println!("{:<16} {:>6}", "index schemes", summary.indexing_schemes);
    println!("{:<16} {:>6}", "storage", summary.storage_locations);
}

pub fn print_trace(outcome: &TraversalOutcome<Vec<TraceRow>>) {
    println!(
        "{:>3}  {:<20} {:<20} {:<8} {:<6} {:<32} samples",
        "hop", "vessel", "container", "position", "event", "event type"
    );
    for row in &outcome.output {
        println!(
            "{:>3}  {:<20} {:<20} {:<8} {:<6} {:<32} {}",
            row.hop,
            row.vessel.as_deref().unwrap_or("-"),
            row.container.as_deref().unwrap_or("-"),
            row.position.as_deref().unwrap_or("-"),
            row.event.as_deref().unwrap_or("-"),
            row.event_type.as_deref().unwrap_or("-"),
            row.samples.join(",")
        );
    }
    println!(
        "\n{} nodes, {} edges, max hop {}{}",
        outcome.nodes_visited,
        outcome.edges_followed,
        outcome.max_hop,
        if outcome.truncated { " (truncated)" } else { "" }
    );
}
