use chrono::{DateTime, Duration, TimeZone, Utc};
use labtrack_core::{
    event::LabEventBuilder,
    geometry::VesselPosition,
    provenance,
    store::LabStore,
    traversal::{
        criteria::{
            LabEventCriteria, NearestPlateCriteria, NearestSampleCriteria, NearestTubeCriteria,
            TraceCriteria, VesselCollectorCriteria,
        },
        evaluate_criteria, CancelToken, TraversalBuilder, TraversalDirection, TraversalStart,
    },
    vessel::VesselId,
    LabError,
};
use labtrack_schemas::{
    event::LabEventType,
    geometry::SbsSection,
    vessel::{PlateType, RackType, VesselType},
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn pos(name: &str) -> VesselPosition {
    VesselPosition::parse(name).unwrap()
}

fn tube_chain(store: &mut LabStore, length: usize) -> Vec<VesselId> {
    let tubes: Vec<VesselId> = (0..=length)
        .map(|i| store.add_tube(&format!("T{}", i), at(0)).unwrap())
        .collect();
    for (i, pair) in tubes.windows(2).enumerate() {
        let event = LabEventBuilder::new(LabEventType::PoolingTransfer, at(i as i64 + 1))
            .vessel_transfer(pair[0], pair[1]);
        store.record_event(event).unwrap();
    }
    tubes
}

#[test]
fn hop_limit_bounds_a_long_chain() {
    let mut store = LabStore::new();
    let tubes = tube_chain(&mut store, 10);

    let bounded = TraversalBuilder::new(&store)
        .from_vessel(tubes[10])
        .direction(TraversalDirection::Ancestors)
        .hop_limit(3u32)
        .build()
        .unwrap()
        .evaluate_criteria(&LabEventCriteria)
        .unwrap();
    assert_eq!(bounded.max_hop, 3);
    assert_eq!(bounded.output.len(), 3);
    assert!(bounded.truncated);

    let unbounded = TraversalBuilder::new(&store)
        .from_vessel(tubes[10])
        .direction(TraversalDirection::Ancestors)
        .build()
        .unwrap()
        .evaluate_criteria(&LabEventCriteria)
        .unwrap();
    assert_eq!(unbounded.max_hop, 10);
    assert_eq!(unbounded.output.len(), 10);
    assert!(!unbounded.truncated);
}

#[test]
fn zero_hop_limit_visits_the_start_only() {
    let mut store = LabStore::new();
    let tubes = tube_chain(&mut store, 2);
    let outcome = TraversalBuilder::new(&store)
        .from_vessel(tubes[0])
        .direction(TraversalDirection::Descendants)
        .hop_limit(labtrack_core::traversal::HopLimit::AtMost(0))
        .build()
        .unwrap()
        .evaluate_criteria(&TraceCriteria::default())
        .unwrap();
    assert_eq!(outcome.output.len(), 1);
    assert_eq!(outcome.output[0].vessel.as_deref(), Some("T0"));
    assert!(outcome.truncated);
}

#[test]
fn self_transfer_terminates() {
    let mut store = LabStore::new();
    let tube = store.add_tube("LOOP", at(0)).unwrap();
    let event = LabEventBuilder::new(LabEventType::PoolingTransfer, at(1)).vessel_transfer(tube, tube);
    store.record_event(event).unwrap();

    for direction in [TraversalDirection::Ancestors, TraversalDirection::Descendants] {
        let outcome = evaluate_criteria(
            &store,
            TraversalStart::Vessel(tube),
            &LabEventCriteria,
            direction,
            0,
            None,
        )
        .unwrap();
        assert_eq!(outcome.output.len(), 1);
        assert_eq!(outcome.edges_followed, 1);
    }
}

#[test]
fn cycles_between_tubes_terminate() {
    let mut store = LabStore::new();
    let a = store.add_tube("A", at(0)).unwrap();
    let b = store.add_tube("B", at(0)).unwrap();
    store
        .record_event(LabEventBuilder::new(LabEventType::PoolingTransfer, at(1)).vessel_transfer(a, b))
        .unwrap();
    store
        .record_event(LabEventBuilder::new(LabEventType::PoolingTransfer, at(2)).vessel_transfer(b, a))
        .unwrap();
    let outcome = evaluate_criteria(
        &store,
        TraversalStart::Vessel(a),
        &LabEventCriteria,
        TraversalDirection::Descendants,
        0,
        None,
    )
    .unwrap();
    assert_eq!(outcome.output.len(), 2);
}

#[test]
fn quadrant_transfer_lands_on_interleaved_positions() {
    let mut store = LabStore::new();
    let p96 = store.add_plate("P96", PlateType::Eppendorf96, at(0)).unwrap();
    let p384 = store.add_plate("P384", PlateType::Eppendorf384, at(0)).unwrap();
    let event = LabEventBuilder::new(LabEventType::ShearingTransfer, at(1)).section_transfer(
        p96,
        SbsSection::All96,
        p384,
        SbsSection::P384_96Tip1B,
    );
    store.record_event(event).unwrap();

    let trace = |start| {
        evaluate_criteria(
            &store,
            start,
            &TraceCriteria { include_empty_positions: true },
            TraversalDirection::Descendants,
            0,
            None,
        )
        .unwrap()
        .output
    };
    let rows = trace(TraversalStart::Position { container: p96, position: pos("B01") });
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].container.as_deref(), Some("P384"));
    assert_eq!(rows[1].position.as_deref(), Some("C02"));
    assert_eq!(rows[1].hop, 1);

    let ancestors = evaluate_criteria(
        &store,
        TraversalStart::Position { container: p384, position: pos("A01") },
        &LabEventCriteria,
        TraversalDirection::Ancestors,
        0,
        None,
    )
    .unwrap();
    assert!(ancestors.output.is_empty());
}

#[test]
fn cherry_picks_follow_only_their_pairs() {
    let mut store = LabStore::new();
    let source = store.add_plate("SRC", PlateType::Eppendorf96, at(0)).unwrap();
    let target = store.add_plate("DST", PlateType::Eppendorf96, at(0)).unwrap();
    let event = LabEventBuilder::new(LabEventType::ReArray, at(1))
        .cherry_pick(source, pos("B02"), target, pos("C03"))
        .cherry_pick(source, pos("H12"), target, pos("A01"));
    store.record_event(event).unwrap();

    let plates_above = |position: &str| {
        evaluate_criteria(
            &store,
            TraversalStart::Position { container: target, position: pos(position) },
            &NearestPlateCriteria,
            TraversalDirection::Ancestors,
            0,
            None,
        )
        .unwrap()
        .output
    };
    assert_eq!(plates_above("C03"), BTreeSet::from([source]));
    assert_eq!(plates_above("D04"), BTreeSet::new());

    let rows = evaluate_criteria(
        &store,
        TraversalStart::Position { container: target, position: pos("A01") },
        &TraceCriteria { include_empty_positions: true },
        TraversalDirection::Ancestors,
        0,
        None,
    )
    .unwrap()
    .output;
    assert_eq!(rows[1].position.as_deref(), Some("H12"));
}

#[test]
fn tubes_are_followed_through_every_formation_they_sat_in() {
    let mut store = LabStore::new();
    let tube = store.add_tube("T1", at(0)).unwrap();
    store.add_sample(tube, "SM-1").unwrap();
    let other = store.add_tube("T2", at(0)).unwrap();
    let rack1 = store.add_rack("RACK1", RackType::Matrix96, at(0)).unwrap();
    let rack2 = store.add_rack("RACK2", RackType::Matrix96, at(0)).unwrap();
    let f1 = store
        .add_tube_formation(RackType::Matrix96, &[(pos("A01"), tube), (pos("A02"), other)], at(0))
        .unwrap();
    let f2 = store
        .add_tube_formation(RackType::Matrix96, &[(pos("B01"), tube)], at(2))
        .unwrap();
    store.place_formation_on_rack(rack1, f1).unwrap();
    store.place_formation_on_rack(rack2, f2).unwrap();

    let p1 = store.add_plate("P1", PlateType::Eppendorf96, at(0)).unwrap();
    let p2 = store.add_plate("P2", PlateType::Eppendorf96, at(0)).unwrap();
    let from_rack1 = store.transfer_container(rack1).unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::SamplesDaughterPlateCreation, at(1))
                .section_transfer(from_rack1, SbsSection::All96, p1, SbsSection::All96),
        )
        .unwrap();
    let from_rack2 = store.transfer_container(rack2).unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::SamplesDaughterPlateCreation, at(3))
                .section_transfer(from_rack2, SbsSection::All96, p2, SbsSection::All96),
        )
        .unwrap();

    let plates = evaluate_criteria(
        &store,
        TraversalStart::Vessel(tube),
        &VesselCollectorCriteria {
            vessel_types: Some(vec![VesselType::StaticPlate]),
            include_start: false,
        },
        TraversalDirection::Descendants,
        0,
        None,
    )
    .unwrap()
    .output;
    assert_eq!(plates, BTreeSet::from([p1, p2]));

    let samples = provenance::nearest_samples(&store, p2, Some(pos("B01"))).unwrap();
    assert_eq!(samples, BTreeSet::from(["SM-1".to_string()]));
    let none = provenance::nearest_samples(&store, p1, Some(pos("A02"))).unwrap();
    assert!(none.is_empty());

    let tubes = evaluate_criteria(
        &store,
        TraversalStart::Vessel(p1),
        &NearestTubeCriteria,
        TraversalDirection::Ancestors,
        0,
        None,
    )
    .unwrap()
    .output;
    assert_eq!(tubes, BTreeSet::from([tube, other]));
}

#[test]
fn mismatched_historical_sections_are_reported() {
    let mut store = LabStore::new();
    let p96 = store.add_plate("P96", PlateType::Eppendorf96, at(0)).unwrap();
    let p384 = store.add_plate("P384", PlateType::Eppendorf384, at(0)).unwrap();
    let event = LabEventBuilder::new(LabEventType::ShearingTransfer, at(1)).section_transfer(
        p96,
        SbsSection::All96,
        p384,
        SbsSection::All96,
    );
    store.import_event(event).unwrap();

    let result = evaluate_criteria(
        &store,
        TraversalStart::Vessel(p384),
        &LabEventCriteria,
        TraversalDirection::Ancestors,
        0,
        None,
    );
    assert!(matches!(result, Err(LabError::DataIntegrity { .. })));
}

#[test]
fn malformed_transfers_fail_from_the_source_side_too() {
    let mut store = LabStore::new();
    let source = store.add_plate("SRC", PlateType::Eppendorf96, at(0)).unwrap();
    let target = store.add_plate("DST", PlateType::Eppendorf96, at(0)).unwrap();
    let row_t = VesselPosition::new(19, 0);
    store
        .import_event(
            LabEventBuilder::new(LabEventType::ReArray, at(1)).cherry_pick(
                source,
                row_t,
                target,
                pos("A01"),
            ),
        )
        .unwrap();
    for (start, direction) in [
        (target, TraversalDirection::Ancestors),
        (source, TraversalDirection::Descendants),
    ] {
        let result = evaluate_criteria(
            &store,
            TraversalStart::Vessel(start),
            &LabEventCriteria,
            direction,
            0,
            None,
        );
        assert!(matches!(result, Err(LabError::DataIntegrity { .. })), "{:?}", direction);
    }

    let mut store = LabStore::new();
    let tube = store.add_tube("TUBE", at(0)).unwrap();
    let plate = store.add_plate("P1", PlateType::Eppendorf96, at(0)).unwrap();
    store
        .import_event(
            LabEventBuilder::new(LabEventType::ShearingTransfer, at(1)).section_transfer(
                tube,
                SbsSection::All96,
                plate,
                SbsSection::All96,
            ),
        )
        .unwrap();
    let result = evaluate_criteria(
        &store,
        TraversalStart::Vessel(tube),
        &LabEventCriteria,
        TraversalDirection::Descendants,
        0,
        None,
    );
    assert!(matches!(result, Err(LabError::DataIntegrity { .. })));
}

#[test]
fn whole_plate_transfers_continue_a_positional_walk() {
    let mut store = LabStore::new();
    let p1 = store.add_plate("P1", PlateType::Eppendorf96, at(0)).unwrap();
    let p2 = store.add_plate("P2", PlateType::Eppendorf96, at(0)).unwrap();
    let tube = store.add_tube("TUBE", at(0)).unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::ShearingTransfer, at(1))
                .section_transfer(p1, SbsSection::All96, p2, SbsSection::All96),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PoolingTransfer, at(2)).vessel_transfer(p2, tube),
        )
        .unwrap();

    let reached = evaluate_criteria(
        &store,
        TraversalStart::Vessel(p1),
        &VesselCollectorCriteria::default(),
        TraversalDirection::Descendants,
        0,
        None,
    )
    .unwrap();
    assert!(reached.output.contains(&tube));
    let events = provenance::descendant_events(&store, p1, 0).unwrap();
    assert_eq!(events.len(), 2);

    let mut store = LabStore::new();
    let t0 = store.add_tube("T0", at(0)).unwrap();
    let pa = store.add_plate("PA", PlateType::Eppendorf96, at(0)).unwrap();
    let pb = store.add_plate("PB", PlateType::Eppendorf96, at(0)).unwrap();
    store.add_sample(t0, "SM-0").unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PoolingTransfer, at(1)).vessel_transfer(t0, pa),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::NormalizationTransfer, at(2))
                .section_transfer(pa, SbsSection::All96, pb, SbsSection::All96),
        )
        .unwrap();

    let upstream = evaluate_criteria(
        &store,
        TraversalStart::Position { container: pb, position: pos("C05") },
        &VesselCollectorCriteria::default(),
        TraversalDirection::Ancestors,
        0,
        None,
    )
    .unwrap();
    assert!(upstream.output.contains(&pa));
    assert!(upstream.output.contains(&t0));
    assert_eq!(
        provenance::nearest_samples(&store, pb, Some(pos("C05"))).unwrap(),
        BTreeSet::from(["SM-0".to_string()])
    );
    // Every position of PA reports the whole-plate transfer; it is followed once.
    let events = provenance::ancestor_events(&store, pb, 0).unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn cancelled_walks_fail() {
    let mut store = LabStore::new();
    let tubes = tube_chain(&mut store, 3);
    let token = CancelToken::new();
    let traverser = TraversalBuilder::new(&store)
        .from_vessel(tubes[0])
        .direction(TraversalDirection::Descendants)
        .cancel_token(token.clone())
        .build()
        .unwrap();
    assert!(traverser.evaluate_criteria(&LabEventCriteria).is_ok());
    token.cancel();
    assert!(matches!(
        traverser.evaluate_criteria(&LabEventCriteria),
        Err(LabError::TraversalCancelled(_))
    ));
}

#[test]
fn start_event_type_filters_the_first_hop() {
    let mut store = LabStore::new();
    let root = store.add_tube("ROOT", at(0)).unwrap();
    let pooled = store.add_tube("POOL", at(0)).unwrap();
    let denatured = store.add_tube("DEN", at(0)).unwrap();
    let downstream = store.add_tube("DOWN", at(0)).unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PoolingTransfer, at(1)).vessel_transfer(root, pooled),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::DenatureTransfer, at(2)).vessel_transfer(root, denatured),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PoolingTransfer, at(3))
                .vessel_transfer(denatured, downstream),
        )
        .unwrap();

    let reached = evaluate_criteria(
        &store,
        TraversalStart::Vessel(root),
        &VesselCollectorCriteria::default(),
        TraversalDirection::Descendants,
        0,
        Some(LabEventType::DenatureTransfer),
    )
    .unwrap()
    .output;
    assert_eq!(reached, BTreeSet::from([denatured, downstream]));
}

#[test]
fn traces_are_deterministic() {
    let mut store = LabStore::new();
    let source = store.add_plate("SRC", PlateType::Eppendorf96, at(0)).unwrap();
    let a = store.add_plate("A", PlateType::Eppendorf96, at(0)).unwrap();
    let b = store.add_plate("B", PlateType::Eppendorf96, at(0)).unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::NormalizationTransfer, at(5))
                .section_transfer(source, SbsSection::All96, b, SbsSection::All96),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::NormalizationTransfer, at(1))
                .section_transfer(source, SbsSection::All96, a, SbsSection::All96),
        )
        .unwrap();

    let run = || {
        evaluate_criteria(
            &store,
            TraversalStart::Position { container: source, position: pos("A01") },
            &TraceCriteria { include_empty_positions: true },
            TraversalDirection::Descendants,
            0,
            None,
        )
        .unwrap()
        .output
    };
    let first = run();
    assert_eq!(first, run());
    let containers: Vec<Option<&str>> = first.iter().map(|r| r.container.as_deref()).collect();
    assert_eq!(containers, vec![Some("SRC"), Some("A"), Some("B")]);
}

#[test]
fn plate_parents_skip_racks_and_grandparents() {
    let mut store = LabStore::new();
    let tube = store.add_tube("T1", at(0)).unwrap();
    let rack = store.add_rack("RACK", RackType::Matrix96, at(0)).unwrap();
    let formation = store
        .add_tube_formation(RackType::Matrix96, &[(pos("A01"), tube)], at(0))
        .unwrap();
    store.place_formation_on_rack(rack, formation).unwrap();
    let grandparent = store.add_plate("GP", PlateType::Eppendorf96, at(0)).unwrap();
    let plate1 = store.add_plate("PLATE1", PlateType::Eppendorf96, at(0)).unwrap();
    let plate2 = store.add_plate("PLATE2", PlateType::Eppendorf96, at(0)).unwrap();
    let plate3 = store.add_plate("PLATE3", PlateType::Eppendorf96, at(0)).unwrap();

    assert!(provenance::immediate_plate_parents(&store, plate3).unwrap().is_empty());

    store
        .record_event(
            LabEventBuilder::new(LabEventType::ShearingTransfer, at(1))
                .section_transfer(grandparent, SbsSection::All96, plate1, SbsSection::All96),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PoolingTransfer, at(2))
                .section_transfer(formation, SbsSection::All96, plate3, SbsSection::All96)
                .section_transfer(plate1, SbsSection::All96, plate3, SbsSection::All96)
                .section_transfer(plate2, SbsSection::All96, plate3, SbsSection::All96),
        )
        .unwrap();

    assert_eq!(
        provenance::immediate_plate_parents(&store, plate3).unwrap(),
        vec![plate1, plate2]
    );
    assert_eq!(
        provenance::immediate_plate_children(&store, plate1).unwrap(),
        vec![plate3]
    );
    assert_eq!(provenance::ancestor_events(&store, plate3, 0).unwrap().len(), 2);
    assert_eq!(provenance::ancestor_events(&store, plate3, 1).unwrap().len(), 1);
    assert_eq!(provenance::descendant_events(&store, grandparent, 0).unwrap().len(), 2);
}

#[test]
fn samples_and_indexes_come_from_upstream() {
    use labtrack_core::vessel::Reagent;
    let mut store = LabStore::new();
    let tube = store.add_tube("LIB", at(0)).unwrap();
    let adapters = store.add_plate("ADAPT", PlateType::IndexedAdapterPlate96, at(0)).unwrap();
    let pond = store.add_plate("POND", PlateType::Eppendorf96, at(0)).unwrap();
    let well = store.well_at(adapters, pos("A01")).unwrap();
    store
        .add_reagent(
            well,
            Reagent::MolecularIndex { scheme: "Illumina_P7-ACGTACGT".to_string() },
        )
        .unwrap();
    store.add_sample(pond, "SM-POND").unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::IndexedAdapterLigation, at(1))
                .section_transfer(adapters, SbsSection::All96, pond, SbsSection::All96),
        )
        .unwrap();
    store
        .record_event(
            LabEventBuilder::new(LabEventType::PondRegistration, at(2))
                .cherry_pick(pond, pos("A01"), pond, pos("A01"))
                .vessel_transfer(pond, tube),
        )
        .unwrap();

    assert_eq!(
        provenance::ancestor_indexing_schemes(&store, tube).unwrap(),
        BTreeSet::from(["Illumina_P7-ACGTACGT".to_string()])
    );
    assert_eq!(
        provenance::nearest_samples(&store, tube, None).unwrap(),
        BTreeSet::from(["SM-POND".to_string()])
    );
    let neighbours = provenance::contamination_neighbours(&store, tube).unwrap();
    assert_eq!(neighbours, vec![pond]);
    let samples = evaluate_criteria(
        &store,
        TraversalStart::Vessel(tube),
        &NearestSampleCriteria,
        TraversalDirection::Descendants,
        0,
        None,
    )
    .unwrap()
    .output;
    assert!(samples.is_empty());
}

#[test]
fn rack_neighbours_count_as_contamination_risks() {
    let mut store = LabStore::new();
    let left = store.add_tube("LEFT", at(0)).unwrap();
    let right = store.add_tube("RIGHT", at(0)).unwrap();
    let far = store.add_tube("FAR", at(0)).unwrap();
    store
        .add_tube_formation(
            RackType::Matrix96,
            &[(pos("A01"), left), (pos("A02"), right), (pos("H12"), far)],
            at(0),
        )
        .unwrap();

    assert_eq!(provenance::contamination_neighbours(&store, left).unwrap(), vec![right]);
    assert_eq!(provenance::contamination_neighbours(&store, right).unwrap(), vec![left]);
    assert!(provenance::contamination_neighbours(&store, far).unwrap().is_empty());

    let empty = LabStore::new();
    assert!(matches!(
        provenance::contamination_neighbours(&empty, far),
        Err(LabError::VesselNotFound(_))
    ));
}
