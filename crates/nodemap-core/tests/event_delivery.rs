//! Event and chunk payload delivery into chunk ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nodemap_core::event::ChunkLayoutError;
use nodemap_core::schema::{
    IntRegDescription, NodeDescription, NodeKind, PortDescription, RegisterDescription,
};
use nodemap_core::{
    DispatchOutcome, ErrorKind, EventAdapter, EventError, NodeMap, NodeMapConfig, Value,
};
use parking_lot as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use swissknife as _;
use thiserror as _;
use tracing as _;

fn chunk_port(name: &str, event_id: &str) -> NodeDescription {
    NodeDescription::new(
        name,
        NodeKind::Port(PortDescription {
            event_id: Some(event_id.into()),
        }),
    )
}

fn chunk_map() -> NodeMap {
    NodeMap::builder(NodeMapConfig::default())
        .node(chunk_port("TimestampPort", "a5c0"))
        .node(chunk_port("MirrorPort", "A5C0"))
        .node(NodeDescription::new(
            "ChunkTimestamp",
            NodeKind::IntReg(IntRegDescription::new(RegisterDescription::new(
                "TimestampPort",
                0,
                8,
            ))),
        ))
        .node(NodeDescription::int_swiss_knife(
            "TimestampMs",
            "T / 1000",
            &[("T", "ChunkTimestamp")],
        ))
        .node(NodeDescription::int_swiss_knife(
            "Residue",
            "T - M * 1000",
            &[("T", "ChunkTimestamp"), ("M", "TimestampMs")],
        ))
        .build()
        .expect("chunk map builds")
}

fn chunk(id: u32, data: &[u8]) -> Vec<u8> {
    let mut bytes = data.to_vec();
    bytes.extend_from_slice(&id.to_be_bytes());
    bytes.extend_from_slice(&u32::try_from(data.len()).expect("short chunk").to_be_bytes());
    bytes
}

#[test]
fn unmatched_event_is_dropped_silently() {
    let map = chunk_map();
    let hits = Arc::new(AtomicUsize::new(0));
    for node in ["ChunkTimestamp", "TimestampMs", "Residue"] {
        let hits = Arc::clone(&hits);
        map.register_callback(node, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .expect("node exists");
    }
    let adapter = EventAdapter::new(&map);

    let outcome = adapter.dispatch("ChunkX", &[1, 2, 3]).expect("no error");

    assert_eq!(outcome, DispatchOutcome::Dropped);
    assert!(!outcome.is_delivered());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    let diagnostics = adapter.diagnostics();
    assert_eq!(diagnostics.dropped, 1);
    assert_eq!(diagnostics.delivered, 0);
    assert_eq!(diagnostics.last_id, None);
}

#[test]
fn delivery_fills_every_matching_port_and_invalidates_dependents() {
    let map = chunk_map();
    let adapter = EventAdapter::new(&map);
    assert_eq!(
        map.get_value("ChunkTimestamp").expect_err("empty chunk port").kind(),
        ErrorKind::OutOfRange
    );

    let outcome = adapter
        .dispatch("a5C0", &42_000_u64.to_le_bytes())
        .expect("delivered");

    assert_eq!(
        outcome,
        DispatchOutcome::Delivered {
            ports: 2,
            invalidated: 3,
        }
    );
    assert_eq!(map.get_value("TimestampMs").expect("read"), Value::Integer(42));
    let mirror = map.port("MirrorPort").expect("IPort");
    assert_eq!(mirror.extent().expect("extent"), 8);

    adapter
        .dispatch("A5C0", &7_000_u64.to_le_bytes())
        .expect("delivered again");
    assert_eq!(map.get_value("TimestampMs").expect("read"), Value::Integer(7));

    let diagnostics = adapter.diagnostics();
    assert_eq!(diagnostics.delivered, 2);
    assert_eq!(diagnostics.injected_bytes, 32);
    assert_eq!(diagnostics.last_id.as_deref(), Some("A5C0"));
}

#[test]
fn delivery_notifies_callbacks_after_the_lock_is_released() {
    let map = chunk_map();
    let adapter = EventAdapter::new(&map);
    adapter
        .dispatch("A5C0", &1_000_u64.to_le_bytes())
        .expect("delivered");
    map.get_value("TimestampMs").expect("prime cache");

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    map.register_callback("TimestampMs", move |node| {
        sink.lock().push(node.value().expect("read in callback"));
    })
    .expect("node exists");

    adapter
        .dispatch("A5C0", &5_000_u64.to_le_bytes())
        .expect("delivered");
    assert_eq!(*seen.lock(), vec![Value::Integer(5)]);
}

#[test]
fn chunk_data_dispatches_each_chunk() {
    let map = chunk_map();
    let adapter = EventAdapter::new(&map);
    let mut buffer = chunk(0x77, &[0xEE; 3]);
    buffer.extend(chunk(0xA5C0, &9_000_u64.to_le_bytes()));

    let outcomes = adapter.deliver_chunk_data(&buffer).expect("well formed");

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_delivered());
    assert_eq!(outcomes[1], DispatchOutcome::Dropped);
    assert_eq!(map.get_value("ChunkTimestamp").expect("read"), Value::Integer(9_000));
}

#[test]
fn malformed_trailer_stops_delivery() {
    let map = chunk_map();
    let adapter = EventAdapter::new(&map);
    let mut buffer = vec![0_u8; 2];
    buffer.extend_from_slice(&9_u32.to_be_bytes());
    buffer.extend_from_slice(&40_u32.to_be_bytes());
    buffer.extend(chunk(0xA5C0, &3_000_u64.to_le_bytes()));

    let error = adapter.deliver_chunk_data(&buffer).expect_err("malformed");

    assert!(matches!(
        error,
        EventError::Layout(ChunkLayoutError::LengthOverrun { id: 9, .. })
    ));
    assert_eq!(adapter.diagnostics().delivered, 1);
    assert_eq!(map.get_value("TimestampMs").expect("read"), Value::Integer(3));
}

#[test]
fn concurrent_delivery_and_reads_stay_consistent() {
    let map = chunk_map();
    let adapter = EventAdapter::new(&map);
    adapter
        .dispatch("A5C0", &0_u64.to_le_bytes())
        .expect("seed");
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for value in 0..300_u64 {
                adapter
                    .dispatch("A5C0", &(value * 1000 + value % 7).to_le_bytes())
                    .expect("delivered");
            }
        });
        scope.spawn(|| {
            for _ in 0..300 {
                let Value::Integer(residue) = map.get_value("Residue").expect("read") else {
                    panic!("integer formula");
                };
                assert!((0..7).contains(&residue), "residue {residue}");
                let timestamp = map.integer("ChunkTimestamp").expect("IInteger");
                assert!(timestamp.value().expect("read") >= 0);
            }
        });
    });
    assert_eq!(adapter.diagnostics().delivered, 301);
}
