//! Cache invalidation, change callbacks, polling, and concurrent access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nodemap_core::schema::{
    FormulaDescription, IntRegDescription, NodeDescription, NodeKind, OperandDescription,
    PortDescription, RegisterDescription,
};
use nodemap_core::{
    CachingMode, MemoryPort, NodeMap, NodeMapConfig, Port, PortError, Value,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use swissknife as _;
use thiserror as _;
use tracing as _;

type Hits = Arc<Mutex<HashMap<String, usize>>>;

fn record_all(map: &NodeMap) -> Hits {
    let hits: Hits = Arc::default();
    let names: Vec<String> = map.nodes().map(|node| node.name().to_string()).collect();
    for name in names {
        let hits = Arc::clone(&hits);
        map.register_callback(&name, move |node| {
            *hits.lock().entry(node.name().to_string()).or_default() += 1;
        })
        .expect("node exists");
    }
    hits
}

fn diamond() -> NodeMap {
    NodeMap::builder(NodeMapConfig::default())
        .node(NodeDescription::integer("A", 1))
        .node(NodeDescription::int_swiss_knife("B", "X + 1", &[("X", "A")]))
        .node(NodeDescription::int_swiss_knife("C", "X * 2", &[("X", "A")]))
        .node(NodeDescription::int_swiss_knife("D", "L + R", &[("L", "B"), ("R", "C")]))
        .node(NodeDescription::integer("Unrelated", 0))
        .build()
        .expect("diamond builds")
}

#[test]
fn diamond_invalidates_each_dependent_once() {
    let map = diamond();
    assert_eq!(map.get_value("D").expect("read"), Value::Integer(4));
    let hits = record_all(&map);

    map.set_value("A", 5_i64).expect("write");

    let hits = hits.lock().clone();
    for name in ["A", "B", "C", "D"] {
        assert_eq!(hits.get(name), Some(&1), "{name}");
    }
    assert_eq!(hits.get("Unrelated"), None);
    assert!(!map.node("D").expect("D").is_cache_valid());
    assert_eq!(map.get_value("D").expect("read"), Value::Integer(16));
}

#[test]
fn reads_are_cached_until_invalidated() {
    let map = diamond();
    map.get_value("D").expect("read");
    for name in ["A", "B", "C", "D"] {
        assert!(map.node(name).expect("node").is_cache_valid(), "{name}");
    }
    map.invalidate("B").expect("invalidate");
    assert!(!map.node("B").expect("B").is_cache_valid());
    assert!(!map.node("D").expect("D").is_cache_valid());
    assert!(map.node("C").expect("C").is_cache_valid());
}

#[test]
fn invalidate_all_is_silent() {
    let map = diamond();
    map.get_value("D").expect("read");
    let hits = record_all(&map);
    map.invalidate_all();
    assert!(hits.lock().is_empty());
    assert!(!map.node("A").expect("A").is_cache_valid());
    assert_eq!(map.get_value("D").expect("read"), Value::Integer(4));
}

#[test]
fn callbacks_may_read_the_map() {
    let map = diamond();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = map
        .register_callback("D", move |node| {
            sink.lock().push(node.value().expect("read inside callback"));
        })
        .expect("D exists");

    map.set_value("A", 2_i64).expect("write");
    assert_eq!(*seen.lock(), vec![Value::Integer(7)]);

    assert!(map.deregister_callback(handle));
    assert!(!map.deregister_callback(handle));
    map.set_value("A", 3_i64).expect("write");
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn callback_registration_needs_a_node() {
    let map = diamond();
    assert!(map.register_callback("Nope", |_| {}).is_err());
}

fn selector_map() -> NodeMap {
    let mut memory = vec![0_u8; 16];
    memory[0] = 10;
    memory[4] = 20;
    NodeMap::builder(NodeMapConfig::default())
        .node(NodeDescription::new("Device", NodeKind::Port(PortDescription::default())))
        .node(NodeDescription::integer("GainSelector", 0).with_selected(["Gain"]))
        .node(NodeDescription::new(
            "Gain",
            NodeKind::IntReg(IntRegDescription::new(
                RegisterDescription::new("Device", 0, 4).with_index("GainSelector", 4),
            )),
        ))
        .node(NodeDescription::int_swiss_knife("GainTwice", "G * 2", &[("G", "Gain")]))
        .bind_port("Device", MemoryPort::from_bytes(memory))
        .build()
        .expect("selector map builds")
}

#[test]
fn selector_change_recomputes_mapped_nodes() {
    let map = selector_map();
    assert_eq!(map.get_value("Gain").expect("read"), Value::Integer(10));
    assert_eq!(map.get_value("GainTwice").expect("read"), Value::Integer(20));
    assert!(map.node("Gain").expect("Gain").is_cache_valid());

    map.set_value("GainSelector", 1_i64).expect("select");

    assert!(!map.node("Gain").expect("Gain").is_cache_valid());
    assert!(!map.node("GainTwice").expect("GainTwice").is_cache_valid());
    assert_eq!(map.register("Gain").expect("IRegister").address().expect("address"), 4);
    assert_eq!(map.get_value("Gain").expect("read"), Value::Integer(20));
    assert_eq!(map.get_value("GainTwice").expect("read"), Value::Integer(40));
}

#[test]
fn selector_view_lists_selected_features() {
    let map = selector_map();
    let selector = map.selector("GainSelector").expect("ISelector");
    let selected: Vec<&str> = selector
        .selected_features()
        .iter()
        .map(|node| node.name())
        .collect();
    assert_eq!(selected, ["Gain"]);
}

#[test]
fn port_write_invalidates_mapped_registers() {
    let map = selector_map();
    assert_eq!(map.get_value("Gain").expect("read"), Value::Integer(10));
    map.port("Device").expect("IPort").write(0, &[11]).expect("write");
    assert_eq!(map.get_value("Gain").expect("read"), Value::Integer(11));
}

/// Counts transport reads; the register always holds `value`.
struct CountingPort {
    reads: Arc<AtomicUsize>,
    value: u8,
}

impl Port for CountingPort {
    fn extent(&self) -> u64 {
        4
    }

    fn read(&mut self, _address: u64, buffer: &mut [u8]) -> Result<(), PortError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        buffer.fill(0);
        buffer[0] = self.value;
        Ok(())
    }

    fn write(&mut self, _address: u64, data: &[u8]) -> Result<(), PortError> {
        self.value = data[0];
        Ok(())
    }
}

fn counted(config: NodeMapConfig, caching: CachingMode) -> (NodeMap, Arc<AtomicUsize>) {
    let reads = Arc::new(AtomicUsize::new(0));
    let map = NodeMap::builder(config)
        .node(NodeDescription::new("Device", NodeKind::Port(PortDescription::default())))
        .node(
            NodeDescription::new(
                "Temperature",
                NodeKind::IntReg(IntRegDescription::new(RegisterDescription::new(
                    "Device", 0, 4,
                ))),
            )
            .with_caching(caching)
            .with_polling_time(Duration::from_millis(100)),
        )
        .bind_port(
            "Device",
            CountingPort {
                reads: Arc::clone(&reads),
                value: 42,
            },
        )
        .build()
        .expect("counted map builds");
    (map, reads)
}

#[test]
fn polling_expires_the_cache() {
    let (map, reads) = counted(NodeMapConfig::default(), CachingMode::WriteThrough);
    let hits = record_all(&map);
    map.get_value("Temperature").expect("read");
    map.get_value("Temperature").expect("read");
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    map.poll(Duration::from_millis(60));
    assert!(map.node("Temperature").expect("node").is_cache_valid());
    map.poll(Duration::from_millis(60));
    assert!(!map.node("Temperature").expect("node").is_cache_valid());
    assert_eq!(hits.lock().get("Temperature"), Some(&1));

    map.get_value("Temperature").expect("read");
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn no_cache_reads_every_time() {
    let (map, reads) = counted(NodeMapConfig::default(), CachingMode::NoCache);
    for _ in 0..3 {
        map.get_value("Temperature").expect("read");
    }
    assert_eq!(reads.load(Ordering::SeqCst), 3);
}

/// Register whose device-side value changes without the node map noticing.
struct SensorPort {
    value: Arc<AtomicUsize>,
}

impl Port for SensorPort {
    fn extent(&self) -> u64 {
        4
    }

    fn read(&mut self, _address: u64, buffer: &mut [u8]) -> Result<(), PortError> {
        buffer.fill(0);
        buffer[0] = u8::try_from(self.value.load(Ordering::SeqCst)).unwrap_or(u8::MAX);
        Ok(())
    }

    fn write(&mut self, _address: u64, _data: &[u8]) -> Result<(), PortError> {
        Ok(())
    }
}

fn sensor_map(caching: CachingMode) -> (NodeMap, Arc<AtomicUsize>) {
    let value = Arc::new(AtomicUsize::new(10));
    let map = NodeMap::builder(NodeMapConfig::default())
        .node(NodeDescription::new("Device", NodeKind::Port(PortDescription::default())))
        .node(
            NodeDescription::new(
                "Temp",
                NodeKind::IntReg(IntRegDescription::new(RegisterDescription::new(
                    "Device", 0, 4,
                ))),
            )
            .with_caching(caching),
        )
        .node(NodeDescription::int_swiss_knife("Twice", "T * 2", &[("T", "Temp")]))
        .node(NodeDescription::int_swiss_knife("Plus", "D + 1", &[("D", "Twice")]))
        .bind_port(
            "Device",
            SensorPort {
                value: Arc::clone(&value),
            },
        )
        .build()
        .expect("sensor map builds");
    (map, value)
}

#[test]
fn formulas_over_uncached_registers_recompute() {
    let (map, value) = sensor_map(CachingMode::NoCache);
    assert_eq!(map.get_value("Twice").expect("read"), Value::Integer(20));
    assert_eq!(map.get_value("Plus").expect("read"), Value::Integer(21));
    assert!(!map.node("Twice").expect("node").is_cache_valid());
    assert!(!map.node("Plus").expect("node").is_cache_valid());

    value.store(50, Ordering::SeqCst);
    assert_eq!(map.get_value("Temp").expect("read"), Value::Integer(50));
    assert_eq!(map.get_value("Twice").expect("read"), Value::Integer(100));
    assert_eq!(map.get_value("Plus").expect("read"), Value::Integer(101));
}

#[test]
fn formulas_over_cached_registers_keep_their_value() {
    let (map, value) = sensor_map(CachingMode::WriteThrough);
    assert_eq!(map.get_value("Twice").expect("read"), Value::Integer(20));
    value.store(50, Ordering::SeqCst);
    assert_eq!(map.get_value("Twice").expect("read"), Value::Integer(20));
    map.invalidate("Temp").expect("known node");
    assert_eq!(map.get_value("Twice").expect("read"), Value::Integer(100));
}

#[test]
fn disabled_cache_reads_every_time() {
    let config = NodeMapConfig {
        cache_enabled: false,
        ..NodeMapConfig::default()
    };
    let (map, reads) = counted(config, CachingMode::WriteThrough);
    map.get_value("Temperature").expect("read");
    map.get_value("Temperature").expect("read");
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn write_around_leaves_the_cache_invalid() {
    let (map, reads) = counted(NodeMapConfig::default(), CachingMode::WriteAround);
    map.set_value("Temperature", 7_i64).expect("write");
    assert!(!map.node("Temperature").expect("node").is_cache_valid());
    assert_eq!(map.get_value("Temperature").expect("read"), Value::Integer(7));
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    let (map, reads) = counted(NodeMapConfig::default(), CachingMode::WriteThrough);
    map.set_value("Temperature", 7_i64).expect("write");
    assert_eq!(map.get_value("Temperature").expect("read"), Value::Integer(7));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn concurrent_readers_never_see_half_invalidated_chains() {
    let map = diamond();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for value in 0..200_i64 {
                map.set_value("A", value).expect("write");
            }
        });
        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let Value::Integer(d) = map.get_value("D").expect("read") else {
                        panic!("D is an integer");
                    };
                    assert_eq!((d - 1) % 3, 0, "D = 3A + 1 for a single A, got {d}");
                }
            });
        }
    });
    assert_eq!(map.get_value("D").expect("read"), Value::Integer(3 * 199 + 1));
}

/// Node `i > 0` sums the nodes selected by bit `j` of `masks[i - 1]`
/// (`j < i`); node 0 is a stored integer.
fn random_dag(masks: &[u32]) -> NodeMap {
    let mut builder =
        NodeMap::builder(NodeMapConfig::default()).node(NodeDescription::integer("N0", 1));
    for (offset, mask) in masks.iter().enumerate() {
        let index = offset + 1;
        let name = format!("N{index}");
        let inputs: Vec<usize> = (0..index).filter(|j| mask & (1 << j) != 0).collect();
        let description = if inputs.is_empty() {
            NodeDescription::integer(name, 0)
        } else {
            NodeDescription::new(
                name,
                NodeKind::IntSwissKnife(FormulaDescription {
                    formula: inputs
                        .iter()
                        .map(|j| format!("V{j}"))
                        .collect::<Vec<_>>()
                        .join(" + "),
                    operands: inputs
                        .iter()
                        .map(|j| OperandDescription::new(format!("V{j}"), format!("N{j}")))
                        .collect(),
                }),
            )
        };
        builder = builder.node(description);
    }
    builder.build().expect("dag builds")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn invalidation_closure_is_exact(masks in prop::collection::vec(any::<u32>(), 1..10)) {
        let map = random_dag(&masks);
        for node in map.nodes() {
            let _ = node.value();
        }
        let mut reached = vec![false; masks.len() + 1];
        reached[0] = true;
        for (offset, mask) in masks.iter().enumerate() {
            let index = offset + 1;
            reached[index] = (0..index).any(|j| mask & (1 << j) != 0 && reached[j]);
        }
        let hits = record_all(&map);

        map.set_value("N0", 2_i64).expect("write");

        let hits = hits.lock().clone();
        for (index, expected) in reached.iter().enumerate() {
            let name = format!("N{index}");
            let count = hits.get(&name).copied().unwrap_or_default();
            prop_assert_eq!(count, usize::from(*expected), "{}", name);
            prop_assert_eq!(
                map.node(&name).expect("node").is_cache_valid(),
                !expected || index == 0
            );
        }
    }
}
