//! World-save round trips across all three network kinds, including the
//! skip-and-warn behavior for malformed records.

use gridflow_core::config::EngineConfig;
use gridflow_core::coord::{Direction, TileCoord};
use gridflow_core::fixed::fixed;
use gridflow_core::item::{Inventory, ItemKindId, ItemStack};
use gridflow_core::machine::{MachineInfo, MachineStore};
use gridflow_core::registry::{NetworkRegistry, ResourceNetwork};
use gridflow_core::serialize::{NetworkBody, NetworkRecord, WorldSave, decode_world, encode_world};
use gridflow_core::storage::FluidKind;
use gridflow_core::test_utils::GridFixture;
use gridflow_core::tile::{DirMask, KindMask, ResourceKind};
use gridflow_fluid::FluidNetwork;
use gridflow_item::ItemNetwork;
use gridflow_power::PowerNetwork;

fn c(x: i32, y: i32) -> TileCoord {
    TileCoord::new(x, y)
}

/// Build one network of each kind, snapshot them into a world save, decode,
/// and restore each through its kind's loader.
#[test]
fn world_save_round_trip_across_kinds() {
    let mut grid = GridFixture::new();
    let mut machines = MachineStore::new();

    // Item run with a pump and chests.
    machines.place(
        c(-1, 0),
        MachineInfo {
            accepts: KindMask::ITEMS,
            connections: DirMask::ALL,
        },
        Some(Inventory::new(64)),
    );
    machines.place(
        c(3, 0),
        MachineInfo {
            accepts: KindMask::ITEMS,
            connections: DirMask::ALL,
        },
        Some(Inventory::new(64)),
    );
    let _ = machines
        .inventory_mut(c(-1, 0))
        .unwrap()
        .insert(ItemStack::new(ItemKindId(2), 12));
    grid.pump(ResourceKind::Items, c(0, 0), Direction::East, 4, 1);
    grid.transport(ResourceKind::Items, c(1, 0));
    grid.transport(ResourceKind::Items, c(2, 0));
    let mut items: NetworkRegistry<ItemNetwork> = NetworkRegistry::new();
    for x in 0..3 {
        items.place(c(x, 0), &grid, &machines).unwrap();
    }
    // Put a unit in flight so the save carries one.
    let item_id = items.id_at(c(0, 0)).unwrap();
    let _ = items
        .network_mut(item_id)
        .unwrap()
        .tick(&grid, &mut machines, &EngineConfig::default());

    // Fluid line with contents.
    let mut fluids: NetworkRegistry<FluidNetwork> = NetworkRegistry::new();
    for x in 0..4 {
        grid.transport(ResourceKind::Fluids, c(x, 5));
        grid.set_capacity(c(x, 5), fixed(25.0));
        fluids.place(c(x, 5), &grid, &machines).unwrap();
    }
    let fluid_id = fluids.id_at(c(0, 5)).unwrap();
    fluids
        .network_mut(fluid_id)
        .unwrap()
        .import(Some(FluidKind(1)), fixed(42.0));

    // Power line with charge.
    let mut power: NetworkRegistry<PowerNetwork> = NetworkRegistry::new();
    for x in 0..3 {
        grid.transport(ResourceKind::Power, c(x, 9));
        grid.set_capacity(c(x, 9), fixed(10.0));
        power.place(c(x, 9), &grid, &machines).unwrap();
    }
    let power_id = power.id_at(c(0, 9)).unwrap();
    let _ = power.network_mut(power_id).unwrap().import(fixed(14.0));

    // Snapshot everything.
    let records = vec![
        items.network(item_id).unwrap().to_record().unwrap(),
        fluids.network(fluid_id).unwrap().to_record().unwrap(),
        power.network(power_id).unwrap().to_record().unwrap(),
    ];
    let bytes = encode_world(&WorldSave::new(77, records)).unwrap();

    // Restore.
    let save = decode_world(&bytes).unwrap();
    assert_eq!(save.header.tick, 77);

    let item_records = save.records_of(ResourceKind::Items);
    assert_eq!(item_records.len(), 1);
    let restored_items = ItemNetwork::from_record(item_records[0], &grid).unwrap();
    assert_eq!(restored_items.graph().len(), 3);
    assert_eq!(restored_items.live_units(), 1);
    assert!(restored_items.adjacent_inventories().contains(&c(3, 0)));

    let fluid_records = save.records_of(ResourceKind::Fluids);
    let restored_fluids = FluidNetwork::from_record(fluid_records[0], &grid).unwrap();
    assert_eq!(restored_fluids.storage().current(), fixed(42.0));
    assert_eq!(restored_fluids.storage().max(), fixed(100.0));
    assert_eq!(restored_fluids.storage().fluid_kind(), Some(FluidKind(1)));

    let power_records = save.records_of(ResourceKind::Power);
    let restored_power = PowerNetwork::from_record(power_records[0], &grid).unwrap();
    assert_eq!(restored_power.storage().current(), fixed(14.0));

    // Loaded instances slot back into registries with their ids intact.
    let mut fresh: NetworkRegistry<FluidNetwork> = NetworkRegistry::new();
    fresh.insert_loaded(restored_fluids);
    assert_eq!(fresh.id_at(c(2, 5)), Some(fluid_id));
    let net = fresh.network_at(c(2, 5)).unwrap();
    assert!(net.graph().find_path(&grid, c(0, 5), c(3, 5)).unwrap().is_some());
}

/// A record with a corrupt filter byte is skipped; the rest of the save
/// still loads.
#[test]
fn corrupt_record_does_not_poison_the_load() {
    let mut grid = GridFixture::new();
    let machines = MachineStore::new();
    let mut fluids: NetworkRegistry<FluidNetwork> = NetworkRegistry::new();
    for x in 0..2 {
        grid.transport(ResourceKind::Fluids, c(x, 0));
        grid.set_capacity(c(x, 0), fixed(10.0));
        fluids.place(c(x, 0), &grid, &machines).unwrap();
    }
    let id = fluids.id_at(c(0, 0)).unwrap();

    let good = fluids.network(id).unwrap().to_record().unwrap();
    let bad = NetworkRecord {
        id: 99,
        filter: 250,
        body: NetworkBody::Seed(c(0, 0)),
        junctions: Vec::new(),
        extra: Vec::new(),
    };
    let bytes = encode_world(&WorldSave::new(1, vec![bad, good])).unwrap();

    let save = decode_world(&bytes).unwrap();
    let usable = save.records_of(ResourceKind::Fluids);
    assert_eq!(usable.len(), 1);
    assert!(FluidNetwork::from_record(usable[0], &grid).is_ok());
}
