//! Archive round-trip and corruption tests

use byteorder::{LittleEndian, WriteBytesExt};

use nav_common::Error;

use super::archive::{
    pack_tile_set, unpack_tile_set, NAVMESH_SET_VERSION, SET_HEADER_SIZE,
    TILE_RECORD_HEADER_SIZE,
};
use super::tile_data::TileData;
use super::tile_header::{TileDataHeader, TILE_DATA_MAGIC, TILE_DATA_VERSION};
use super::tile_set::{NavMeshParams, TileRef, TileSet};

fn params() -> NavMeshParams {
    NavMeshParams {
        origin: [-128.0, 0.0, -128.0],
        tile_width: 32.0,
        tile_height: 32.0,
        max_tiles: 16,
        max_polys_per_tile: 256,
    }
}

fn tile_payload(x: i32, y: i32) -> Vec<u8> {
    let header = TileDataHeader {
        magic: TILE_DATA_MAGIC,
        version: TILE_DATA_VERSION,
        x,
        y,
        layer: 0,
        user_id: (x * 100 + y) as u32,
        poly_count: 6,
        vert_count: 18,
        detail_mesh_count: 6,
        detail_vert_count: 24,
        detail_tri_count: 12,
        bmin: [x as f32 * 32.0 - 128.0, 0.0, y as f32 * 32.0 - 128.0],
        bmax: [(x + 1) as f32 * 32.0 - 128.0, 4.0, (y + 1) as f32 * 32.0 - 128.0],
        walkable_height: 2.0,
        walkable_radius: 0.6,
        walkable_climb: 0.9,
    };
    let mut data = Vec::new();
    header.write_to(&mut data).unwrap();
    // Distinct filler per tile so payload mix-ups show up in assertions.
    data.extend_from_slice(&vec![(x * 16 + y) as u8; 40 + (x as usize) * 8]);
    data
}

fn populated_set() -> (TileSet, Vec<(TileRef, Vec<u8>)>) {
    let mut set = TileSet::new(params()).unwrap();
    let mut inserted = Vec::new();
    for x in 0..3 {
        for y in 0..2 {
            let bytes = tile_payload(x, y);
            let mut data = TileData::from_bytes(&bytes);
            let tile_ref = set.insert(&mut data, TileRef::NULL).unwrap();
            inserted.push((tile_ref, bytes));
        }
    }
    (set, inserted)
}

#[test]
fn test_pack_unpack_round_trip() {
    let (set, inserted) = populated_set();

    let archive = pack_tile_set(&set).unwrap();
    let expected_len = SET_HEADER_SIZE
        + inserted.len() * TILE_RECORD_HEADER_SIZE
        + inserted.iter().map(|(_, b)| b.len()).sum::<usize>();
    assert_eq!(archive.len(), expected_len);

    let restored = unpack_tile_set(&archive).unwrap();
    assert_eq!(restored.params(), set.params());
    assert_eq!(restored.tile_count(), inserted.len());

    // Every tile resolves under its original reference with identical bytes.
    for (tile_ref, bytes) in &inserted {
        let tile = restored.tile_by_ref(*tile_ref).unwrap();
        assert_eq!(tile.payload(), &bytes[..]);
    }
}

#[test]
fn test_pack_empty_set() {
    let set = TileSet::new(params()).unwrap();
    let archive = pack_tile_set(&set).unwrap();
    assert_eq!(archive.len(), SET_HEADER_SIZE);

    let restored = unpack_tile_set(&archive).unwrap();
    assert_eq!(restored.tile_count(), 0);
    assert_eq!(restored.params(), set.params());
}

#[test]
fn test_unpack_rejects_wrong_version() {
    let (set, _) = populated_set();
    let mut archive = pack_tile_set(&set).unwrap();

    let mut bad_version = Vec::new();
    bad_version
        .write_i32::<LittleEndian>(NAVMESH_SET_VERSION + 3)
        .unwrap();
    archive[..4].copy_from_slice(&bad_version);

    assert!(matches!(
        unpack_tile_set(&archive),
        Err(Error::WrongVersion { found, .. }) if found == NAVMESH_SET_VERSION + 3
    ));
}

#[test]
fn test_unpack_rejects_truncation() {
    let (set, _) = populated_set();
    let archive = pack_tile_set(&set).unwrap();

    // Too short for the top header.
    assert!(unpack_tile_set(&archive[..SET_HEADER_SIZE - 4]).is_err());

    // Cut inside a record header and inside a payload.
    assert!(unpack_tile_set(&archive[..SET_HEADER_SIZE + 6]).is_err());
    assert!(unpack_tile_set(&archive[..archive.len() - 1]).is_err());
}

#[test]
fn test_unpack_corrupt_record_is_all_or_nothing() {
    let (set, inserted) = populated_set();
    let mut archive = pack_tile_set(&set).unwrap();

    // Corrupt the magic of the last tile's payload; every earlier record
    // is intact, yet the unpack must still fail outright.
    let last_payload_len = inserted.last().unwrap().1.len();
    let magic_offset = archive.len() - last_payload_len;
    archive[magic_offset] ^= 0xff;

    assert!(matches!(
        unpack_tile_set(&archive),
        Err(Error::WrongMagic)
    ));
}

#[test]
fn test_unpack_rejects_null_reference() {
    let (set, _) = populated_set();
    let mut archive = pack_tile_set(&set).unwrap();

    // Zero out the first record's tile reference.
    let first_record = SET_HEADER_SIZE;
    archive[first_record..first_record + 8].fill(0);

    assert!(matches!(
        unpack_tile_set(&archive),
        Err(Error::CorruptRecord(_))
    ));
}

#[test]
fn test_references_stay_stable_across_round_trips() {
    let (set, inserted) = populated_set();

    let once = unpack_tile_set(&pack_tile_set(&set).unwrap()).unwrap();
    let twice = unpack_tile_set(&pack_tile_set(&once).unwrap()).unwrap();

    for (tile_ref, bytes) in &inserted {
        assert_eq!(twice.tile_by_ref(*tile_ref).unwrap().payload(), &bytes[..]);
    }
}
