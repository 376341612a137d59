//! Tile storage, ownership tracking, and archive serialization
//!
//! This crate owns the lifecycle of serialized navigation tiles: building
//! payloads into ownership-tagged buffers, handing them to a slot-based
//! [`TileSet`], and packing whole sets into a versioned archive that
//! restores tiles under their original references.

mod archive;
mod builder;
mod tile_data;
mod tile_header;
mod tile_set;

#[cfg(test)]
mod archive_tests;

pub use archive::{
    pack_tile_set, unpack_tile_set, NAVMESH_SET_VERSION, SET_HEADER_SIZE,
    TILE_RECORD_HEADER_SIZE,
};
pub use builder::{
    build_tile_data, build_tile_data_raw, TileBuildParams, TileBuilder, TileParams,
};
pub use tile_data::{DataOwnership, TileData};
pub use tile_header::{
    read_tile_data_header, TileDataHeader, TILE_DATA_HEADER_SIZE, TILE_DATA_MAGIC,
    TILE_DATA_VERSION,
};
pub use tile_set::{NavMeshParams, StoredTile, TileRef, TileSet};
