//! Tile build orchestration
//!
//! Builders produce tile payload bytes; this module owns the parameter
//! types they consume and routes the produced payload into an
//! ownership-tagged [`TileData`] buffer.

use nav_common::{BuildContext, Error, Result};

use super::tile_data::TileData;

/// Spatial and agent parameters of a single tile
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileParams {
    /// Tile grid x coordinate
    pub x: i32,
    /// Tile grid y coordinate
    pub y: i32,
    /// Layer within the tile column
    pub layer: i32,
    /// User assigned tile id
    pub user_id: u32,
    /// Minimum bounds of the tile
    pub bmin: [f32; 3],
    /// Maximum bounds of the tile
    pub bmax: [f32; 3],
    /// Minimum height where the agent can still walk
    pub walkable_height: f32,
    /// Radius of the agent
    pub walkable_radius: f32,
    /// Maximum ledge height the agent can climb
    pub walkable_climb: f32,
    /// Cell size on the xz plane
    pub cs: f32,
    /// Cell height
    pub ch: f32,
}

/// Tile parameters extended with the capacity budget for a build
///
/// Holds the spatial parameters by composition so a build request and the
/// tile description it carries stay separate types with an explicit
/// conversion between them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileBuildParams {
    /// Spatial and agent parameters of the tile
    pub tile: TileParams,
    /// Maximum number of polygon vertices
    pub max_poly_verts: i32,
    /// Maximum number of polygons
    pub max_polys: i32,
    /// Maximum number of detail vertices
    pub max_detail_verts: i32,
    /// Maximum number of detail triangles
    pub max_detail_tris: i32,
    /// Maximum number of off-mesh connections
    pub max_connections: i32,
}

impl TileBuildParams {
    /// The tile description this build request is for
    pub fn tile_params(&self) -> &TileParams {
        &self.tile
    }

    fn validate(&self) -> Result<()> {
        if self.max_poly_verts < 3 {
            return Err(Error::InvalidParam(
                "a tile needs at least 3 polygon vertices".to_string(),
            ));
        }
        if self.max_polys < 1 {
            return Err(Error::InvalidParam(
                "a tile needs at least 1 polygon".to_string(),
            ));
        }
        if self.max_detail_verts < 0
            || self.max_detail_tris < 0
            || self.max_connections < 0
        {
            return Err(Error::InvalidParam(
                "capacity budgets must be non-negative".to_string(),
            ));
        }
        if self.tile.cs <= 0.0 || self.tile.ch <= 0.0 {
            return Err(Error::InvalidParam(
                "cell size and height must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Produces serialized tile payloads
pub trait TileBuilder {
    /// Builds the payload for one tile, logging progress to `ctx`
    fn build_tile(&self, params: &TileBuildParams, ctx: &mut BuildContext) -> Result<Vec<u8>>;
}

/// Builds a tile and stores the payload into an empty buffer
///
/// Validates the capacity budget up front and rejects a target that
/// already holds a payload, so a failed build never clobbers one.
pub fn build_tile_data(
    builder: &dyn TileBuilder,
    params: &TileBuildParams,
    ctx: &mut BuildContext,
    out: &mut TileData,
) -> Result<()> {
    if !out.is_empty() {
        return Err(Error::InvalidParam(
            "target buffer already holds a payload".to_string(),
        ));
    }
    params.validate()?;

    let payload = builder.build_tile(params, ctx)?;
    if payload.is_empty() {
        return Err(Error::InvalidParam(
            "builder produced an empty payload".to_string(),
        ));
    }
    out.assign_local(payload)
}

/// Copies pre-built payload bytes into an empty buffer
pub fn build_tile_data_raw(data: &[u8], out: &mut TileData) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidParam(
            "tile payload is empty".to_string(),
        ));
    }
    let mut copy = Vec::new();
    copy.try_reserve_exact(data.len())?;
    copy.extend_from_slice(data);
    out.assign_local(copy)
}
