use crate::tiles::{Directions, TileCoord};

/// What the world looks like to the simulation: which tiles are space,
/// which are sealed, and which directions entities block.
///
/// Queried during revalidation only; between revalidations the grid
/// trusts its cached adjacency, so hosts must invalidate a tile when
/// anything here changes for it.
pub trait TerrainSource {
	fn is_space(&self, coords: TileCoord) -> bool;
	/// Directions air cannot leave this tile through.
	fn airtight_directions(&self, _coords: TileCoord) -> Directions {
		Directions::empty()
	}
	/// Fully sealed, holds no air at all.
	fn is_air_blocked(&self, _coords: TileCoord) -> bool {
		false
	}
}

/// Outbound effects the simulation reports but does not implement.
/// Every method has a no-op default, so hosts implement only what they
/// render or gameplay cares about.
pub trait AtmosHooks {
	/// A tile ended the tick with a pressure difference worth shoving
	/// entities around over.
	fn high_pressure_movement(&mut self, _coords: TileCoord, _difference: f32, _direction: Directions) {}
	/// The visible gases on a tile changed.
	fn invalidate_visuals(&mut self, _coords: TileCoord) {}
	/// Decompression vented enough gas through this tile to tear the
	/// floor off.
	fn rip_floor(&mut self, _coords: TileCoord, _vented_moles: f32) {}
	/// Decompression found the boundary between a pressurized tile and
	/// space; hosts with firelocks close them here.
	fn firelock_boundary(&mut self, _a: TileCoord, _b: TileCoord) {}
}

/// Hooks that do nothing, for hosts and tests that don't care.
#[derive(Default, Debug, Clone, Copy)]
pub struct NullHooks;

impl AtmosHooks for NullHooks {}
