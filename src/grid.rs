use eyre::{eyre, Result};
use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use rand::{rngs::SmallRng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug_span, trace};

use crate::gas::constants::{
	CELL_VOLUME, EXCITED_GROUP_BREAKDOWN_CYCLES, EXCITED_GROUP_DISMANTLE_CYCLES,
	EQUALIZE_HARD_TILE_LIMIT, EQUALIZE_TILE_LIMIT, T20C,
};
use crate::gas::{GasId, Mixture};
use crate::hooks::{AtmosHooks, TerrainSource};
use crate::reaction::{GasReaction, ReactionRegistry};
use crate::tiles::groups::ExcitedGroups;
use crate::tiles::{Directions, Tile, TileArena, TileCoord, TileIndex};

/// Tunables for one grid's simulation. The defaults match the numbers
/// the rest of the crate's constants assume; hosts mostly touch the
/// feature toggles.
#[derive(Copy, Clone, Debug)]
pub struct AtmosConfig {
	pub equalization_enabled: bool,
	pub decompression_enabled: bool,
	/// Whether decompression may tear floor tiles off.
	pub rip_tiles: bool,
	pub excited_groups: bool,
	/// Soft cap on equalization zone size; tiles past it are dropped
	/// from the zone.
	pub equalize_tile_limit: usize,
	/// Hard cap on zone flood fills, equalization and decompression
	/// both.
	pub equalize_hard_tile_limit: usize,
	pub group_breakdown_cycles: i32,
	pub group_dismantle_cycles: i32,
}

impl Default for AtmosConfig {
	fn default() -> Self {
		Self {
			equalization_enabled: true,
			decompression_enabled: true,
			rip_tiles: true,
			excited_groups: true,
			equalize_tile_limit: EQUALIZE_TILE_LIMIT,
			equalize_hard_tile_limit: EQUALIZE_HARD_TILE_LIMIT,
			group_breakdown_cycles: EXCITED_GROUP_BREAKDOWN_CYCLES,
			group_dismantle_cycles: EXCITED_GROUP_DISMANTLE_CYCLES,
		}
	}
}

/// One grid's worth of atmosphere, fully self-contained: tiles, active
/// set, excited groups, cycle counters and RNG all live here, so grids
/// never contend with each other and a grid plus its collaborators is
/// everything a tick needs.
pub struct GridAtmosphere {
	pub(crate) arena: TileArena,
	pub(crate) active_tiles: IndexSet<TileIndex, FxBuildHasher>,
	pub(crate) excited_groups: ExcitedGroups,
	pub(crate) high_pressure_delta: IndexSet<TileIndex, FxBuildHasher>,
	invalidated: IndexSet<TileCoord, FxBuildHasher>,
	pub(crate) update_counter: i64,
	eq_queue_cycle: i64,
	eq_queue_cycle_slow: i64,
	pub config: AtmosConfig,
	pub(crate) reactions: ReactionRegistry,
	pub(crate) rng: SmallRng,
}

impl GridAtmosphere {
	pub fn new(config: AtmosConfig) -> Self {
		Self::with_seed(config, rand::random())
	}

	/// As `new`, with a fixed RNG seed so decompression side effects
	/// are reproducible.
	pub fn with_seed(config: AtmosConfig, seed: u64) -> Self {
		Self {
			arena: TileArena::new(),
			active_tiles: IndexSet::default(),
			excited_groups: ExcitedGroups::default(),
			high_pressure_delta: IndexSet::default(),
			invalidated: IndexSet::default(),
			update_counter: 1,
			eq_queue_cycle: 0,
			eq_queue_cycle_slow: 0,
			config,
			reactions: ReactionRegistry::new(),
			rng: SmallRng::seed_from_u64(seed),
		}
	}

	pub fn update_counter(&self) -> i64 {
		self.update_counter
	}
	pub fn tile_count(&self) -> usize {
		self.arena.len()
	}
	pub fn active_tile_count(&self) -> usize {
		self.active_tiles.len()
	}
	pub fn excited_group_count(&self) -> usize {
		self.excited_groups.len()
	}

	pub fn register_reaction(&mut self, reaction: Box<dyn GasReaction + Send + Sync>) {
		self.reactions.register(reaction);
	}

	/// Queues a tile for (re)validation against the terrain on the next
	/// tick. New tiles enter the simulation this way too.
	pub fn invalidate_tile(&mut self, coords: TileCoord) {
		self.invalidated.insert(coords);
	}

	pub fn tile(&self, coords: TileCoord) -> Option<&Tile> {
		self.arena.node_id(coords).map(|idx| self.arena.node(idx))
	}

	pub fn tile_air(&self, coords: TileCoord) -> Option<&Mixture> {
		self.tile(coords).and_then(|tile| tile.air.as_ref())
	}

	pub fn tile_air_mut(&mut self, coords: TileCoord) -> Result<&mut Mixture> {
		let idx = self
			.arena
			.node_id(coords)
			.ok_or_else(|| eyre!("no tile at {coords}"))?;
		self.arena
			.node_mut(idx)
			.air
			.as_mut()
			.ok_or_else(|| eyre!("tile at {coords} holds no air"))
	}

	/// Adds gas to a tile and wakes it.
	pub fn add_gas(
		&mut self,
		coords: TileCoord,
		gas: GasId,
		quantity: f32,
		temperature: f32,
	) -> Result<()> {
		let idx = self
			.arena
			.node_id(coords)
			.ok_or_else(|| eyre!("no tile at {coords}"))?;
		{
			let tile = self.arena.node_mut(idx);
			let air = tile
				.air
				.as_mut()
				.ok_or_else(|| eyre!("tile at {coords} holds no air"))?;
			air.add(gas, quantity, temperature)?;
		}
		self.add_active_tile(idx);
		Ok(())
	}

	/// Total moles across the whole grid, mostly useful for sanity
	/// checks on conservation.
	pub fn total_moles(&self) -> f64 {
		self.arena
			.tiles()
			.map(|(_, tile)| f64::from(tile.total_moles()))
			.sum()
	}

	/// Runs zone equalization (or decompression, if the zone touches
	/// space) outward from the given tile right now. `tick` does this
	/// automatically for tiles that moved gas; this is for hosts that
	/// changed a tile's contents out of band.
	pub fn equalize_zone(&mut self, coords: TileCoord, hooks: &mut dyn AtmosHooks) -> Result<()> {
		let idx = self
			.arena
			.node_id(coords)
			.ok_or_else(|| eyre!("no tile at {coords}"))?;
		let cycle_num = self.update_counter;
		self.equalize_pressure_in_zone(idx, cycle_num, hooks);
		Ok(())
	}

	/// One full simulation tick: revalidate queued tiles, diffuse the
	/// active set, age excited groups, equalize flagged zones, then
	/// flush pressure-movement reports.
	pub fn tick(&mut self, terrain: &dyn TerrainSource, hooks: &mut dyn AtmosHooks) {
		let span = debug_span!("atmos_tick", counter = self.update_counter);
		let _enter = span.enter();
		self.process_revalidate(terrain, hooks);
		self.process_active_tiles(hooks);
		if self.config.excited_groups {
			self.process_excited_groups(hooks);
		}
		if self.config.equalization_enabled {
			self.process_tile_equalize(hooks);
		}
		self.process_high_pressure_delta(hooks);
		self.update_counter += 1;
	}

	fn process_revalidate(&mut self, terrain: &dyn TerrainSource, hooks: &mut dyn AtmosHooks) {
		if self.invalidated.is_empty() {
			return;
		}
		let queued: Vec<TileCoord> = self.invalidated.drain(..).collect();
		trace!(tiles = queued.len(), "revalidating");
		for coords in queued {
			let idx = self.arena.insert(coords);
			let blocked = terrain.is_air_blocked(coords);
			let is_space = terrain.is_space(coords);
			let mut needs_vacuum_fix = false;
			{
				let tile = self.arena.node_mut(idx);
				if blocked {
					tile.air = None;
					tile.space = false;
				} else if is_space {
					tile.space = true;
					tile.air = Some(Mixture::space(CELL_VOLUME));
				} else {
					let had_real_air = tile
						.air
						.as_ref()
						.map_or(false, |air| !air.is_immutable());
					if !had_real_air {
						let mut air = Mixture::from_vol(CELL_VOLUME);
						air.force_temperature(T20C);
						tile.air = Some(air);
						needs_vacuum_fix = true;
					}
					tile.space = false;
				}
			}
			let my_airtight = terrain.airtight_directions(coords);
			let mut neighbors: Vec<(TileIndex, Directions)> = Vec::with_capacity(4);
			if self.arena.node(idx).air.is_some() {
				for dir in Directions::CARDINALS {
					if my_airtight.contains(dir) {
						continue;
					}
					let adj_coords = coords.step(dir);
					let Some(adj) = self.arena.node_id(adj_coords) else {
						continue;
					};
					if self.arena.node(adj).air.is_none()
						|| terrain.airtight_directions(adj_coords).contains(dir.opposite())
					{
						continue;
					}
					neighbors.push((adj, dir));
				}
			}
			self.arena.set_adjacencies(idx, &neighbors);
			if needs_vacuum_fix && !neighbors.is_empty() {
				// a freshly opened tile pulls an even slice of air from
				// each open neighbor instead of starting as a vacuum
				let ratio = 1.0 / (neighbors.len() + 1) as f32;
				for &(adj, _) in &neighbors {
					let (tile, other) = self.arena.node_twice_mut(idx, adj);
					if let (Some(a), Some(b)) = (tile.air.as_mut(), other.air.as_mut()) {
						a.merge(&b.remove_ratio(ratio));
					}
				}
			}
			if let Some(id) = self.arena.node(idx).excited_group {
				self.excited_group_dismantle(id, false);
			}
			if self.arena.node(idx).air.is_some() {
				self.add_active_tile(idx);
			} else {
				self.remove_active_tile(idx, true);
			}
			for (adj, _) in neighbors {
				self.add_active_tile(adj);
			}
			{
				let tile = self.arena.node_mut(idx);
				let coords = tile.coords;
				let Tile { air, vis_hash, .. } = tile;
				match air.as_ref() {
					Some(air) => {
						if air.vis_hash_changed(vis_hash) {
							hooks.invalidate_visuals(coords);
						}
					}
					None => {
						if *vis_hash != 0 {
							*vis_hash = 0;
							hooks.invalidate_visuals(coords);
						}
					}
				}
			}
		}
	}

	fn process_tile_equalize(&mut self, hooks: &mut dyn AtmosHooks) {
		let cycle_num = self.update_counter;
		let flagged: Vec<TileIndex> = self.high_pressure_delta.iter().copied().collect();
		for i in flagged {
			self.equalize_pressure_in_zone(i, cycle_num, hooks);
		}
	}

	fn process_high_pressure_delta(&mut self, hooks: &mut dyn AtmosHooks) {
		let flagged: Vec<TileIndex> = self.high_pressure_delta.drain(..).collect();
		for i in flagged {
			let (coords, difference, direction) = {
				let tile = self.arena.node(i);
				(tile.coords, tile.pressure_difference, tile.pressure_direction)
			};
			if difference > 0.0 {
				hooks.high_pressure_movement(coords, difference, direction);
			}
			let tile = self.arena.node_mut(i);
			tile.pressure_difference = 0.0;
			tile.pressure_direction = Directions::empty();
		}
	}

	pub(crate) fn add_active_tile(&mut self, i: TileIndex) {
		let tile = self.arena.node_mut(i);
		if tile.air.is_none() {
			return;
		}
		tile.excited = true;
		self.active_tiles.insert(i);
	}

	pub(crate) fn remove_active_tile(&mut self, i: TileIndex, dispose_group: bool) {
		self.active_tiles.swap_remove(&i);
		let group = {
			let tile = self.arena.node_mut(i);
			tile.excited = false;
			tile.excited_group
		};
		if let Some(id) = group {
			if dispose_group {
				self.excited_group_dismantle(id, false);
			} else {
				self.excited_group_remove_tile(id, i);
			}
		}
	}

	/// Flags a tile as having moved enough gas for entities to care,
	/// keeping whichever direction saw the biggest push this tick.
	pub(crate) fn consider_pressure_difference(
		&mut self,
		i: TileIndex,
		direction: Directions,
		difference: f32,
	) {
		self.high_pressure_delta.insert(i);
		let tile = self.arena.node_mut(i);
		if difference > tile.pressure_difference {
			tile.pressure_difference = difference;
			tile.pressure_direction = direction;
		}
	}

	pub(crate) fn next_eq_queue_cycle(&mut self) -> i64 {
		self.eq_queue_cycle += 1;
		self.eq_queue_cycle
	}

	pub(crate) fn next_eq_slow_queue_cycle(&mut self) -> i64 {
		self.eq_queue_cycle_slow += 1;
		self.eq_queue_cycle_slow
	}
}

/// Ticks many grids in parallel. Grids are independent by construction,
/// so this is just a rayon zip; the three slices must line up.
pub fn par_tick_all<T, H>(grids: &mut [GridAtmosphere], terrains: &[T], hooks: &mut [H])
where
	T: TerrainSource + Sync,
	H: AtmosHooks + Send,
{
	grids
		.par_iter_mut()
		.zip(terrains.par_iter())
		.zip(hooks.par_iter_mut())
		.for_each(|((grid, terrain), hook)| grid.tick(terrain, hook));
}
