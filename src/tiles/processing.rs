use tracing::trace;

use crate::gas::constants::MINIMUM_AIR_TO_SUSPEND;
use crate::gas::GasCompareResult;
use crate::grid::GridAtmosphere;
use crate::hooks::AtmosHooks;
use crate::reaction::ReactionContext;
use crate::tiles::{Directions, TileIndex};

impl GridAtmosphere {
	/// Runs one diffusion pass over a snapshot of the active set.
	/// Processing a tile can activate or deactivate others, so the live
	/// set is re-checked per tile rather than iterated directly.
	pub(crate) fn process_active_tiles(&mut self, hooks: &mut dyn AtmosHooks) {
		let fire_count = self.update_counter;
		let snapshot: Vec<TileIndex> = self.active_tiles.iter().copied().collect();
		trace!(active = snapshot.len(), "processing active tiles");
		for i in snapshot {
			if self.active_tiles.contains(&i) {
				self.process_cell(i, fire_count, hooks);
			}
		}
	}

	/// Shares this tile's air with each unprocessed neighbor, keeping
	/// excited-group bookkeeping in step, then runs reactions and a
	/// visuals check. A tile that ends up in no excited group goes back
	/// to sleep immediately; its group otherwise decides when it does.
	pub(crate) fn process_cell(&mut self, i: TileIndex, fire_count: i64, hooks: &mut dyn AtmosHooks) {
		{
			let tile = self.arena.node_mut(i);
			if tile.air.is_none() {
				self.remove_active_tile(i, false);
				return;
			}
			if tile.archived_cycle < fire_count {
				tile.archive(fire_count);
			}
			tile.current_cycle = fire_count;
		}
		let adjacent: Vec<(TileIndex, Directions)> = self.arena.adjacent_with_dir(i).collect();
		let adjacent_count = adjacent.len() as u32;
		for (j, dir) in adjacent {
			if self.arena.node(j).current_cycle >= fire_count {
				continue;
			}
			{
				let neighbor = self.arena.node_mut(j);
				if neighbor.air.is_none() {
					continue;
				}
				if neighbor.archived_cycle < fire_count {
					neighbor.archive(fire_count);
				}
			}
			let tile_group = self.arena.node(i).excited_group;
			let other_group = self.arena.node(j).excited_group;
			let mut should_share = false;
			if self.config.excited_groups && tile_group.is_some() && other_group.is_some() {
				if let (Some(a), Some(b)) = (tile_group, other_group) {
					if a != b {
						self.excited_group_merge(a, b);
					}
				}
				should_share = true;
			} else {
				let cmp = {
					let (tile, neighbor) = (self.arena.node(i), self.arena.node(j));
					match (tile.air.as_ref(), neighbor.air.as_ref()) {
						(Some(a), Some(b)) => a.compare(b),
						_ => GasCompareResult::NoExchange,
					}
				};
				if cmp != GasCompareResult::NoExchange {
					if !self.arena.node(j).excited {
						self.add_active_tile(j);
					}
					if self.config.excited_groups {
						let id = match tile_group.or(other_group) {
							Some(id) => id,
							None => self.excited_group_create(),
						};
						if self.arena.node(i).excited_group.is_none() {
							self.excited_group_add_tile(id, i);
						}
						if self.arena.node(j).excited_group.is_none() {
							self.excited_group_add_tile(id, j);
						}
					}
					should_share = true;
				}
			}
			if !should_share {
				continue;
			}
			let (difference, significant) = {
				let (tile, neighbor) = self.arena.node_twice_mut(i, j);
				match (tile.air.as_mut(), neighbor.air.as_mut()) {
					(Some(a), Some(b)) => {
						let difference = a.share(b, adjacent_count);
						(difference, a.last_share() > MINIMUM_AIR_TO_SUSPEND)
					}
					_ => (0.0, false),
				}
			};
			if significant {
				if let Some(id) = self.arena.node(i).excited_group {
					self.excited_group_reset_cooldowns(id);
				}
				if let Some(id) = self.arena.node(j).excited_group {
					self.excited_group_reset_cooldowns(id);
				}
			}
			if difference > 0.0 {
				self.consider_pressure_difference(i, dir, difference);
			} else if difference < 0.0 {
				self.consider_pressure_difference(j, dir.opposite(), -difference);
			}
		}
		{
			let Self {
				arena, reactions, ..
			} = self;
			let tile = arena.node_mut(i);
			if let Some(air) = tile.air.as_mut() {
				reactions.react(air, &ReactionContext { coords: tile.coords });
			}
		}
		{
			let tile = self.arena.node_mut(i);
			let coords = tile.coords;
			let crate::tiles::Tile { air, vis_hash, .. } = tile;
			if let Some(air) = air.as_ref() {
				if air.vis_hash_changed(vis_hash) {
					hooks.invalidate_visuals(coords);
				}
			}
		}
		if self.arena.node(i).excited_group.is_none() {
			self.remove_active_tile(i, false);
		}
	}
}
