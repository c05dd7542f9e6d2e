use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use tracing::trace;

use crate::gas::{constants::CELL_VOLUME, Mixture};
use crate::grid::GridAtmosphere;
use crate::hooks::AtmosHooks;
use crate::tiles::TileIndex;

/// Handle to an excited group. Groups are owned by the grid's
/// [`ExcitedGroups`] table; tiles refer to them only through these ids,
/// so there is no ownership cycle between tiles and groups.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct GroupId(u64);

/// A connected patch of active tiles that have recently exchanged gas.
/// The cooldowns tick up every pass and are reset whenever something
/// interesting happens to the group; a quiet group first averages
/// itself out, then falls asleep entirely.
#[derive(Default, Debug)]
pub struct ExcitedGroup {
	pub tiles: Vec<TileIndex>,
	pub breakdown_cooldown: i32,
	pub dismantle_cooldown: i32,
}

#[derive(Default)]
pub struct ExcitedGroups {
	groups: IndexMap<GroupId, ExcitedGroup, FxBuildHasher>,
	next_id: u64,
}

impl ExcitedGroups {
	pub fn alloc(&mut self) -> GroupId {
		let id = GroupId(self.next_id);
		self.next_id += 1;
		self.groups.insert(id, ExcitedGroup::default());
		id
	}
	pub fn get(&self, id: GroupId) -> Option<&ExcitedGroup> {
		self.groups.get(&id)
	}
	pub fn get_mut(&mut self, id: GroupId) -> Option<&mut ExcitedGroup> {
		self.groups.get_mut(&id)
	}
	pub fn remove(&mut self, id: GroupId) -> Option<ExcitedGroup> {
		self.groups.swap_remove(&id)
	}
	pub fn ids(&self) -> Vec<GroupId> {
		self.groups.keys().copied().collect()
	}
	pub fn len(&self) -> usize {
		self.groups.len()
	}
	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}
}

impl GridAtmosphere {
	pub(crate) fn excited_group_create(&mut self) -> GroupId {
		self.excited_groups.alloc()
	}

	pub(crate) fn excited_group_add_tile(&mut self, id: GroupId, index: TileIndex) {
		if let Some(group) = self.excited_groups.get_mut(id) {
			group.tiles.push(index);
			group.breakdown_cooldown = 0;
			group.dismantle_cooldown = 0;
			self.arena.node_mut(index).excited_group = Some(id);
		}
	}

	pub(crate) fn excited_group_remove_tile(&mut self, id: GroupId, index: TileIndex) {
		if let Some(group) = self.excited_groups.get_mut(id) {
			group.tiles.retain(|&t| t != index);
		}
		self.arena.node_mut(index).excited_group = None;
	}

	pub(crate) fn excited_group_reset_cooldowns(&mut self, id: GroupId) {
		if let Some(group) = self.excited_groups.get_mut(id) {
			group.breakdown_cooldown = 0;
			group.dismantle_cooldown = 0;
		}
	}

	/// Merges two groups, the larger one surviving, and resets its
	/// cooldowns.
	pub(crate) fn excited_group_merge(&mut self, a: GroupId, b: GroupId) -> GroupId {
		if a == b {
			return a;
		}
		let a_len = self.excited_groups.get(a).map_or(0, |g| g.tiles.len());
		let b_len = self.excited_groups.get(b).map_or(0, |g| g.tiles.len());
		let (winner, loser) = if a_len >= b_len { (a, b) } else { (b, a) };
		if let Some(absorbed) = self.excited_groups.remove(loser) {
			for &t in &absorbed.tiles {
				self.arena.node_mut(t).excited_group = Some(winner);
			}
			if let Some(group) = self.excited_groups.get_mut(winner) {
				group.tiles.extend(absorbed.tiles);
				group.breakdown_cooldown = 0;
				group.dismantle_cooldown = 0;
			}
		}
		winner
	}

	/// Averages every member's mixture into a common one and copies it
	/// back, so a group that's been quietly sloshing for a few ticks
	/// just snaps to equilibrium.
	pub(crate) fn excited_group_self_breakdown(&mut self, id: GroupId, hooks: &mut dyn AtmosHooks) {
		let Some(tiles) = self.excited_groups.get(id).map(|g| g.tiles.clone()) else {
			return;
		};
		let mut combined = Mixture::from_vol(CELL_VOLUME);
		let mut count = 0_u32;
		for &t in &tiles {
			if let Some(air) = self.arena.node(t).air.as_ref() {
				combined.merge(air);
				count += 1;
			}
		}
		if count > 0 {
			combined.multiply(1.0 / count as f32);
			for &t in &tiles {
				let tile = self.arena.node_mut(t);
				if let Some(air) = tile.air.as_mut() {
					air.copy_from_mutable(&combined);
					if air.vis_hash_changed(&mut tile.vis_hash) {
						hooks.invalidate_visuals(tile.coords);
					}
				}
			}
		}
		if let Some(group) = self.excited_groups.get_mut(id) {
			group.breakdown_cooldown = 0;
		}
		trace!(?id, tiles = tiles.len(), "excited group broke down");
	}

	/// Drops the group. With `unexcite`, its members also leave the
	/// active set.
	pub(crate) fn excited_group_dismantle(&mut self, id: GroupId, unexcite: bool) {
		if let Some(group) = self.excited_groups.remove(id) {
			for t in group.tiles {
				let tile = self.arena.node_mut(t);
				tile.excited_group = None;
				if unexcite {
					tile.excited = false;
					self.active_tiles.swap_remove(&t);
				}
			}
		}
	}

	/// Ages every group by one pass; stale ones break down, dead ones
	/// dismantle.
	pub(crate) fn process_excited_groups(&mut self, hooks: &mut dyn AtmosHooks) {
		let breakdown_cycles = self.config.group_breakdown_cycles;
		let dismantle_cycles = self.config.group_dismantle_cycles;
		for id in self.excited_groups.ids() {
			let Some(group) = self.excited_groups.get_mut(id) else {
				continue;
			};
			group.breakdown_cooldown += 1;
			group.dismantle_cooldown += 1;
			let breakdown = group.breakdown_cooldown > breakdown_cycles;
			let dismantle = group.dismantle_cooldown > dismantle_cycles;
			if breakdown {
				self.excited_group_self_breakdown(id, hooks);
			}
			if dismantle {
				self.excited_group_dismantle(id, true);
			}
		}
	}
}
