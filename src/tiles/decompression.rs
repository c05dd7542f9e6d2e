use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use rand::Rng;
use tracing::{debug, warn};

use crate::gas::constants::{
	DECOMPRESSION_RIP_CHANCE_MAX, DECOMPRESSION_RIP_CHANCE_MIN, DECOMPRESSION_RIP_CHANCE_SCALE,
	DECOMPRESSION_RIP_THRESHOLD, TCMB,
};
use crate::grid::GridAtmosphere;
use crate::hooks::AtmosHooks;
use crate::tiles::{EqInfo, Tile, TileIndex};

impl GridAtmosphere {
	/// Vents a zone that touched space.
	///
	/// Two flood fills: the first collects the zone and sorts out which
	/// tiles are space, the second walks inward from the space tiles so
	/// every normal tile knows its one hop back toward vacuum. The
	/// drain then runs that order in reverse: each tile adds its own
	/// contents to the amount flowing through it, hands the running
	/// total to the next tile spaceward, records it as the tile's
	/// pressure difference, and is left empty at vacuum temperature.
	pub(crate) fn explosively_depressurize(
		&mut self,
		start: TileIndex,
		cycle_num: i64,
		hooks: &mut dyn AtmosHooks,
	) {
		let hard_limit = self.config.equalize_hard_tile_limit;
		let queue_cycle = self.next_eq_queue_cycle();
		{
			let tile = self.arena.node_mut(start);
			if tile.air.is_none() {
				return;
			}
			tile.eq = EqInfo::stamped(queue_cycle);
		}
		let mut zone: IndexSet<TileIndex, FxBuildHasher> = IndexSet::default();
		zone.insert(start);
		let mut space_tiles: Vec<TileIndex> = Vec::new();
		let mut queue_idx = 0;
		let mut hit_limit = false;
		while queue_idx < zone.len() {
			let cur = zone[queue_idx];
			queue_idx += 1;
			self.arena.node_mut(cur).eq.last_cycle = cycle_num;
			if self.arena.node(cur).is_space_like() {
				// space is terminal, it only ever receives
				space_tiles.push(cur);
				continue;
			}
			let cur_coords = self.arena.node(cur).coords;
			let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(cur).collect();
			for adj in neighbors {
				let adj_tile = self.arena.node(adj);
				if adj_tile.air.is_none() {
					continue;
				}
				// every pressurized tile bordering space reports its
				// boundary, visited or not
				if adj_tile.is_space_like() {
					hooks.firelock_boundary(cur_coords, adj_tile.coords);
				}
				if adj_tile.eq.last_queue_cycle == queue_cycle {
					continue;
				}
				if zone.len() >= hard_limit {
					hit_limit = true;
					continue;
				}
				self.arena.node_mut(adj).eq = EqInfo::stamped(queue_cycle);
				zone.insert(adj);
			}
		}
		if hit_limit {
			warn!(limit = hard_limit, "decompression zone hit the hard tile cap");
		}
		if space_tiles.is_empty() {
			return;
		}

		let slow_cycle = self.next_eq_slow_queue_cycle();
		let mut progression: Vec<TileIndex> = Vec::with_capacity(zone.len());
		for &s in &space_tiles {
			let tile = self.arena.node_mut(s);
			tile.eq.last_slow_queue_cycle = slow_cycle;
			tile.eq.transfer_to = None;
			tile.eq.transfer_amount = 0.0;
			progression.push(s);
		}
		let mut prog_idx = 0;
		while prog_idx < progression.len() {
			let cur = progression[prog_idx];
			prog_idx += 1;
			let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(cur).collect();
			for adj in neighbors {
				{
					let eq = &self.arena.node(adj).eq;
					if eq.last_queue_cycle != queue_cycle || eq.last_slow_queue_cycle == slow_cycle
					{
						continue;
					}
				}
				if self.arena.node(adj).is_space_like() {
					continue;
				}
				// first discovery wins; the path with fewer hops to
				// space claims the tile
				let tile = self.arena.node_mut(adj);
				tile.eq.last_slow_queue_cycle = slow_cycle;
				tile.eq.transfer_to = Some(cur);
				tile.eq.transfer_amount = 0.0;
				progression.push(adj);
			}
		}

		let mut total_moles_removed = 0.0_f64;
		for &cur in progression.iter().rev() {
			let Some(target) = self.arena.node(cur).eq.transfer_to else {
				continue;
			};
			let sum = self.arena.node(cur).total_moles();
			total_moles_removed += f64::from(sum);
			let amount = {
				let tile = self.arena.node_mut(cur);
				tile.eq.transfer_amount += sum;
				tile.eq.transfer_amount
			};
			self.arena.node_mut(target).eq.transfer_amount += amount;
			let dir = self
				.arena
				.node(cur)
				.coords
				.direction_to(self.arena.node(target).coords);
			{
				let tile = self.arena.node_mut(cur);
				tile.pressure_difference = amount;
				tile.pressure_direction = dir;
			}
			{
				let tgt = self.arena.node_mut(target);
				if tgt.pressure_difference < amount {
					tgt.pressure_difference = amount;
					tgt.pressure_direction = dir;
				}
			}
			self.high_pressure_delta.insert(cur);
			self.high_pressure_delta.insert(target);
			self.add_active_tile(cur);
			{
				let tile = self.arena.node_mut(cur);
				let coords = tile.coords;
				let Tile { air, vis_hash, .. } = tile;
				if let Some(air) = air.as_mut() {
					air.clear();
					air.force_temperature(TCMB);
					if air.vis_hash_changed(vis_hash) {
						hooks.invalidate_visuals(coords);
					}
				}
			}
			self.handle_decompression_floor_rip(cur, sum, hooks);
		}
		debug!(
			removed = total_moles_removed,
			zone = progression.len(),
			"explosively depressurized"
		);
	}

	fn handle_decompression_floor_rip(&mut self, i: TileIndex, sum: f32, hooks: &mut dyn AtmosHooks) {
		if !self.config.rip_tiles {
			return;
		}
		let chance = (sum / DECOMPRESSION_RIP_CHANCE_SCALE)
			.clamp(DECOMPRESSION_RIP_CHANCE_MIN, DECOMPRESSION_RIP_CHANCE_MAX);
		if sum > DECOMPRESSION_RIP_THRESHOLD && self.rng.gen_bool(f64::from(chance)) {
			hooks.rip_floor(self.arena.node(i).coords, sum);
		}
	}
}
