use float_ord::FloatOrd;
use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use petgraph::graphmap::DiGraphMap;
use tracing::trace;

use crate::gas::constants::MINIMUM_MOLES_DELTA_TO_MOVE;
use crate::gas::GasCompareResult;
use crate::grid::GridAtmosphere;
use crate::hooks::AtmosHooks;
use crate::tiles::{EqInfo, Tile, TileIndex};

/// Planned gas movement between tiles, kept off to the side of the
/// arena while a zone is being balanced. A positive edge `a -> b` means
/// `a` owes that many moles to `b`; the mirrored edge carries the
/// negation.
type TransferGraph = DiGraphMap<TileIndex, f32>;

type ZoneSet = IndexSet<TileIndex, FxBuildHasher>;

fn adjust_eq_movement(graph: &mut TransferGraph, from: TileIndex, to: TileIndex, amount: f32) {
	if let Some(weight) = graph.edge_weight_mut(from, to) {
		*weight += amount;
	} else {
		graph.add_edge(from, to, amount);
	}
	if let Some(weight) = graph.edge_weight_mut(to, from) {
		*weight -= amount;
	} else {
		graph.add_edge(to, from, -amount);
	}
}

impl GridAtmosphere {
	/// Balances the connected zone around `start` toward a common mole
	/// count, in better than quadratic time for most zones.
	///
	/// The zone is flood filled (soft cap: excess tiles are un-stamped
	/// and ignored; hard cap: the fill just stops), each tile is tagged
	/// with its delta from the zone average, and the deltas are
	/// cancelled against each other: a fast even-spread pass when both
	/// sides of the imbalance are plentiful, then a BFS pairing pass
	/// driven by whichever side is smaller. Nothing moves until
	/// `finalize_eq` pays out the planned transfers at the end.
	///
	/// Touching space aborts the whole thing into explosive
	/// decompression, which owns that kind of imbalance.
	pub(crate) fn equalize_pressure_in_zone(
		&mut self,
		start: TileIndex,
		cycle_num: i64,
		hooks: &mut dyn AtmosHooks,
	) {
		let starting_moles = {
			let tile = self.arena.node_mut(start);
			if tile.air.is_none() || tile.eq.last_cycle >= cycle_num {
				return;
			}
			// stamp even when the quick reject fires, so a tile flagged
			// twice in one tick doesn't rescan its neighbors
			tile.eq.last_cycle = cycle_num;
			tile.total_moles()
		};
		let mut run = false;
		for (_, adj) in self.arena.adjacent(start) {
			if let Some(air) = adj.air.as_ref() {
				if (air.total_moles() - starting_moles).abs() > MINIMUM_MOLES_DELTA_TO_MOVE {
					run = true;
					break;
				}
			}
		}
		if !run {
			return;
		}

		let soft_limit = self.config.equalize_tile_limit;
		let hard_limit = self.config.equalize_hard_tile_limit;
		let queue_cycle = self.next_eq_queue_cycle();
		let mut zone: ZoneSet =
			IndexSet::with_capacity_and_hasher(soft_limit, FxBuildHasher::default());
		zone.insert(start);
		self.arena.node_mut(start).eq = EqInfo::stamped(queue_cycle);
		let mut queue_idx = 0;
		let mut found_space = false;
		'bfs: while queue_idx < zone.len() {
			let cur = zone[queue_idx];
			queue_idx += 1;
			self.arena.node_mut(cur).eq.last_cycle = cycle_num;
			let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(cur).collect();
			for adj in neighbors {
				let adj_tile = self.arena.node(adj);
				if adj_tile.is_space_like() {
					found_space = true;
					break 'bfs;
				}
				if adj_tile.air.is_none()
					|| adj_tile.eq.last_queue_cycle == queue_cycle
					|| zone.len() >= hard_limit
				{
					continue;
				}
				self.arena.node_mut(adj).eq = EqInfo::stamped(queue_cycle);
				zone.insert(adj);
			}
		}
		if found_space {
			if self.config.decompression_enabled {
				self.explosively_depressurize(start, cycle_num, hooks);
			}
			return;
		}

		let mut tiles: Vec<TileIndex> = zone.iter().copied().collect();
		if tiles.len() > soft_limit {
			for &t in &tiles[soft_limit..] {
				self.arena.node_mut(t).eq.last_queue_cycle = 0;
			}
			tiles.truncate(soft_limit);
		}
		let mut total_moles = 0.0_f64;
		for &t in &tiles {
			let moles = self.arena.node(t).total_moles();
			self.arena.node_mut(t).eq.mole_delta = moles;
			total_moles += f64::from(moles);
		}
		let average_moles = (total_moles / tiles.len() as f64) as f32;
		for &t in &tiles {
			self.arena.node_mut(t).eq.mole_delta -= average_moles;
		}
		trace!(
			zone = tiles.len(),
			average = average_moles,
			"equalizing zone"
		);

		let mut eq_graph = TransferGraph::new();

		let giver_count = tiles
			.iter()
			.filter(|&&t| self.arena.node(t).eq.mole_delta > 0.0)
			.count();
		let taker_count = tiles
			.iter()
			.filter(|&&t| self.arena.node(t).eq.mole_delta < 0.0)
			.count();
		let log_n = (tiles.len() as f32).log2();
		if giver_count as f32 > log_n && taker_count as f32 > log_n {
			// fast pass: process tiles poorest-first and have each
			// giver spread its surplus evenly over not-yet-done
			// neighbors. The sort is stable, so ties keep flood-fill
			// discovery order.
			tiles.sort_by_cached_key(|&t| FloatOrd(self.arena.node(t).eq.mole_delta));
			for &t in &tiles {
				self.arena.node_mut(t).eq.fast_done = true;
				if self.arena.node(t).eq.mole_delta <= 0.0 {
					continue;
				}
				let eligible: Vec<TileIndex> = self
					.arena
					.adjacent_node_ids(t)
					.filter(|&adj| {
						let eq = &self.arena.node(adj).eq;
						eq.last_queue_cycle == queue_cycle && !eq.fast_done
					})
					.collect();
				if eligible.is_empty() {
					continue;
				}
				let moles_to_move = self.arena.node(t).eq.mole_delta / eligible.len() as f32;
				for adj in eligible {
					adjust_eq_movement(&mut eq_graph, t, adj, moles_to_move);
					self.arena.node_mut(t).eq.mole_delta -= moles_to_move;
					self.arena.node_mut(adj).eq.mole_delta += moles_to_move;
				}
			}
		}

		let givers: Vec<TileIndex> = tiles
			.iter()
			.copied()
			.filter(|&t| self.arena.node(t).eq.mole_delta > 0.0)
			.collect();
		let takers: Vec<TileIndex> = tiles
			.iter()
			.copied()
			.filter(|&t| self.arena.node(t).eq.mole_delta < 0.0)
			.collect();
		// drive the slow pass from whichever side has fewer tiles
		if givers.len() < takers.len() {
			self.eq_give_to_takers(&givers, queue_cycle, &mut eq_graph);
		} else {
			self.eq_take_from_givers(&takers, queue_cycle, &mut eq_graph);
		}

		for &t in &tiles {
			self.finalize_eq(t, queue_cycle, &mut eq_graph, hooks);
		}
		// wake anything that still disagrees with a zone member
		for &t in &tiles {
			let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(t).collect();
			for adj in neighbors {
				let wake = {
					let (tile, other) = (self.arena.node(t), self.arena.node(adj));
					match (tile.air.as_ref(), other.air.as_ref()) {
						(Some(a), Some(b)) => b.compare(a) != GasCompareResult::NoExchange,
						_ => false,
					}
				};
				if wake {
					self.add_active_tile(adj);
					break;
				}
			}
		}
	}

	/// BFS out from each giver, promising gas to takers as they're
	/// found, then consolidates the promised amounts back along the
	/// discovery paths in reverse so intermediate tiles just pass gas
	/// through.
	fn eq_give_to_takers(
		&mut self,
		givers: &[TileIndex],
		queue_cycle: i64,
		eq_graph: &mut TransferGraph,
	) {
		let mut queue: ZoneSet = IndexSet::default();
		for &giver in givers {
			{
				let tile = self.arena.node_mut(giver);
				tile.eq.transfer_to = None;
				tile.eq.transfer_amount = 0.0;
			}
			let slow_cycle = self.next_eq_slow_queue_cycle();
			self.arena.node_mut(giver).eq.last_slow_queue_cycle = slow_cycle;
			queue.clear();
			queue.insert(giver);
			let mut queue_idx = 0;
			while queue_idx < queue.len() {
				if self.arena.node(giver).eq.mole_delta <= 0.0 {
					break;
				}
				let cur = queue[queue_idx];
				queue_idx += 1;
				let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(cur).collect();
				for adj in neighbors {
					if self.arena.node(giver).eq.mole_delta <= 0.0 {
						break;
					}
					{
						let eq = &self.arena.node(adj).eq;
						if eq.last_queue_cycle != queue_cycle
							|| eq.last_slow_queue_cycle == slow_cycle
						{
							continue;
						}
					}
					{
						let tile = self.arena.node_mut(adj);
						tile.eq.last_slow_queue_cycle = slow_cycle;
						tile.eq.transfer_to = Some(cur);
						tile.eq.transfer_amount = 0.0;
					}
					queue.insert(adj);
					let taker_delta = self.arena.node(adj).eq.mole_delta;
					if taker_delta < 0.0 {
						let giver_delta = self.arena.node(giver).eq.mole_delta;
						if -taker_delta > giver_delta {
							// needs more gas than the giver has left
							let tile = self.arena.node_mut(adj);
							tile.eq.transfer_amount -= giver_delta;
							tile.eq.mole_delta += giver_delta;
							self.arena.node_mut(giver).eq.mole_delta = 0.0;
						} else {
							let tile = self.arena.node_mut(adj);
							tile.eq.transfer_amount += taker_delta;
							tile.eq.mole_delta = 0.0;
							self.arena.node_mut(giver).eq.mole_delta += taker_delta;
						}
					}
				}
			}
			self.consolidate_slow_queue(&queue, eq_graph);
		}
	}

	/// Mirror of `eq_give_to_takers`, run when takers are the smaller
	/// side.
	fn eq_take_from_givers(
		&mut self,
		takers: &[TileIndex],
		queue_cycle: i64,
		eq_graph: &mut TransferGraph,
	) {
		let mut queue: ZoneSet = IndexSet::default();
		for &taker in takers {
			{
				let tile = self.arena.node_mut(taker);
				tile.eq.transfer_to = None;
				tile.eq.transfer_amount = 0.0;
			}
			let slow_cycle = self.next_eq_slow_queue_cycle();
			self.arena.node_mut(taker).eq.last_slow_queue_cycle = slow_cycle;
			queue.clear();
			queue.insert(taker);
			let mut queue_idx = 0;
			while queue_idx < queue.len() {
				if self.arena.node(taker).eq.mole_delta >= 0.0 {
					break;
				}
				let cur = queue[queue_idx];
				queue_idx += 1;
				let neighbors: Vec<TileIndex> = self.arena.adjacent_node_ids(cur).collect();
				for adj in neighbors {
					if self.arena.node(taker).eq.mole_delta >= 0.0 {
						break;
					}
					{
						let eq = &self.arena.node(adj).eq;
						if eq.last_queue_cycle != queue_cycle
							|| eq.last_slow_queue_cycle == slow_cycle
						{
							continue;
						}
					}
					{
						let tile = self.arena.node_mut(adj);
						tile.eq.last_slow_queue_cycle = slow_cycle;
						tile.eq.transfer_to = Some(cur);
						tile.eq.transfer_amount = 0.0;
					}
					queue.insert(adj);
					let giver_delta = self.arena.node(adj).eq.mole_delta;
					if giver_delta > 0.0 {
						let taker_delta = self.arena.node(taker).eq.mole_delta;
						if giver_delta > -taker_delta {
							// has more gas than the taker still needs
							let tile = self.arena.node_mut(adj);
							tile.eq.transfer_amount -= taker_delta;
							tile.eq.mole_delta += taker_delta;
							self.arena.node_mut(taker).eq.mole_delta = 0.0;
						} else {
							let tile = self.arena.node_mut(adj);
							tile.eq.transfer_amount += giver_delta;
							tile.eq.mole_delta = 0.0;
							self.arena.node_mut(taker).eq.mole_delta += giver_delta;
						}
					}
				}
			}
			self.consolidate_slow_queue(&queue, eq_graph);
		}
	}

	/// Walks a slow-pass queue in reverse discovery order, moving each
	/// tile's accumulated transfer one hop along its discovery path.
	fn consolidate_slow_queue(&mut self, queue: &ZoneSet, eq_graph: &mut TransferGraph) {
		for idx in (0..queue.len()).rev() {
			let t = queue[idx];
			let (amount, dest) = {
				let eq = &self.arena.node(t).eq;
				(eq.transfer_amount, eq.transfer_to)
			};
			if amount == 0.0 {
				continue;
			}
			let Some(dest) = dest else {
				continue;
			};
			adjust_eq_movement(eq_graph, t, dest, amount);
			self.arena.node_mut(dest).eq.transfer_amount += amount;
			self.arena.node_mut(t).eq.transfer_amount = 0.0;
		}
	}

	/// Pays out this tile's planned outgoing transfers. If the tile
	/// doesn't hold the gas it owes yet, the neighbors owing it gas are
	/// finalized first, recursively; the edges are zeroed up front so
	/// the recursion terminates.
	pub(crate) fn finalize_eq(
		&mut self,
		i: TileIndex,
		queue_cycle: i64,
		eq_graph: &mut TransferGraph,
		hooks: &mut dyn AtmosHooks,
	) {
		if !eq_graph.contains_node(i) {
			return;
		}
		let transfer_dirs: Vec<(TileIndex, f32)> =
			eq_graph.edges(i).map(|(_, to, w)| (to, *w)).collect();
		if transfer_dirs.iter().all(|&(_, w)| w == 0.0) {
			return;
		}
		for &(adj, _) in &transfer_dirs {
			if let Some(weight) = eq_graph.edge_weight_mut(i, adj) {
				*weight = 0.0;
			}
		}
		for &(adj, amount) in &transfer_dirs {
			if amount <= 0.0 {
				continue;
			}
			if self.arena.node(i).total_moles() < amount {
				self.finalize_eq_neighbors(&transfer_dirs, queue_cycle, eq_graph, hooks);
			}
			if let Some(weight) = eq_graph.edge_weight_mut(adj, i) {
				*weight = 0.0;
			}
			let dir = self
				.arena
				.node(i)
				.coords
				.direction_to(self.arena.node(adj).coords);
			{
				let (tile, other) = self.arena.node_twice_mut(i, adj);
				if let (Some(a), Some(b)) = (tile.air.as_mut(), other.air.as_mut()) {
					b.merge(&a.remove(amount));
				}
			}
			for t in [i, adj] {
				let tile = self.arena.node_mut(t);
				let coords = tile.coords;
				let Tile { air, vis_hash, .. } = tile;
				if let Some(air) = air.as_ref() {
					if air.vis_hash_changed(vis_hash) {
						hooks.invalidate_visuals(coords);
					}
				}
			}
			self.consider_pressure_difference(i, dir, amount);
			self.consider_pressure_difference(adj, dir, amount);
		}
	}

	fn finalize_eq_neighbors(
		&mut self,
		transfer_dirs: &[(TileIndex, f32)],
		queue_cycle: i64,
		eq_graph: &mut TransferGraph,
		hooks: &mut dyn AtmosHooks,
	) {
		for &(adj, amount) in transfer_dirs {
			if amount < 0.0 && self.arena.node(adj).eq.last_queue_cycle == queue_cycle {
				self.finalize_eq(adj, queue_cycle, eq_graph, hooks);
			}
		}
	}
}
