pub mod decompression;
pub mod equalize;
pub mod groups;
pub mod processing;

use std::collections::HashMap;

use bitflags::bitflags;
use fxhash::FxBuildHasher;
use petgraph::{
	graph::{DiGraph, NodeIndex},
	visit::EdgeRef,
};

use crate::gas::Mixture;
use groups::GroupId;

bitflags! {
	#[derive(Default, Copy, Clone, PartialEq, Eq, Hash, Debug)]
	pub struct Directions: u8 {
		const NORTH = 0b1;
		const SOUTH = 0b10;
		const EAST	= 0b100;
		const WEST	= 0b1000;
		const ALL_CARDINALS = Self::NORTH.bits() | Self::SOUTH.bits() | Self::EAST.bits() | Self::WEST.bits();
	}
}

impl Directions {
	pub const CARDINALS: [Directions; 4] = [
		Directions::NORTH,
		Directions::SOUTH,
		Directions::EAST,
		Directions::WEST,
	];

	pub const fn opposite(self) -> Self {
		match self.bits() {
			0b1 => Directions::SOUTH,
			0b10 => Directions::NORTH,
			0b100 => Directions::WEST,
			0b1000 => Directions::EAST,
			_ => self,
		}
	}

	pub const fn offset(self) -> (i32, i32) {
		match self.bits() {
			0b1 => (0, 1),
			0b10 => (0, -1),
			0b100 => (1, 0),
			0b1000 => (-1, 0),
			_ => (0, 0),
		}
	}
}

/// A tile position on the grid, in tile units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
	pub x: i32,
	pub y: i32,
}

impl TileCoord {
	pub const fn new(x: i32, y: i32) -> Self {
		Self { x, y }
	}
	pub const fn step(self, dir: Directions) -> Self {
		let (dx, dy) = dir.offset();
		Self {
			x: self.x + dx,
			y: self.y + dy,
		}
	}
	/// Cardinal direction from this coord to an adjacent one, empty if
	/// they aren't cardinal neighbors.
	pub fn direction_to(self, other: Self) -> Directions {
		match (other.x - self.x, other.y - self.y) {
			(0, 1) => Directions::NORTH,
			(0, -1) => Directions::SOUTH,
			(1, 0) => Directions::EAST,
			(-1, 0) => Directions::WEST,
			_ => Directions::empty(),
		}
	}
}

impl std::fmt::Display for TileCoord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "({}, {})", self.x, self.y)
	}
}

pub type TileIndex = NodeIndex<usize>;

/// Scratch state for equalization and decompression, embedded in the
/// tile. None of it means anything unless the matching cycle stamp is
/// current; stamping a tile into a pass overwrites the whole block.
#[derive(Copy, Clone, Default, Debug)]
pub struct EqInfo {
	pub last_cycle: i64,
	pub last_queue_cycle: i64,
	pub last_slow_queue_cycle: i64,
	pub mole_delta: f32,
	pub transfer_amount: f32,
	pub transfer_to: Option<TileIndex>,
	pub fast_done: bool,
}

impl EqInfo {
	pub fn stamped(queue_cycle: i64) -> Self {
		Self {
			last_queue_cycle: queue_cycle,
			..Self::default()
		}
	}
}

/// One tile's worth of atmosphere. `air` is `None` for fully sealed
/// tiles (walls); space tiles hold an immutable space mixture.
#[derive(Debug)]
pub struct Tile {
	pub coords: TileCoord,
	pub air: Option<Mixture>,
	pub space: bool,
	pub excited: bool,
	pub excited_group: Option<GroupId>,
	pub archived_cycle: i64,
	pub current_cycle: i64,
	pub pressure_difference: f32,
	pub pressure_direction: Directions,
	pub vis_hash: u64,
	pub eq: EqInfo,
}

impl Tile {
	fn new(coords: TileCoord) -> Self {
		Self {
			coords,
			air: None,
			space: false,
			excited: false,
			excited_group: None,
			archived_cycle: 0,
			current_cycle: 0,
			pressure_difference: 0.0,
			pressure_direction: Directions::empty(),
			vis_hash: 0,
			eq: EqInfo::default(),
		}
	}
	pub fn total_moles(&self) -> f32 {
		self.air.as_ref().map_or(0.0, Mixture::total_moles)
	}
	pub fn is_space_like(&self) -> bool {
		self.space || self.air.as_ref().is_some_and(Mixture::is_immutable)
	}
	pub fn archive(&mut self, cycle: i64) {
		if let Some(air) = self.air.as_mut() {
			air.archive();
		}
		self.archived_cycle = cycle;
	}
}

/// The grid's tiles, with adjacency as graph edges. An edge `a -> b`
/// exists only when air can flow that way; its weight is the cardinal
/// direction from `a` to `b`. Edges are kept mirrored, so `neighbors`
/// on either node sees the other.
#[derive(Default)]
pub struct TileArena {
	graph: DiGraph<Tile, Directions, usize>,
	map: HashMap<TileCoord, TileIndex, FxBuildHasher>,
}

impl TileArena {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn len(&self) -> usize {
		self.graph.node_count()
	}
	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}
	/// Index of the tile at the given coords, creating it blocked and
	/// airless if it doesn't exist yet.
	pub fn insert(&mut self, coords: TileCoord) -> TileIndex {
		if let Some(&idx) = self.map.get(&coords) {
			return idx;
		}
		let idx = self.graph.add_node(Tile::new(coords));
		self.map.insert(coords, idx);
		idx
	}
	pub fn node_id(&self, coords: TileCoord) -> Option<TileIndex> {
		self.map.get(&coords).copied()
	}
	pub fn get(&self, idx: TileIndex) -> Option<&Tile> {
		self.graph.node_weight(idx)
	}
	pub fn get_mut(&mut self, idx: TileIndex) -> Option<&mut Tile> {
		self.graph.node_weight_mut(idx)
	}
	/// Borrows a tile by an index known to be valid. Indices handed out
	/// by this arena stay valid for its whole lifetime, since tiles are
	/// never removed from the graph.
	pub fn node(&self, idx: TileIndex) -> &Tile {
		&self.graph[idx]
	}
	pub fn node_mut(&mut self, idx: TileIndex) -> &mut Tile {
		&mut self.graph[idx]
	}
	/// Mutably borrows two distinct tiles at once.
	pub fn node_twice_mut(&mut self, a: TileIndex, b: TileIndex) -> (&mut Tile, &mut Tile) {
		self.graph.index_twice_mut(a, b)
	}
	pub fn tiles(&self) -> impl Iterator<Item = (TileIndex, &Tile)> {
		self.graph
			.node_indices()
			.map(move |idx| (idx, &self.graph[idx]))
	}
	pub fn adjacent_node_ids(
		&self,
		index: TileIndex,
	) -> impl Iterator<Item = TileIndex> + '_ {
		self.graph.neighbors(index)
	}
	pub fn adjacent(&self, index: TileIndex) -> impl Iterator<Item = (TileIndex, &Tile)> + '_ {
		self.graph
			.neighbors(index)
			.map(move |idx| (idx, &self.graph[idx]))
	}
	pub fn adjacent_with_dir(
		&self,
		index: TileIndex,
	) -> impl Iterator<Item = (TileIndex, Directions)> + '_ {
		self.graph.edges(index).map(|e| (e.target(), *e.weight()))
	}
	pub fn adjacent_count(&self, index: TileIndex) -> usize {
		self.graph.neighbors(index).count()
	}
	/// Replaces every adjacency touching `index` with the given set,
	/// mirroring each edge.
	pub fn set_adjacencies(&mut self, index: TileIndex, neighbors: &[(TileIndex, Directions)]) {
		self.remove_adjacencies(index);
		for &(adj, dir) in neighbors {
			self.graph.add_edge(index, adj, dir);
			self.graph.add_edge(adj, index, dir.opposite());
		}
	}
	pub fn remove_adjacencies(&mut self, index: TileIndex) {
		self.graph.retain_edges(|g, e| {
			g.edge_endpoints(e)
				.map_or(true, |(a, b)| a != index && b != index)
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_directions_round_trip() {
		for dir in Directions::CARDINALS {
			assert_eq!(dir.opposite().opposite(), dir);
			let here = TileCoord::new(3, -2);
			let there = here.step(dir);
			assert_eq!(here.direction_to(there), dir);
			assert_eq!(there.direction_to(here), dir.opposite());
		}
	}

	#[test]
	fn test_adjacency_is_mirrored() {
		let mut arena = TileArena::new();
		let a = arena.insert(TileCoord::new(0, 0));
		let b = arena.insert(TileCoord::new(1, 0));
		arena.set_adjacencies(a, &[(b, Directions::EAST)]);
		assert_eq!(
			arena.adjacent_with_dir(a).collect::<Vec<_>>(),
			vec![(b, Directions::EAST)]
		);
		assert_eq!(
			arena.adjacent_with_dir(b).collect::<Vec<_>>(),
			vec![(a, Directions::WEST)]
		);
		// replacing a's adjacency drops the mirrored edge too
		arena.set_adjacencies(a, &[]);
		assert_eq!(arena.adjacent_count(a), 0);
		assert_eq!(arena.adjacent_count(b), 0);
		// reinsert at the same coords returns the same node
		assert_eq!(arena.insert(TileCoord::new(1, 0)), b);
	}
}
