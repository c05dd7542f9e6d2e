use std::collections::HashSet;

use gridmos::constants::{DECOMPRESSION_RIP_THRESHOLD, T20C};
use gridmos::{
	AtmosConfig, AtmosHooks, Directions, GasId, GridAtmosphere, NullHooks, TerrainSource,
	TileCoord,
};

/// A rectangular room, optionally with some of its tiles open to space.
struct Terrain {
	width: i32,
	height: i32,
	space: HashSet<TileCoord>,
}

impl Terrain {
	fn room(width: i32, height: i32) -> Self {
		Self {
			width,
			height,
			space: HashSet::new(),
		}
	}

	fn with_space(mut self, coords: TileCoord) -> Self {
		self.space.insert(coords);
		self
	}
}

impl TerrainSource for Terrain {
	fn is_space(&self, coords: TileCoord) -> bool {
		self.space.contains(&coords)
	}

	fn is_air_blocked(&self, coords: TileCoord) -> bool {
		coords.x < 0 || coords.y < 0 || coords.x >= self.width || coords.y >= self.height
	}
}

#[derive(Default)]
struct Recorder {
	pushes: Vec<(TileCoord, f32, Directions)>,
	visuals: Vec<TileCoord>,
	rips: Vec<(TileCoord, f32)>,
	firelocks: Vec<(TileCoord, TileCoord)>,
}

impl AtmosHooks for Recorder {
	fn high_pressure_movement(&mut self, coords: TileCoord, difference: f32, direction: Directions) {
		self.pushes.push((coords, difference, direction));
	}
	fn invalidate_visuals(&mut self, coords: TileCoord) {
		self.visuals.push(coords);
	}
	fn rip_floor(&mut self, coords: TileCoord, vented_moles: f32) {
		self.rips.push((coords, vented_moles));
	}
	fn firelock_boundary(&mut self, a: TileCoord, b: TileCoord) {
		self.firelocks.push((a, b));
	}
}

fn populated_grid(terrain: &Terrain, seed: u64) -> GridAtmosphere {
	let mut grid = GridAtmosphere::with_seed(AtmosConfig::default(), seed);
	for x in 0..terrain.width {
		for y in 0..terrain.height {
			grid.invalidate_tile(TileCoord::new(x, y));
		}
	}
	grid.tick(terrain, &mut NullHooks);
	grid
}

#[test]
fn equalization_levels_a_row() {
	let terrain = Terrain::room(4, 1);
	let mut grid = populated_grid(&terrain, 7);
	grid.add_gas(TileCoord::new(0, 0), GasId::Oxygen, 100.0, T20C)
		.unwrap();
	grid.equalize_zone(TileCoord::new(0, 0), &mut NullHooks)
		.unwrap();
	for x in 0..4 {
		let moles = grid.tile_air(TileCoord::new(x, 0)).unwrap().total_moles();
		assert!(
			(moles - 25.0).abs() < 0.01,
			"tile {x} should hold the zone average, got {moles}"
		);
	}
}

#[test]
fn equalization_converges_on_a_block() {
	let terrain = Terrain::room(3, 3);
	let mut grid = populated_grid(&terrain, 21);
	for x in 0..3 {
		for y in 0..3 {
			grid.add_gas(TileCoord::new(x, y), GasId::Oxygen, 10.0, T20C)
				.unwrap();
		}
	}
	grid.add_gas(TileCoord::new(1, 1), GasId::Oxygen, 90.0, T20C)
		.unwrap();
	// (10 * 8 + 100) / 9 = 20; a second call is a no-op
	grid.equalize_zone(TileCoord::new(1, 1), &mut NullHooks)
		.unwrap();
	grid.equalize_zone(TileCoord::new(1, 1), &mut NullHooks)
		.unwrap();
	for x in 0..3 {
		for y in 0..3 {
			let moles = grid.tile_air(TileCoord::new(x, y)).unwrap().total_moles();
			assert!(
				(moles - 20.0).abs() < 0.01,
				"tile ({x}, {y}) should hold the block average, got {moles}"
			);
		}
	}
}

#[test]
fn equalization_conserves_moles() {
	let terrain = Terrain::room(5, 2);
	let mut grid = populated_grid(&terrain, 7);
	for (i, x) in (0..5).enumerate() {
		grid.add_gas(
			TileCoord::new(x, 0),
			GasId::Nitrogen,
			10.0 * (i as f32 + 1.0),
			T20C,
		)
		.unwrap();
	}
	let before = grid.total_moles();
	grid.equalize_zone(TileCoord::new(0, 0), &mut NullHooks)
		.unwrap();
	let after = grid.total_moles();
	assert!(
		(before - after).abs() < before * 0.001,
		"equalization must conserve moles: {before} -> {after}"
	);
}

#[test]
fn equalization_runs_a_zone_once_per_tick() {
	let terrain = Terrain::room(2, 1);
	let mut grid = populated_grid(&terrain, 13);
	for x in 0..2 {
		grid.add_gas(TileCoord::new(x, 0), GasId::Oxygen, 10.0, T20C)
			.unwrap();
	}
	// a settled zone is rejected, and the rejection still counts as
	// this tick's visit
	grid.equalize_zone(TileCoord::new(0, 0), &mut NullHooks)
		.unwrap();
	grid.add_gas(TileCoord::new(0, 0), GasId::Oxygen, 50.0, T20C)
		.unwrap();
	grid.equalize_zone(TileCoord::new(0, 0), &mut NullHooks)
		.unwrap();
	let b = grid.tile_air(TileCoord::new(1, 0)).unwrap().total_moles();
	assert!(
		(b - 10.0).abs() < 1e-4,
		"an already-visited zone must not re-equalize this tick, got {b}"
	);
	// the next tick levels it out again
	grid.tick(&terrain, &mut NullHooks);
	let b = grid.tile_air(TileCoord::new(1, 0)).unwrap().total_moles();
	assert!(b > 10.0, "the zone should equalize on the following tick");
}

#[test]
fn every_space_boundary_is_reported() {
	// two pressurized tiles share one space neighbor; both pairs
	// must come through the firelock hook
	let terrain = Terrain::room(2, 2).with_space(TileCoord::new(1, 1));
	let mut grid = populated_grid(&terrain, 17);
	for coords in [
		TileCoord::new(0, 0),
		TileCoord::new(1, 0),
		TileCoord::new(0, 1),
	] {
		grid.add_gas(coords, GasId::Oxygen, 30.0, T20C).unwrap();
	}
	grid.add_gas(TileCoord::new(0, 0), GasId::Oxygen, 30.0, T20C)
		.unwrap();
	let mut hooks = Recorder::default();
	grid.equalize_zone(TileCoord::new(0, 0), &mut hooks)
		.unwrap();
	let space = TileCoord::new(1, 1);
	for coords in [TileCoord::new(1, 0), TileCoord::new(0, 1)] {
		assert!(
			hooks.firelocks.contains(&(coords, space)),
			"boundary {coords} -> {space} should be reported"
		);
	}
}

#[test]
fn decompression_drains_a_tile_and_reports_the_loss() {
	let terrain = Terrain::room(2, 1).with_space(TileCoord::new(1, 0));
	let mut grid = populated_grid(&terrain, 7);
	grid.add_gas(TileCoord::new(0, 0), GasId::Plasma, 50.0, T20C)
		.unwrap();
	let mut hooks = Recorder::default();
	grid.equalize_zone(TileCoord::new(0, 0), &mut hooks)
		.unwrap();
	let drained = grid.tile_air(TileCoord::new(0, 0)).unwrap();
	assert!(
		drained.total_moles() < 1e-6,
		"tile open to space should end empty"
	);
	assert!(
		!hooks.firelocks.is_empty(),
		"the space boundary should have been reported"
	);
	// the recorded flow is flushed on the next tick
	grid.tick(&terrain, &mut hooks);
	let reported = hooks
		.pushes
		.iter()
		.find(|(coords, ..)| *coords == TileCoord::new(0, 0))
		.map(|&(_, difference, _)| difference)
		.expect("drained tile should report pressure movement");
	assert!(
		(reported - 50.0).abs() < 0.01,
		"drain magnitude should equal the vented moles, got {reported}"
	);
}

#[test]
fn hull_breach_empties_the_room() {
	let terrain = Terrain::room(4, 3).with_space(TileCoord::new(3, 1));
	let mut grid = populated_grid(&terrain, 99);
	for x in 0..3 {
		for y in 0..3 {
			grid.add_gas(TileCoord::new(x, y), GasId::Plasma, 120.0, T20C)
				.unwrap();
		}
	}
	let mut hooks = Recorder::default();
	for _ in 0..4 {
		grid.tick(&terrain, &mut hooks);
	}
	assert!(
		!hooks.visuals.is_empty(),
		"venting visible gas should refresh tile visuals"
	);
	for x in 0..3 {
		for y in 0..3 {
			let moles = grid.tile_air(TileCoord::new(x, y)).unwrap().total_moles();
			assert!(
				moles < 0.01,
				"tile ({x}, {y}) should have vented, still holds {moles}"
			);
		}
	}
	for &(_, vented) in &hooks.rips {
		assert!(
			vented > DECOMPRESSION_RIP_THRESHOLD,
			"floors only rip above the vent threshold, got {vented}"
		);
	}
}

#[test]
fn uneven_room_settles_and_goes_idle() {
	let terrain = Terrain::room(5, 1);
	let mut grid = populated_grid(&terrain, 3);
	grid.add_gas(TileCoord::new(2, 0), GasId::Oxygen, 80.0, T20C)
		.unwrap();
	let before = grid.total_moles();
	let horizon = grid.config.group_dismantle_cycles * 3;
	for _ in 0..horizon {
		grid.tick(&terrain, &mut NullHooks);
	}
	let after = grid.total_moles();
	assert!(
		(before - after).abs() < before * 0.001,
		"settling must conserve moles: {before} -> {after}"
	);
	assert_eq!(
		grid.active_tile_count(),
		0,
		"a settled room should fall out of the active set"
	);
	let spread = (0..5)
		.map(|x| grid.tile_air(TileCoord::new(x, 0)).unwrap().total_moles())
		.fold((f32::MAX, f32::MIN), |(lo, hi), m| (lo.min(m), hi.max(m)));
	assert!(
		spread.1 - spread.0 < 0.5,
		"tiles should be close to uniform, spread {spread:?}"
	);
}

#[test]
fn temperatures_converge_across_tiles() {
	let terrain = Terrain::room(2, 1);
	let mut grid = populated_grid(&terrain, 11);
	grid.add_gas(TileCoord::new(0, 0), GasId::Oxygen, 40.0, 400.0)
		.unwrap();
	grid.add_gas(TileCoord::new(1, 0), GasId::Oxygen, 40.0, 300.0)
		.unwrap();
	for _ in 0..60 {
		grid.tick(&terrain, &mut NullHooks);
	}
	let a = grid.tile_air(TileCoord::new(0, 0)).unwrap().get_temperature();
	let b = grid.tile_air(TileCoord::new(1, 0)).unwrap().get_temperature();
	assert!(
		(a - b).abs() < 5.0,
		"temperatures should pull together, got {a} and {b}"
	);
}

#[test]
fn airtight_directions_block_flow() {
	struct Walled(Terrain);
	impl TerrainSource for Walled {
		fn is_space(&self, coords: TileCoord) -> bool {
			self.0.is_space(coords)
		}
		fn is_air_blocked(&self, coords: TileCoord) -> bool {
			self.0.is_air_blocked(coords)
		}
		fn airtight_directions(&self, coords: TileCoord) -> Directions {
			// a one-way seal down the middle of the room
			if coords.x == 0 {
				Directions::EAST
			} else {
				Directions::empty()
			}
		}
	}
	let terrain = Walled(Terrain::room(2, 1));
	let mut grid = GridAtmosphere::with_seed(AtmosConfig::default(), 5);
	grid.invalidate_tile(TileCoord::new(0, 0));
	grid.invalidate_tile(TileCoord::new(1, 0));
	grid.tick(&terrain, &mut NullHooks);
	grid.add_gas(TileCoord::new(0, 0), GasId::Oxygen, 30.0, T20C)
		.unwrap();
	for _ in 0..10 {
		grid.tick(&terrain, &mut NullHooks);
	}
	let sealed = grid.tile_air(TileCoord::new(1, 0)).unwrap().total_moles();
	assert!(
		sealed < 1e-6,
		"no gas should cross an airtight boundary, got {sealed}"
	);
}
