//! Tile-grid gas simulation.
//!
//! A grid of square tiles, each holding a [`Mixture`] of gases, evolves
//! through discrete ticks: active tiles diffuse gas to their neighbors,
//! whole pressure-connected zones equalize toward a shared average, and
//! zones that reach space vent explosively. Tiles that stop changing
//! fall out of the active set through excited groups, so a settled grid
//! costs almost nothing to tick.
//!
//! The host owns the map. It tells the simulation which tiles exist and
//! what the terrain looks like through [`TerrainSource`], and hears
//! back about pressure shoves, visual changes and ripped floors through
//! [`AtmosHooks`]. Everything else lives inside [`GridAtmosphere`];
//! independent grids can be ticked in parallel with [`par_tick_all`].

pub mod gas;
pub mod grid;
pub mod hooks;
pub mod reaction;
pub mod tiles;

pub use gas::constants;
pub use gas::mixture::{GasCompareResult, Mixture};
pub use gas::GasId;
pub use grid::{par_tick_all, AtmosConfig, GridAtmosphere};
pub use hooks::{AtmosHooks, NullHooks, TerrainSource};
pub use reaction::{GasReaction, ReactionContext, ReactionOutcome, ReactionRegistry};
pub use tiles::{Directions, TileCoord};
