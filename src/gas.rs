pub mod constants;

pub mod mixture;

pub use mixture::{GasCompareResult, Mixture};

use constants::MOLES_GAS_VISIBLE;

/// The fixed set of gas species the simulation knows about.
///
/// The table is closed and `const`; per-species data lives in the
/// associated functions below rather than in any runtime registry, so
/// two mixtures always agree on what index means what gas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum GasId {
	Oxygen,
	Nitrogen,
	CarbonDioxide,
	Plasma,
	Tritium,
	WaterVapor,
	Miasma,
	NitrousOxide,
	Frezon,
}

pub const TOTAL_NUM_GASES: usize = 9;

impl GasId {
	pub const ALL: [GasId; TOTAL_NUM_GASES] = [
		GasId::Oxygen,
		GasId::Nitrogen,
		GasId::CarbonDioxide,
		GasId::Plasma,
		GasId::Tritium,
		GasId::WaterVapor,
		GasId::Miasma,
		GasId::NitrousOxide,
		GasId::Frezon,
	];

	pub const fn index(self) -> usize {
		self as usize
	}

	pub fn from_index(idx: usize) -> Option<Self> {
		Self::ALL.get(idx).copied()
	}

	/// Specific heat in J/(K*mol), used for heat capacity and all
	/// temperature-weighted transfers.
	pub const fn specific_heat(self) -> f32 {
		match self {
			GasId::Oxygen => 20.0,
			GasId::Nitrogen => 20.0,
			GasId::CarbonDioxide => 30.0,
			GasId::Plasma => 200.0,
			GasId::Tritium => 10.0,
			GasId::WaterVapor => 40.0,
			GasId::Miasma => 20.0,
			GasId::NitrousOxide => 40.0,
			GasId::Frezon => 600.0,
		}
	}

	/// Moles at which the gas becomes visible on a tile, if it is
	/// visible at all.
	pub const fn moles_visible(self) -> Option<f32> {
		match self {
			GasId::Plasma
			| GasId::WaterVapor
			| GasId::Miasma
			| GasId::NitrousOxide
			| GasId::Frezon => Some(MOLES_GAS_VISIBLE),
			_ => None,
		}
	}

	pub const fn name(self) -> &'static str {
		match self {
			GasId::Oxygen => "oxygen",
			GasId::Nitrogen => "nitrogen",
			GasId::CarbonDioxide => "carbon dioxide",
			GasId::Plasma => "plasma",
			GasId::Tritium => "tritium",
			GasId::WaterVapor => "water vapor",
			GasId::Miasma => "miasma",
			GasId::NitrousOxide => "nitrous oxide",
			GasId::Frezon => "frezon",
		}
	}
}

/// Specific heat for a raw mole-vector index, zero past the table.
pub fn specific_heat_of(idx: usize) -> f32 {
	GasId::from_index(idx).map_or(0.0, GasId::specific_heat)
}
