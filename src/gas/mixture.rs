use std::cell::Cell;

use eyre::{bail, Result};
use itertools::{
	EitherOrBoth::{Both, Left, Right},
	Itertools,
};
use tinyvec::TinyVec;

use super::{constants::*, specific_heat_of, GasId, TOTAL_NUM_GASES};

type GasMoles = TinyVec<[f32; TOTAL_NUM_GASES]>;

/// What, if anything, two mixtures would exchange if they were allowed
/// to interact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GasCompareResult {
	NoExchange,
	TemperatureExchange,
	MoleExchange(GasId),
}

/// A volume of gas on (or off) the grid.
///
/// Carries its own archive: sharing during a tick reads the archived
/// moles and temperature, so processing order within the tick doesn't
/// change the result. The archive is only meaningful between a call to
/// `archive` and the next mutation, which is the tile processor's
/// responsibility to get right.
#[derive(Clone, Debug)]
pub struct Mixture {
	moles: GasMoles,
	moles_archived: GasMoles,
	temperature: f32,
	temperature_archived: f32,
	pub volume: f32,
	last_share: f32,
	immutable: bool,
	cached_heat_capacity: Cell<Option<f32>>,
}

impl Default for Mixture {
	fn default() -> Self {
		Self::new()
	}
}

impl Mixture {
	/// Makes an empty gas mixture with the standard cell volume.
	pub fn new() -> Self {
		Self {
			moles: TinyVec::new(),
			moles_archived: TinyVec::new(),
			temperature: TCMB,
			temperature_archived: TCMB,
			volume: CELL_VOLUME,
			last_share: 0.0,
			immutable: false,
			cached_heat_capacity: Cell::new(None),
		}
	}
	/// Makes an empty gas mixture with the given volume.
	pub fn from_vol(vol: f32) -> Self {
		let mut ret = Self::new();
		ret.volume = vol;
		ret
	}
	/// Makes the immutable all-consuming mixture used for space tiles.
	pub fn space(vol: f32) -> Self {
		let mut ret = Self::from_vol(vol);
		ret.immutable = true;
		ret
	}
	pub fn is_immutable(&self) -> bool {
		self.immutable
	}
	pub fn mark_immutable(&mut self) {
		self.immutable = true;
	}
	pub fn get_temperature(&self) -> f32 {
		self.temperature
	}
	/// Sets the temperature, if the mix isn't immutable. Rejects
	/// non-finite and non-positive values; anything below the
	/// cosmic background is clamped up to it.
	pub fn set_temperature(&mut self, temp: f32) -> Result<()> {
		if !temp.is_finite() || temp <= 0.0 {
			bail!("invalid temperature: {temp}");
		}
		self.force_temperature(temp);
		Ok(())
	}
	pub(crate) fn force_temperature(&mut self, temp: f32) {
		if !self.immutable && temp.is_normal() {
			self.temperature = temp.max(TCMB);
		}
	}
	/// Returns an iterator over the gas indices and mole amounts thereof.
	pub fn enumerate(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
		self.moles.iter().copied().enumerate()
	}
	pub fn get_moles(&self, gas: GasId) -> f32 {
		self.moles.get(gas.index()).copied().unwrap_or(0.0)
	}
	pub fn last_share(&self) -> f32 {
		self.last_share
	}
	fn maybe_expand(&mut self, size: usize) {
		if self.moles.len() < size {
			self.moles.resize(size, 0.0);
		}
	}
	/// If the mix is not immutable, sets the given gas to the given amount.
	/// Negative and non-finite amounts are rejected; amounts below the
	/// minimum mole threshold drop the gas from the mix entirely.
	pub fn set_moles(&mut self, gas: GasId, amt: f32) -> Result<()> {
		if !amt.is_finite() || amt < 0.0 {
			bail!("invalid mole amount for {}: {amt}", gas.name());
		}
		if self.immutable {
			return Ok(());
		}
		let idx = gas.index();
		if amt <= GAS_MIN_MOLES {
			if idx < self.moles.len() {
				self.moles[idx] = 0.0;
				self.garbage_collect();
				self.cached_heat_capacity.set(None);
			}
			return Ok(());
		}
		self.maybe_expand(idx + 1);
		self.moles[idx] = amt;
		self.cached_heat_capacity.set(None);
		Ok(())
	}
	/// Adjusts the given gas by a delta, saturating at zero downward.
	pub fn adjust_moles(&mut self, gas: GasId, amt: f32) {
		if self.immutable || !amt.is_normal() {
			return;
		}
		let idx = gas.index();
		self.maybe_expand(idx + 1);
		let r = &mut self.moles[idx];
		*r = (*r + amt).max(0.0);
		if amt < 0.0 {
			self.garbage_collect();
		}
		self.cached_heat_capacity.set(None);
	}
	/// Adds gas of a given temperature, averaging the mix temperature
	/// weighted by mole count. The intermediate math runs in f64 so
	/// repeated small additions don't drift.
	pub fn add(&mut self, gas: GasId, quantity: f32, temperature: f32) -> Result<()> {
		if !quantity.is_finite() || quantity < 0.0 {
			bail!("invalid gas quantity for {}: {quantity}", gas.name());
		}
		if !temperature.is_finite() || temperature <= 0.0 {
			bail!("invalid gas temperature: {temperature}");
		}
		if self.immutable || quantity < GAS_MIN_MOLES {
			return Ok(());
		}
		let old_moles = f64::from(self.total_moles());
		let q = f64::from(quantity);
		let blended = (f64::from(self.temperature) * old_moles
			+ f64::from(temperature.max(TCMB)) * q)
			/ (old_moles + q);
		let idx = gas.index();
		self.maybe_expand(idx + 1);
		self.moles[idx] += quantity;
		self.temperature = (blended as f32).max(TCMB);
		self.cached_heat_capacity.set(None);
		Ok(())
	}
	#[inline(never)] // mostly this makes it so that heat_capacity itself is inlined
	fn slow_heat_capacity(&self) -> f32 {
		let heat_cap = self
			.moles
			.iter()
			.copied()
			.enumerate()
			.fold(0.0, |acc, (i, amt)| specific_heat_of(i).mul_add(amt, acc));
		self.cached_heat_capacity.set(Some(heat_cap));
		heat_cap
	}
	/// The heat capacity of the material, zero when empty.
	/// [joules?]/mole-kelvin.
	pub fn heat_capacity(&self) -> f32 {
		self.cached_heat_capacity
			.get()
			.filter(|cap| cap.is_finite() && cap.is_sign_positive())
			.unwrap_or_else(|| self.slow_heat_capacity())
	}
	/// The total mole count of the mixture. Moles.
	pub fn total_moles(&self) -> f32 {
		self.moles.iter().sum()
	}
	/// Pressure. Kilopascals.
	pub fn return_pressure(&self) -> f32 {
		if self.volume <= 0.0 {
			return 0.0;
		}
		self.total_moles() * R_IDEAL_GAS_EQUATION * self.temperature / self.volume
	}
	/// Thermal energy. Joules?
	pub fn thermal_energy(&self) -> f32 {
		self.heat_capacity() * self.temperature
	}
	/// Stamps the archive with the current moles and temperature.
	pub fn archive(&mut self) {
		self.moles_archived = self.moles.clone();
		self.temperature_archived = self.temperature;
	}
	/// Merges one gas mixture into another, weighting the resulting
	/// temperature by heat capacity.
	pub fn merge(&mut self, giver: &Self) {
		if self.immutable {
			return;
		}
		let our_heat_capacity = f64::from(self.heat_capacity());
		let other_heat_capacity = f64::from(giver.heat_capacity());
		self.maybe_expand(giver.moles.len());
		for (a, b) in self.moles.iter_mut().zip(giver.moles.iter()) {
			*a += b;
		}
		let combined_heat_capacity = our_heat_capacity + other_heat_capacity;
		if combined_heat_capacity > f64::from(MINIMUM_HEAT_CAPACITY) {
			self.force_temperature(
				((our_heat_capacity * f64::from(self.temperature)
					+ other_heat_capacity * f64::from(giver.temperature))
					/ combined_heat_capacity) as f32,
			);
		}
		self.cached_heat_capacity
			.set(Some(combined_heat_capacity as f32));
	}
	/// Takes a ratio of this mixture's moles and puts it into another
	/// mixture. If this mix is mutable, also removes those moles from
	/// the original. The ratio is clamped to [0, 1].
	pub fn remove_ratio_into(&mut self, mut ratio: f32, into: &mut Self) {
		if !(ratio > 0.0) || self.total_moles() < GAS_MIN_MOLES {
			into.clear();
			return;
		}
		if ratio >= 1.0 {
			ratio = 1.0;
		}
		let orig_temp = self.temperature;
		into.copy_from_mutable(self);
		into.multiply(ratio);
		self.multiply(1.0 - ratio);
		self.temperature = orig_temp;
		into.temperature = orig_temp;
	}
	/// As `remove_ratio_into`, but a raw number of moles instead of a ratio.
	pub fn remove_into(&mut self, amount: f32, into: &mut Self) {
		let total = self.total_moles();
		if total < GAS_MIN_MOLES {
			into.clear();
			return;
		}
		self.remove_ratio_into(amount / total, into);
	}
	/// A convenience function that makes the mixture for `remove_ratio_into` on the spot and returns it.
	pub fn remove_ratio(&mut self, ratio: f32) -> Self {
		let mut removed = Self::from_vol(self.volume);
		self.remove_ratio_into(ratio, &mut removed);
		removed
	}
	/// Like `remove_ratio`, but with moles. Asking for more than is
	/// present empties the mix rather than erroring.
	pub fn remove(&mut self, amount: f32) -> Self {
		let mut removed = Self::from_vol(self.volume);
		self.remove_into(amount, &mut removed);
		removed
	}
	/// Copies from a given gas mixture, if we're mutable.
	pub fn copy_from_mutable(&mut self, sample: &Self) {
		if self.immutable {
			return;
		}
		self.moles = sample.moles.clone();
		self.temperature = sample.temperature;
		self.cached_heat_capacity
			.set(sample.cached_heat_capacity.get());
	}
	/// Shares gas with another mixture based on the archived states of
	/// both, as if toward equilibrium across `adjacent_count + 1`
	/// openings. Moves heat capacity along with the moved moles and
	/// finishes with plain conduction when the mole movement barely
	/// changed the sharer.
	///
	/// Returns the net moles transferred, positive when this mix lost
	/// gas, and records the unsigned total moved on both mixes as
	/// `last_share`.
	pub fn share(&mut self, sharer: &mut Self, adjacent_count: u32) -> f32 {
		if self.immutable && sharer.immutable {
			return 0.0;
		}
		let temperature_delta = self.temperature_archived - sharer.temperature_archived;
		let abs_temperature_delta = temperature_delta.abs();
		let temperature_matters = abs_temperature_delta > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER;
		let (old_self_heat_capacity, old_sharer_heat_capacity) = if temperature_matters {
			(self.heat_capacity(), sharer.heat_capacity())
		} else {
			(0.0, 0.0)
		};
		let len = self
			.moles_archived
			.len()
			.max(sharer.moles_archived.len());
		if !self.immutable {
			self.maybe_expand(len);
		}
		if !sharer.immutable {
			sharer.maybe_expand(len);
		}
		let mut heat_capacity_self_to_sharer = 0.0_f32;
		let mut heat_capacity_sharer_to_self = 0.0_f32;
		let mut moved_moles = 0.0_f32;
		let mut abs_moved_moles = 0.0_f32;
		for idx in 0..len {
			let delta = (self.moles_archived.get(idx).copied().unwrap_or(0.0)
				- sharer.moles_archived.get(idx).copied().unwrap_or(0.0))
				/ (adjacent_count + 1) as f32;
			if !delta.is_normal() {
				continue;
			}
			if temperature_matters {
				let gas_heat_capacity = delta * specific_heat_of(idx);
				if delta > 0.0 {
					heat_capacity_self_to_sharer += gas_heat_capacity;
				} else {
					heat_capacity_sharer_to_self -= gas_heat_capacity;
				}
			}
			if !self.immutable {
				self.moles[idx] -= delta;
			}
			if !sharer.immutable {
				sharer.moles[idx] += delta;
			}
			moved_moles += delta;
			abs_moved_moles += delta.abs();
		}
		self.last_share = abs_moved_moles;
		sharer.last_share = abs_moved_moles;
		if !self.immutable {
			self.garbage_collect();
			self.cached_heat_capacity.set(None);
		}
		if !sharer.immutable {
			sharer.garbage_collect();
			sharer.cached_heat_capacity.set(None);
		}
		if temperature_matters {
			let new_self_heat_capacity =
				old_self_heat_capacity + heat_capacity_sharer_to_self - heat_capacity_self_to_sharer;
			let new_sharer_heat_capacity =
				old_sharer_heat_capacity + heat_capacity_self_to_sharer - heat_capacity_sharer_to_self;
			if new_self_heat_capacity > MINIMUM_HEAT_CAPACITY {
				self.force_temperature(
					(old_self_heat_capacity * self.temperature
						- heat_capacity_self_to_sharer * self.temperature_archived
						+ heat_capacity_sharer_to_self * sharer.temperature_archived)
						/ new_self_heat_capacity,
				);
			}
			if new_sharer_heat_capacity > MINIMUM_HEAT_CAPACITY {
				sharer.force_temperature(
					(old_sharer_heat_capacity * sharer.temperature
						- heat_capacity_sharer_to_self * sharer.temperature_archived
						+ heat_capacity_self_to_sharer * self.temperature_archived)
						/ new_sharer_heat_capacity,
				);
				// conduction cleanup when the mole movement barely
				// changed the sharer's heat capacity
				if old_sharer_heat_capacity > MINIMUM_HEAT_CAPACITY
					&& (new_sharer_heat_capacity / old_sharer_heat_capacity - 1.0).abs() < 0.1
				{
					self.temperature_share(sharer, OPEN_HEAT_TRANSFER_COEFFICIENT);
				}
			}
		}
		moved_moles
	}
	/// A very simple finite difference solution to the heat transfer
	/// equation. Conducts heat only, no mole movement.
	pub fn temperature_share(&mut self, sharer: &mut Self, conduction_coefficient: f32) -> f32 {
		let temperature_delta = self.temperature_archived - sharer.temperature_archived;
		if temperature_delta.abs() > MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER {
			let self_heat_capacity = self.heat_capacity();
			let sharer_heat_capacity = sharer.heat_capacity();

			if sharer_heat_capacity > MINIMUM_HEAT_CAPACITY
				&& self_heat_capacity > MINIMUM_HEAT_CAPACITY
			{
				let heat = conduction_coefficient
					* temperature_delta * (self_heat_capacity * sharer_heat_capacity
					/ (self_heat_capacity + sharer_heat_capacity));
				if !self.immutable {
					self.force_temperature((self.temperature - heat / self_heat_capacity).max(TCMB));
				}
				if !sharer.immutable {
					sharer.force_temperature(
						(sharer.temperature + heat / sharer_heat_capacity).max(TCMB),
					);
				}
			}
		}
		sharer.temperature
	}
	/// Classifies what this mixture and a sample would exchange.
	///
	/// Symmetric: the per-gas ratio test runs against the larger of the
	/// two sides, so `a.compare(b)` and `b.compare(a)` always agree.
	pub fn compare(&self, sample: &Self) -> GasCompareResult {
		for (i, pair) in self
			.moles
			.iter()
			.copied()
			.zip_longest(sample.moles.iter().copied())
			.enumerate()
		{
			let (a, b) = match pair {
				Both(a, b) => (a, b),
				Left(a) => (a, 0.0),
				Right(b) => (0.0, b),
			};
			let delta = (a - b).abs();
			if delta > MINIMUM_MOLES_DELTA_TO_MOVE
				&& delta > a.max(b) * MINIMUM_AIR_RATIO_TO_MOVE
			{
				if let Some(gas) = GasId::from_index(i) {
					return GasCompareResult::MoleExchange(gas);
				}
			}
		}
		if self.total_moles().max(sample.total_moles()) > MINIMUM_MOLES_DELTA_TO_MOVE
			&& (self.temperature - sample.temperature).abs()
				> MINIMUM_TEMPERATURE_DELTA_TO_SUSPEND
		{
			return GasCompareResult::TemperatureExchange;
		}
		GasCompareResult::NoExchange
	}
	/// Clears the moles from the gas.
	pub fn clear(&mut self) {
		if !self.immutable {
			self.moles.clear();
			self.cached_heat_capacity.set(None);
		}
	}
	/// Multiplies every gas molage with this value.
	pub fn multiply(&mut self, multiplier: f32) {
		if !self.immutable {
			for amt in self.moles.iter_mut() {
				*amt *= multiplier;
			}
			self.cached_heat_capacity.set(None);
			self.garbage_collect();
		}
	}
	/// A hashed representation of the visible gases in the mix, so
	/// callers only refresh visuals when something actually changed.
	/// `hash` holds the previous value and is updated in place.
	pub fn vis_hash_changed(&self, hash: &mut u64) -> bool {
		use std::hash::Hasher;
		let mut hasher: ahash::AHasher = ahash::AHasher::default();
		for (i, gas) in self.enumerate() {
			if let Some(amt) = GasId::from_index(i)
				.and_then(GasId::moles_visible)
				.filter(|&amt| gas >= amt)
			{
				hasher.write_usize(i);
				hasher.write_usize(FACTOR_GAS_VISIBLE_MAX.min((gas / amt).ceil()) as usize);
			}
		}
		let cur_hash = hasher.finish();
		let changed = *hash != cur_hash;
		*hash = cur_hash;
		changed
	}
	// Removes all redundant zeroes from the gas mixture.
	pub fn garbage_collect(&mut self) {
		let mut last_valid_found = 0;
		for (i, amt) in self.moles.iter_mut().enumerate() {
			if *amt > GAS_MIN_MOLES {
				last_valid_found = i;
			} else {
				*amt = 0.0;
			}
		}
		self.moles.truncate(last_valid_found + 1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge() {
		let mut into = Mixture::new();
		into.set_moles(GasId::Oxygen, 82.0).unwrap();
		into.set_moles(GasId::Nitrogen, 22.0).unwrap();
		into.set_temperature(293.15).unwrap();
		let mut source = Mixture::new();
		source.set_moles(GasId::Plasma, 100.0).unwrap();
		source.set_temperature(313.15).unwrap();
		into.merge(&source);
		// make sure that the merge successfuly moved the moles
		assert_eq!(into.get_moles(GasId::Plasma), 100.0);
		assert_eq!(source.get_moles(GasId::Plasma), 100.0); // source is not modified by merge
												  /*
												  make sure that the merge successfuly changed the temperature of the mix merged into:
												  test gases have heat capacities of 2,080 and 20,000 respectively, so total thermal energies of
												  609,752 and 6,263,000 respectively once multiplied by temperatures. add those together,
												  then divide by new total heat capacity:
												  (609,752 + 6,263,000)/(2,080 + 20,000) =
												  6,872,752 / 22,080 ~
												  311.265942
												  so we compare to see if it's relatively close to 311.266, cause of floating point precision
												  */
		assert!(
			(into.get_temperature() - 311.266).abs() < 0.01,
			"{} should be near 311.266, is {}",
			into.get_temperature(),
			(into.get_temperature() - 311.266)
		);
	}

	#[test]
	fn test_merge_empty_keeps_temperature() {
		// two empty mixes have no heat capacity between them, so the
		// temperature average must not run at all
		let mut into = Mixture::new();
		into.set_temperature(T20C).unwrap();
		into.merge(&Mixture::new());
		assert!(
			(into.get_temperature() - T20C).abs() < 0.01,
			"empty merge must not move the temperature, got {}",
			into.get_temperature()
		);
		assert!(into.heat_capacity() < MINIMUM_HEAT_CAPACITY);
	}

	#[test]
	fn test_remove() {
		// also tests multiply, copy_from_mutable
		let mut removed = Mixture::new();
		removed.set_moles(GasId::Oxygen, 22.0).unwrap();
		removed.set_moles(GasId::Nitrogen, 82.0).unwrap();
		let new = removed.remove_ratio(0.5);
		assert_eq!(removed.compare(&new), GasCompareResult::NoExchange);
		assert_eq!(removed.get_moles(GasId::Oxygen), 11.0);
		assert_eq!(removed.get_moles(GasId::Nitrogen), 41.0);
		removed.mark_immutable();
		let new_two = removed.remove_ratio(0.5);
		assert_eq!(
			removed.compare(&new_two),
			GasCompareResult::MoleExchange(GasId::Oxygen)
		);
		assert_eq!(removed.get_moles(GasId::Oxygen), 11.0);
		assert_eq!(removed.get_moles(GasId::Nitrogen), 41.0);
		assert_eq!(new_two.get_moles(GasId::Oxygen), 5.5);
	}

	#[test]
	fn test_remove_more_than_present() {
		let mut mix = Mixture::new();
		mix.set_moles(GasId::Oxygen, 5.0).unwrap();
		let removed = mix.remove(50.0);
		assert_eq!(removed.get_moles(GasId::Oxygen), 5.0);
		assert!(mix.total_moles() < GAS_MIN_MOLES);
	}

	#[test]
	fn test_add_weighted_temperature() {
		// 5 mol at 300 K plus 5 mol at 400 K lands halfway
		let mut mix = Mixture::new();
		mix.add(GasId::Oxygen, 5.0, 300.0).unwrap();
		assert!((mix.get_temperature() - 300.0).abs() < 0.01);
		mix.add(GasId::Oxygen, 5.0, 400.0).unwrap();
		assert!(
			(mix.get_temperature() - 350.0).abs() < 0.5,
			"expected ~350 K, got {}",
			mix.get_temperature()
		);
		assert!((mix.total_moles() - 10.0).abs() < 1e-4);
	}

	#[test]
	fn test_invalid_quantities_rejected() {
		let mut mix = Mixture::new();
		assert!(mix.set_moles(GasId::Oxygen, -1.0).is_err());
		assert!(mix.set_moles(GasId::Oxygen, f32::NAN).is_err());
		assert!(mix.add(GasId::Oxygen, -5.0, 300.0).is_err());
		assert!(mix.add(GasId::Oxygen, 5.0, f32::INFINITY).is_err());
		assert!(mix.set_temperature(-20.0).is_err());
		assert!(mix.total_moles() < GAS_MIN_MOLES);
	}

	#[test]
	fn test_share_balances() {
		// 10 mol against vacuum across one opening: delta is
		// (10 - 0) / (1 + 1) = 5, so both ends land on 5
		let mut a = Mixture::new();
		a.set_moles(GasId::Oxygen, 10.0).unwrap();
		a.set_temperature(293.15).unwrap();
		let mut b = Mixture::new();
		b.set_temperature(293.15).unwrap();
		a.archive();
		b.archive();
		let moved = a.share(&mut b, 1);
		assert!((moved - 5.0).abs() < 1e-4);
		assert!((a.total_moles() - 5.0).abs() < 1e-4);
		assert!((b.total_moles() - 5.0).abs() < 1e-4);
		assert!((a.total_moles() + b.total_moles() - 10.0).abs() < 1e-4);
		assert!((a.last_share() - 5.0).abs() < 1e-4);
	}

	#[test]
	fn test_share_into_space_is_one_sided() {
		let mut a = Mixture::new();
		a.set_moles(GasId::Oxygen, 10.0).unwrap();
		a.set_temperature(293.15).unwrap();
		let mut space = Mixture::space(CELL_VOLUME);
		a.archive();
		space.archive();
		let moved = a.share(&mut space, 1);
		assert!(moved > 0.0);
		assert!(a.total_moles() < 10.0);
		assert!(space.total_moles() < GAS_MIN_MOLES);
	}

	#[test]
	fn test_compare_symmetry() {
		let pairs = [
			(0.0, 0.0),
			(10.0, 10.05),
			(200.0, 200.2),
			(0.0, 0.11),
			(50.0, 120.0),
		];
		for (x, y) in pairs {
			let mut a = Mixture::new();
			a.set_moles(GasId::Oxygen, x).unwrap();
			let mut b = Mixture::new();
			b.set_moles(GasId::Oxygen, y).unwrap();
			assert_eq!(a.compare(&b), b.compare(&a), "asymmetric at {x} vs {y}");
		}
	}
}
