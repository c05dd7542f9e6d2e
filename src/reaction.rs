use float_ord::FloatOrd;

use crate::gas::Mixture;
use crate::tiles::TileCoord;

/// What a reaction did to the mixture it ran on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReactionOutcome {
	NoReaction,
	Reacting,
	/// The mixture changed in a way that makes running any further
	/// reactions this tick meaningless.
	StopReactions,
}

/// Where a reaction is happening, for handlers that care.
#[derive(Copy, Clone, Debug)]
pub struct ReactionContext {
	pub coords: TileCoord,
}

/// A gas reaction the simulation dispatches during tile processing.
///
/// `check` is the cheap precondition filter (temperature and reagent
/// floors, typically); `react` only runs when it passed. Hosts register
/// implementations with [`ReactionRegistry::register`].
pub trait GasReaction {
	/// Higher priorities run first.
	fn priority(&self) -> f32;
	fn check(&self, air: &Mixture) -> bool;
	fn react(&self, air: &mut Mixture, ctx: &ReactionContext) -> ReactionOutcome;
}

/// The ordered list of registered reactions.
#[derive(Default)]
pub struct ReactionRegistry {
	reactions: Vec<Box<dyn GasReaction + Send + Sync>>,
}

impl ReactionRegistry {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn register(&mut self, reaction: Box<dyn GasReaction + Send + Sync>) {
		self.reactions.push(reaction);
		self.reactions
			.sort_by_key(|r| std::cmp::Reverse(FloatOrd(r.priority())));
	}
	pub fn len(&self) -> usize {
		self.reactions.len()
	}
	pub fn is_empty(&self) -> bool {
		self.reactions.is_empty()
	}
	pub fn can_react(&self, air: &Mixture) -> bool {
		self.reactions.iter().any(|r| r.check(air))
	}
	/// Runs every applicable reaction in priority order, stopping early
	/// if one of them says to.
	pub fn react(&self, air: &mut Mixture, ctx: &ReactionContext) -> ReactionOutcome {
		let mut outcome = ReactionOutcome::NoReaction;
		for reaction in &self.reactions {
			if !reaction.check(air) {
				continue;
			}
			match reaction.react(air, ctx) {
				ReactionOutcome::StopReactions => return ReactionOutcome::StopReactions,
				ReactionOutcome::Reacting => outcome = ReactionOutcome::Reacting,
				ReactionOutcome::NoReaction => {}
			}
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gas::GasId;

	struct Condense {
		priority: f32,
	}

	impl GasReaction for Condense {
		fn priority(&self) -> f32 {
			self.priority
		}
		fn check(&self, air: &Mixture) -> bool {
			air.get_moles(GasId::WaterVapor) > 1.0
		}
		fn react(&self, air: &mut Mixture, _ctx: &ReactionContext) -> ReactionOutcome {
			air.adjust_moles(GasId::WaterVapor, -1.0);
			ReactionOutcome::Reacting
		}
	}

	#[test]
	fn test_react_runs_only_when_check_passes() {
		let mut registry = ReactionRegistry::new();
		registry.register(Box::new(Condense { priority: 1.0 }));
		let ctx = ReactionContext {
			coords: TileCoord { x: 0, y: 0 },
		};
		let mut air = Mixture::new();
		air.set_moles(GasId::WaterVapor, 0.5).unwrap();
		assert_eq!(registry.react(&mut air, &ctx), ReactionOutcome::NoReaction);
		air.set_moles(GasId::WaterVapor, 3.0).unwrap();
		assert_eq!(registry.react(&mut air, &ctx), ReactionOutcome::Reacting);
		assert!((air.get_moles(GasId::WaterVapor) - 2.0).abs() < 1e-6);
	}
}
