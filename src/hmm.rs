//! Latent skill-state tracking per key.
//!
//! Each observation scales the current state's transition row by an
//! emission adjustment, renormalizes it, and then samples the next state by
//! a cumulative-probability draw. The draw is deliberately stochastic (a
//! belief update rather than maximum-likelihood filtering) so repeated
//! observations produce a state *distribution* downstream, not a single
//! argmax trajectory.

use crate::stats::Sampler;
use crate::types::SkillState;

/// Row = current state; columns = learning, proficient, mastered, regressing.
const TRANSITIONS: [[f64; SkillState::COUNT]; SkillState::COUNT] = [
    [0.70, 0.25, 0.03, 0.02],
    [0.05, 0.70, 0.20, 0.05],
    [0.01, 0.09, 0.85, 0.05],
    [0.20, 0.30, 0.10, 0.40],
];

#[derive(Debug, Clone, Copy)]
pub struct SkillObservation {
    pub was_correct: bool,
    pub speed_ms: f64,
    pub avg_speed_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SkillTransition {
    pub next: SkillState,
    /// The normalized post-emission row the draw was made from.
    pub probabilities: [f64; SkillState::COUNT],
}

/// Advance one key's latent state given a fresh observation.
pub fn step(
    current: SkillState,
    observation: &SkillObservation,
    sampler: &mut Sampler,
) -> SkillTransition {
    let probabilities = adjusted_row(current, observation);

    // Cumulative draw against a single uniform.
    let draw = sampler.uniform();
    let mut cumulative = 0.0;
    let mut next = SkillState::from_index(SkillState::COUNT - 1);
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            next = SkillState::from_index(i);
            break;
        }
    }

    SkillTransition {
        next,
        probabilities,
    }
}

/// The transition row for `current`, scaled by the emission adjustment and
/// renormalized to sum to 1.
pub fn adjusted_row(
    current: SkillState,
    observation: &SkillObservation,
) -> [f64; SkillState::COUNT] {
    let mut row = TRANSITIONS[current.index()];

    let emission_bonus = if observation.was_correct { 1.2 } else { 0.5 };
    let speed_factor = if observation.speed_ms < observation.avg_speed_ms {
        1.1
    } else {
        0.9
    };

    row[SkillState::Learning.index()] *= if observation.was_correct { 0.8 } else { 1.3 };
    row[SkillState::Proficient.index()] *= emission_bonus;
    row[SkillState::Mastered.index()] *= emission_bonus * speed_factor;
    row[SkillState::Regressing.index()] *= if observation.was_correct { 0.7 } else { 1.5 };

    let total: f64 = row.iter().sum();
    for p in &mut row {
        *p /= total;
    }
    row
}
