//! Declarative betting abstraction.
//!
//! A `BettingAbstraction` is the validated, immutable configuration the
//! tree builder consumes: per-street bet-count limits, bet-size tables in
//! pot fractions, all-in/min-bet rules, bet-to snapping, and reentrancy
//! controls. Symmetric abstractions give one table; asymmetric ones split
//! "our" and "opponent" limits so a target player can be given a richer
//! action menu than the rest.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingAbstraction {
    /// Short name used in tree and checkpoint file names.
    pub name: String,

    /// When true, `our_*`/`opp_*` tables apply and one tree is built per
    /// target player.
    #[serde(default)]
    pub asymmetric: bool,

    /// Maximum bets per street (symmetric form).
    #[serde(default)]
    pub max_bets: Vec<u32>,
    #[serde(default)]
    pub our_max_bets: Vec<u32>,
    #[serde(default)]
    pub opp_max_bets: Vec<u32>,

    /// Bet sizes as pot fractions, indexed [street][bet_number][choice]
    /// (symmetric form).
    #[serde(default)]
    pub bet_sizes: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub our_bet_sizes: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    pub opp_bet_sizes: Vec<Vec<Vec<f64>>>,

    /// Force an all-in candidate, by [street][bet_number]. Missing rows
    /// read as false.
    #[serde(default)]
    pub always_all_in: Vec<Vec<bool>>,
    /// Force a min-bet candidate, by [street][bet_number].
    #[serde(default)]
    pub always_min_bet: Vec<Vec<bool>>,

    /// Remove the opening call (limp) at the initial street.
    #[serde(default)]
    pub no_open_limp: bool,

    /// Pot size (in chips) past which only the pot bet and all-in are
    /// offered. Zero disables the cutoff.
    #[serde(default)]
    pub only_pot_threshold: u32,

    /// Replace the fraction table with a single geometric bet sized so that
    /// repeating it on every remaining street reaches all-in.
    #[serde(default)]
    pub geometric: bool,

    /// Candidates at or above this fraction of the stack snap to all-in.
    /// Zero disables snapping.
    #[serde(default)]
    pub close_to_all_in_frac: f64,

    /// Optional ascending allow-list of legal bet-to amounts; candidates
    /// are remapped to the nearest entry by indifference interpolation.
    #[serde(default)]
    pub allowable_bet_tos: Option<Vec<u32>>,

    /// Streets on which structurally-equivalent subtrees may merge.
    #[serde(default)]
    pub reentrant_streets: Vec<bool>,
    /// Minimum pot size before any merge.
    #[serde(default)]
    pub min_reentrant_pot: u32,
    /// Minimum total bets before a merge, per street.
    #[serde(default)]
    pub min_reentrant_bets: Vec<u32>,
    /// Multiplayer override indexed by remaining-player count minus two;
    /// the effective threshold is the larger of the two.
    #[serde(default)]
    pub mp_min_reentrant_bets: Vec<u32>,
}

impl BettingAbstraction {
    pub fn load(path: &Path, num_streets: usize) -> SolverResult<BettingAbstraction> {
        let raw = fs::read_to_string(path)?;
        let abs: BettingAbstraction = serde_json::from_str(&raw)?;
        abs.validate(num_streets)?;
        Ok(abs)
    }

    pub fn validate(&self, num_streets: usize) -> SolverResult<()> {
        if self.name.is_empty() {
            return Err(SolverError::Config(
                "betting abstraction name must not be empty".to_string(),
            ));
        }
        if self.asymmetric {
            if !self.max_bets.is_empty() || !self.bet_sizes.is_empty() {
                return Err(SolverError::Config(
                    "asymmetric abstraction must use our_/opp_ tables, not max_bets/bet_sizes"
                        .to_string(),
                ));
            }
            Self::check_limits("our_max_bets", &self.our_max_bets, num_streets)?;
            Self::check_limits("opp_max_bets", &self.opp_max_bets, num_streets)?;
            Self::check_sizes("our_bet_sizes", &self.our_bet_sizes, &self.our_max_bets)?;
            Self::check_sizes("opp_bet_sizes", &self.opp_bet_sizes, &self.opp_max_bets)?;
        } else {
            if !self.our_max_bets.is_empty() || !self.opp_max_bets.is_empty() {
                return Err(SolverError::Config(
                    "our_/opp_ tables require asymmetric = true".to_string(),
                ));
            }
            Self::check_limits("max_bets", &self.max_bets, num_streets)?;
            Self::check_sizes("bet_sizes", &self.bet_sizes, &self.max_bets)?;
        }
        if !(0.0..=1.0).contains(&self.close_to_all_in_frac) {
            return Err(SolverError::Config(format!(
                "close_to_all_in_frac {} outside [0, 1]",
                self.close_to_all_in_frac
            )));
        }
        if let Some(ref allowed) = self.allowable_bet_tos {
            if allowed.is_empty() {
                return Err(SolverError::Config(
                    "allowable_bet_tos must not be empty when present".to_string(),
                ));
            }
            if !allowed.windows(2).all(|w| w[0] < w[1]) {
                return Err(SolverError::Config(
                    "allowable_bet_tos must be strictly ascending".to_string(),
                ));
            }
        }
        if self.reentrant_streets.len() > num_streets {
            return Err(SolverError::Config(format!(
                "reentrant_streets has {} entries for {} streets",
                self.reentrant_streets.len(),
                num_streets
            )));
        }
        Ok(())
    }

    fn check_limits(field: &str, limits: &[u32], num_streets: usize) -> SolverResult<()> {
        if limits.len() != num_streets {
            return Err(SolverError::Config(format!(
                "{} has {} entries for {} streets",
                field,
                limits.len(),
                num_streets
            )));
        }
        Ok(())
    }

    fn check_sizes(field: &str, sizes: &[Vec<Vec<f64>>], limits: &[u32]) -> SolverResult<()> {
        if sizes.len() != limits.len() {
            return Err(SolverError::Config(format!(
                "{} has {} streets, expected {}",
                field,
                sizes.len(),
                limits.len()
            )));
        }
        for (st, street_sizes) in sizes.iter().enumerate() {
            if street_sizes.len() != limits[st] as usize {
                return Err(SolverError::Config(format!(
                    "{}[{}] has {} bet-number rows, max_bets is {}",
                    field,
                    st,
                    street_sizes.len(),
                    limits[st]
                )));
            }
            for (nb, fracs) in street_sizes.iter().enumerate() {
                for &frac in fracs {
                    if frac <= 0.0 {
                        return Err(SolverError::Config(format!(
                            "{}[{}][{}] contains non-positive fraction {}",
                            field, st, nb, frac
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Maximum bets on `street` from the perspective of the target player
    /// (`our = true`) or any other player.
    pub fn max_bets(&self, street: u8, our: bool) -> u32 {
        let table = if !self.asymmetric {
            &self.max_bets
        } else if our {
            &self.our_max_bets
        } else {
            &self.opp_max_bets
        };
        table.get(street as usize).copied().unwrap_or(0)
    }

    /// Pot-fraction choices for the `bet_number`-th bet on `street`.
    pub fn bet_fracs(&self, street: u8, bet_number: u32, our: bool) -> &[f64] {
        let table = if !self.asymmetric {
            &self.bet_sizes
        } else if our {
            &self.our_bet_sizes
        } else {
            &self.opp_bet_sizes
        };
        table
            .get(street as usize)
            .and_then(|rows| rows.get(bet_number as usize))
            .map(|fracs| fracs.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_always_all_in(&self, street: u8, bet_number: u32) -> bool {
        self.always_all_in
            .get(street as usize)
            .and_then(|row| row.get(bet_number as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_always_min_bet(&self, street: u8, bet_number: u32) -> bool {
        self.always_min_bet
            .get(street as usize)
            .and_then(|row| row.get(bet_number as usize))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_reentrant(&self, street: u8) -> bool {
        self.reentrant_streets
            .get(street as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Minimum total bets before merging applies at this street, for the
    /// given remaining-player count.
    pub fn reentrant_bet_floor(&self, street: u8, num_remaining: usize) -> u32 {
        let base = self
            .min_reentrant_bets
            .get(street as usize)
            .copied()
            .unwrap_or(0);
        let by_remaining = if num_remaining >= 2 {
            self.mp_min_reentrant_bets
                .get(num_remaining - 2)
                .copied()
                .unwrap_or(0)
        } else {
            0
        };
        base.max(by_remaining)
    }

    /// Remap a candidate bet-to onto the allow-list, if one is configured.
    ///
    /// Picks between the nearest legal amounts below and above using the
    /// pseudo-harmonic indifference probability; the lower amount wins when
    /// that probability is at least one half.
    pub fn snap_to_allowed(&self, bet_to: u32, pot: u32) -> u32 {
        let allowed = match self.allowable_bet_tos {
            Some(ref a) => a,
            None => return bet_to,
        };
        match allowed.binary_search(&bet_to) {
            Ok(_) => bet_to,
            Err(pos) => {
                if pos == 0 {
                    allowed[0]
                } else if pos == allowed.len() {
                    allowed[allowed.len() - 1]
                } else {
                    let below = allowed[pos - 1];
                    let above = allowed[pos];
                    if indifference_prob(below, above, bet_to, pot) >= 0.5 {
                        below
                    } else {
                        above
                    }
                }
            }
        }
    }
}

/// Pseudo-harmonic mapping: the probability with which an amount between
/// two offered sizes is played as the smaller one so that the opponent is
/// indifferent. Amounts are normalized by the pot before applying
/// f(a, b, x) = ((b - x)(1 + a)) / ((b - a)(1 + x)).
fn indifference_prob(below: u32, above: u32, actual: u32, pot: u32) -> f64 {
    let pot = pot.max(1) as f64;
    let a = below as f64 / pot;
    let b = above as f64 / pot;
    let x = actual as f64 / pot;
    if b <= a {
        return 1.0;
    }
    ((b - x) * (1.0 + a)) / ((b - a) * (1.0 + x))
}
