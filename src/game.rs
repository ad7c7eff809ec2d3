//! Game parameter model.
//!
//! A `Game` describes the fixed rules of the abstraction being solved:
//! player count, blinds, stack depth, number of streets, and the deck
//! shape (rank/suit counts, used for checkpoint naming). Loaded from a
//! JSON parameter file and validated before anything else runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 10;
pub const MAX_STREETS: usize = 4;

/// Seat conventions: seat 0 posts the small blind, seat 1 the big blind.
/// Preflop action starts left of the big blind; postflop action starts at
/// the first remaining seat from the small blind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    /// Short name used in checkpoint file names (e.g., "holdem").
    pub name: String,
    pub num_players: usize,
    /// Number of betting rounds in the abstraction (1-4).
    pub num_streets: usize,
    /// Starting stack per player, in chips.
    pub stack_size: u32,
    pub small_blind: u32,
    pub big_blind: u32,
    /// Smallest legal opening bet. Conventionally the big blind.
    pub min_bet: u32,
    /// Deck shape, recorded in checkpoint names.
    pub num_ranks: u32,
    pub num_suits: u32,
}

impl Game {
    pub fn load(path: &Path) -> SolverResult<Game> {
        let raw = fs::read_to_string(path)?;
        let game: Game = serde_json::from_str(&raw)?;
        game.validate()?;
        Ok(game)
    }

    pub fn validate(&self) -> SolverResult<()> {
        if self.num_players < MIN_PLAYERS || self.num_players > MAX_PLAYERS {
            return Err(SolverError::Config(format!(
                "num_players {} outside {}..={}",
                self.num_players, MIN_PLAYERS, MAX_PLAYERS
            )));
        }
        if self.num_streets == 0 || self.num_streets > MAX_STREETS {
            return Err(SolverError::Config(format!(
                "num_streets {} outside 1..={}",
                self.num_streets, MAX_STREETS
            )));
        }
        if self.big_blind == 0 {
            return Err(SolverError::Config("big_blind must be positive".to_string()));
        }
        if self.small_blind >= self.big_blind {
            return Err(SolverError::Config(format!(
                "small_blind {} must be less than big_blind {}",
                self.small_blind, self.big_blind
            )));
        }
        if self.min_bet == 0 {
            return Err(SolverError::Config("min_bet must be positive".to_string()));
        }
        if self.stack_size < self.big_blind {
            return Err(SolverError::Config(format!(
                "stack_size {} smaller than big_blind {}",
                self.stack_size, self.big_blind
            )));
        }
        // Node records store bet-to amounts as u16.
        if self.stack_size > u16::MAX as u32 {
            return Err(SolverError::Config(format!(
                "stack_size {} exceeds the representable maximum {}",
                self.stack_size,
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Index of the last street.
    pub fn max_street(&self) -> u8 {
        (self.num_streets - 1) as u8
    }

    pub fn big_blind_seat(&self) -> u8 {
        (1 % self.num_players) as u8
    }

    /// First remaining seat to act on `street`, given a bitmask of folded
    /// seats. Preflop the blinds have already acted by posting. Heads-up
    /// the small blind is the button and acts last after the flop.
    pub fn first_to_act(&self, street: u8, folded: u16) -> u8 {
        let start = if street == 0 {
            2 % self.num_players
        } else if self.num_players == 2 {
            1
        } else {
            0
        };
        for offset in 0..self.num_players {
            let seat = (start + offset) % self.num_players;
            if folded & (1 << seat) == 0 {
                return seat as u8;
            }
        }
        // Callers never pass an all-folded mask.
        start as u8
    }

    /// Next remaining seat after `seat`, cyclic.
    pub fn next_to_act(&self, seat: u8, folded: u16) -> u8 {
        for offset in 1..=self.num_players {
            let next = (seat as usize + offset) % self.num_players;
            if folded & (1 << next) == 0 {
                return next as u8;
            }
        }
        seat
    }
}
