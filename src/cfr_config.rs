//! CFR training configuration.
//!
//! Everything that shapes an individual run without changing the game:
//! sampling algorithm, per-street storage widths and scaling, warm-up and
//! pruning policy, batch and checkpoint cadence. Loaded from JSON and
//! validated against the game before storage is allocated.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::game::Game;

/// How an opponent node fans out during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Sample one successor by the current strategy.
    OutcomeSampling,
    /// Recurse every successor, propagating reach probabilities.
    VectorReach,
}

impl Algorithm {
    pub fn parse(name: &str) -> SolverResult<Algorithm> {
        match name {
            "outcome_sampling" => Ok(Algorithm::OutcomeSampling),
            "vector_reach" => Ok(Algorithm::VectorReach),
            other => Err(SolverError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Fixed storage width for one street's regret or strategy-sum cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageWidth {
    U8,
    U16,
    I32,
    F64,
}

impl StorageWidth {
    pub fn bytes(self) -> usize {
        match self {
            StorageWidth::U8 => 1,
            StorageWidth::U16 => 2,
            StorageWidth::I32 => 4,
            StorageWidth::F64 => 8,
        }
    }

    /// Largest magnitude the width can hold; updates past the configured
    /// ceiling (clamped to this) trigger a bucket-row rescale.
    pub fn max_value(self) -> f64 {
        match self {
            StorageWidth::U8 => u8::MAX as f64,
            StorageWidth::U16 => u16::MAX as f64,
            StorageWidth::I32 => i32::MAX as f64,
            StorageWidth::F64 => f64::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfrConfig {
    /// Short name recorded in checkpoint file names.
    pub name: String,
    /// "outcome_sampling" or "vector_reach".
    pub algorithm: String,
    /// Per-street widths, indexed by street.
    pub regret_widths: Vec<StorageWidth>,
    pub sumprob_widths: Vec<StorageWidth>,
    /// Regret clamp per street. A floor of 0 gives CFR+.
    pub regret_floors: Vec<f64>,
    pub regret_ceilings: Vec<f64>,
    pub sumprob_ceilings: Vec<f64>,
    /// Multiplied into deltas before rounding to storage width.
    #[serde(default)]
    pub regret_scaling: Vec<f64>,
    #[serde(default)]
    pub sumprob_scaling: Vec<f64>,
    /// Iteration before which strategy-sum weight is 1; after, the weight
    /// grows as (iteration - soft_warmup). 0 disables.
    #[serde(default)]
    pub soft_warmup: u64,
    /// Iteration before which strategy sums are not written at all.
    /// Mutually exclusive with soft_warmup. 0 disables.
    #[serde(default)]
    pub hard_warmup: u64,
    /// Per-street reach threshold below which regret/strategy updates are
    /// skipped. Empty disables pruning.
    #[serde(default)]
    pub prune_thresholds: Vec<f64>,
    /// Self-play iterations per batch.
    pub batch_size: u64,
    /// Checkpoint every this many batches.
    pub save_interval: u64,
    /// The shared iteration counter is published every this many
    /// iterations to limit contention.
    #[serde(default = "default_iteration_stride")]
    pub iteration_stride: u64,
    #[serde(default)]
    pub seed: u64,
}

fn default_iteration_stride() -> u64 {
    1
}

impl CfrConfig {
    pub fn load(path: &Path, game: &Game) -> SolverResult<CfrConfig> {
        let raw = fs::read_to_string(path)?;
        let config: CfrConfig = serde_json::from_str(&raw)?;
        config.validate(game)?;
        Ok(config)
    }

    pub fn validate(&self, game: &Game) -> SolverResult<()> {
        Algorithm::parse(&self.algorithm)?;
        let streets = game.num_streets;
        for (label, len) in [
            ("regret_widths", self.regret_widths.len()),
            ("sumprob_widths", self.sumprob_widths.len()),
            ("regret_floors", self.regret_floors.len()),
            ("regret_ceilings", self.regret_ceilings.len()),
            ("sumprob_ceilings", self.sumprob_ceilings.len()),
        ] {
            if len != streets {
                return Err(SolverError::Config(format!(
                    "{} has {} entries, expected one per street ({})",
                    label, len, streets
                )));
            }
        }
        for (label, v) in [
            ("regret_scaling", &self.regret_scaling),
            ("sumprob_scaling", &self.sumprob_scaling),
            ("prune_thresholds", &self.prune_thresholds),
        ] {
            if !v.is_empty() && v.len() != streets {
                return Err(SolverError::Config(format!(
                    "{} has {} entries, expected none or one per street ({})",
                    label,
                    v.len(),
                    streets
                )));
            }
        }
        if self.soft_warmup > 0 && self.hard_warmup > 0 {
            return Err(SolverError::Config(
                "soft_warmup and hard_warmup are mutually exclusive".to_string(),
            ));
        }
        for street in 0..streets {
            if self.regret_floors[street] > 0.0 {
                return Err(SolverError::Config(format!(
                    "regret_floors[{}] must be <= 0",
                    street
                )));
            }
            if self.regret_ceilings[street] <= 0.0
                || self.regret_ceilings[street] > self.regret_widths[street].max_value()
            {
                return Err(SolverError::Config(format!(
                    "regret_ceilings[{}] outside the {}-byte width",
                    street,
                    self.regret_widths[street].bytes()
                )));
            }
            if self.sumprob_ceilings[street] <= 0.0
                || self.sumprob_ceilings[street] > self.sumprob_widths[street].max_value()
            {
                return Err(SolverError::Config(format!(
                    "sumprob_ceilings[{}] outside the {}-byte width",
                    street,
                    self.sumprob_widths[street].bytes()
                )));
            }
        }
        if self.batch_size == 0 {
            return Err(SolverError::Config("batch_size must be positive".to_string()));
        }
        if self.save_interval == 0 {
            return Err(SolverError::Config(
                "save_interval must be positive".to_string(),
            ));
        }
        if self.iteration_stride == 0 {
            return Err(SolverError::Config(
                "iteration_stride must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn algorithm(&self) -> Algorithm {
        // Checked in validate.
        Algorithm::parse(&self.algorithm).unwrap_or(Algorithm::OutcomeSampling)
    }

    pub fn regret_scale(&self, street: u8) -> f64 {
        self.regret_scaling
            .get(street as usize)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn sumprob_scale(&self, street: u8) -> f64 {
        self.sumprob_scaling
            .get(street as usize)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn prune_threshold(&self, street: u8) -> f64 {
        self.prune_thresholds
            .get(street as usize)
            .copied()
            .unwrap_or(0.0)
    }

    /// Strategy-sum weight for `iteration`, or `None` when hard warm-up
    /// suppresses the update entirely.
    pub fn sumprob_weight(&self, iteration: u64) -> Option<f64> {
        if self.hard_warmup > 0 {
            if iteration < self.hard_warmup {
                return None;
            }
            return Some((iteration - self.hard_warmup) as f64);
        }
        if self.soft_warmup > 0 && iteration >= self.soft_warmup {
            return Some((iteration - self.soft_warmup) as f64);
        }
        Some(1.0)
    }
}
