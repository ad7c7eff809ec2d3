//! Batch training driver.
//!
//! A run is a sequence of batches, each `batch_size` self-play iterations
//! spread over a fixed pool of OS threads. Thread 0 runs on the caller;
//! the rest are spawned and joined at batch boundaries, so the only
//! synchronization inside a batch is the relaxed iteration counter that
//! warm-up weights read. Every `save_interval` batches all storage is
//! flushed; a resumed run reloads the checkpoint for its start batch and
//! continues as if never interrupted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::betting_tree::BettingTrees;
use crate::buckets::Buckets;
use crate::cfr::CfrEngine;
use crate::cfr_config::CfrConfig;
use crate::deal::DealSampler;
use crate::error::SolverResult;
use crate::game::Game;
use crate::regret_storage::{CfrStorage, CheckpointMeta};

pub struct Trainer<'a> {
    game: &'a Game,
    trees: &'a BettingTrees,
    /// One storage per target tree: a single entry for symmetric
    /// abstractions, one per player for asymmetric ones.
    storages: Vec<CfrStorage>,
    metas: Vec<CheckpointMeta>,
    buckets: &'a dyn Buckets,
    config: &'a CfrConfig,
    sampler: &'a dyn DealSampler,
    num_threads: usize,
    iteration: AtomicU64,
}

impl<'a> Trainer<'a> {
    pub fn new(
        game: &'a Game,
        trees: &'a BettingTrees,
        buckets: &'a dyn Buckets,
        config: &'a CfrConfig,
        sampler: &'a dyn DealSampler,
        meta: CheckpointMeta,
        num_threads: usize,
    ) -> Trainer<'a> {
        let num_buckets = buckets.bucket_counts();
        let (storages, metas) = match trees {
            BettingTrees::Symmetric(tree) => (
                vec![CfrStorage::new(tree, game, config, &num_buckets)],
                vec![meta],
            ),
            BettingTrees::Asymmetric(per_player) => {
                let mut storages = Vec::with_capacity(per_player.len());
                let mut metas = Vec::with_capacity(per_player.len());
                for (target, tree) in per_player.iter().enumerate() {
                    storages.push(CfrStorage::new(tree, game, config, &num_buckets));
                    let mut m = meta.clone();
                    // Asymmetric runs train one tree per target player;
                    // their checkpoints must not collide.
                    m.betting_abs_name = format!("{}.p{}", m.betting_abs_name, target);
                    metas.push(m);
                }
                (storages, metas)
            }
        };
        Trainer {
            game,
            trees,
            storages,
            metas,
            buckets,
            config,
            sampler,
            num_threads: num_threads.max(1),
            iteration: AtomicU64::new(0),
        }
    }

    fn storage_for(&self, target: u8) -> &CfrStorage {
        match self.trees {
            BettingTrees::Symmetric(_) => &self.storages[0],
            BettingTrees::Asymmetric(_) => &self.storages[target as usize],
        }
    }

    pub fn storages(&self) -> &[CfrStorage] {
        &self.storages
    }

    /// Run batches `[start_batch, end_batch)`. A nonzero start resumes
    /// from the checkpoint written at that batch boundary.
    pub fn train(&self, start_batch: u64, end_batch: u64) -> SolverResult<()> {
        let start_iteration = start_batch * self.config.batch_size;
        if start_batch > 0 {
            self.load(start_iteration)?;
        }
        self.iteration.store(start_iteration, Ordering::Relaxed);

        for batch in start_batch..end_batch {
            let started = Instant::now();
            self.run_batch(batch);
            eprintln!(
                "batch {}: {} iterations in {:.1}s",
                batch,
                self.config.batch_size,
                started.elapsed().as_secs_f64()
            );
            if (batch + 1) % self.config.save_interval == 0 || batch + 1 == end_batch {
                self.save((batch + 1) * self.config.batch_size)?;
            }
        }
        Ok(())
    }

    pub fn save(&self, iteration: u64) -> SolverResult<()> {
        for (storage, meta) in self.storages.iter().zip(self.metas.iter()) {
            storage.save(meta, iteration)?;
        }
        Ok(())
    }

    pub fn load(&self, iteration: u64) -> SolverResult<()> {
        for (storage, meta) in self.storages.iter().zip(self.metas.iter()) {
            storage.load(meta, iteration)?;
        }
        Ok(())
    }

    fn run_batch(&self, batch: u64) {
        std::thread::scope(|scope| {
            for worker in 1..self.num_threads {
                scope.spawn(move || self.run_worker(batch, worker));
            }
            self.run_worker(batch, 0);
        });
    }

    /// One worker's share of a batch: iterations congruent to its index.
    fn run_worker(&self, batch: u64, worker: usize) {
        let seed = self
            .config
            .seed
            .wrapping_add(batch.wrapping_mul(0x9e37_79b9_7f4a_7c15))
            .wrapping_add(worker as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        let stride = self.config.iteration_stride;
        let mut since_publish = 0u64;

        let mut i = worker as u64;
        while i < self.config.batch_size {
            let deal = self.sampler.sample(&mut rng);
            let iteration = self.iteration.load(Ordering::Relaxed).max(1);
            for target in 0..self.game.num_players as u8 {
                let tree = self.trees.tree_for(target);
                let engine = CfrEngine::new(
                    tree,
                    self.storage_for(target),
                    self.buckets,
                    self.config,
                );
                engine.run_iteration(&deal, target, iteration, &mut rng);
            }
            since_publish += 1;
            if since_publish >= stride {
                self.iteration.fetch_add(since_publish, Ordering::Relaxed);
                since_publish = 0;
            }
            i += self.num_threads as u64;
        }
        if since_publish > 0 {
            self.iteration.fetch_add(since_publish, Ordering::Relaxed);
        }
    }
}
