//! Regret and strategy-sum storage.
//!
//! One dense array per (player, street), laid out in nonterminal-id order:
//! each decision node with at least two successors owns a block of
//! `num_buckets x num_succs` cells, bucket-major, so one bucket's action
//! row is contiguous. Cell width is configured per street and hidden
//! behind `CellArray`, which exposes plain f64 reads and writes.
//!
//! Cells are atomics accessed with Relaxed loads and stores, never
//! read-modify-write. Concurrent trainers can lose updates to each other;
//! that costs convergence quality, not memory safety, and is the price of
//! running batches without locks.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU16, AtomicU64, AtomicU8, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;

use crate::betting_tree::BettingTree;
use crate::cfr_config::{CfrConfig, StorageWidth};
use crate::error::{SolverError, SolverResult};
use crate::game::Game;

/// Fixed-width cell array with f64 at the boundary. Integer widths round
/// to nearest and clamp to the width's range on write.
pub enum CellArray {
    U8(Vec<AtomicU8>),
    U16(Vec<AtomicU16>),
    I32(Vec<AtomicI32>),
    F64(Vec<AtomicU64>),
}

impl CellArray {
    pub fn new(width: StorageWidth, len: usize) -> CellArray {
        match width {
            StorageWidth::U8 => CellArray::U8((0..len).map(|_| AtomicU8::new(0)).collect()),
            StorageWidth::U16 => CellArray::U16((0..len).map(|_| AtomicU16::new(0)).collect()),
            StorageWidth::I32 => CellArray::I32((0..len).map(|_| AtomicI32::new(0)).collect()),
            StorageWidth::F64 => {
                CellArray::F64((0..len).map(|_| AtomicU64::new(0f64.to_bits())).collect())
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CellArray::U8(v) => v.len(),
            CellArray::U16(v) => v.len(),
            CellArray::I32(v) => v.len(),
            CellArray::F64(v) => v.len(),
        }
    }

    pub fn width(&self) -> StorageWidth {
        match self {
            CellArray::U8(_) => StorageWidth::U8,
            CellArray::U16(_) => StorageWidth::U16,
            CellArray::I32(_) => StorageWidth::I32,
            CellArray::F64(_) => StorageWidth::F64,
        }
    }

    pub fn get(&self, i: usize) -> f64 {
        match self {
            CellArray::U8(v) => v[i].load(Ordering::Relaxed) as f64,
            CellArray::U16(v) => v[i].load(Ordering::Relaxed) as f64,
            CellArray::I32(v) => v[i].load(Ordering::Relaxed) as f64,
            CellArray::F64(v) => f64::from_bits(v[i].load(Ordering::Relaxed)),
        }
    }

    pub fn set(&self, i: usize, value: f64) {
        match self {
            CellArray::U8(v) => {
                let clamped = value.round().clamp(0.0, u8::MAX as f64);
                v[i].store(clamped as u8, Ordering::Relaxed);
            }
            CellArray::U16(v) => {
                let clamped = value.round().clamp(0.0, u16::MAX as f64);
                v[i].store(clamped as u16, Ordering::Relaxed);
            }
            CellArray::I32(v) => {
                let clamped = value.round().clamp(i32::MIN as f64, i32::MAX as f64);
                v[i].store(clamped as i32, Ordering::Relaxed);
            }
            CellArray::F64(v) => v[i].store(value.to_bits(), Ordering::Relaxed),
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> SolverResult<()> {
        match self {
            CellArray::U8(v) => {
                for cell in v {
                    writer.write_u8(cell.load(Ordering::Relaxed))?;
                }
            }
            CellArray::U16(v) => {
                for cell in v {
                    writer.write_u16::<LittleEndian>(cell.load(Ordering::Relaxed))?;
                }
            }
            CellArray::I32(v) => {
                for cell in v {
                    writer.write_i32::<LittleEndian>(cell.load(Ordering::Relaxed))?;
                }
            }
            CellArray::F64(v) => {
                for cell in v {
                    writer.write_u64::<LittleEndian>(cell.load(Ordering::Relaxed))?;
                }
            }
        }
        Ok(())
    }

    fn read_from<R: Read>(&self, reader: &mut R) -> SolverResult<()> {
        match self {
            CellArray::U8(v) => {
                for cell in v {
                    cell.store(reader.read_u8()?, Ordering::Relaxed);
                }
            }
            CellArray::U16(v) => {
                for cell in v {
                    cell.store(reader.read_u16::<LittleEndian>()?, Ordering::Relaxed);
                }
            }
            CellArray::I32(v) => {
                for cell in v {
                    cell.store(reader.read_i32::<LittleEndian>()?, Ordering::Relaxed);
                }
            }
            CellArray::F64(v) => {
                for cell in v {
                    cell.store(reader.read_u64::<LittleEndian>()?, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}

/// Storage for one (player, street): regrets and strategy sums over every
/// decision node with two or more successors.
pub struct StreetStorage {
    regrets: CellArray,
    sumprobs: CellArray,
    /// Cell offset of each nonterminal id's block; `None` for nodes with
    /// fewer than two successors, which need no storage.
    offsets: Vec<Option<usize>>,
    succ_counts: Vec<u16>,
    num_buckets: usize,
    regret_floor: f64,
    regret_ceiling: f64,
    sumprob_ceiling: f64,
}

impl StreetStorage {
    fn new(succ_counts: &[u16], num_buckets: usize, config: &CfrConfig, street: u8) -> StreetStorage {
        let mut offsets = Vec::with_capacity(succ_counts.len());
        let mut total = 0usize;
        for &n in succ_counts {
            if n >= 2 {
                offsets.push(Some(total));
                total += num_buckets * n as usize;
            } else {
                offsets.push(None);
            }
        }
        let s = street as usize;
        StreetStorage {
            regrets: CellArray::new(config.regret_widths[s], total),
            sumprobs: CellArray::new(config.sumprob_widths[s], total),
            offsets,
            succ_counts: succ_counts.to_vec(),
            num_buckets,
            regret_floor: config.regret_floors[s],
            regret_ceiling: config.regret_ceilings[s],
            sumprob_ceiling: config.sumprob_ceilings[s],
        }
    }

    pub fn num_cells(&self) -> usize {
        self.regrets.len()
    }

    /// Start of the action row for (nonterminal, bucket), with the row
    /// length. `None` when the node carries no storage.
    fn row(&self, nt_id: u32, bucket: u32) -> Option<(usize, usize)> {
        let num_succs = self.succ_counts[nt_id as usize] as usize;
        self.offsets[nt_id as usize]
            .map(|base| (base + bucket as usize * num_succs, num_succs))
    }

    pub fn has_storage(&self, nt_id: u32) -> bool {
        self.offsets[nt_id as usize].is_some()
    }

    /// Current regrets for one bucket row.
    pub fn regret_row(&self, nt_id: u32, bucket: u32, out: &mut Vec<f64>) {
        out.clear();
        if let Some((base, n)) = self.row(nt_id, bucket) {
            for s in 0..n {
                out.push(self.regrets.get(base + s));
            }
        }
    }

    pub fn sumprob_row(&self, nt_id: u32, bucket: u32, out: &mut Vec<f64>) {
        out.clear();
        if let Some((base, n)) = self.row(nt_id, bucket) {
            for s in 0..n {
                out.push(self.sumprobs.get(base + s));
            }
        }
    }

    /// Add `delta` to one action's regret. If the result would pass the
    /// street's ceiling, every action at this bucket is halved first so
    /// relative proportions survive, then the update lands, clamped to
    /// the floor/ceiling.
    pub fn add_regret(&self, nt_id: u32, bucket: u32, succ: usize, delta: f64) {
        let Some((base, n)) = self.row(nt_id, bucket) else {
            return;
        };
        let old = self.regrets.get(base + succ);
        if old + delta > self.regret_ceiling {
            for s in 0..n {
                let v = self.regrets.get(base + s);
                self.regrets.set(base + s, v / 2.0);
            }
        }
        let updated = self.regrets.get(base + succ) + delta;
        self.regrets.set(
            base + succ,
            updated.clamp(self.regret_floor, self.regret_ceiling),
        );
    }

    /// Add `delta` to one action's strategy sum, halving the bucket row
    /// on ceiling overflow like `add_regret`.
    pub fn add_sumprob(&self, nt_id: u32, bucket: u32, succ: usize, delta: f64) {
        let Some((base, n)) = self.row(nt_id, bucket) else {
            return;
        };
        let old = self.sumprobs.get(base + succ);
        if old + delta > self.sumprob_ceiling {
            for s in 0..n {
                let v = self.sumprobs.get(base + s);
                self.sumprobs.set(base + s, v / 2.0);
            }
        }
        let updated = self.sumprobs.get(base + succ) + delta;
        self.sumprobs
            .set(base + succ, updated.min(self.sumprob_ceiling).max(0.0));
    }
}

/// Which of the two parallel arrays a checkpoint file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckpointKind {
    Regrets,
    Sumprobs,
}

impl CheckpointKind {
    fn label(self) -> &'static str {
        match self {
            CheckpointKind::Regrets => "regrets",
            CheckpointKind::Sumprobs => "sumprobs",
        }
    }
}

/// Everything a checkpoint file name encodes, so runs with different
/// abstractions or configs never collide in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointMeta {
    pub dir: PathBuf,
    pub game_name: String,
    pub num_players: usize,
    pub card_abs_name: String,
    pub num_ranks: u32,
    pub num_suits: u32,
    pub max_street: u8,
    pub betting_abs_name: String,
    pub cfr_config_name: String,
}

impl CheckpointMeta {
    pub fn new(
        dir: &Path,
        game: &Game,
        card_abs_name: &str,
        betting_abs_name: &str,
        cfr_config_name: &str,
    ) -> CheckpointMeta {
        CheckpointMeta {
            dir: dir.to_path_buf(),
            game_name: game.name.clone(),
            num_players: game.num_players,
            card_abs_name: card_abs_name.to_string(),
            num_ranks: game.num_ranks,
            num_suits: game.num_suits,
            max_street: game.max_street(),
            betting_abs_name: betting_abs_name.to_string(),
            cfr_config_name: cfr_config_name.to_string(),
        }
    }

    fn file_path(&self, kind: CheckpointKind, iteration: u64, player: u8, street: u8) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{}.{}.{}.{}.{}.{}.{}.{}.p{}.s{}",
            kind.label(),
            self.game_name,
            self.num_players,
            self.card_abs_name,
            self.num_ranks,
            self.num_suits,
            self.max_street,
            self.betting_abs_name,
            self.cfr_config_name,
            iteration,
            player,
            street
        ))
    }
}

/// All storage over one betting tree: a `StreetStorage` per acting
/// (player, street). Asymmetric runs hold one `CfrStorage` per target
/// player's tree.
pub struct CfrStorage {
    streets: Vec<Vec<StreetStorage>>,
}

impl CfrStorage {
    /// Allocate zeroed storage sized from the tree's successor counts and
    /// the per-street bucket counts.
    pub fn new(
        tree: &BettingTree,
        game: &Game,
        config: &CfrConfig,
        num_buckets: &[usize],
    ) -> CfrStorage {
        let mut streets = Vec::with_capacity(game.num_players);
        for player in 0..game.num_players {
            let mut per_street = Vec::with_capacity(game.num_streets);
            for street in 0..game.num_streets {
                per_street.push(StreetStorage::new(
                    tree.succ_counts(player as u8, street as u8),
                    num_buckets[street],
                    config,
                    street as u8,
                ));
            }
            streets.push(per_street);
        }
        CfrStorage { streets }
    }

    pub fn street(&self, player: u8, street: u8) -> &StreetStorage {
        &self.streets[player as usize][street as usize]
    }

    pub fn num_players(&self) -> usize {
        self.streets.len()
    }

    pub fn num_streets(&self) -> usize {
        self.streets[0].len()
    }

    /// Serialize every array for `iteration`, one file per array per
    /// (player, street), flushed in parallel.
    pub fn save(&self, meta: &CheckpointMeta, iteration: u64) -> SolverResult<()> {
        std::fs::create_dir_all(&meta.dir)?;
        let jobs = self.checkpoint_jobs();
        jobs.par_iter().try_for_each(|&(player, street, kind)| {
            let path = meta.file_path(kind, iteration, player, street);
            let storage = self.street(player, street);
            let array = match kind {
                CheckpointKind::Regrets => &storage.regrets,
                CheckpointKind::Sumprobs => &storage.sumprobs,
            };
            let mut writer = BufWriter::new(File::create(&path)?);
            array.write_to(&mut writer)?;
            writer.flush()?;
            Ok(())
        })
    }

    /// Load every array saved at `iteration`, in parallel. Sizes must
    /// match the current trees and bucket counts exactly.
    pub fn load(&self, meta: &CheckpointMeta, iteration: u64) -> SolverResult<()> {
        let jobs = self.checkpoint_jobs();
        jobs.par_iter().try_for_each(|&(player, street, kind)| {
            let path = meta.file_path(kind, iteration, player, street);
            let storage = self.street(player, street);
            let array = match kind {
                CheckpointKind::Regrets => &storage.regrets,
                CheckpointKind::Sumprobs => &storage.sumprobs,
            };
            let file = File::open(&path).map_err(|e| {
                SolverError::Checkpoint(format!("cannot open {}: {}", path.display(), e))
            })?;
            let expected = (array.len() * array.width().bytes()) as u64;
            let actual = file.metadata()?.len();
            if actual != expected {
                return Err(SolverError::Checkpoint(format!(
                    "{} holds {} bytes, expected {}",
                    path.display(),
                    actual,
                    expected
                )));
            }
            let mut reader = BufReader::new(file);
            array.read_from(&mut reader)
        })
    }

    fn checkpoint_jobs(&self) -> Vec<(u8, u8, CheckpointKind)> {
        let mut jobs = Vec::new();
        for player in 0..self.num_players() {
            for street in 0..self.num_streets() {
                for kind in [CheckpointKind::Regrets, CheckpointKind::Sumprobs] {
                    jobs.push((player as u8, street as u8, kind));
                }
            }
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting_abstraction::BettingAbstraction;
    use crate::cfr_config::StorageWidth;
    use crate::tree_builder::TreeBuilder;

    fn test_game() -> Game {
        Game {
            name: "holdem".to_string(),
            num_players: 2,
            num_streets: 1,
            stack_size: 200,
            small_blind: 1,
            big_blind: 2,
            min_bet: 2,
            num_ranks: 13,
            num_suits: 4,
        }
    }

    fn pot_abstraction() -> BettingAbstraction {
        BettingAbstraction {
            name: "pot".to_string(),
            asymmetric: false,
            max_bets: vec![2],
            our_max_bets: vec![],
            opp_max_bets: vec![],
            bet_sizes: vec![vec![vec![1.0], vec![1.0]]],
            our_bet_sizes: vec![],
            opp_bet_sizes: vec![],
            always_all_in: vec![],
            always_min_bet: vec![],
            no_open_limp: false,
            only_pot_threshold: 0,
            geometric: false,
            close_to_all_in_frac: 0.0,
            allowable_bet_tos: None,
            reentrant_streets: vec![],
            min_reentrant_pot: 0,
            min_reentrant_bets: vec![],
            mp_min_reentrant_bets: vec![],
        }
    }

    fn int_config() -> CfrConfig {
        CfrConfig {
            name: "int".to_string(),
            algorithm: "outcome_sampling".to_string(),
            regret_widths: vec![StorageWidth::I32],
            sumprob_widths: vec![StorageWidth::I32],
            regret_floors: vec![0.0],
            regret_ceilings: vec![2_000_000_000.0],
            sumprob_ceilings: vec![2_000_000_000.0],
            regret_scaling: vec![],
            sumprob_scaling: vec![],
            soft_warmup: 0,
            hard_warmup: 0,
            prune_thresholds: vec![],
            batch_size: 10,
            save_interval: 1,
            iteration_stride: 1,
            seed: 0,
        }
    }

    fn build_storage(config: &CfrConfig, num_buckets: usize) -> (BettingTree, CfrStorage) {
        let game = test_game();
        let tree = TreeBuilder::build(&game, &pot_abstraction(), 0).unwrap();
        let storage = CfrStorage::new(&tree, &game, config, &[num_buckets]);
        (tree, storage)
    }

    #[test]
    fn rescale_halves_the_whole_bucket_row() {
        let (_, storage) = build_storage(&int_config(), 4);
        let s = storage.street(0, 0);
        // Root for player 0 has three successors.
        s.add_regret(0, 1, 0, 1_200_000_000.0);
        s.add_regret(0, 1, 1, 600_000_000.0);
        s.add_regret(0, 1, 2, 300_000_000.0);

        // Pushes action 0 to 2,000,000,001: the whole row halves first.
        s.add_regret(0, 1, 0, 800_000_001.0);

        let mut row = Vec::new();
        s.regret_row(0, 1, &mut row);
        assert_eq!(row[1], 300_000_000.0);
        assert_eq!(row[2], 150_000_000.0);
        assert_eq!(row[0], 600_000_000.0 + 800_000_001.0);
        for v in row {
            assert!(v <= 2_000_000_000.0);
        }
    }

    #[test]
    fn rescale_preserves_ratios() {
        let (_, storage) = build_storage(&int_config(), 1);
        let s = storage.street(0, 0);
        s.add_regret(0, 0, 1, 1_000_000_000.0);
        s.add_regret(0, 0, 2, 500_000_000.0);
        s.add_regret(0, 0, 0, 2_000_000_001.0);
        let mut row = Vec::new();
        s.regret_row(0, 0, &mut row);
        assert!((row[1] / row[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cfr_plus_floor_clamps_negative() {
        let (_, storage) = build_storage(&int_config(), 1);
        let s = storage.street(0, 0);
        s.add_regret(0, 0, 0, 100.0);
        s.add_regret(0, 0, 0, -250.0);
        let mut row = Vec::new();
        s.regret_row(0, 0, &mut row);
        assert_eq!(row[0], 0.0);
    }

    #[test]
    fn narrow_widths_round_and_saturate() {
        let mut config = int_config();
        config.regret_widths = vec![StorageWidth::U8];
        config.regret_ceilings = vec![250.0];
        let (_, storage) = build_storage(&config, 1);
        let s = storage.street(0, 0);
        s.add_regret(0, 0, 0, 7.4);
        let mut row = Vec::new();
        s.regret_row(0, 0, &mut row);
        assert_eq!(row[0], 7.0);

        s.add_regret(0, 0, 0, 260.0);
        s.regret_row(0, 0, &mut row);
        assert!(row[0] <= 250.0);
    }

    #[test]
    fn checkpoint_round_trip_is_bit_exact() {
        let mut config = int_config();
        config.regret_widths = vec![StorageWidth::F64];
        let (tree, storage) = build_storage(&config, 4);
        let s = storage.street(0, 0);
        s.add_regret(0, 2, 0, 0.1 + 0.2); // deliberately non-representable
        s.add_regret(0, 2, 1, 1e-300);
        s.add_sumprob(0, 3, 2, 42.0);

        let dir = std::env::temp_dir().join(format!("ckpt_{}", std::process::id()));
        let meta = CheckpointMeta::new(&dir, &test_game(), "none", "pot", "int");
        storage.save(&meta, 7).unwrap();

        let restored = CfrStorage::new(&tree, &test_game(), &config, &[4]);
        restored.load(&meta, 7).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let a = storage.street(0, 0);
        let b = restored.street(0, 0);
        let (mut ra, mut rb) = (Vec::new(), Vec::new());
        a.regret_row(0, 2, &mut ra);
        b.regret_row(0, 2, &mut rb);
        assert_eq!(ra[0].to_bits(), rb[0].to_bits());
        assert_eq!(ra[1].to_bits(), rb[1].to_bits());
        a.sumprob_row(0, 3, &mut ra);
        b.sumprob_row(0, 3, &mut rb);
        assert_eq!(ra[2].to_bits(), rb[2].to_bits());
    }

    #[test]
    fn missing_checkpoint_is_fatal() {
        let (_, storage) = build_storage(&int_config(), 1);
        let dir = std::env::temp_dir().join(format!("ckpt_missing_{}", std::process::id()));
        let meta = CheckpointMeta::new(&dir, &test_game(), "none", "pot", "int");
        assert!(matches!(
            storage.load(&meta, 0),
            Err(SolverError::Checkpoint(_))
        ));
    }
}
