//! Training-loop behavior through the public API: regret matching,
//! overflow rescaling, warm-up, and a full batch run with checkpoints.

use blueprint::betting_abstraction::BettingAbstraction;
use blueprint::betting_tree::BettingTrees;
use blueprint::buckets::{Buckets, UniformBuckets};
use blueprint::cfr::{average_strategy, regret_match, CfrEngine};
use blueprint::cfr_config::{CfrConfig, StorageWidth};
use blueprint::deal::{Deal, DealSampler, UniformDealSampler};
use blueprint::game::Game;
use blueprint::regret_storage::{CfrStorage, CheckpointMeta};
use blueprint::trainer::Trainer;
use blueprint::tree_builder::TreeBuilder;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn game() -> Game {
    Game {
        name: "holdem".to_string(),
        num_players: 2,
        num_streets: 1,
        stack_size: 200,
        small_blind: 1,
        big_blind: 2,
        min_bet: 2,
        num_ranks: 6,
        num_suits: 1,
    }
}

fn abstraction() -> BettingAbstraction {
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

fn config(algorithm: &str) -> CfrConfig {
    CfrConfig {
        name: "it".to_string(),
        algorithm: algorithm.to_string(),
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
        batch_size: 2_000,
        save_interval: 1,
        iteration_stride: 16,
        seed: 31,
    }
}

#[test]
fn regret_matching_contract() {
    let mut probs = Vec::new();
    // All-zero regrets: one-hot on the default successor.
    regret_match(&[0.0; 4], 2, &mut probs);
    assert_eq!(probs, vec![0.0, 0.0, 1.0, 0.0]);

    // Any non-negative vector: normalized to 1.
    regret_match(&[1.0, 2.0, 5.0], 0, &mut probs);
    assert_relative_eq!(probs.iter().sum::<f64>(), 1.0);
    assert_relative_eq!(probs[2], 0.625);
}

#[test]
fn overflow_halves_whole_bucket() {
    let g = game();
    let tree = TreeBuilder::build(&g, &abstraction(), 0).unwrap();
    let storage = CfrStorage::new(&tree, &g, &config("outcome_sampling"), &[6]);
    let s = storage.street(0, 0);

    s.add_regret(0, 0, 0, 1_500_000_000.0);
    s.add_regret(0, 0, 1, 900_000_000.0);
    s.add_regret(0, 0, 2, 100_000_000.0);
    // Drives action 0 to 2,000,000,001.
    s.add_regret(0, 0, 0, 500_000_001.0);

    let mut row = Vec::new();
    s.regret_row(0, 0, &mut row);
    assert!(row.iter().all(|&v| v <= 2_000_000_000.0));
    assert_eq!(row[1], 450_000_000.0);
    assert_eq!(row[2], 50_000_000.0);
    assert_relative_eq!(row[1] / row[2], 9.0);
}

#[test]
fn soft_warmup_grows_average_weight() {
    let g = game();
    let tree = TreeBuilder::build(&g, &abstraction(), 0).unwrap();
    let mut cfg = config("vector_reach");
    cfg.soft_warmup = 10;
    let storage = CfrStorage::new(&tree, &g, &cfg, &[6]);
    let buckets = UniformBuckets::new(vec![6]);
    let engine = CfrEngine::new(&tree, &storage, &buckets, &cfg);
    let mut rng = StdRng::seed_from_u64(1);

    let deal = Deal::new(vec![vec![1], vec![4]], vec![1, 4]);
    engine.run_iteration(&deal, 0, 5, &mut rng);
    let s1 = storage.street(1, 0);
    let mut early = Vec::new();
    s1.sumprob_row(0, 4, &mut early);
    let early_total: f64 = early.iter().sum();

    engine.run_iteration(&deal, 0, 1_000, &mut rng);
    let mut late = Vec::new();
    s1.sumprob_row(0, 4, &mut late);
    let late_total: f64 = late.iter().sum();

    // Pre-warm-up iterations carry weight 1; later ones carry
    // (iteration - soft_warmup), so the increment must be far larger.
    assert!(early_total >= 1.0);
    assert!(late_total - early_total > 100.0 * early_total);
}

#[test]
fn batch_training_converges_to_sensible_play() {
    // Ranks are tied to hands: hand 5 is the nuts, hand 0 is air. After
    // training, the small blind should raise the nuts far more often
    // than air.
    struct TiedSampler {
        inner: UniformDealSampler,
    }
    impl DealSampler for TiedSampler {
        fn sample(&self, rng: &mut StdRng) -> Deal {
            let raw = self.inner.sample(rng);
            let (h0, h1) = (raw.hand(0, 0), raw.hand(1, 0));
            Deal::new(vec![vec![h0], vec![h1]], vec![h0, h1])
        }
    }

    let g = game();
    let trees = BettingTrees::build(&g, &abstraction()).unwrap();
    let buckets = UniformBuckets::new(vec![6]);
    let cfg = config("vector_reach");
    let sampler = TiedSampler {
        inner: UniformDealSampler::new(2, vec![6], 6),
    };
    let dir = std::env::temp_dir().join(format!("it_train_{}", std::process::id()));
    let meta = CheckpointMeta::new(&dir, &g, "none", "pot", "it");
    let trainer = Trainer::new(&g, &trees, &buckets, &cfg, &sampler, meta, 2);
    trainer.train(0, 10).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let tree = trees.tree_for(0);
    let root = tree.node(tree.root());
    let s = trainer.storages()[0].street(0, 0);
    let (mut nuts, mut air) = (Vec::new(), Vec::new());
    average_strategy(s, root, 5, &mut nuts);
    average_strategy(s, root, 0, &mut air);
    let bet = root.first_bet_succ_index();
    assert!(
        nuts[bet] > air[bet],
        "nuts {:?} should raise more than air {:?}",
        nuts,
        air
    );
}

#[test]
fn checkpoints_reload_identically() {
    let g = game();
    let trees = BettingTrees::build(&g, &abstraction()).unwrap();
    let buckets = UniformBuckets::new(vec![6]);
    let cfg = config("outcome_sampling");
    let sampler = UniformDealSampler::new(2, vec![6], 6);
    let dir = std::env::temp_dir().join(format!("it_ckpt_{}", std::process::id()));
    let meta = CheckpointMeta::new(&dir, &g, "none", "pot", "it");

    let trainer = Trainer::new(&g, &trees, &buckets, &cfg, &sampler, meta.clone(), 1);
    trainer.train(0, 1).unwrap();

    let reloaded = Trainer::new(&g, &trees, &buckets, &cfg, &sampler, meta, 1);
    reloaded.load(cfg.batch_size).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let tree = trees.tree_for(0);
    for player in 0..2u8 {
        let a = trainer.storages()[0].street(player, 0);
        let b = reloaded.storages()[0].street(player, 0);
        for id in 0..tree.nonterminal_count(player, 0) as u32 {
            if !a.has_storage(id) {
                continue;
            }
            for bucket in 0..buckets.num_buckets(0) as u32 {
                let (mut ra, mut rb) = (Vec::new(), Vec::new());
                a.regret_row(id, bucket, &mut ra);
                b.regret_row(id, bucket, &mut rb);
                assert_eq!(ra, rb);
                a.sumprob_row(id, bucket, &mut ra);
                b.sumprob_row(id, bucket, &mut rb);
                assert_eq!(ra, rb);
            }
        }
    }
}
