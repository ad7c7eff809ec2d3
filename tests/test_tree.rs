//! End-to-end betting-tree checks: construction, numbering, and the
//! binary file round trip through the public API.

use std::path::PathBuf;

use blueprint::betting_abstraction::BettingAbstraction;
use blueprint::betting_tree::BettingTrees;
use blueprint::game::Game;
use blueprint::node::SHOWDOWN;
use blueprint::tree_builder::TreeBuilder;
use blueprint::tree_io::{read_tree, write_tree};

fn game(num_players: usize, num_streets: usize, stack: u32) -> Game {
    Game {
        name: "holdem".to_string(),
        num_players,
        num_streets,
        stack_size: stack,
        small_blind: 1,
        big_blind: 2,
        min_bet: 2,
        num_ranks: 13,
        num_suits: 4,
    }
}

fn abstraction(max_bets: Vec<u32>, fracs: Vec<f64>) -> BettingAbstraction {
    let bet_sizes = max_bets
        .iter()
        .map(|&n| (0..n).map(|_| fracs.clone()).collect())
        .collect();
    BettingAbstraction {
        name: "test".to_string(),
        asymmetric: false,
        max_bets,
        our_max_bets: vec![],
        opp_max_bets: vec![],
        bet_sizes,
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

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}", name, std::process::id()))
}

#[test]
fn worked_scenario_matches_hand_computation() {
    // Stack 200, min bet 2, one street, two pot-size bets maximum.
    let g = game(2, 1, 200);
    let tree = TreeBuilder::build(&g, &abstraction(vec![2], vec![1.0]), 0).unwrap();

    let root = tree.node(tree.root());
    assert_eq!(root.num_succs(), 3);
    let call = tree.node(root.succs[0]);
    assert!(call.is_terminal());
    assert_eq!(call.player_acting, SHOWDOWN);
    assert_eq!(call.last_bet_to, 2);

    let bet1 = tree.node(root.succs[2]);
    assert_eq!(bet1.last_bet_to, 6); // 2 + round(1.0 * 4)
    let bet2 = tree.node(bet1.succs[2]);
    assert_eq!(bet2.last_bet_to, 18); // 6 + round(1.0 * 12)
    assert_eq!(bet2.num_succs(), 2); // bet cap reached: call or fold
}

#[test]
fn trees_are_well_formed() {
    let configs: Vec<(Game, BettingAbstraction)> = vec![
        (game(2, 2, 200), abstraction(vec![3, 3], vec![0.5, 1.0])),
        (game(3, 2, 100), abstraction(vec![2, 2], vec![1.0])),
        (game(2, 4, 400), abstraction(vec![2, 2, 2, 2], vec![0.75])),
    ];
    for (g, abs) in configs {
        let tree = TreeBuilder::build(&g, &abs, 0).unwrap();
        for node in tree.arena() {
            if node.is_terminal() {
                assert_eq!(node.num_succs(), 0);
                continue;
            }
            assert!(node.num_succs() >= 1);
            // Call and fold, when present, precede all bet successors,
            // and bet successors strictly ascend past the node's bet-to.
            let mut prev = node.last_bet_to;
            for s in node.first_bet_succ_index()..node.num_succs() {
                let child = tree.node(node.succs[s]);
                assert!(child.last_bet_to > prev);
                prev = child.last_bet_to;
            }
        }
    }
}

#[test]
fn terminal_ids_are_dense() {
    let g = game(3, 2, 100);
    let tree = TreeBuilder::build(&g, &abstraction(vec![2, 2], vec![1.0]), 0).unwrap();
    let mut ids: Vec<u32> = tree
        .arena()
        .iter()
        .filter(|n| n.is_terminal())
        .map(|n| n.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids.len() as u32, tree.num_terminals());
    for (expected, &id) in ids.iter().enumerate() {
        assert_eq!(id, expected as u32);
    }
}

#[test]
fn file_round_trip_preserves_every_record() {
    let g = game(2, 3, 200);
    let tree = TreeBuilder::build(&g, &abstraction(vec![2, 2, 2], vec![0.5, 1.0]), 0).unwrap();

    let path = temp_path("it_tree_rt.bin");
    write_tree(&tree, &path).unwrap();
    let reread = read_tree(&path, &g).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(tree.arena().len(), reread.arena().len());
    for (a, b) in tree.arena().iter().zip(reread.arena().iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.street, b.street);
        assert_eq!(a.player_acting, b.player_acting);
        assert_eq!(a.num_remaining, b.num_remaining);
        assert_eq!(a.last_bet_to, b.last_bet_to);
        assert_eq!(a.pack_flags(), b.pack_flags());
        assert_eq!(a.succs, b.succs);
    }
}

#[test]
fn reentrant_sharing_survives_round_trip() {
    let g = game(3, 2, 200);
    let mut abs = abstraction(vec![2, 2], vec![1.0]);
    abs.reentrant_streets = vec![false, true];
    abs.min_reentrant_bets = vec![0, 1];
    let tree = TreeBuilder::build(&g, &abs, 0).unwrap();

    let in_degree = |t: &blueprint::betting_tree::BettingTree| {
        let mut refs = vec![0usize; t.arena().len()];
        for node in t.arena() {
            for &s in &node.succs {
                refs[s as usize] += 1;
            }
        }
        refs
    };
    let shared_before = in_degree(&tree).iter().filter(|&&r| r > 1).count();
    assert!(shared_before > 0);

    let path = temp_path("it_tree_shared.bin");
    write_tree(&tree, &path).unwrap();
    let reread = read_tree(&path, &g).unwrap();
    std::fs::remove_file(&path).unwrap();

    let shared_after = in_degree(&reread).iter().filter(|&&r| r > 1).count();
    assert_eq!(shared_before, shared_after);
    assert_eq!(tree.arena().len(), reread.arena().len());
}

#[test]
fn builds_are_byte_identical() {
    let g = game(2, 2, 200);
    let abs = abstraction(vec![2, 2], vec![0.5, 1.0]);
    let p1 = temp_path("it_det1.bin");
    let p2 = temp_path("it_det2.bin");
    write_tree(&TreeBuilder::build(&g, &abs, 0).unwrap(), &p1).unwrap();
    write_tree(&TreeBuilder::build(&g, &abs, 0).unwrap(), &p2).unwrap();
    let b1 = std::fs::read(&p1).unwrap();
    let b2 = std::fs::read(&p2).unwrap();
    std::fs::remove_file(&p1).unwrap();
    std::fs::remove_file(&p2).unwrap();
    assert!(!b1.is_empty());
    assert_eq!(b1, b2);
}

#[test]
fn asymmetric_abstraction_builds_one_tree_per_player() {
    let g = game(2, 1, 200);
    let mut abs = abstraction(vec![], vec![]);
    abs.asymmetric = true;
    abs.our_max_bets = vec![3];
    abs.opp_max_bets = vec![1];
    abs.our_bet_sizes = vec![vec![vec![0.5, 1.0]; 3]];
    abs.opp_bet_sizes = vec![vec![vec![1.0]]];

    match BettingTrees::build(&g, &abs).unwrap() {
        BettingTrees::Asymmetric(trees) => {
            assert_eq!(trees.len(), 2);
            assert_ne!(trees[0].arena().len(), trees[1].arena().len());
        }
        BettingTrees::Symmetric(_) => panic!("expected one tree per player"),
    }
}
