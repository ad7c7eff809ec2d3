//! Betting tree ownership and derived indices.
//!
//! `BettingTree` owns the node arena produced by the builder plus the
//! derived numbering: dense terminal ids across the whole tree, dense
//! nonterminal ids per (player, street), and the per-nonterminal successor
//! counts the regret storage is laid out from. `BettingTrees` wraps either
//! one symmetric tree shared by every player or one tree per target player
//! for asymmetric abstractions.

use crate::betting_abstraction::BettingAbstraction;
use crate::error::SolverResult;
use crate::game::{Game, MAX_STREETS};
use crate::node::{Node, NodeIndex};
use crate::tree_builder::TreeBuilder;

#[derive(Debug)]
pub struct BettingTree {
    arena: Vec<Node>,
    root: NodeIndex,
    num_terminals: u32,
    /// Successor count per nonterminal id, indexed [player][street][id].
    /// Length of each inner vec is the dense nonterminal count.
    nonterminal_succs: Vec<Vec<Vec<u16>>>,
}

impl BettingTree {
    /// Take ownership of a built arena and run the numbering pass: one
    /// depth-first pre-order traversal assigning terminal ids densely
    /// across the tree and nonterminal ids densely per (player, street).
    /// Reentrant nodes keep the id from their first visit.
    pub fn new(arena: Vec<Node>, root: NodeIndex, game: &Game) -> BettingTree {
        let mut tree = BettingTree {
            arena,
            root,
            num_terminals: 0,
            nonterminal_succs: vec![vec![Vec::new(); MAX_STREETS]; game.num_players],
        };
        tree.assign_ids(root, &mut vec![false; tree.arena.len()]);
        tree
    }

    fn assign_ids(&mut self, idx: NodeIndex, visited: &mut Vec<bool>) {
        if visited[idx as usize] {
            return;
        }
        visited[idx as usize] = true;

        if self.arena[idx as usize].is_terminal() {
            self.arena[idx as usize].id = self.num_terminals;
            self.num_terminals += 1;
            return;
        }

        let (player, street, num_succs) = {
            let node = &self.arena[idx as usize];
            (
                node.player_acting as usize,
                node.street as usize,
                node.num_succs() as u16,
            )
        };
        let counts = &mut self.nonterminal_succs[player][street];
        self.arena[idx as usize].id = counts.len() as u32;
        counts.push(num_succs);

        let succs = self.arena[idx as usize].succs.clone();
        for succ in succs {
            self.assign_ids(succ, visited);
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.arena[idx as usize]
    }

    pub fn arena(&self) -> &[Node] {
        &self.arena
    }

    pub fn num_terminals(&self) -> u32 {
        self.num_terminals
    }

    pub fn num_players(&self) -> usize {
        self.nonterminal_succs.len()
    }

    pub fn nonterminal_count(&self, player: u8, street: u8) -> usize {
        self.nonterminal_succs[player as usize][street as usize].len()
    }

    /// Successor counts in nonterminal-id order for (player, street); the
    /// regret storage layout follows this order.
    pub fn succ_counts(&self, player: u8, street: u8) -> &[u16] {
        &self.nonterminal_succs[player as usize][street as usize]
    }
}

/// The trees a training run walks: one shared tree, or one per target
/// player when the betting abstraction is asymmetric.
#[derive(Debug)]
pub enum BettingTrees {
    Symmetric(BettingTree),
    Asymmetric(Vec<BettingTree>),
}

impl BettingTrees {
    pub fn build(game: &Game, abs: &BettingAbstraction) -> SolverResult<BettingTrees> {
        if abs.asymmetric {
            let mut trees = Vec::with_capacity(game.num_players);
            for player in 0..game.num_players {
                trees.push(TreeBuilder::build(game, abs, player as u8)?);
            }
            Ok(BettingTrees::Asymmetric(trees))
        } else {
            Ok(BettingTrees::Symmetric(TreeBuilder::build(game, abs, 0)?))
        }
    }

    /// The tree player `p` trains against.
    pub fn tree_for(&self, p: u8) -> &BettingTree {
        match self {
            BettingTrees::Symmetric(tree) => tree,
            BettingTrees::Asymmetric(trees) => &trees[p as usize],
        }
    }
}
