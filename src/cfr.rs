//! The CFR walk.
//!
//! One iteration plays a single sampled deal from one target player's
//! perspective. At the target's nodes every successor is evaluated and
//! regrets move toward the counterfactual values; at opponent nodes the
//! current strategy (from regret matching) is either sampled down one
//! successor or propagated across all of them, and the strategy sums
//! accumulate toward the long-run average strategy. The two fan-out
//! variants share one walk; only the opponent branch differs.

use rand::rngs::StdRng;
use rand::Rng;

use crate::betting_tree::BettingTree;
use crate::buckets::Buckets;
use crate::cfr_config::{Algorithm, CfrConfig};
use crate::deal::Deal;
use crate::node::{Node, NodeIndex, SHOWDOWN};
use crate::regret_storage::{CfrStorage, StreetStorage};

/// Regret matching: positive regrets, normalized. With no positive
/// regret the strategy is one-hot on the default successor.
pub fn regret_match(regrets: &[f64], default_succ: usize, probs: &mut Vec<f64>) {
    probs.clear();
    let sum: f64 = regrets.iter().map(|r| r.max(0.0)).sum();
    if sum > 0.0 {
        probs.extend(regrets.iter().map(|r| r.max(0.0) / sum));
    } else {
        probs.resize(regrets.len(), 0.0);
        probs[default_succ] = 1.0;
    }
}

/// Average strategy for one (node, bucket) from accumulated strategy
/// sums; one-hot on the default successor while still untrained.
pub fn average_strategy(
    storage: &StreetStorage,
    node: &Node,
    bucket: u32,
    probs: &mut Vec<f64>,
) {
    probs.clear();
    if !storage.has_storage(node.id) {
        probs.resize(node.num_succs(), 0.0);
        probs[node.default_succ_index()] = 1.0;
        return;
    }
    let mut sums = Vec::new();
    storage.sumprob_row(node.id, bucket, &mut sums);
    let total: f64 = sums.iter().sum();
    if total > 0.0 {
        probs.extend(sums.iter().map(|s| s / total));
    } else {
        probs.resize(node.num_succs(), 0.0);
        probs[node.default_succ_index()] = 1.0;
    }
}

pub struct CfrEngine<'a> {
    tree: &'a BettingTree,
    storage: &'a CfrStorage,
    buckets: &'a dyn Buckets,
    config: &'a CfrConfig,
    algorithm: Algorithm,
}

impl<'a> CfrEngine<'a> {
    pub fn new(
        tree: &'a BettingTree,
        storage: &'a CfrStorage,
        buckets: &'a dyn Buckets,
        config: &'a CfrConfig,
    ) -> CfrEngine<'a> {
        CfrEngine {
            tree,
            storage,
            buckets,
            config,
            algorithm: config.algorithm(),
        }
    }

    /// Play one deal for `target`, updating the target's regrets and the
    /// opponents' strategy sums. Returns the deal's value to the target.
    pub fn run_iteration(
        &self,
        deal: &Deal,
        target: u8,
        iteration: u64,
        rng: &mut StdRng,
    ) -> f64 {
        self.walk(self.tree.root(), deal, target, iteration, 1.0, 0, rng)
    }

    fn walk(
        &self,
        idx: NodeIndex,
        deal: &Deal,
        target: u8,
        iteration: u64,
        opp_reach: f64,
        folded: u16,
        rng: &mut StdRng,
    ) -> f64 {
        let node = self.tree.node(idx);
        if node.is_terminal() {
            return self.terminal_value(node, deal, target, folded);
        }
        if node.player_acting == target {
            self.target_node(node, deal, target, iteration, opp_reach, folded, rng)
        } else {
            self.opponent_node(node, deal, target, iteration, opp_reach, folded, rng)
        }
    }

    fn terminal_value(&self, node: &Node, deal: &Deal, target: u8, folded: u16) -> f64 {
        let contribution = node.last_bet_to as f64;
        if node.player_acting != SHOWDOWN {
            // Fold terminal: one player left standing.
            return if node.player_acting == target {
                contribution
            } else {
                -contribution
            };
        }
        if folded & (1 << target) != 0 {
            return -contribution;
        }
        let ours = deal.rank(target);
        let mut best_other = None;
        for p in 0..deal.num_players() as u8 {
            if p != target && folded & (1 << p) == 0 {
                let r = deal.rank(p);
                best_other = Some(best_other.map_or(r, |b: u32| b.max(r)));
            }
        }
        match best_other {
            Some(best) if ours > best => contribution,
            Some(best) if ours < best => -contribution,
            _ => 0.0,
        }
    }

    fn current_strategy(&self, node: &Node, bucket: u32, probs: &mut Vec<f64>) {
        let storage = self.storage.street(node.player_acting, node.street);
        if storage.has_storage(node.id) {
            let mut regrets = Vec::new();
            storage.regret_row(node.id, bucket, &mut regrets);
            regret_match(&regrets, node.default_succ_index(), probs);
        } else {
            probs.clear();
            probs.resize(node.num_succs(), 0.0);
            probs[node.default_succ_index()] = 1.0;
        }
    }

    fn succ_folded(&self, node: &Node, succ: usize, folded: u16) -> u16 {
        if Some(succ) == node.fold_succ_index() {
            folded | (1 << node.player_acting)
        } else {
            folded
        }
    }

    fn target_node(
        &self,
        node: &Node,
        deal: &Deal,
        target: u8,
        iteration: u64,
        opp_reach: f64,
        folded: u16,
        rng: &mut StdRng,
    ) -> f64 {
        let street = node.street;
        let bucket = self.buckets.bucket(street, deal.hand(target, street));
        let mut probs = Vec::new();
        self.current_strategy(node, bucket, &mut probs);

        let n = node.num_succs();
        let mut vals = vec![0.0; n];
        for s in 0..n {
            let next_folded = self.succ_folded(node, s, folded);
            vals[s] = self.walk(
                node.succs[s],
                deal,
                target,
                iteration,
                opp_reach,
                next_folded,
                rng,
            );
        }
        let value: f64 = probs.iter().zip(vals.iter()).map(|(p, v)| p * v).sum();

        let storage = self.storage.street(target, street);
        if storage.has_storage(node.id) && opp_reach >= self.config.prune_threshold(street) {
            let scale = self.config.regret_scale(street);
            for s in 0..n {
                storage.add_regret(node.id, bucket, s, (vals[s] - value) * scale);
            }
        }
        value
    }

    fn opponent_node(
        &self,
        node: &Node,
        deal: &Deal,
        target: u8,
        iteration: u64,
        opp_reach: f64,
        folded: u16,
        rng: &mut StdRng,
    ) -> f64 {
        let street = node.street;
        let player = node.player_acting;
        let bucket = self.buckets.bucket(street, deal.hand(player, street));
        let mut probs = Vec::new();
        self.current_strategy(node, bucket, &mut probs);

        let storage = self.storage.street(player, street);
        let weight = self
            .config
            .sumprob_weight(iteration)
            .map(|w| w * self.config.sumprob_scale(street));
        let update = storage.has_storage(node.id)
            && opp_reach >= self.config.prune_threshold(street);

        match self.algorithm {
            Algorithm::OutcomeSampling => {
                let s = sample_succ(&probs, rng);
                if update {
                    if let Some(w) = weight {
                        storage.add_sumprob(node.id, bucket, s, w);
                    }
                }
                let next_folded = self.succ_folded(node, s, folded);
                self.walk(
                    node.succs[s],
                    deal,
                    target,
                    iteration,
                    opp_reach,
                    next_folded,
                    rng,
                )
            }
            Algorithm::VectorReach => {
                let n = node.num_succs();
                let mut value = 0.0;
                for s in 0..n {
                    let next_folded = self.succ_folded(node, s, folded);
                    let val = self.walk(
                        node.succs[s],
                        deal,
                        target,
                        iteration,
                        opp_reach * probs[s],
                        next_folded,
                        rng,
                    );
                    value += probs[s] * val;
                    if update {
                        if let Some(w) = weight {
                            storage.add_sumprob(node.id, bucket, s, probs[s] * opp_reach * w);
                        }
                    }
                }
                value
            }
        }
    }
}

fn sample_succ(probs: &[f64], rng: &mut StdRng) -> usize {
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (s, p) in probs.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return s;
        }
    }
    probs.len() - 1
}
