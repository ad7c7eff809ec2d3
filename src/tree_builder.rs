//! Recursive betting-tree construction.
//!
//! `TreeBuilder` turns a `Game` plus `BettingAbstraction` into a node
//! arena, one (street, bet-count, bet-to, acting-player) state at a time.
//! Candidate bet-to amounts are collected into an ordered seen-set so the
//! successor list comes out [call?, fold?, bets ascending] and identical
//! configurations always produce identical trees. On reentrant streets,
//! structurally-equivalent states probe a memo and share the subtree built
//! on first visit, which bounds multiplayer tree growth.

use std::collections::{BTreeSet, HashMap};

use crate::betting_abstraction::BettingAbstraction;
use crate::betting_tree::BettingTree;
use crate::error::{SolverError, SolverResult};
use crate::game::Game;
use crate::node::{Node, NodeIndex, SHOWDOWN};

/// Betting state passed down the recursion. `folded` is a seat bitmask;
/// `num_players_to_act` counts the remaining seats that still owe a
/// response before the street closes.
#[derive(Debug, Clone, Copy)]
struct BetState {
    street: u8,
    last_bet_size: u32,
    bet_to: u32,
    num_street_bets: u32,
    num_bets: u32,
    player_acting: u8,
    num_players_to_act: u8,
    folded: u16,
}

/// Memo key for reentrant states: everything that determines the shape of
/// the subtree below. The raw action history is deliberately absent —
/// merging histories that reach the same state is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReentrantKey {
    street: u8,
    player_acting: u8,
    num_street_bets: u32,
    bet_to: u32,
    last_bet_size: u32,
    folded: u16,
    num_players_to_act: u8,
}

impl ReentrantKey {
    fn from_state(s: &BetState) -> ReentrantKey {
        ReentrantKey {
            street: s.street,
            player_acting: s.player_acting,
            num_street_bets: s.num_street_bets,
            bet_to: s.bet_to,
            last_bet_size: s.last_bet_size,
            folded: s.folded,
            num_players_to_act: s.num_players_to_act,
        }
    }
}

pub struct TreeBuilder<'a> {
    game: &'a Game,
    abs: &'a BettingAbstraction,
    /// Player whose perspective is "our" in asymmetric abstractions.
    target_player: u8,
    arena: Vec<Node>,
    reentrant: HashMap<ReentrantKey, NodeIndex>,
}

impl<'a> TreeBuilder<'a> {
    /// Build the full tree for one target player and run the numbering
    /// pass. Construction is single-threaded and deterministic.
    pub fn build(
        game: &'a Game,
        abs: &'a BettingAbstraction,
        target_player: u8,
    ) -> SolverResult<BettingTree> {
        let mut builder = TreeBuilder {
            game,
            abs,
            target_player,
            arena: Vec::new(),
            reentrant: HashMap::new(),
        };
        let initial = BetState {
            street: 0,
            // The small blind faces the difference between the blinds.
            last_bet_size: game.big_blind - game.small_blind,
            bet_to: game.big_blind,
            num_street_bets: 0,
            num_bets: 0,
            player_acting: game.first_to_act(0, 0),
            // The big blind's post counts as having acted.
            num_players_to_act: (game.num_players - 1) as u8,
            folded: 0,
        };
        let root = builder.build_subtree(&initial)?;
        Ok(BettingTree::new(builder.arena, root, game))
    }

    fn num_remaining(&self, folded: u16) -> usize {
        self.game.num_players - folded.count_ones() as usize
    }

    fn build_subtree(&mut self, s: &BetState) -> SolverResult<NodeIndex> {
        let num_remaining = self.num_remaining(s.folded);

        let reentrant = self.abs.is_reentrant(s.street)
            && 2 * s.bet_to >= self.abs.min_reentrant_pot
            && s.num_bets >= self.abs.reentrant_bet_floor(s.street, num_remaining);
        let key = ReentrantKey::from_state(s);
        if reentrant {
            if let Some(&idx) = self.reentrant.get(&key) {
                return Ok(idx);
            }
        }

        let mut succs = Vec::new();
        let has_call = if self.open_limp_blocked(s) {
            false
        } else {
            succs.push(self.build_call_succ(s, num_remaining)?);
            true
        };
        let has_fold = if self.fold_allowed(s) {
            succs.push(self.build_fold_succ(s, num_remaining)?);
            true
        } else {
            false
        };
        for bet_to in self.bet_candidates(s) {
            succs.push(self.build_bet_succ(s, bet_to, num_remaining)?);
        }

        if succs.is_empty() {
            return Err(SolverError::TreeBuild(format!(
                "zero-successor nonterminal: street {} player {} bet_to {} street_bets {}",
                s.street, s.player_acting, s.bet_to, s.num_street_bets
            )));
        }

        let idx = self.push_node(Node {
            id: u32::MAX,
            street: s.street,
            player_acting: s.player_acting,
            num_remaining: num_remaining as u8,
            last_bet_to: s.bet_to as u16,
            has_call_succ: has_call,
            has_fold_succ: has_fold,
            succs,
        })?;
        if reentrant {
            self.reentrant.insert(key, idx);
        }
        Ok(idx)
    }

    fn open_limp_blocked(&self, s: &BetState) -> bool {
        self.abs.no_open_limp && s.street == 0 && s.num_street_bets == 0
    }

    /// Folding is legal when facing a bet, or at the opening street for
    /// everyone except the big blind (who already has the bet matched).
    fn fold_allowed(&self, s: &BetState) -> bool {
        s.num_street_bets > 0
            || (s.street == 0 && s.player_acting != self.game.big_blind_seat())
    }

    fn build_call_succ(&mut self, s: &BetState, num_remaining: usize) -> SolverResult<NodeIndex> {
        if s.num_players_to_act == 1 {
            // This call closes the street.
            self.street_completed(s, s.folded, num_remaining)
        } else {
            let next = BetState {
                player_acting: self.game.next_to_act(s.player_acting, s.folded),
                num_players_to_act: s.num_players_to_act - 1,
                ..*s
            };
            self.build_subtree(&next)
        }
    }

    fn build_fold_succ(&mut self, s: &BetState, num_remaining: usize) -> SolverResult<NodeIndex> {
        let folded = s.folded | (1 << s.player_acting);
        if num_remaining == 2 {
            // One player left: they take the pot.
            let winner = self.sole_remaining(folded);
            let contribution = s.bet_to - s.last_bet_size;
            return self.push_terminal(s.street, winner, 1, contribution);
        }
        if s.num_players_to_act == 1 {
            // The folder was last to act; everyone left has matched.
            self.street_completed(s, folded, num_remaining - 1)
        } else {
            let next = BetState {
                player_acting: self.game.next_to_act(s.player_acting, folded),
                num_players_to_act: s.num_players_to_act - 1,
                folded,
                ..*s
            };
            self.build_subtree(&next)
        }
    }

    /// The street's action is settled at `bet_to`. Advance to the next
    /// street, or terminate at a showdown when no decisions remain.
    fn street_completed(
        &mut self,
        s: &BetState,
        folded: u16,
        num_remaining: usize,
    ) -> SolverResult<NodeIndex> {
        let all_in = s.bet_to == self.game.stack_size;
        if s.street == self.game.max_street() || all_in {
            return self.push_terminal(s.street, SHOWDOWN, num_remaining as u8, s.bet_to);
        }
        let street = s.street + 1;
        let next = BetState {
            street,
            last_bet_size: 0,
            bet_to: s.bet_to,
            num_street_bets: 0,
            num_bets: s.num_bets,
            player_acting: self.game.first_to_act(street, folded),
            num_players_to_act: num_remaining as u8,
            folded,
        };
        self.build_subtree(&next)
    }

    fn build_bet_succ(
        &mut self,
        s: &BetState,
        bet_to: u32,
        num_remaining: usize,
    ) -> SolverResult<NodeIndex> {
        let next = BetState {
            street: s.street,
            last_bet_size: bet_to - s.bet_to,
            bet_to,
            num_street_bets: s.num_street_bets + 1,
            num_bets: s.num_bets + 1,
            player_acting: self.game.next_to_act(s.player_acting, s.folded),
            num_players_to_act: (num_remaining - 1) as u8,
            folded: s.folded,
        };
        self.build_subtree(&next)
    }

    /// Enumerate surviving bet-to amounts for this state, ascending.
    fn bet_candidates(&self, s: &BetState) -> Vec<u32> {
        let our = s.player_acting == self.target_player;
        let max_bets = self.abs.max_bets(s.street, our);
        if s.num_street_bets >= max_bets {
            return Vec::new();
        }

        let stack = self.game.stack_size;
        let pot = 2 * s.bet_to;
        let mut seen: BTreeSet<u32> = BTreeSet::new();

        if self.abs.is_always_all_in(s.street, s.num_street_bets) {
            seen.insert(stack);
        }
        if self.abs.is_always_min_bet(s.street, s.num_street_bets) {
            let increment = self.game.min_bet.max(s.last_bet_size);
            let candidate = s.bet_to + increment;
            seen.insert(if candidate >= stack { stack } else { candidate });
        }

        if self.abs.geometric {
            if let Some(candidate) = self.geometric_bet_to(s.street, s.bet_to) {
                seen.insert(self.shape_candidate(candidate, pot, stack));
            }
        } else if self.abs.only_pot_threshold > 0 && pot >= self.abs.only_pot_threshold {
            // Past the cutoff only the pot bet and all-in are offered.
            seen.insert(self.shape_candidate(s.bet_to + pot, pot, stack));
            seen.insert(stack);
        } else {
            for &frac in self.abs.bet_fracs(s.street, s.num_street_bets, our) {
                let candidate = s.bet_to + (frac * pot as f64).round() as u32;
                seen.insert(self.shape_candidate(candidate, pot, stack));
            }
        }

        seen.into_iter()
            .filter(|&bet_to| self.bet_survives(s, bet_to))
            .collect()
    }

    /// Snap a raw candidate to all-in when close to or past the stack,
    /// then remap onto the allow-list.
    fn shape_candidate(&self, candidate: u32, pot: u32, stack: u32) -> u32 {
        let frac = self.abs.close_to_all_in_frac;
        if candidate >= stack || (frac > 0.0 && candidate as f64 >= frac * stack as f64) {
            return stack;
        }
        let snapped = self.abs.snap_to_allowed(candidate, pot);
        snapped.min(stack)
    }

    /// Bet-to that grows the pot by an equal multiple on every remaining
    /// street, reaching all-in on the last one.
    fn geometric_bet_to(&self, street: u8, bet_to: u32) -> Option<u32> {
        let stack = self.game.stack_size;
        if bet_to >= stack {
            return None;
        }
        let streets_left = (self.game.max_street() - street + 1) as f64;
        let multiplier = (stack as f64 / bet_to as f64).powf(1.0 / streets_left);
        Some((bet_to as f64 * multiplier).round() as u32)
    }

    fn bet_survives(&self, s: &BetState, bet_to: u32) -> bool {
        if bet_to <= s.bet_to {
            return false;
        }
        if bet_to == self.game.stack_size {
            return true;
        }
        let bet_size = bet_to - s.bet_to;
        bet_size >= self.game.min_bet && bet_size >= s.last_bet_size
    }

    fn push_terminal(
        &mut self,
        street: u8,
        player_remaining: u8,
        num_remaining: u8,
        contribution: u32,
    ) -> SolverResult<NodeIndex> {
        self.push_node(Node {
            id: u32::MAX,
            street,
            player_acting: player_remaining,
            num_remaining,
            last_bet_to: contribution as u16,
            has_call_succ: false,
            has_fold_succ: false,
            succs: Vec::new(),
        })
    }

    fn push_node(&mut self, node: Node) -> SolverResult<NodeIndex> {
        let idx = self.arena.len();
        if idx > u32::MAX as usize {
            return Err(SolverError::TreeBuild("node arena overflow".to_string()));
        }
        self.arena.push(node);
        Ok(idx as u32)
    }

    fn sole_remaining(&self, folded: u16) -> u8 {
        for seat in 0..self.game.num_players {
            if folded & (1 << seat) == 0 {
                return seat as u8;
            }
        }
        unreachable!("fold terminal with no remaining player")
    }
}
