//! Betting-tree nodes.
//!
//! Nodes live in an arena (`Vec<Node>`) and reference successors by index,
//! so reentrant subtrees shared by several parents are just two parents
//! holding the same index. Flags are named fields in memory and only
//! packed into the 16-bit wire form at the serialization boundary.

pub type NodeIndex = u32;

/// Terminal marker for `player_acting`: showdown among all remaining
/// players rather than a single fold winner.
pub const SHOWDOWN: u8 = u8::MAX;

const FLAG_HAS_CALL: u16 = 1 << 0;
const FLAG_HAS_FOLD: u16 = 1 << 1;
const STREET_SHIFT: u16 = 3;
const STREET_MASK: u16 = 0x3 << STREET_SHIFT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Dense id: terminals index the flat terminal array; nonterminals are
    /// dense per (player, street). Assigned in the numbering pass.
    pub id: u32,
    pub street: u8,
    /// Acting player; at terminals, the sole remaining player on a fold or
    /// `SHOWDOWN`.
    pub player_acting: u8,
    pub num_remaining: u8,
    /// Cumulative bet-to after the action leading here; at terminals, the
    /// matched contribution per remaining player.
    pub last_bet_to: u16,
    pub has_call_succ: bool,
    pub has_fold_succ: bool,
    /// Ordered successors: [call?, fold?, bets by ascending bet-to].
    pub succs: Vec<NodeIndex>,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        self.succs.is_empty()
    }

    pub fn num_succs(&self) -> usize {
        self.succs.len()
    }

    pub fn call_succ_index(&self) -> Option<usize> {
        if self.has_call_succ {
            Some(0)
        } else {
            None
        }
    }

    pub fn fold_succ_index(&self) -> Option<usize> {
        if self.has_fold_succ {
            Some(self.has_call_succ as usize)
        } else {
            None
        }
    }

    /// Successor regret matching falls back to when no regret is positive.
    pub fn default_succ_index(&self) -> usize {
        self.call_succ_index().unwrap_or(0)
    }

    /// Index of the first bet successor.
    pub fn first_bet_succ_index(&self) -> usize {
        self.has_call_succ as usize + self.has_fold_succ as usize
    }

    /// Reconstruct the action string for successor `s`: "c", "f", or "bN"
    /// where N is the bet-to delta.
    pub fn action_name(&self, s: usize, arena: &[Node]) -> String {
        if Some(s) == self.call_succ_index() {
            "c".to_string()
        } else if Some(s) == self.fold_succ_index() {
            "f".to_string()
        } else {
            let child = &arena[self.succs[s] as usize];
            format!("b{}", child.last_bet_to - self.last_bet_to)
        }
    }

    /// Pack the wire flags: bit0 has-call, bit1 has-fold, bits 3-4 street.
    pub fn pack_flags(&self) -> u16 {
        let mut flags = 0u16;
        if self.has_call_succ {
            flags |= FLAG_HAS_CALL;
        }
        if self.has_fold_succ {
            flags |= FLAG_HAS_FOLD;
        }
        flags |= ((self.street as u16) << STREET_SHIFT) & STREET_MASK;
        flags
    }

    /// Unpack wire flags into (has_call, has_fold, street).
    pub fn unpack_flags(flags: u16) -> (bool, bool, u8) {
        (
            flags & FLAG_HAS_CALL != 0,
            flags & FLAG_HAS_FOLD != 0,
            ((flags & STREET_MASK) >> STREET_SHIFT) as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(street: u8, bet_to: u16, succs: Vec<NodeIndex>) -> Node {
        Node {
            id: 0,
            street,
            player_acting: 0,
            num_remaining: 2,
            last_bet_to: bet_to,
            has_call_succ: true,
            has_fold_succ: true,
            succs,
        }
    }

    #[test]
    fn successor_positions() {
        let n = decision(0, 2, vec![1, 2, 3]);
        assert_eq!(n.call_succ_index(), Some(0));
        assert_eq!(n.fold_succ_index(), Some(1));
        assert_eq!(n.first_bet_succ_index(), 2);
        assert_eq!(n.default_succ_index(), 0);
    }

    #[test]
    fn fold_only_positions() {
        let mut n = decision(0, 2, vec![1, 2]);
        n.has_call_succ = false;
        assert_eq!(n.call_succ_index(), None);
        assert_eq!(n.fold_succ_index(), Some(0));
        assert_eq!(n.default_succ_index(), 0);
    }

    #[test]
    fn flags_round_trip() {
        for street in 0..4u8 {
            for (call, fold) in [(false, false), (true, false), (false, true), (true, true)] {
                let mut n = decision(street, 0, vec![]);
                n.has_call_succ = call;
                n.has_fold_succ = fold;
                let flags = n.pack_flags();
                assert_eq!(Node::unpack_flags(flags), (call, fold, street));
            }
        }
    }

    #[test]
    fn action_names_from_deltas() {
        let child_call = decision(0, 2, vec![]);
        let child_fold = decision(0, 2, vec![]);
        let child_bet = decision(0, 6, vec![]);
        let arena = vec![child_call, child_fold, child_bet];
        let parent = decision(0, 2, vec![0, 1, 2]);
        assert_eq!(parent.action_name(0, &arena), "c");
        assert_eq!(parent.action_name(1, &arena), "f");
        assert_eq!(parent.action_name(2, &arena), "b4");
    }
}
