//! Binary tree interchange format.
//!
//! Trees are flattened depth-first pre-order. Each node is a fixed
//! 12-byte little-endian record followed by its children:
//!
//! ```text
//! [id:u32][lastBetTo:u16][numSuccs:u16][flags:u16][playerActing:u8][numRemaining:u8]
//! ```
//!
//! A shared (reentrant) nonterminal is written in full on first visit;
//! later visits repeat the record with the children omitted. The reader
//! keys nonterminals by (street, player, id) and resolves a repeat to the
//! node built on first sight, so sharing survives the round trip as
//! identity, not as duplicated subtrees.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::betting_tree::BettingTree;
use crate::error::{SolverError, SolverResult};
use crate::game::Game;
use crate::node::{Node, NodeIndex};

pub fn write_tree(tree: &BettingTree, path: &Path) -> SolverResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut written = HashSet::new();
    write_subtree(tree, tree.root(), &mut written, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn write_subtree<W: Write>(
    tree: &BettingTree,
    idx: NodeIndex,
    written: &mut HashSet<NodeIndex>,
    writer: &mut W,
) -> SolverResult<()> {
    let node = tree.node(idx);
    let first_visit = written.insert(idx);
    let num_succs = if first_visit { node.num_succs() } else { 0 };

    writer.write_u32::<LittleEndian>(node.id)?;
    writer.write_u16::<LittleEndian>(node.last_bet_to)?;
    writer.write_u16::<LittleEndian>(num_succs as u16)?;
    writer.write_u16::<LittleEndian>(node.pack_flags())?;
    writer.write_u8(node.player_acting)?;
    writer.write_u8(node.num_remaining)?;

    if first_visit {
        for &succ in &node.succs {
            write_subtree(tree, succ, written, writer)?;
        }
    }
    Ok(())
}

pub fn read_tree(path: &Path, game: &Game) -> SolverResult<BettingTree> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut arena = Vec::new();
    let mut seen = HashMap::new();
    let root = read_subtree(&mut reader, &mut arena, &mut seen)?;
    Ok(BettingTree::new(arena, root, game))
}

/// Memo key for shared-node resolution on read. Terminals are written
/// exactly once so only nonterminals are recorded.
type SeenKey = (u8, u8, u32);

fn read_subtree<R: Read>(
    reader: &mut R,
    arena: &mut Vec<Node>,
    seen: &mut HashMap<SeenKey, NodeIndex>,
) -> SolverResult<NodeIndex> {
    let id = reader.read_u32::<LittleEndian>()?;
    let last_bet_to = reader.read_u16::<LittleEndian>()?;
    let num_succs = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let player_acting = reader.read_u8()?;
    let num_remaining = reader.read_u8()?;
    let (has_call_succ, has_fold_succ, street) = Node::unpack_flags(flags);

    if num_succs == 0 && (has_call_succ || has_fold_succ) {
        // A repeated shared node: the record carries its decision flags
        // but omits the children. Resolve it to the first occurrence.
        let key = (street, player_acting, id);
        return seen.get(&key).copied().ok_or_else(|| {
            SolverError::TreeFormat(format!(
                "childless record for unseen nonterminal id {} (street {}, player {})",
                id, street, player_acting
            ))
        });
    }

    let idx = arena.len() as NodeIndex;
    arena.push(Node {
        id,
        street,
        player_acting,
        num_remaining,
        last_bet_to,
        has_call_succ,
        has_fold_succ,
        succs: Vec::with_capacity(num_succs as usize),
    });
    if num_succs > 0 {
        seen.insert((street, player_acting, id), idx);
        for _ in 0..num_succs {
            let succ = read_subtree(reader, arena, seen)?;
            arena[idx as usize].succs.push(succ);
        }
    }
    Ok(idx)
}
