//! Card-abstraction boundary.
//!
//! The solver never looks at cards; it sees opaque bucket indices from a
//! card abstraction computed elsewhere. `Buckets` is the lookup interface
//! the training walk consumes; `FileBuckets` memory-maps nothing fancy,
//! just loads the precomputed per-street tables and checks the declared
//! sizes up front.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{SolverError, SolverResult};
use crate::game::Game;

pub trait Buckets: Send + Sync {
    fn num_buckets(&self, street: u8) -> usize;

    /// Bucket of `hand` on `street`. `hand` is the street's canonical
    /// hand index from the card abstraction.
    fn bucket(&self, street: u8, hand: u32) -> u32;

    /// True when the street is unbucketed and raw hand indices address
    /// storage directly.
    fn is_none(&self, street: u8) -> bool;

    fn num_hands(&self, street: u8) -> usize;

    fn bucket_counts(&self) -> Vec<usize> {
        (0..self.max_street() + 1)
            .map(|st| self.num_buckets(st as u8))
            .collect()
    }

    fn max_street(&self) -> usize;
}

/// Per-street tables loaded from `buckets.<name>.<street>` files. Each
/// file is `[num_buckets:u32][num_hands:u64]` followed by one u32 bucket
/// per hand, little-endian.
#[derive(Debug)]
pub struct FileBuckets {
    pub name: String,
    tables: Vec<Vec<u32>>,
    num_buckets: Vec<usize>,
}

impl FileBuckets {
    /// Load one table per street. `expected_hands[street]` is the hand
    /// count the card abstraction must cover; a mismatch is fatal before
    /// any storage is allocated against the wrong shape.
    pub fn load(
        dir: &Path,
        name: &str,
        game: &Game,
        expected_hands: &[u64],
    ) -> SolverResult<FileBuckets> {
        let mut tables = Vec::with_capacity(game.num_streets);
        let mut num_buckets = Vec::with_capacity(game.num_streets);
        for street in 0..game.num_streets {
            let path = dir.join(format!("buckets.{}.{}", name, street));
            let file = File::open(&path)?;
            let mut reader = BufReader::new(file);
            let buckets = reader.read_u32::<LittleEndian>()?;
            let declared = reader.read_u64::<LittleEndian>()?;
            if declared != expected_hands[street] {
                return Err(SolverError::BucketCountMismatch {
                    path: path.display().to_string(),
                    declared,
                    expected: expected_hands[street],
                });
            }
            let mut table = vec![0u32; declared as usize];
            reader.read_u32_into::<LittleEndian>(&mut table)?;
            // Trailing garbage means the file was written for a
            // different abstraction.
            let mut probe = [0u8; 1];
            if reader.read(&mut probe)? != 0 {
                return Err(SolverError::Config(format!(
                    "{} longer than its declared {} entries",
                    path.display(),
                    declared
                )));
            }
            for (hand, &b) in table.iter().enumerate() {
                if b >= buckets {
                    return Err(SolverError::Config(format!(
                        "{}: hand {} maps to bucket {} but only {} exist",
                        path.display(),
                        hand,
                        b,
                        buckets
                    )));
                }
            }
            num_buckets.push(buckets as usize);
            tables.push(table);
        }
        Ok(FileBuckets {
            name: name.to_string(),
            tables,
            num_buckets,
        })
    }
}

impl Buckets for FileBuckets {
    fn num_buckets(&self, street: u8) -> usize {
        self.num_buckets[street as usize]
    }

    fn bucket(&self, street: u8, hand: u32) -> u32 {
        self.tables[street as usize][hand as usize]
    }

    fn is_none(&self, _street: u8) -> bool {
        false
    }

    fn num_hands(&self, street: u8) -> usize {
        self.tables[street as usize].len()
    }

    fn max_street(&self) -> usize {
        self.tables.len() - 1
    }
}

/// Identity bucketing: every hand is its own bucket. Stands in for the
/// card abstraction in tests and tiny games.
pub struct UniformBuckets {
    hands_per_street: Vec<usize>,
}

impl UniformBuckets {
    pub fn new(hands_per_street: Vec<usize>) -> UniformBuckets {
        UniformBuckets { hands_per_street }
    }
}

impl Buckets for UniformBuckets {
    fn num_buckets(&self, street: u8) -> usize {
        self.hands_per_street[street as usize]
    }

    fn bucket(&self, street: u8, hand: u32) -> u32 {
        hand % self.hands_per_street[street as usize] as u32
    }

    fn is_none(&self, _street: u8) -> bool {
        true
    }

    fn num_hands(&self, street: u8) -> usize {
        self.hands_per_street[street as usize]
    }

    fn max_street(&self) -> usize {
        self.hands_per_street.len() - 1
    }
}
