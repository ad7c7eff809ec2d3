//! Simulated deals.
//!
//! A `Deal` is everything card-dependent one self-play hand needs: each
//! player's canonical hand index per street (bucketed through the card
//! abstraction at lookup time) and a comparable showdown rank per player.
//! Board canonicalization and real hand evaluation live outside the
//! solver; `UniformDealSampler` is the built-in stand-in that draws
//! independent uniform hands, which is exact for abstract test games.

use rand::rngs::StdRng;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct Deal {
    /// Hand index per player per street.
    hands: Vec<Vec<u32>>,
    /// Showdown rank per player; higher wins, equal splits.
    ranks: Vec<u32>,
}

impl Deal {
    pub fn new(hands: Vec<Vec<u32>>, ranks: Vec<u32>) -> Deal {
        Deal { hands, ranks }
    }

    pub fn hand(&self, player: u8, street: u8) -> u32 {
        self.hands[player as usize][street as usize]
    }

    pub fn rank(&self, player: u8) -> u32 {
        self.ranks[player as usize]
    }

    pub fn num_players(&self) -> usize {
        self.hands.len()
    }
}

pub trait DealSampler: Send + Sync {
    fn sample(&self, rng: &mut StdRng) -> Deal;
}

pub struct UniformDealSampler {
    num_players: usize,
    hands_per_street: Vec<usize>,
    num_ranks: u32,
}

impl UniformDealSampler {
    pub fn new(num_players: usize, hands_per_street: Vec<usize>, num_ranks: u32) -> UniformDealSampler {
        UniformDealSampler {
            num_players,
            hands_per_street,
            num_ranks,
        }
    }
}

impl DealSampler for UniformDealSampler {
    fn sample(&self, rng: &mut StdRng) -> Deal {
        let hands = (0..self.num_players)
            .map(|_| {
                self.hands_per_street
                    .iter()
                    .map(|&n| rng.gen_range(0..n as u32))
                    .collect()
            })
            .collect();
        let ranks = (0..self.num_players)
            .map(|_| rng.gen_range(0..self.num_ranks))
            .collect();
        Deal::new(hands, ranks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn sampled_deals_are_in_range() {
        let sampler = UniformDealSampler::new(3, vec![6, 10], 100);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let deal = sampler.sample(&mut rng);
            assert_eq!(deal.num_players(), 3);
            for p in 0..3 {
                assert!(deal.hand(p, 0) < 6);
                assert!(deal.hand(p, 1) < 10);
                assert!(deal.rank(p) < 100);
            }
        }
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let sampler = UniformDealSampler::new(2, vec![6], 10);
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let da = sampler.sample(&mut a);
            let db = sampler.sample(&mut b);
            assert_eq!(da.hand(0, 0), db.hand(0, 0));
            assert_eq!(da.rank(1), db.rank(1));
        }
    }
}
