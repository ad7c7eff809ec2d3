pub mod betting_abstraction;
pub mod betting_tree;
pub mod buckets;
pub mod cfr;
pub mod cfr_config;
pub mod cli;
pub mod deal;
pub mod error;
pub mod game;
pub mod node;
pub mod regret_storage;
pub mod trainer;
pub mod tree_builder;
pub mod tree_io;
