//! Command-line entry points.
//!
//! Two real commands: `build-tree` turns parameter files into a binary
//! betting-tree file, `train` runs CFR batches against checkpointed
//! storage. `tree-stats` is a convenience reader over the binary format.
//! All fatal paths print a diagnostic to stderr and exit -1.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use itertools::Itertools;

use crate::betting_abstraction::BettingAbstraction;
use crate::betting_tree::BettingTrees;
use crate::buckets::{Buckets, FileBuckets, UniformBuckets};
use crate::cfr_config::CfrConfig;
use crate::deal::UniformDealSampler;
use crate::error::SolverResult;
use crate::game::Game;
use crate::regret_storage::CheckpointMeta;
use crate::trainer::Trainer;
use crate::tree_builder::TreeBuilder;
use crate::tree_io::{read_tree, write_tree};

#[derive(Parser)]
#[command(
    name = "blueprint",
    version = "1.0.0",
    about = "CFR blueprint solver — betting-tree construction and batch training."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a betting tree from parameter files and write it out
    BuildTree {
        /// Game parameter file (JSON)
        #[arg(short, long)]
        game: PathBuf,
        /// Betting abstraction file (JSON)
        #[arg(short, long)]
        betting_abstraction: PathBuf,
        /// Output tree file
        #[arg(short, long)]
        output: PathBuf,
        /// Target player for asymmetric abstractions
        #[arg(short, long, default_value = "0")]
        target_player: u8,
    },
    /// Print node counts for a tree file
    TreeStats {
        /// Game parameter file (JSON)
        #[arg(short, long)]
        game: PathBuf,
        /// Tree file written by build-tree
        tree: PathBuf,
    },
    /// Run CFR training batches
    Train {
        /// Game parameter file (JSON)
        #[arg(short, long)]
        game: PathBuf,
        /// Betting abstraction file (JSON)
        #[arg(short, long)]
        betting_abstraction: PathBuf,
        /// CFR configuration file (JSON)
        #[arg(short, long)]
        cfr_config: PathBuf,
        /// Card abstraction name; "none" uses unbucketed hands
        #[arg(long, default_value = "none")]
        card_abstraction: String,
        /// Directory holding bucket files (required unless "none")
        #[arg(long)]
        bucket_dir: Option<PathBuf>,
        /// Canonical hand count per street, comma separated
        #[arg(long, value_delimiter = ',')]
        num_hands: Vec<u64>,
        /// Checkpoint directory
        #[arg(long)]
        checkpoint_dir: PathBuf,
        /// Worker threads
        #[arg(short = 'j', long, default_value = "1")]
        threads: usize,
        /// First batch to run; nonzero resumes from a checkpoint
        #[arg(long, default_value = "0")]
        start_batch: u64,
        /// One past the last batch to run
        #[arg(long)]
        end_batch: u64,
    },
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        print_error(&e.to_string());
        process::exit(-1);
    }
}

fn dispatch(cli: Cli) -> SolverResult<()> {
    match cli.command {
        Commands::BuildTree {
            game,
            betting_abstraction,
            output,
            target_player,
        } => {
            let game = Game::load(&game)?;
            let abs = BettingAbstraction::load(&betting_abstraction, game.num_streets)?;
            let tree = TreeBuilder::build(&game, &abs, target_player)?;
            write_tree(&tree, &output)?;
            eprintln!(
                "wrote {}: {} nodes, {} terminals",
                output.display(),
                tree.arena().len(),
                tree.num_terminals()
            );
            Ok(())
        }
        Commands::TreeStats { game, tree } => {
            let game = Game::load(&game)?;
            let tree = read_tree(&tree, &game)?;
            println!(
                "{} nodes, {} terminals",
                tree.arena().len(),
                tree.num_terminals()
            );
            for (player, street) in
                (0..game.num_players as u8).cartesian_product(0..game.num_streets as u8)
            {
                println!(
                    "player {} street {}: {} decision nodes",
                    player,
                    street,
                    tree.nonterminal_count(player, street)
                );
            }
            Ok(())
        }
        Commands::Train {
            game,
            betting_abstraction,
            cfr_config,
            card_abstraction,
            bucket_dir,
            num_hands,
            checkpoint_dir,
            threads,
            start_batch,
            end_batch,
        } => {
            let game = Game::load(&game)?;
            let abs = BettingAbstraction::load(&betting_abstraction, game.num_streets)?;
            let config = CfrConfig::load(&cfr_config, &game)?;
            if num_hands.len() != game.num_streets {
                return Err(crate::error::SolverError::Config(format!(
                    "--num-hands needs one entry per street ({})",
                    game.num_streets
                )));
            }

            let buckets: Box<dyn Buckets> = if card_abstraction == "none" {
                Box::new(UniformBuckets::new(
                    num_hands.iter().map(|&n| n as usize).collect(),
                ))
            } else {
                let dir = bucket_dir.ok_or_else(|| {
                    crate::error::SolverError::Config(
                        "--bucket-dir is required with a card abstraction".to_string(),
                    )
                })?;
                Box::new(FileBuckets::load(&dir, &card_abstraction, &game, &num_hands)?)
            };

            let trees = BettingTrees::build(&game, &abs)?;
            let hands_per_street: Vec<usize> =
                num_hands.iter().map(|&n| n as usize).collect();
            let rank_space = hands_per_street.last().copied().unwrap_or(1) as u32;
            let sampler =
                UniformDealSampler::new(game.num_players, hands_per_street, rank_space.max(1));
            let meta = CheckpointMeta::new(
                &checkpoint_dir,
                &game,
                &card_abstraction,
                &abs.name,
                &config.name,
            );
            let trainer = Trainer::new(
                &game,
                &trees,
                buckets.as_ref(),
                &config,
                &sampler,
                meta,
                threads,
            );
            trainer.train(start_batch, end_batch)?;
            print_root_strategy(&trees, &trainer);
            Ok(())
        }
    }
}

/// Post-run summary: the learned average strategy at the root, bucket 0.
fn print_root_strategy(trees: &BettingTrees, trainer: &Trainer) {
    let tree = trees.tree_for(0);
    let root = tree.node(tree.root());
    let storage = trainer.storages()[0].street(root.player_acting, root.street);
    let mut probs = Vec::new();
    crate::cfr::average_strategy(storage, root, 0, &mut probs);
    let summary = probs
        .iter()
        .enumerate()
        .map(|(s, p)| format!("{}={:.3}", root.action_name(s, tree.arena()), p))
        .collect::<Vec<_>>()
        .join(" ");
    eprintln!("root average strategy (bucket 0): {}", summary);
}
