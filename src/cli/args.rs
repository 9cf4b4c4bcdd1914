//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Catalog graph compiler: scraped course and program records in,
/// canonical course graph out
#[derive(Parser, Debug)]
#[command(name = "catgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Optional TOML config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile records into one fully-merged graph
    Compile {
        /// Input JSONL file (scraped records, one JSON object per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Write the graph as separate collection files into this directory
        #[arg(short, long, conflicts_with = "coalesced")]
        out_dir: Option<PathBuf>,

        /// Write the graph as one coalesced JSON object to this file
        /// ("-" for stdout)
        #[arg(long)]
        coalesced: Option<PathBuf>,
    },

    /// Compile records into a per-record envelope stream (JSONL)
    Envelopes {
        /// Input JSONL file
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSONL file ("-" for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },
}
