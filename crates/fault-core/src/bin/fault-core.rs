//! Command-line entry point for local smoke-testing the pipeline.
//!
//! The HTTP surface described in the service's reference interface is out
//! of scope here; this binary exists to exercise the library end-to-end
//! against a JSONL knowledge base without standing up a server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fault_core::prelude::*;
use fault_retrieve::bm25::InvertedIndex;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single query against a JSONL knowledge base using keyword (BM25) retrieval.
    Search {
        /// Path to a JSONL file of fault cases, one JSON object per line.
        #[arg(long)]
        data: PathBuf,
        /// The free-text query.
        query: String,
        #[arg(long, default_value_t = 3)]
        topn: usize,
    },
}

fn load_cases(path: &PathBuf) -> Result<Vec<FaultCase>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<FaultCase>(line).context("parsing fault case"))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Search { data, query, topn } => {
            let cases = load_cases(&data)?;
            let normalized = normalize(&query);
            tracing::info!(query = %normalized, cases = cases.len(), "running keyword search");

            let mut index = InvertedIndex::new();
            let mut by_id = std::collections::HashMap::new();
            for (i, case) in cases.iter().enumerate() {
                let tokens: Vec<String> = case.text.split_whitespace().map(str::to_string).collect();
                index.add_document(i as u32, &tokens);
                by_id.insert(i as u32, case.clone());
            }

            let query_tokens: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
            let hits = index
                .retrieve(&query_tokens, topn, Default::default())
                .map_err(|e| anyhow::anyhow!("retrieval failed: {e}"))?;

            for (rank, (doc_id, score)) in hits.into_iter().enumerate() {
                if let Some(case) = by_id.get(&doc_id) {
                    println!("{}. [{}] score={:.3} {}", rank + 1, case.id, score, case.text);
                }
            }
        }
    }

    Ok(())
}
