use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use serde::Serialize;
use shieldpool_config::ShieldpoolConfig;
use shieldpool_privacy::field::{field_from_decimal, field_to_decimal};
use shieldpool_privacy::{
    CircomPoseidon, FieldElement, MerkleProof, TreeParams, TriadMerkleTree, verify_merkle_path,
};

use crate::print_json;

/// Snapshot file and the parameters it must have
#[derive(Args, Debug, Default)]
pub struct TreeLocation {
    /// Snapshot file (defaults to storage.tree_path)
    #[arg(long)]
    pub tree: Option<PathBuf>,
    /// Tree depth (defaults to tree.depth)
    #[arg(long)]
    pub depth: Option<usize>,
    /// Decimal empty-leaf value (defaults to tree.zero_value)
    #[arg(long)]
    pub zero_value: Option<String>,
}

impl TreeLocation {
    fn path(&self, config: &ShieldpoolConfig) -> PathBuf {
        self.tree
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.storage.tree_path))
    }

    fn params(&self, config: &ShieldpoolConfig) -> Result<TreeParams> {
        let zero_value = self.zero_value.as_deref().unwrap_or(&config.tree.zero_value);
        Ok(TreeParams {
            depth: self.depth.unwrap_or(config.tree.depth),
            zero_value: field_from_decimal(zero_value).context("Invalid zero value")?,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum TreeCommand {
    /// Create an empty tree snapshot
    Init {
        #[command(flatten)]
        location: TreeLocation,
        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },
    /// Append one triad of decimal commitments
    Insert {
        #[command(flatten)]
        location: TreeLocation,
        #[arg(num_args = 3, required = true)]
        leaves: Vec<String>,
    },
    /// Print the current root
    Root {
        #[command(flatten)]
        location: TreeLocation,
    },
    /// Print the inclusion proof for a leaf
    Proof {
        #[command(flatten)]
        location: TreeLocation,
        leaf_index: u64,
        /// Print the flattened circuit inputs instead
        #[arg(long)]
        circuit: bool,
    },
    /// Check a proof file produced by `tree proof`
    Verify {
        /// Proof JSON file
        proof: PathBuf,
    },
}

#[derive(Serialize)]
struct InsertView {
    first_leaf_index: u64,
    root: String,
    triads: u64,
}

pub fn run(cmd: TreeCommand, config: &ShieldpoolConfig) -> Result<()> {
    match cmd {
        TreeCommand::Init { location, force } => {
            let path = location.path(config);
            if path.exists() && !force {
                bail!(
                    "Tree {} already exists. Pass --force to overwrite.",
                    path.display()
                );
            }

            let params = location.params(config)?;
            let tree =
                TriadMerkleTree::new(params.depth, params.zero_value, CircomPoseidon::new())?;
            save(&tree, &path, config)?;
            log::info!("created depth {} tree at {}", params.depth, path.display());
            println!("{}", field_to_decimal(&tree.root()));
            Ok(())
        }
        TreeCommand::Insert { location, leaves } => {
            let path = location.path(config);
            let mut tree = load(&location, config)?;

            let mut triad = [FieldElement::from(0u64); 3];
            for (slot, leaf) in triad.iter_mut().zip(&leaves) {
                *slot = field_from_decimal(leaf)
                    .with_context(|| format!("Invalid commitment '{leaf}'"))?;
            }

            let first_leaf_index = tree.insert_batch(triad)?;
            save(&tree, &path, config)?;
            print_json(&InsertView {
                first_leaf_index,
                root: field_to_decimal(&tree.root()),
                triads: tree.triad_count(),
            })
        }
        TreeCommand::Root { location } => {
            let tree = load(&location, config)?;
            println!("{}", field_to_decimal(&tree.root()));
            Ok(())
        }
        TreeCommand::Proof {
            location,
            leaf_index,
            circuit,
        } => {
            let tree = load(&location, config)?;
            let proof = tree.gen_merkle_path(leaf_index)?;
            if circuit {
                print_json(&proof.circuit_inputs())
            } else {
                print_json(&proof)
            }
        }
        TreeCommand::Verify { proof } => {
            let data = fs::read_to_string(&proof)
                .with_context(|| format!("Failed to read proof file: {}", proof.display()))?;
            let proof: MerkleProof =
                serde_json::from_str(&data).context("Failed to parse proof")?;

            if verify_merkle_path(&proof, &CircomPoseidon::new()) {
                println!("valid");
                Ok(())
            } else {
                bail!("proof does not match root {}", field_to_decimal(&proof.root))
            }
        }
    }
}

/// Load a snapshot, failing unless it has the expected depth and zero value
fn load(location: &TreeLocation, config: &ShieldpoolConfig) -> Result<TriadMerkleTree> {
    let path = location.path(config);
    let params = location.params(config)?;
    TriadMerkleTree::load_expecting(&path, params, CircomPoseidon::new())
        .with_context(|| format!("Failed to load tree: {}", path.display()))
}

fn save(tree: &TriadMerkleTree, path: &Path, config: &ShieldpoolConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    tree.save(path, config.tree.compressed)
        .with_context(|| format!("Failed to save tree: {}", path.display()))
}
