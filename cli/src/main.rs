mod keys;
mod output;
mod tree;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shieldpool_config::ShieldpoolConfig;

#[derive(Parser, Debug)]
#[command(name = "shieldpool")]
#[command(about = "Shielded pool keys, secrets and commitment tree")]
struct Cli {
    /// Config file (defaults to SP_CONFIG, ./shieldpool.toml, ~/.shieldpool/shieldpool.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive root keys from a wallet signature, or generate random ones
    Keygen(keys::KeygenArgs),
    /// Print the shielded address for a wallet signature
    Address(keys::SignatureArgs),
    /// Encrypt a secret to an address's reading key
    Encrypt(output::EncryptArgs),
    /// Decrypt a secret with the wallet's reading key
    Decrypt(output::DecryptArgs),
    /// Create or recover shielded outputs
    #[command(subcommand)]
    Output(output::OutputCommand),
    /// Nullifier of a recovered output at a tree position
    Nullifier(output::NullifierArgs),
    /// Manage the commitment tree snapshot
    #[command(subcommand)]
    Tree(tree::TreeCommand),
    /// Print a sample config file
    Config,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ShieldpoolConfig::load_from(path)?,
        None => ShieldpoolConfig::load()?,
    };
    log::debug!("using config {config:?}");

    match cli.command {
        Command::Keygen(args) => keys::keygen(&args, &config),
        Command::Address(args) => keys::address(&args),
        Command::Encrypt(args) => output::encrypt(&args),
        Command::Decrypt(args) => output::decrypt(&args),
        Command::Output(cmd) => output::run(cmd),
        Command::Nullifier(args) => output::nullifier(&args),
        Command::Tree(cmd) => tree::run(cmd, &config),
        Command::Config => {
            print!("{}", ShieldpoolConfig::generate_sample());
            Ok(())
        }
    }
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tree_insert() {
        let cli = Cli::try_parse_from(["shieldpool", "tree", "insert", "1", "2", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Tree(_)));
    }
}
