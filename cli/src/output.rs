use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use shieldpool_privacy::field::{field_to_decimal, scalar_to_decimal, secret_from_decimal};
use shieldpool_privacy::{
    CircomPoseidon, RecoveredOutput, Scalar, SecretCiphertext, ShieldedAddress, create_output,
    decrypt_secret, encrypt_secret, recover_output,
};

use crate::keys::SignatureArgs;
use crate::print_json;

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Secret as a decimal scalar (0 allowed)
    #[arg(long)]
    pub secret: String,

    /// Recipient shielded address (hex)
    #[arg(long)]
    pub to: String,
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// 64-byte ciphertext (hex)
    #[arg(long)]
    pub ciphertext: String,

    #[command(flatten)]
    pub wallet: SignatureArgs,
}

#[derive(Subcommand, Debug)]
pub enum OutputCommand {
    /// Create an output paying an address
    Create {
        /// Recipient shielded address (hex)
        #[arg(long)]
        to: String,
    },
    /// Recover an output addressed to this wallet
    Recover(DecryptArgs),
}

#[derive(Args, Debug)]
pub struct NullifierArgs {
    #[command(flatten)]
    pub output: DecryptArgs,

    /// Position of the output's commitment in the tree
    #[arg(long)]
    pub leaf_index: u64,
}

#[derive(Serialize)]
struct OutputView {
    commitment: String,
    ciphertext: String,
    stealth_public_key: String,
}

#[derive(Serialize)]
struct RecoveredView {
    blinding: String,
    stealth_private_key: String,
    stealth_public_key: String,
    commitment: String,
}

impl From<&RecoveredOutput> for RecoveredView {
    fn from(out: &RecoveredOutput) -> Self {
        Self {
            blinding: scalar_to_decimal(&out.blinding),
            stealth_private_key: scalar_to_decimal(out.stealth_keypair.private_key()),
            stealth_public_key: out.stealth_keypair.public_key().to_hex(),
            commitment: field_to_decimal(&out.commitment),
        }
    }
}

fn parse_secret(s: &str) -> Result<Scalar> {
    secret_from_decimal(s).context("Invalid secret")
}

fn parse_address(s: &str) -> Result<ShieldedAddress> {
    ShieldedAddress::from_hex(s).context("Invalid shielded address")
}

fn parse_ciphertext(s: &str) -> Result<SecretCiphertext> {
    SecretCiphertext::from_hex(s).context("Invalid ciphertext")
}

pub fn encrypt(args: &EncryptArgs) -> Result<()> {
    let secret = parse_secret(&args.secret)?;
    let address = parse_address(&args.to)?;

    let ciphertext = encrypt_secret(&secret, &address.reading, &mut rand::thread_rng())?;
    println!("{}", ciphertext.to_hex());
    Ok(())
}

pub fn decrypt(args: &DecryptArgs) -> Result<()> {
    let keys = args.wallet.root_keys()?;
    let ciphertext = parse_ciphertext(&args.ciphertext)?;

    let secret = decrypt_secret(&ciphertext, keys.reading.private_key())
        .context("Failed to decrypt secret")?;
    println!("{}", scalar_to_decimal(&secret));
    Ok(())
}

pub fn run(cmd: OutputCommand) -> Result<()> {
    let hasher = CircomPoseidon::new();

    match cmd {
        OutputCommand::Create { to } => {
            let address = parse_address(&to)?;
            let output = create_output(&address, &hasher, &mut rand::thread_rng())?;
            print_json(&OutputView {
                commitment: field_to_decimal(&output.commitment),
                ciphertext: output.ciphertext.to_hex(),
                stealth_public_key: output.stealth_public_key.to_hex(),
            })
        }
        OutputCommand::Recover(args) => {
            let recovered = recover(&args, &hasher)?;
            print_json(&RecoveredView::from(&recovered))
        }
    }
}

pub fn nullifier(args: &NullifierArgs) -> Result<()> {
    let hasher = CircomPoseidon::new();
    let recovered = recover(&args.output, &hasher)?;
    let nullifier = recovered.nullifier(args.leaf_index, &hasher)?;
    println!("{}", field_to_decimal(nullifier.as_field()));
    Ok(())
}

fn recover(args: &DecryptArgs, hasher: &CircomPoseidon) -> Result<RecoveredOutput> {
    let keys = args.wallet.root_keys()?;
    let ciphertext = parse_ciphertext(&args.ciphertext)?;
    recover_output(&ciphertext, &keys, hasher).context("Output is not addressed to this wallet")
}
