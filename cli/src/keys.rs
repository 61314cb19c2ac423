use anyhow::{Context, Result, bail};
use clap::Args;
use num_bigint::BigUint;
use serde::Serialize;
use shieldpool_config::ShieldpoolConfig;
use shieldpool_privacy::field::{field_to_decimal, random_scalar_above, scalar_to_decimal};
use shieldpool_privacy::{CircomPoseidon, KEY_DERIVATION_MESSAGE, Keypair, RootKeys};

use crate::print_json;

#[derive(Args, Debug)]
pub struct SignatureArgs {
    /// Hex signature (r ∥ s ∥ v) over the key derivation message
    #[arg(long, env = "SP_SIGNATURE")]
    pub signature: String,
}

impl SignatureArgs {
    pub fn root_keys(&self) -> Result<RootKeys> {
        RootKeys::from_signature_hex(&self.signature, &CircomPoseidon::new())
            .context("Failed to derive keys from signature")
    }
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Hex signature (r ∥ s ∥ v) over the key derivation message
    #[arg(long, conflicts_with = "random")]
    pub signature: Option<String>,

    /// Generate random root keys instead
    #[arg(long)]
    pub random: bool,
}

#[derive(Serialize)]
struct KeypairView {
    private_key: String,
    public_x: String,
    public_y: String,
    packed: String,
}

impl From<&Keypair> for KeypairView {
    fn from(kp: &Keypair) -> Self {
        Self {
            private_key: scalar_to_decimal(kp.private_key()),
            public_x: field_to_decimal(&kp.public_key().x()),
            public_y: field_to_decimal(&kp.public_key().y()),
            packed: kp.public_key().to_hex(),
        }
    }
}

#[derive(Serialize)]
struct RootKeysView {
    spending: KeypairView,
    reading: KeypairView,
    address: String,
}

pub fn keygen(args: &KeygenArgs, config: &ShieldpoolConfig) -> Result<()> {
    let keys = match (&args.signature, args.random) {
        (Some(signature), _) => RootKeys::from_signature_hex(signature, &CircomPoseidon::new())
            .context("Failed to derive keys from signature")?,
        (None, true) => random_root_keys(config.keys.min_scalar_bits)?,
        (None, false) => {
            eprintln!("Sign this message with your wallet and pass it as --signature:");
            eprintln!();
            eprintln!("{KEY_DERIVATION_MESSAGE}");
            bail!("no signature given");
        }
    };

    print_json(&RootKeysView {
        spending: (&keys.spending).into(),
        reading: (&keys.reading).into(),
        address: keys.address().to_hex(),
    })
}

pub fn address(args: &SignatureArgs) -> Result<()> {
    println!("{}", args.root_keys()?.address().to_hex());
    Ok(())
}

fn random_root_keys(min_scalar_bits: u32) -> Result<RootKeys> {
    let min = if min_scalar_bits == 0 {
        BigUint::from(1u8)
    } else {
        BigUint::from(1u8) << (min_scalar_bits - 1)
    };

    let mut rng = rand::thread_rng();
    let spending = Keypair::from_private_key(random_scalar_above(&mut rng, &min)?)?;
    let reading = Keypair::from_private_key(random_scalar_above(&mut rng, &min)?)?;
    Ok(RootKeys { spending, reading })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shieldpool_privacy::field::scalar_to_biguint;

    #[test]
    fn test_random_keys_respect_min_bits() {
        let keys = random_root_keys(200).unwrap();
        assert!(scalar_to_biguint(keys.spending.private_key()).bits() >= 200);
        assert!(scalar_to_biguint(keys.reading.private_key()).bits() >= 200);
    }
}
