//! namechain CLI
//!
//! Offline tooling over the name and message codecs, token ids, registrar
//! commitments and the price curve.
//!
//! Usage:
//!   namechain encode-name test.eth
//!   namechain decode-message 0x01...
//!   namechain quote --config pricing.json --label alice --duration 31536000

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use namechain_core::message::get_message_type;
use namechain_core::name::{self, canonical_id, generation_of, label_to_token_id};
use namechain_core::{convert_decimals, load_json_config, Address, BridgeMessage, PriceCurve, PricingConfig, B256};
use namechain_registry::Registrar;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "namechain")]
#[command(about = "Name codec, bridge message and pricing tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a dotted name to DNS wire format
    EncodeName { name: String },

    /// Decode a hex DNS wire-format name
    DecodeName { hex: String },

    /// Token id of a label at a generation
    TokenId {
        label: String,
        #[arg(long, default_value_t = 0)]
        generation: u32,
    },

    /// ENS namehash of a dotted name
    Namehash { name: String },

    /// Read the type tag of a hex bridge message
    MessageType { hex: String },

    /// Decode a hex bridge message to JSON
    DecodeMessage { hex: String },

    /// Registrar commitment for a registration
    Commitment {
        #[arg(long)]
        label: String,
        #[arg(long)]
        owner: Address,
        /// Random if omitted
        #[arg(long)]
        secret: Option<B256>,
        #[arg(long, default_value_t = Address::ZERO)]
        subregistry: Address,
        #[arg(long, default_value_t = Address::ZERO)]
        resolver: Address,
        #[arg(long)]
        duration: u64,
    },

    /// Price quote from a pricing config
    Quote {
        /// Pricing config (JSON)
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        label: String,
        #[arg(long)]
        duration: u64,
        /// Current expiry of the name, 0 if never registered
        #[arg(long, default_value_t = 0)]
        expiry: u64,
        /// Quote time, defaults to the system clock
        #[arg(long)]
        now: Option<u64>,
        /// Also convert the total to a token with these decimals
        #[arg(long)]
        decimals: Option<u8>,
    },
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(trimmed).with_context(|| format!("invalid hex: {}", input))
}

fn unix_now() -> Result<u64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "namechain=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::EncodeName { name: dotted } => {
            let labels = name::parse_dotted(&dotted)?;
            let encoded = name::encode(&labels)?;
            println!("0x{}", hex::encode(encoded));
        }
        Command::DecodeName { hex } => {
            let labels = name::decode(&parse_hex(&hex)?)?;
            println!("{}", name::to_dotted(&labels));
        }
        Command::TokenId { label, generation } => {
            name::validate_label(&label)?;
            let token_id = label_to_token_id(&label, generation);
            println!("token_id:     {:#x}", token_id);
            println!("canonical_id: {:#x}", canonical_id(token_id));
            println!("generation:   {}", generation_of(token_id));
        }
        Command::Namehash { name: dotted } => {
            let labels = name::parse_dotted(&dotted)?;
            println!("{}", name::namehash(&labels));
        }
        Command::MessageType { hex } => {
            let message_type = get_message_type(&parse_hex(&hex)?)?;
            println!("{}", message_type);
        }
        Command::DecodeMessage { hex } => {
            let message = BridgeMessage::decode(&parse_hex(&hex)?)?;
            tracing::debug!(message_type = %message.message_type(), "Decoded message");
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        Command::Commitment {
            label,
            owner,
            secret,
            subregistry,
            resolver,
            duration,
        } => {
            name::validate_label(&label)?;
            let secret = secret.unwrap_or_else(|| B256::from(rand::random::<[u8; 32]>()));
            let commitment =
                Registrar::make_commitment(&label, owner, secret, subregistry, resolver, duration);
            println!("secret:     {}", secret);
            println!("commitment: {}", commitment);
        }
        Command::Quote {
            config,
            label,
            duration,
            expiry,
            now,
            decimals,
        } => {
            let pricing: PricingConfig = load_json_config(&config)?;
            let price_decimals = pricing.price_decimals;
            let curve = PriceCurve::new(pricing)?;
            let now = match now {
                Some(now) => now,
                None => unix_now()?,
            };
            if duration == 0 {
                bail!("duration must be non-zero");
            }

            let quote = curve.price(&label, expiry, duration, now)?;
            let total = quote.total()?;
            tracing::info!(label = %label, duration, expiry, now, "Quoted");

            let mut output = serde_json::json!({
                "label": label,
                "base": quote.base.to_string(),
                "premium": quote.premium.to_string(),
                "total": total.to_string(),
                "price_decimals": price_decimals,
            });
            if let Some(decimals) = decimals {
                let amount = convert_decimals(total, price_decimals, decimals)?;
                output["token_amount"] = serde_json::Value::String(amount.to_string());
                output["token_decimals"] = serde_json::Value::from(decimals);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
