//! TSS Signer CLI
//!
//! Command-line driver for the wallet key lifecycle:
//! - deal key shares and messaging keys for all three parties
//! - export an encrypted share from one party to another
//! - combine received shares into durable signing material
//! - run a signing session against the gateway

use anyhow::Result;
use clap::{Parser, Subcommand};
use gateway_client::HttpGateway;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tss_core::codec::{encrypt_n_share, DecryptableNShare};
use tss_core::keygen::trusted_dealer_keygen;
use tss_core::messaging::MessagingKeys;
use tss_core::{
    create_combined_key, signing_shares, CombinedKey, CommonKeychain, EcdsaEngine, KeyShare,
    LocalEngine, PartyRole, SigningSession,
};

/// TSS Signer - threshold wallet party node
#[derive(Parser)]
#[command(name = "tss-signer")]
#[command(about = "2-of-3 threshold ECDSA wallet signer")]
#[command(version)]
struct Cli {
    /// Gateway service URL
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:8080")]
    gateway: String,

    /// Gateway access token
    #[arg(long, env = "GATEWAY_TOKEN")]
    token: Option<String>,

    /// Data directory for key material
    #[arg(short, long, env = "DEST", default_value = "./data")]
    dest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deal key shares and messaging keys for all three parties
    Keygen {
        /// Fixed RNG seed, for reproducible fixtures
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Seal one party's share for another party
    ExportShare {
        /// Originating party (1-3)
        #[arg(short, long)]
        from: u8,

        /// Receiving party (1-3)
        #[arg(short, long)]
        to: u8,
    },

    /// Combine received shares into signing material
    Combine {
        /// Local party (1-3)
        #[arg(short, long)]
        party: u8,

        /// Expected common keychain (130 hex chars)
        #[arg(short, long)]
        expected: String,
    },

    /// Run a signing session for one transaction request
    Sign {
        /// Local party (1-3)
        #[arg(short, long)]
        party: u8,

        /// Wallet ID
        #[arg(short, long)]
        wallet: String,

        /// Transaction request ID
        #[arg(short, long)]
        tx_request: String,

        /// Message digest to sign (hex encoded, 32 bytes)
        #[arg(short, long)]
        message: String,
    },

    /// Show key material info for a party
    Info {
        /// Local party (1-3)
        #[arg(short, long)]
        party: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.dest)?;

    match cli.command {
        Commands::Keygen { seed } => run_keygen(&cli, seed)?,
        Commands::ExportShare { from, to } => {
            run_export_share(&cli, parse_role(from)?, parse_role(to)?)?
        }
        Commands::Combine { party, ref expected } => {
            run_combine(&cli, parse_role(party)?, expected)?
        }
        Commands::Sign {
            party,
            ref wallet,
            ref tx_request,
            ref message,
        } => run_sign(&cli, parse_role(party)?, wallet, tx_request, message).await?,
        Commands::Info { party } => show_info(&cli, parse_role(party)?)?,
    }

    Ok(())
}

fn parse_role(index: u8) -> Result<PartyRole> {
    PartyRole::try_from(index).map_err(|e| anyhow::anyhow!(e))
}

fn run_keygen(cli: &Cli, seed: Option<u64>) -> Result<()> {
    info!(seeded = seed.is_some(), "Dealing key shares");

    let mut rng = match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    let key_shares = trusted_dealer_keygen(&mut rng)?;

    for key_share in &key_shares {
        let role = key_share.p_share.i;
        let messaging = MessagingKeys::generate(&mut rng);
        save_json(
            &cli.dest.join(format!("keyshare.{}.json", role.index())),
            key_share,
        )?;
        save_json(
            &cli.dest.join(format!("messaging.{}.json", role.index())),
            &messaging,
        )?;
    }

    let keychain = dealt_common_keychain(&key_shares)?;
    info!(common_keychain = %keychain, "Key shares dealt and saved");
    println!("Common Keychain: {keychain}");

    Ok(())
}

/// Combine the user's freshly dealt shares to print the wallet identity
fn dealt_common_keychain(key_shares: &[KeyShare; 3]) -> Result<CommonKeychain> {
    let engine = LocalEngine::new();
    let peers: Vec<_> = key_shares[1..]
        .iter()
        .map(|share| share.n_share_for(PartyRole::User).map(Clone::clone))
        .collect::<tss_core::Result<_>>()?;
    let output = engine.key_combine(&key_shares[0].p_share, &peers)?;
    Ok(CommonKeychain::from_parts(
        &output.x_share.y,
        &output.x_share.chaincode,
    )?)
}

fn run_export_share(cli: &Cli, from: PartyRole, to: PartyRole) -> Result<()> {
    let key_share: KeyShare = load_json(&cli.dest.join(format!("keyshare.{}.json", from.index())))?;
    let sender: MessagingKeys =
        load_json(&cli.dest.join(format!("messaging.{}.json", from.index())))?;
    let recipient: MessagingKeys =
        load_json(&cli.dest.join(format!("messaging.{}.json", to.index())))?;

    let decryptable = DecryptableNShare {
        n_share: encrypt_n_share(&key_share, to, &recipient.public(), &sender)?,
        sender: sender.public(),
    };

    let path = cli
        .dest
        .join(format!("nshare.{}.{}.json", from.index(), to.index()));
    save_json(&path, &decryptable)?;

    info!(from = %from, to = %to, path = ?path, "Share sealed and saved");
    Ok(())
}

fn run_combine(cli: &Cli, party: PartyRole, expected: &str) -> Result<()> {
    let key_share: KeyShare =
        load_json(&cli.dest.join(format!("keyshare.{}.json", party.index())))?;
    let messaging: MessagingKeys =
        load_json(&cli.dest.join(format!("messaging.{}.json", party.index())))?;
    let expected = CommonKeychain::new(expected)?;

    let mut encrypted_shares = Vec::new();
    for sender in PartyRole::all() {
        if sender == party {
            continue;
        }
        let path = cli
            .dest
            .join(format!("nshare.{}.{}.json", sender.index(), party.index()));
        if path.exists() {
            encrypted_shares.push(load_json::<DecryptableNShare>(&path)?);
        }
    }

    let engine = LocalEngine::new();
    let combined = create_combined_key(&engine, &key_share, &messaging, &encrypted_shares, &expected)?;

    let path = cli
        .dest
        .join(format!("signingmaterial.{}.json", party.index()));
    save_json(&path, &combined)?;

    info!(common_keychain = %combined.common_keychain, path = ?path, "Key combination complete");
    println!("Common Keychain: {}", combined.common_keychain);

    Ok(())
}

async fn run_sign(
    cli: &Cli,
    party: PartyRole,
    wallet: &str,
    tx_request: &str,
    message: &str,
) -> Result<()> {
    let combined: CombinedKey =
        load_json(&cli.dest.join(format!("signingmaterial.{}.json", party.index())))?;

    let digest: [u8; 32] = hex::decode(message)?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Message digest must be 32 bytes"))?;

    let engine = LocalEngine::new();
    let (x_share, y_share) = signing_shares(&engine, &combined.signing_material)?;

    let mut gateway = HttpGateway::new(&cli.gateway);
    if let Some(token) = &cli.token {
        gateway = gateway.with_access_token(token);
    }

    info!(
        wallet_id = wallet,
        tx_request_id = tx_request,
        "Starting signing session"
    );

    let session = SigningSession::new(&engine, &gateway, wallet, tx_request);
    let s_share = session.run(&x_share, &y_share, &digest).await?;

    info!(
        r = hex::encode(&s_share.r),
        "Signing session complete, signature share offered"
    );
    println!("Signature share:");
    println!("  r: {}", hex::encode(&s_share.r));
    println!("  s: {}", hex::encode(&s_share.s));

    Ok(())
}

fn show_info(cli: &Cli, party: PartyRole) -> Result<()> {
    let material_path = cli
        .dest
        .join(format!("signingmaterial.{}.json", party.index()));

    if material_path.exists() {
        let combined: CombinedKey = load_json(&material_path)?;
        println!("Signing Material:");
        println!("  Party: {}", combined.signing_material.role());
        println!("  Common Keychain: {}", combined.common_keychain);
        println!(
            "  Backup share held: {}",
            combined.signing_material.backup_n_share.is_some()
        );
        return Ok(());
    }

    let key_share: KeyShare =
        load_json(&cli.dest.join(format!("keyshare.{}.json", party.index())))?;
    println!("Key Share:");
    println!("  Party: {}", key_share.p_share.i);
    println!("  Public Key: {}", hex::encode(&key_share.p_share.y));
    println!(
        "  Peers covered: {}",
        key_share
            .n_shares
            .keys()
            .map(|role| role.index().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
