//! isnad
//!
//! Offline CLI for the attestation ledger. Creates identities, signs and
//! verifies attestations, computes trust scores over chain files, and
//! manages revocations and delegations.
//!
//! Usage:
//!   isnad init     [keyfile]
//!   isnad show     [keyfile]
//!   isnad attest   <subject> <task> -k <keyfile> [-e <evidence>] [-o <out>]
//!   isnad verify   <file|->
//!   isnad chain    <agent> -c <chain.json>
//!   isnad score    <agent> -c <chain.json> [-s <scope>]
//!   isnad revoke   <target-id> --reason <text> -k <keyfile> [-o <list>]
//!   isnad delegate create <delegate-id> -k <keyfile> -s <scope>... [--expires <unix>] [--max-depth <n>]
//!   isnad stats    -c <chain.json>
//!
//! Exit code 0 on success, 1 on any failure; `--json` switches every
//! command to machine-readable output.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use isnad_domain::{Attestation, Delegation, Revocation};
use isnad_identity::Identity;

mod chain_file;

use chain_file::{load_chain, load_revocations, save_revocations};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "isnad", version, about = "Attestation chains for agent reputation")]
struct Args {
    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new agent identity.
    Init {
        /// Where to write the identity file.
        #[arg(default_value = "identity.json")]
        keyfile: PathBuf,
    },

    /// Show the agent id and public key of an identity file.
    Show {
        #[arg(default_value = "identity.json")]
        keyfile: PathBuf,
    },

    /// Create and sign an attestation as the witness.
    Attest {
        /// Subject agent id.
        subject: String,
        /// Task label.
        task: String,
        /// Witness identity file.
        #[arg(short, long, default_value = "identity.json")]
        keyfile: PathBuf,
        /// Evidence URI.
        #[arg(short, long, default_value = "")]
        evidence: String,
        /// Output file; defaults to attestation-<id>.json.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Verify an attestation file ("-" reads stdin).
    Verify {
        file: String,
    },

    /// List attestations about an agent in a chain file.
    Chain {
        agent: String,
        #[arg(short, long)]
        chain: PathBuf,
    },

    /// Compute the trust score of an agent from a chain file.
    Score {
        agent: String,
        #[arg(short, long)]
        chain: PathBuf,
        /// Restrict scoring to tasks containing this scope.
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Sign a revocation of an agent or attestation.
    Revoke {
        /// Agent id or attestation id to revoke.
        target_id: String,
        #[arg(long)]
        reason: String,
        /// Revoker identity file.
        #[arg(short, long, default_value = "identity.json")]
        keyfile: PathBuf,
        /// Limit the revocation to one task scope.
        #[arg(short, long)]
        scope: Option<String>,
        /// Revocation list file to append to.
        #[arg(short, long, default_value = "revocations.json")]
        out: PathBuf,
    },

    /// Delegation operations.
    Delegate {
        #[command(subcommand)]
        command: DelegateCommand,
    },

    /// Summarize a chain file.
    Stats {
        #[arg(short, long)]
        chain: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum DelegateCommand {
    /// Create and sign a root delegation.
    Create {
        /// Delegate agent id.
        delegate: String,
        /// Principal identity file.
        #[arg(short, long, default_value = "identity.json")]
        keyfile: PathBuf,
        /// Granted scopes (repeatable).
        #[arg(short, long, required = true)]
        scope: Vec<String>,
        /// Expiry as Unix seconds.
        #[arg(long)]
        expires: Option<f64>,
        /// Allowed sub-delegation depth.
        #[arg(long, default_value_t = 0)]
        max_depth: u32,
        /// Output file; defaults to delegation-<id>.json.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

// ── entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Init { keyfile } => cmd_init(&keyfile, args.json),
        Command::Show { keyfile } => cmd_show(&keyfile, args.json),
        Command::Attest {
            subject,
            task,
            keyfile,
            evidence,
            out,
        } => cmd_attest(&subject, &task, &keyfile, &evidence, out, args.json),
        Command::Verify { file } => cmd_verify(&file, args.json),
        Command::Chain { agent, chain } => cmd_chain(&agent, &chain, args.json),
        Command::Score { agent, chain, scope } => cmd_score(&agent, &chain, scope, args.json),
        Command::Revoke {
            target_id,
            reason,
            keyfile,
            scope,
            out,
        } => cmd_revoke(&target_id, &reason, &keyfile, scope, &out, args.json),
        Command::Delegate { command } => match command {
            DelegateCommand::Create {
                delegate,
                keyfile,
                scope,
                expires,
                max_depth,
                out,
            } => cmd_delegate_create(&delegate, &keyfile, scope, expires, max_depth, out, args.json),
        },
        Command::Stats { chain } => cmd_stats(&chain, args.json),
    }
}

// ── commands ──────────────────────────────────────────────────────────────────

fn cmd_init(keyfile: &PathBuf, json: bool) -> Result<()> {
    if keyfile.exists() {
        bail!("refusing to overwrite existing keyfile {}", keyfile.display());
    }
    let identity = Identity::generate();
    identity
        .save(keyfile)
        .with_context(|| format!("writing {}", keyfile.display()))?;

    if json {
        print_json(&json!({
            "agent_id": identity.agent_id(),
            "public_key": identity.public_key_hex(),
            "keyfile": keyfile,
        }));
    } else {
        println!("Generated identity: {}", identity.agent_id());
        println!("  Public key: {}", identity.public_key_hex());
        println!("  Saved to:   {}", keyfile.display());
    }
    Ok(())
}

fn cmd_show(keyfile: &PathBuf, json: bool) -> Result<()> {
    let identity = load_identity(keyfile)?;
    if json {
        print_json(&json!({
            "agent_id": identity.agent_id(),
            "public_key": identity.public_key_hex(),
        }));
    } else {
        println!("Agent ID:   {}", identity.agent_id());
        println!("Public key: {}", identity.public_key_hex());
    }
    Ok(())
}

fn cmd_attest(
    subject: &str,
    task: &str,
    keyfile: &PathBuf,
    evidence: &str,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let witness = load_identity(keyfile)?;
    let attestation = Attestation::create(&witness, subject, task, evidence);
    let id = attestation.attestation_id();

    let path = out.unwrap_or_else(|| PathBuf::from(format!("attestation-{}.json", id)));
    std::fs::write(&path, serde_json::to_string_pretty(&attestation.to_wire())?)
        .with_context(|| format!("writing {}", path.display()))?;

    if json {
        print_json(&json!({
            "attestation_id": id,
            "witness": attestation.witness,
            "subject": subject,
            "task": task,
            "file": path,
        }));
    } else {
        println!("Attestation created: {}", id);
        println!("  {} attests {}: {}", attestation.witness, subject, task);
        println!("  Saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_verify(file: &str, json: bool) -> Result<()> {
    let content = if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file))?
    };

    let attestation: Attestation =
        serde_json::from_str(&content).context("parsing attestation")?;
    let valid = attestation.verify() && attestation.witness_matches_key();

    if json {
        print_json(&json!({
            "valid": valid,
            "attestation_id": attestation.attestation_id(),
            "witness": attestation.witness,
            "subject": attestation.subject,
            "task": attestation.task,
        }));
    } else if valid {
        println!(
            "Valid: {} -> {}: {}",
            attestation.witness, attestation.subject, attestation.task
        );
    } else {
        println!("INVALID signature");
    }

    if valid {
        Ok(())
    } else {
        bail!("attestation failed verification")
    }
}

fn cmd_chain(agent: &str, chain_path: &PathBuf, json: bool) -> Result<()> {
    let ledger = load_chain(chain_path)?;
    let attestations = ledger.by_subject(agent);

    if json {
        print_json(&json!({
            "agent_id": agent,
            "count": attestations.len(),
            "attestations": attestations.iter().map(|a| a.to_wire()).collect::<Vec<Value>>(),
        }));
    } else {
        println!("{} attestation(s) about {}", attestations.len(), agent);
        for attestation in attestations {
            println!(
                "  {}  {} -> {}  [{}]",
                attestation.attestation_id(),
                attestation.witness,
                attestation.subject,
                attestation.task
            );
        }
    }
    Ok(())
}

fn cmd_score(agent: &str, chain_path: &PathBuf, scope: Option<String>, json: bool) -> Result<()> {
    let ledger = load_chain(chain_path)?;
    let score = ledger.trust_score(agent, scope.as_deref());
    let basis = ledger.by_subject(agent).len();

    if json {
        print_json(&json!({
            "agent_id": agent,
            "score": score,
            "scope": scope,
            "attestations": basis,
        }));
    } else {
        println!("Trust score for {}: {:.3}", agent, score);
        println!("  Based on {} attestation(s)", basis);
        if let Some(scope) = scope {
            println!("  Scope: {}", scope);
        }
    }
    Ok(())
}

fn cmd_revoke(
    target_id: &str,
    reason: &str,
    keyfile: &PathBuf,
    scope: Option<String>,
    out: &PathBuf,
    json: bool,
) -> Result<()> {
    let revoker = load_identity(keyfile)?;
    let revocation = Revocation::create(&revoker, target_id, reason, scope);

    let mut entries = load_revocations(out)?;
    entries.push(revocation.clone());
    save_revocations(out, &entries)?;

    if json {
        print_json(&json!({
            "target_id": target_id,
            "revoked_by": revocation.revoked_by,
            "scope": revocation.scope,
            "file": out,
        }));
    } else {
        println!("Revoked {} ({})", target_id, reason);
        println!("  By:       {}", revocation.revoked_by);
        println!("  Saved to: {}", out.display());
    }
    Ok(())
}

fn cmd_delegate_create(
    delegate: &str,
    keyfile: &PathBuf,
    scopes: Vec<String>,
    expires: Option<f64>,
    max_depth: u32,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let principal = load_identity(keyfile)?;
    let delegation = Delegation::create(&principal, delegate, scopes, expires, max_depth)
        .context("creating delegation")?;
    let id = delegation.delegation_id();

    let path = out.unwrap_or_else(|| PathBuf::from(format!("delegation-{}.json", id)));
    std::fs::write(&path, serde_json::to_string_pretty(&delegation)?)
        .with_context(|| format!("writing {}", path.display()))?;

    if json {
        print_json(&json!({
            "delegation_id": id,
            "principal": delegation.principal,
            "delegate": delegate,
            "scopes": delegation.scopes,
            "file": path,
        }));
    } else {
        println!("Delegation created: {}", id);
        println!(
            "  {} -> {} [{}]",
            delegation.principal,
            delegate,
            delegation.scopes.join(",")
        );
        println!("  Saved to: {}", path.display());
    }
    Ok(())
}

fn cmd_stats(chain_path: &PathBuf, json: bool) -> Result<()> {
    let ledger = load_chain(chain_path)?;
    let stats = ledger.stats();

    if json {
        print_json(&json!({
            "count": stats.count,
            "subjects": stats.subjects,
            "witnesses": stats.witnesses,
        }));
    } else {
        println!("Attestations: {}", stats.count);
        println!("Subjects:     {}", stats.subjects);
        println!("Witnesses:    {}", stats.witnesses);
    }
    Ok(())
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn load_identity(keyfile: &PathBuf) -> Result<Identity> {
    Identity::load(keyfile).with_context(|| format!("loading identity {}", keyfile.display()))
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).expect("JSON output"));
}
