use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gatehouse_core::{GateId, Report, Verdict};
use gatehouse_runner::release::{pack_release, release_target, sign, verify};
use gatehouse_runner::{CheckStatus, Runner};

#[derive(Parser)]
#[command(name = "gatehouse", version)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write governance/gatehouse.toml and create the report directories
    Init,

    /// Parse every gate config without running any gate
    Doctor,

    /// Produce the repository snapshot (REALITY_TEST)
    Snapshot,

    /// Compare the doc index against the documented tree (DOCMAP_SYNC)
    Docmap,

    /// Check root layout and tree hygiene (CLEAN_RELEASE_REPORT)
    Preflight,

    /// Evaluate declared claims against evidence (CLAIMS_EVIDENCE)
    Claims,

    /// Compare the snapshot against floors or the baseline (DRIFT_GUARD)
    Drift,

    /// Check runtime metrics against SLOs (RUNTIME_GUARD)
    Runtime,

    /// Check costs and the error budget (BUDGET_SENTINEL)
    Budget,

    /// Run every gate in dependency order and write GOVERNANCE_SUMMARY
    Pipeline,

    /// Manage accepted baseline reports
    Baseline {
        #[command(subcommand)]
        cmd: BaselineCommand,
    },

    /// Build, sign or verify a release bundle
    Release {
        #[command(subcommand)]
        cmd: ReleaseCommand,
    },
}

#[derive(Subcommand)]
enum BaselineCommand {
    /// Copy a current report into the baseline store
    Promote {
        #[arg(default_value = "REALITY_TEST")]
        id: String,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// rc or ga (falls back to REL_CHANNEL)
    #[arg(long)]
    channel: Option<String>,
    /// falls back to REL_VERSION
    #[arg(long = "version", id = "release_version", value_name = "VERSION")]
    version: Option<String>,
}

#[derive(Subcommand)]
enum ReleaseCommand {
    /// Build the deterministic bundle under <out_dir>/<channel>/<version>
    Pack(TargetArgs),
    /// Sign CHECKSUMS.sha256 and write PROVENANCE.json
    Sign(TargetArgs),
    /// Re-hash bundle files and check the signature
    Verify(TargetArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let repo_root = match cli.root {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    tracing::debug!(root = %repo_root.display(), "repository root");

    let gate = match cli.cmd {
        Command::Init => {
            let path = Runner::init_repo(&repo_root)?;
            println!("Initialized gatehouse in {} ({})", repo_root.display(), path.display());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Doctor => {
            let r = Runner::open(repo_root)?;
            let report = r.doctor();
            for c in &report.checks {
                match &c.status {
                    CheckStatus::Ok => println!("ok       {}", c.name),
                    CheckStatus::Absent(d) => println!("absent   {}: {}", c.name, d),
                    CheckStatus::Invalid(d) => println!("invalid  {}: {}", c.name, d),
                }
            }
            return Ok(exit(report.healthy()));
        }
        Command::Snapshot => GateId::Snapshot,
        Command::Docmap => GateId::DocMap,
        Command::Preflight => GateId::Preflight,
        Command::Claims => GateId::Claims,
        Command::Drift => GateId::Drift,
        Command::Runtime => GateId::Runtime,
        Command::Budget => GateId::Budget,
        Command::Pipeline => {
            let r = Runner::open(repo_root)?;
            let outcome = r.pipeline()?;
            for run in &outcome.runs {
                print_verdict(&run.report);
            }
            print_verdict(&outcome.summary);
            return Ok(exit(outcome.verdict() != Verdict::Fail));
        }
        Command::Baseline { cmd: BaselineCommand::Promote { id } } => {
            let r = Runner::open(repo_root)?;
            let path = r.promote(&id)?;
            println!("Promoted {} -> {}", id, path.display());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Release { cmd } => return release(repo_root, cmd),
    };

    let r = Runner::open(repo_root)?;
    let run = r.run_gate(gate)?;
    print_verdict(&run.report);
    Ok(exit(run.verdict() != Verdict::Fail))
}

fn release(repo_root: PathBuf, cmd: ReleaseCommand) -> anyhow::Result<ExitCode> {
    let r = Runner::open(repo_root)?;
    let ctx = r.context();
    match cmd {
        ReleaseCommand::Pack(t) => {
            let target = release_target(&ctx, t.channel.as_deref(), t.version.as_deref())?;
            let bundle = pack_release(&ctx, &target)?;
            println!(
                "RELEASE_PACK: PASS ({} files, {} bytes) -> {}",
                bundle.file_count,
                bundle.total_bytes,
                bundle.out_dir.display()
            );
            for c in &bundle.checksums {
                println!("  {}  {}", c.sha256, c.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        ReleaseCommand::Sign(t) => {
            let target = release_target(&ctx, t.channel.as_deref(), t.version.as_deref())?;
            let provenance = sign(&ctx, &target)?;
            println!("{}", serde_json::to_string_pretty(&provenance)?);
            Ok(ExitCode::SUCCESS)
        }
        ReleaseCommand::Verify(t) => {
            let target = release_target(&ctx, t.channel.as_deref(), t.version.as_deref())?;
            let outcome = verify(&ctx, &target)?;
            for name in &outcome.mismatched {
                println!("mismatch  {}", name);
            }
            for name in &outcome.missing {
                println!("missing   {}", name);
            }
            println!(
                "verify {}: {} files ok, signature {}",
                target.version,
                outcome.verified.len(),
                if outcome.signature_valid { "valid" } else { "INVALID" }
            );
            Ok(exit(outcome.ok()))
        }
    }
}

fn print_verdict(report: &Report) {
    let verdict = report.verdict();
    println!(
        "{}: {} (hard {}, soft {})",
        report.id,
        verdict,
        report.issues_hard.len(),
        report.issues_soft.len()
    );
    if verdict == Verdict::Warn {
        for i in &report.issues_soft {
            println!("  warning {}: actual {} limit {}", i.key, i.actual, i.limit);
        }
    }
    for i in &report.issues_hard {
        println!("  {}: actual {} limit {}", i.key, i.actual, i.limit);
    }
}

fn exit(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
