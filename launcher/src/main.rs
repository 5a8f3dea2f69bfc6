mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use bootstrap::{detect_installer, Bootstrap, InstallerRuntime, Manifest, PipInstaller};
use config::LaunchProfile;

#[derive(Parser)]
#[command(name = "launcher")]
#[command(about = "Build and launch the bonus program service environment", long_about = None)]
struct Cli {
    /// Launch profile to read (a missing file falls back to defaults)
    #[arg(short, long, default_value = "launch.toml")]
    profile: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the runtime environment: install dependencies and copy source
    Build {
        /// Override the dependency manifest path
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Override the source directory
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override the target directory
        #[arg(long)]
        target: Option<PathBuf>,

        /// Override the exposed port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the environment, launch the entrypoint, and wait for it to exit
    Up {
        /// Override the dependency manifest path
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Override the source directory
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override the target directory
        #[arg(long)]
        target: Option<PathBuf>,

        /// Override the exposed port
        #[arg(long)]
        port: Option<u16>,

        /// Entrypoint override, e.g. "python main.py"
        #[arg(long)]
        entrypoint: Option<String>,
    },
    /// Parse the dependency manifest and list its requirements
    Manifest {
        /// Manifest to inspect instead of the profile's
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Check whether a package installer runtime is available
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let profile = LaunchProfile::load_or_default(&cli.profile)?;

    match cli.command {
        Commands::Build {
            manifest,
            source,
            target,
            port,
        } => {
            let profile = apply_overrides(profile, manifest, source, target, port, None);
            run_build(profile).await
        }
        Commands::Up {
            manifest,
            source,
            target,
            port,
            entrypoint,
        } => {
            let profile = apply_overrides(profile, manifest, source, target, port, entrypoint);
            run_up(profile).await
        }
        Commands::Manifest { path } => run_manifest(path.unwrap_or(profile.manifest)),
        Commands::Health => {
            run_health();
            Ok(())
        }
    }
}

fn apply_overrides(
    mut profile: LaunchProfile,
    manifest: Option<PathBuf>,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    port: Option<u16>,
    entrypoint: Option<String>,
) -> LaunchProfile {
    if let Some(manifest) = manifest {
        profile.manifest = manifest;
    }
    if let Some(source) = source {
        profile.source = source;
    }
    if let Some(target) = target {
        profile.target = target;
    }
    if let Some(port) = port {
        profile.port = port;
    }
    if let Some(entrypoint) = entrypoint {
        let mut parts = entrypoint.split_whitespace();
        if let Some(program) = parts.next() {
            profile.entrypoint.program = program.to_string();
            profile.entrypoint.args = parts.map(str::to_string).collect();
        }
    }
    profile
}

async fn run_build(profile: LaunchProfile) -> Result<(), Box<dyn std::error::Error>> {
    let installer = PipInstaller::detect()?;
    let mut bootstrap = Bootstrap::new(profile.build_config());
    bootstrap.build(&installer).await?;

    if let Some(environment) = bootstrap.environment() {
        println!("✅ Environment {} built", environment.id);
        println!("   work dir:      {}", environment.work_dir.display());
        println!("   site packages: {}", environment.site_packages.display());
        println!("   exposed port:  {}", environment.exposed_port);
        for package in &environment.installed {
            println!("   installed:     {}", package.requested);
        }
    }
    Ok(())
}

async fn run_up(profile: LaunchProfile) -> Result<(), Box<dyn std::error::Error>> {
    let installer = PipInstaller::detect()?;
    let mut bootstrap = Bootstrap::new(profile.build_config());
    bootstrap.build(&installer).await?;

    let mut handle = bootstrap.launch().await?;
    println!("🚀 Entrypoint started: {}", handle.spec());

    let status = handle.wait().await?;
    bootstrap.observe_exit()?;
    info!(%status, "entrypoint exited");

    if !status.success() {
        return Err(format!("entrypoint exited with {status}").into());
    }
    println!("✅ Entrypoint exited cleanly");
    Ok(())
}

fn run_manifest(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = Manifest::from_path(&path)?;
    println!("📋 {} requirement(s) in {}", manifest.len(), path.display());
    for requirement in manifest.requirements() {
        println!("   {requirement}");
    }
    Ok(())
}

fn run_health() {
    match detect_installer() {
        InstallerRuntime::None => println!("❌ No package installer found (tried pip, pip3)"),
        runtime => println!("✅ Installer available: {}", runtime.command()),
    }
}
