use clap::{Parser, Subcommand};
use spoolman_dist::{
    assemble_rootfs, run_builder_stage, write_image_layout, BuildArgs, BuilderConfig, DistError,
    ImageRecipe, DEFAULT_BUILD_DATE, DEFAULT_GIT_COMMIT,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "spoolman-dist", version, about = "Deterministic image packaging for spoolman")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the builder stage, assemble the rootfs and write an OCI layout.
    Build {
        /// Application source directory.
        #[arg(long)]
        source: PathBuf,
        /// Pre-built frontend bundle, served from client/dist at runtime.
        #[arg(long)]
        frontend: PathBuf,
        /// Entrypoint script installed executable at the image root.
        #[arg(long)]
        entrypoint: PathBuf,
        /// Dependency manifest consumed by the installer.
        #[arg(long)]
        manifest: PathBuf,
        /// Exact dependency resolution file.
        #[arg(long)]
        lock: PathBuf,
        /// Installer command; may be given multiple times for arguments.
        #[arg(long, required = true, num_args = 1..)]
        installer: Vec<String>,
        /// Database migrations directory, copied under app/migrations.
        #[arg(long)]
        migrations: Option<PathBuf>,
        /// Extra configuration files copied next to the sources.
        #[arg(long = "config-file")]
        config_files: Vec<PathBuf>,
        /// Output directory for the OCI image layout.
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_GIT_COMMIT)]
        git_commit: String,
        #[arg(long, default_value = DEFAULT_BUILD_DATE)]
        build_date: String,
        /// Scratch directory; a temporary one is used when omitted.
        #[arg(long)]
        scratch: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(step = err.step, "build failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DistError> {
    let Command::Build {
        source,
        frontend,
        entrypoint,
        manifest,
        lock,
        installer,
        migrations,
        config_files,
        output,
        git_commit,
        build_date,
        scratch,
    } = cli.command;

    let recipe = ImageRecipe::spoolman();
    let args = BuildArgs {
        git_commit,
        build_date,
    };
    let builder_config = BuilderConfig {
        manifest,
        lock_file: lock,
        installer,
        source_dir: source,
        migrations_dir: migrations,
        config_files,
    };

    let tempdir;
    let scratch = match scratch {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .map_err(|e| DistError::new("dependency-install", e.to_string()))?;
            dir
        }
        None => {
            tempdir = tempfile::tempdir()
                .map_err(|e| DistError::new("dependency-install", e.to_string()))?;
            tempdir.path().to_path_buf()
        }
    };

    let artifacts = run_builder_stage(&scratch, &builder_config)?;
    info!(app_dir = %artifacts.app_dir.display(), "builder stage complete");

    let rootfs = scratch.join("rootfs");
    assemble_rootfs(&rootfs, &recipe, &args, &artifacts, &frontend, &entrypoint)?;
    info!(rootfs = %rootfs.display(), "rootfs assembled");

    std::fs::create_dir_all(&output)
        .map_err(|e| DistError::new("image-layout", e.to_string()))?;
    let digests = write_image_layout(&output, &rootfs, &recipe, &args)?;

    println!("lock sha256    {}", artifacts.lock_sha256);
    println!("layer diff_id  {}", digests.layer_diff_id);
    println!("layer blob     {}", digests.layer_digest);
    println!("config         {}", digests.config_digest);
    println!("manifest       {}", digests.manifest_digest);
    Ok(())
}
