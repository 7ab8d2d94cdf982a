use clap::{Parser, Subcommand};
use picadere::scan::Manifest;
use picadere::{config, output, process, scan};
use std::path::PathBuf;

/// Shared flags for commands that derive images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Discard previously derived files — force re-encoding of everything
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "picadere")]
#[command(about = "Responsive image pipeline for content-driven static sites")]
#[command(long_about = "\
Responsive image pipeline for content-driven static sites

Markdown documents with TOML front matter are the data source. Every image
they reference is derived into responsive variants, and an image table maps
each source path to ready-made <picture> metadata.

Site structure:

  ./
  ├── config.toml                  # Site config (optional; all keys default)
  ├── content/
  │   ├── press/                   # template = \"press\"
  │   │   └── the-times__review.md
  │   ├── writing/                 # template = \"writing\"
  │   ├── quotes/                  # template = \"quote\"
  │   ├── events/                  # template = \"event\"
  │   └── pages/                   # template = \"page\" (og_image → social card)
  ├── public/
  │   └── images/                  # Source images (\"/images/x.jpg\" lives here)
  └── dist/_responsive-images/     # Derived variants + responsive-images.json

Derived files are content-addressed: an unchanged source re-derives for free
on the next build. Broken or missing images degrade to their raw path with a
warning; only required registrations fail the build.

Run 'picadere gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root (holds config.toml, the content and public directories)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Directory for intermediate files (scan manifest)
    #[arg(long, default_value = ".picadere-temp", global = true)]
    temp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan content collections into a manifest
    Scan,
    /// Derive responsive variants from a previous scan
    Process(CacheArgs),
    /// Run the full pipeline: scan → process
    Build(CacheArgs),
    /// Validate content and config without deriving anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let manifest_path = cli.temp_dir.join("manifest.json");

    match cli.command {
        Command::Scan => {
            let manifest = scan::scan(&cli.root)?;
            std::fs::create_dir_all(&cli.temp_dir)?;
            manifest.save(&manifest_path)?;
            output::print_scan_output(&manifest);
        }
        Command::Process(cache_args) => {
            let manifest = Manifest::load(&manifest_path)?;
            process::init_thread_pool(&manifest.config.processing);
            prepare_cache(&cli.root, &manifest, cache_args.no_cache)?;
            let result = process::process_manifest(&cli.root, &manifest)?;
            output::print_process_output(&result);
        }
        Command::Build(cache_args) => {
            println!("==> Stage 1: Scanning {}", cli.root.display());
            let manifest = scan::scan(&cli.root)?;
            std::fs::create_dir_all(&cli.temp_dir)?;
            manifest.save(&manifest_path)?;
            output::print_scan_output(&manifest);

            println!("==> Stage 2: Deriving images");
            process::init_thread_pool(&manifest.config.processing);
            prepare_cache(&cli.root, &manifest, cache_args.no_cache)?;
            let result = process::process_manifest(&cli.root, &manifest)?;
            output::print_process_output(&result);

            println!(
                "==> Build complete: {}",
                cli.root.join(&manifest.config.output.dir).display()
            );
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let manifest = scan::scan(&cli.root)?;
            output::print_scan_output(&manifest);
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// With `--no-cache`, clear the derived-image directory so every variant is
/// re-encoded from scratch.
fn prepare_cache(
    root: &std::path::Path,
    manifest: &Manifest,
    no_cache: bool,
) -> std::io::Result<()> {
    if no_cache {
        let dir = root.join(&manifest.config.output.dir);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
    }
    Ok(())
}
