//! drive_backup CLI - Back up to and restore from a Google Drive folder.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Input;
use glob::glob;
use tracing_subscriber::EnvFilter;

use drive_backup::models::format_size;
use drive_backup::{
    Authenticator, BackupService, DriveClient, PathKind, Selector, UploadOptions,
    DEFAULT_FOLDER_NAME,
};

/// Back up files and directories to a Google Drive folder.
#[derive(Parser)]
#[command(name = "drive_backup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to credentials JSON (service account key or authorized user).
    #[arg(long, env = "DRIVE_BACKUP_CREDENTIALS", default_value = "creds.json")]
    credentials: PathBuf,

    /// Pre-issued OAuth access token; takes precedence over --credentials.
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Name of the drive folder holding the backups.
    #[arg(long, env = "DRIVE_BACKUP_FOLDER", default_value = DEFAULT_FOLDER_NAME)]
    folder: String,

    /// Shared Drive ID to back up into instead of "My Drive".
    #[arg(long, env = "SHARED_DRIVE_ID")]
    drive_id: Option<String>,

    /// Directory for temporary archives (defaults to the system temp dir).
    #[arg(long, env = "DRIVE_BACKUP_TMPDIR")]
    temp_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files or directories (directories are zipped first).
    Upload {
        /// Paths to upload (supports glob patterns like *.txt).
        #[arg(required = true)]
        paths: Vec<String>,

        /// Keep a same-named backup instead of trashing it first.
        #[arg(long)]
        no_replace: bool,
    },

    /// List the backups in the backup folder.
    List,

    /// Download a backup to the local filesystem.
    Restore {
        /// Name of the backup; omit to choose from a numbered list.
        name: Option<String>,

        /// Number of the backup as shown by `list`.
        #[arg(long, short = 'n', conflicts_with = "name")]
        index: Option<usize>,

        /// Local destination directory.
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Move a backup to the drive trash.
    Trash {
        /// Name of the backup.
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let auth = match cli.access_token {
        Some(token) => Authenticator::with_access_token(token),
        None => Authenticator::from_file(&cli.credentials)
            .with_context(|| format!("Failed to load credentials from {:?}", cli.credentials))?,
    };

    let mut client = DriveClient::new(auth);
    if let Some(drive_id) = cli.drive_id {
        client = client.with_shared_drive(drive_id);
    }
    let mut service = BackupService::new(client).with_folder_name(cli.folder);
    if let Some(temp_dir) = cli.temp_dir {
        service = service.with_temp_dir(temp_dir);
    }

    match cli.command {
        Commands::Upload { paths, no_replace } => {
            let files = expand_paths(&paths)?;
            if files.is_empty() {
                anyhow::bail!("No files to upload");
            }

            let options = UploadOptions {
                replace_existing: !no_replace,
            };

            println!(
                "Uploading {} item(s) to '{}'...",
                files.len(),
                service.folder_name()
            );

            for (idx, path) in files.iter().enumerate() {
                print!("[{}/{}] Uploading {}... ", idx + 1, files.len(), path.display());

                let result = match PathKind::detect(path) {
                    Ok(kind) => service.upload_path(path, kind, &options).await,
                    Err(e) => Err(e),
                };

                match result {
                    Ok(file) => println!("OK ({} -> {})", file.name, file.id),
                    Err(e) if e.is_local() => {
                        println!("SKIPPED");
                        eprintln!("  Error: {}", e);
                    }
                    Err(e) => {
                        println!("FAILED");
                        return Err(e).with_context(|| format!("Failed to upload {:?}", path));
                    }
                }
            }

            println!("Done.");
        }

        Commands::List => {
            let listing = service
                .list_backups()
                .await
                .context("Failed to list backups")?;

            if listing.is_empty() {
                println!("No backups found in '{}'.", service.folder_name());
            } else {
                println!("{:>4}  {:>10}  {:<44} {}", "#", "SIZE", "ID", "NAME");
                println!("{}", "-".repeat(100));
                for (number, file) in listing.entries() {
                    println!("{:>4}  {}", number, file);
                }
            }
        }

        Commands::Restore { name, index, to } => {
            let listing = service
                .list_backups()
                .await
                .context("Failed to list backups")?;

            let selector = match explicit_selector(name, index) {
                Some(selector) => selector,
                None => {
                    if listing.is_empty() {
                        println!("No backups found in '{}'.", service.folder_name());
                        return Ok(());
                    }
                    for (number, file) in listing.entries() {
                        let size = file.size.map(format_size).unwrap_or_else(|| "-".to_string());
                        println!("{:>4}. {} ({})", number, file.name, size);
                    }
                    let index: usize = Input::new()
                        .with_prompt("Backup number to restore")
                        .interact_text()?;
                    Selector::Index(index)
                }
            };

            let file = listing.select(&selector)?;
            print!("Restoring {}... ", file.name);

            let path = service
                .restore(file, &to)
                .await
                .with_context(|| format!("Failed to restore {}", file.name))?;

            println!("OK");
            println!("Saved to: {:?}", path);
        }

        Commands::Trash { name } => {
            let file = service
                .trash_backup(&name)
                .await
                .with_context(|| format!("Failed to trash {}", name))?;
            println!("Trashed {} ({})", file.name, file.id);
        }
    }

    Ok(())
}

/// The selector given on the command line, if any. `None` means prompt.
fn explicit_selector(name: Option<String>, index: Option<usize>) -> Option<Selector> {
    match (name, index) {
        (Some(name), _) => Some(Selector::Name(name)),
        (None, Some(index)) => Some(Selector::Index(index)),
        (None, None) => None,
    }
}

/// Log to stderr; RUST_LOG wins over the -v count.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drive_backup={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Expand glob patterns into paths, keeping literal paths that match nothing
/// so the upload can report them.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let matches: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .collect();

        if matches.is_empty() {
            paths.push(PathBuf::from(pattern));
        } else {
            paths.extend(matches);
        }
    }

    let mut seen = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    Ok(paths)
}
