//! Entry point: a `clap`-derived CLI wiring the Document Store Client,
//! Binary Cache and Filesystem Driver together before handing the result
//! to `fuser::mount2`. The `mount`/`unmount` subcommand split mirrors
//! `couchmount.py`'s own command surface; `unmount`'s OS-level dispatch
//! (`fusermount -u` / `umount`) is out of scope (spec.md Non-goals) and is
//! kept only as a named, explicit error so the command surface is complete.

mod binary_cache;
mod cache;
mod config;
mod document;
mod error;
mod fs;
mod path;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fuser::MountOption;
use reqwest::Client;

use binary_cache::BinaryCache;
use config::{load_config, DeviceConfig};
use document::DocumentStore;
use fs::{FsWrapper, RemoteFs};

#[derive(Parser)]
#[command(name = "cozyfuse-rs", about = "Mounts a remote document store as a FUSE filesystem")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mounts `device`'s remote document store at `mountpoint`.
    Mount {
        device: String,
        mountpoint: PathBuf,
        /// Defaults to `~/.cozyfuse/<device>/device.toml`.
        #[arg(long)]
        device_config: Option<PathBuf>,
        /// Defaults to `<device config dir>/settings.toml`.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    Unmount {
        mountpoint: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Mount { device, mountpoint, device_config, settings } => {
            mount(&device, &mountpoint, device_config, settings)
        }
        Command::Unmount { mountpoint } => {
            tracing::error!(?mountpoint, "unmount is not implemented by this binary; use the platform unmount command");
            anyhow::bail!("unmount is not implemented; run `fusermount -u {}` directly", mountpoint.display());
        }
    }
}

fn mount(
    device_name: &str,
    mountpoint: &Path,
    device_config_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let device_config_path = device_config_path.unwrap_or_else(|| config::device_toml_path(device_name));
    let device = DeviceConfig::load(&device_config_path)?;

    let settings_path = settings_path.unwrap_or_else(|| device.config_dir().join("settings.toml"));
    let settings = load_config(&settings_path);

    std::fs::create_dir_all(device.cache_dir())?;

    let http = Client::builder().build()?;
    let mut base = url::Url::parse(&device.url)?;
    base.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("device url {:?} cannot be a base", device.url))?
        .pop_if_empty()
        .push(&device.database);
    let store = DocumentStore::new(http, base.to_string());
    let binary_cache = BinaryCache::new(device.name.clone(), device.cache_dir());

    let remote_fs = RemoteFs::new(settings, device, store, binary_cache);
    let wrapper = FsWrapper(std::sync::Arc::new(std::sync::Mutex::new(remote_fs)));

    let options = vec![MountOption::AutoUnmount, MountOption::FSName("cozyfuse".to_string())];
    tracing::info!(?mountpoint, device = device_name, "mounting");
    fuser::mount2(wrapper, mountpoint, &options)?;
    Ok(())
}
