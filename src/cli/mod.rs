//! Command-line interface
//!
//! Each subcommand maps onto one registry, settings or preferences operation.
//! Failures are printed and turned into a non-zero exit status; nothing here
//! panics on user input.

pub mod shell;

use crate::app::App;
use crate::drivers::download::{download_and_install, DownloadProgress};
use crate::drivers::fetch::{parse_repo_url, RemoteDriver};
use crate::drivers::{DriverLocation, DriverMetadata};
use crate::prefs::{keys, InputBindings, PadButton, PrefValue};
use crate::settings::{SettingNode, SettingPath, SettingsTree};
use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use colored::*;
use std::io::Write;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the data directory, selected driver and channel
    Status,
    /// Manage GPU driver packages
    #[command(subcommand)]
    Drivers(DriversCommand),
    /// Inspect and edit engine settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Read and write front-end preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Controller input bindings
    #[command(subcommand)]
    Bindings(BindingsCommand),
    /// Development engine library
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Game license keys
    #[command(subcommand)]
    Keys(KeysCommand),
    /// Driver download channel
    #[command(subcommand)]
    Channel(ChannelCommand),
}

#[derive(Subcommand, Debug)]
pub enum DriversCommand {
    /// List installed drivers
    List,
    /// Install a driver package archive
    Install { archive: PathBuf },
    /// Download a package from the channel and install it
    Download {
        /// Package name or its 1-based index in `drivers fetch`
        package: String,
        /// Channel repository, defaults to the configured channel
        #[arg(long)]
        repo: Option<String>,
        /// List every release asset, not only the first zip of each release
        #[arg(long)]
        bypass_validation: bool,
    },
    /// Select the active driver (label, name or directory name)
    Select { driver: String },
    /// Delete an installed driver
    Delete { driver: String },
    /// List packages published by the channel
    Fetch {
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        bypass_validation: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Show a group or a single setting (`Video/Renderer`)
    Show { path: Option<String> },
    /// Assign a value
    Set { path: String, value: String },
    /// Restore a setting's default
    Reset { path: String },
    /// Interactive settings browser
    Shell,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print one preference, or all of them
    Get { key: Option<String> },
    /// Write a preference (`bool:true`, `int:3`, `float:0.5`, `long:9`, or a plain string)
    Set {
        key: String,
        value: Option<String>,
        /// Remove the key instead
        #[arg(long, conflicts_with = "value")]
        unset: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BindingsCommand {
    List,
    /// Bind a host key code to a pad button
    Bind { key: i32, button: PadButton },
    /// Remove the binding of a host key code
    Unbind { key: i32 },
    /// Restore the default layout
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// Install a development build of the engine library
    Install { path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Install a license key for a game
    Install { key: PathBuf, game: String },
}

#[derive(Subcommand, Debug)]
pub enum ChannelCommand {
    Get,
    /// Set the channel repository; no URL restores the default
    Set { url: Option<String> },
}

pub async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Status => status(app),
        Command::Drivers(cmd) => drivers(app, cmd).await,
        Command::Settings(cmd) => settings(app, cmd),
        Command::Prefs(cmd) => prefs(app, cmd),
        Command::Bindings(cmd) => bindings(app, cmd),
        Command::Library(LibraryCommand::Install { path }) => {
            let version = app.library_installer().install(&path)?;
            println!("{} {}", "Installed engine library".green(), version.bold());
            Ok(())
        }
        Command::Keys(KeysCommand::Install { key, game }) => {
            if !app.install_key(&key, &game) {
                bail!("Failed to install key {} for {}", key.display(), game);
            }
            println!("{} {}", "Key installed for".green(), game.bold());
            Ok(())
        }
        Command::Channel(cmd) => channel(app, cmd),
    }
}

fn status(app: &App) -> Result<()> {
    println!("{}", "=== emuctl ===".bold().cyan());
    let mode = if app.paths.is_portable {
        "portable"
    } else {
        "installed"
    };
    println!("  Data directory: {} ({})", app.paths.base_dir().display(), mode);
    println!("  Selected driver: {}", app.registry.selected().green());
    println!("  Installed drivers: {}", app.registry.list_drivers().len() - 1);
    println!("  Driver channel: {}", app.channel());
    Ok(())
}

fn print_driver(location: &DriverLocation, meta: &DriverMetadata, selected: &str) {
    let marker = if meta.label == selected {
        "●".green()
    } else {
        " ".normal()
    };
    println!("{} {}", marker, meta.label.bold());
    if !meta.description.is_empty() {
        println!("    {}", meta.description);
    }
    let details: Vec<String> = [
        meta.vendor.as_ref().map(|v| format!("vendor {}", v)),
        meta.driver_version.as_ref().map(|v| format!("driver {}", v)),
        meta.author.as_ref().map(|a| format!("by {}", a)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !details.is_empty() {
        println!("    {}", details.join(", ").dimmed());
    }
    if let DriverLocation::Installed(dir) = location {
        println!("    {}", dir.display().to_string().dimmed());
    }
}

fn resolve_driver(app: &App, query: &str) -> Result<(DriverLocation, DriverMetadata)> {
    app.registry
        .find(query)
        .ok_or_else(|| anyhow!("No installed driver matches '{}'", query))
}

async fn fetch_channel(
    app: &App,
    repo: Option<String>,
    bypass_validation: bool,
) -> Result<Vec<RemoteDriver>> {
    let repo = repo.unwrap_or_else(|| app.channel());
    let drivers = app
        .release_fetcher()
        .fetch_releases(&repo, bypass_validation)
        .await?;
    Ok(drivers)
}

fn print_progress(progress: DownloadProgress) {
    let line = match progress.percent() {
        Some(percent) => format!("\r  {:>3}% ({} / {} bytes)", percent, progress.downloaded, progress.total),
        None => format!("\r  {} bytes", progress.downloaded),
    };
    print!("{}", line);
    let _ = std::io::stdout().flush();
}

async fn drivers(app: &App, cmd: DriversCommand) -> Result<()> {
    match cmd {
        DriversCommand::List => {
            let selected = app.registry.selected();
            for (location, meta) in app.registry.list_drivers() {
                print_driver(&location, &meta, &selected);
            }
            Ok(())
        }
        DriversCommand::Install { archive } => {
            let result = app.registry.install_async(archive).await;
            if result.is_success() {
                println!("{}", result.to_string().green());
                Ok(())
            } else {
                bail!("{}", result)
            }
        }
        DriversCommand::Download {
            package,
            repo,
            bypass_validation,
        } => {
            let available = fetch_channel(app, repo, bypass_validation).await?;
            let chosen = match package.parse::<usize>() {
                Ok(index) if index >= 1 => available.get(index - 1),
                _ => available
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(&package)),
            }
            .ok_or_else(|| anyhow!("The channel has no package '{}'", package))?;

            println!("Downloading {}...", chosen.name.bold());
            let result = download_and_install(
                &app.registry,
                &app.http,
                &chosen.download_url,
                &chosen.name,
                |downloaded, total| print_progress(DownloadProgress { downloaded, total }),
            )
            .await;
            println!();

            let result = result?;
            if result.is_success() {
                println!("{}", result.to_string().green());
                Ok(())
            } else {
                bail!("{}", result)
            }
        }
        DriversCommand::Select { driver } => {
            let (location, meta) = resolve_driver(app, &driver)?;
            app.registry.select(&location)?;
            println!("{} {}", "Selected".green(), meta.label.bold());
            Ok(())
        }
        DriversCommand::Delete { driver } => {
            let (location, meta) = resolve_driver(app, &driver)?;
            app.registry.delete(&location)?;
            println!("{} {}", "Deleted".green(), meta.label.bold());
            Ok(())
        }
        DriversCommand::Fetch {
            repo,
            bypass_validation,
        } => {
            let available = fetch_channel(app, repo, bypass_validation).await?;
            if available.is_empty() {
                println!("{}", "The channel publishes no driver packages".yellow());
            }
            for (index, driver) in available.iter().enumerate() {
                println!(
                    "{:>3}. {} {}",
                    index + 1,
                    driver.name.bold(),
                    format!("({} bytes, {})", driver.size, driver.release).dimmed()
                );
            }
            Ok(())
        }
    }
}

/// Render a node: a leaf as `title = value`, a group as its children
pub(crate) fn describe(tree: &SettingsTree, path: &SettingPath) -> Result<Vec<String>> {
    let node = tree.node(path)?;
    if let SettingNode::Leaf(leaf) = node {
        let value = leaf
            .value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| format!("<{}>", leaf.type_name()));
        return Ok(vec![format!("{} = {}", tree.display_title(path)?, value)]);
    }

    let mut lines = Vec::new();
    for (key, child) in tree.children(path)? {
        let child_path = path.child(key);
        match child {
            SettingNode::Group(_) => lines.push(format!("{}/", key)),
            SettingNode::Leaf(leaf) => {
                let value = leaf
                    .value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| format!("<{}>", leaf.type_name()));
                lines.push(format!("{} = {}", tree.display_title(&child_path)?, value));
            }
        }
    }
    Ok(lines)
}

fn settings(app: &App, cmd: SettingsCommand) -> Result<()> {
    let mut tree = app.settings()?;
    match cmd {
        SettingsCommand::Show { path } => {
            let path = path
                .map(|p| SettingPath::parse_user(&p))
                .unwrap_or_else(SettingPath::root);
            for line in describe(&tree, &path)? {
                println!("{}", line);
            }
        }
        SettingsCommand::Set { path, value } => {
            let path = SettingPath::parse_user(&path);
            tree.set_raw(&path, &value)?;
            println!("{} = {}", path.title().bold(), tree.get(&path)?.to_string().green());
        }
        SettingsCommand::Reset { path } => {
            let path = SettingPath::parse_user(&path);
            tree.reset(&path)?;
            println!("{} = {}", path.title().bold(), tree.get(&path)?.to_string().green());
        }
        SettingsCommand::Shell => shell::run(&mut tree)?,
    }
    Ok(())
}

fn prefs(app: &App, cmd: PrefsCommand) -> Result<()> {
    match cmd {
        PrefsCommand::Get { key: None } => {
            for (key, value) in app.prefs.all() {
                println!("{} = {} {}", key.bold(), value, format!("({})", value.type_name()).dimmed());
            }
        }
        PrefsCommand::Get { key: Some(key) } => match app.prefs.get(&key) {
            Some(value) => println!("{}", value),
            None => match keys::default_for(&key) {
                Some(default) => println!("{} {}", default, "(default)".dimmed()),
                None => bail!("Preference '{}' is not set", key),
            },
        },
        PrefsCommand::Set { key, unset: true, .. } => {
            app.prefs.remove(&key)?;
            println!("{} {}", "Removed".green(), key.bold());
        }
        PrefsCommand::Set {
            key,
            value: Some(raw),
            ..
        } => {
            let value = PrefValue::parse_typed(&raw).map_err(|e| anyhow!(e))?;
            app.prefs.set(&key, Some(value.clone()))?;
            println!("{} = {}", key.bold(), value.to_string().green());
        }
        PrefsCommand::Set { value: None, .. } => bail!("A value or --unset is required"),
    }
    app.prefs.sync()?;
    Ok(())
}

fn bindings(app: &App, cmd: BindingsCommand) -> Result<()> {
    let mut bindings = InputBindings::load(&app.prefs);
    match cmd {
        BindingsCommand::List => {
            for button in PadButton::all() {
                let key = bindings
                    .key_for(*button)
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let marker = if bindings.is_default(*button) { "" } else { " *" };
                println!("{:>9}{}  {}", button.as_str(), marker, key);
            }
            return Ok(());
        }
        BindingsCommand::Bind { key, button } => {
            if let Some(previous) = bindings.bind(key, button) {
                println!("{}", format!("Key {} is no longer bound", previous).yellow());
            }
            println!("{} {} -> {}", "Bound".green(), key, button);
        }
        BindingsCommand::Unbind { key } => match bindings.unbind(key) {
            Some(button) => println!("{} {} ({})", "Unbound".green(), key, button),
            None => bail!("Key {} is not bound", key),
        },
        BindingsCommand::Reset => {
            bindings.reset();
            println!("{}", "Bindings restored to defaults".green());
        }
    }
    bindings
        .save(&app.prefs)
        .context("Failed to save input bindings")
}

fn channel(app: &App, cmd: ChannelCommand) -> Result<()> {
    match cmd {
        ChannelCommand::Get => println!("{}", app.channel()),
        ChannelCommand::Set { url: None } => {
            app.prefs.remove(keys::GPU_DRIVER_CHANNEL)?;
            println!("{} {}", "Channel reset to".green(), app.channel());
        }
        ChannelCommand::Set { url: Some(url) } => {
            parse_repo_url(&url)?;
            app.prefs.set_value(keys::GPU_DRIVER_CHANNEL, url.trim())?;
            println!("{} {}", "Channel set to".green(), app.channel());
        }
    }
    app.prefs.sync()?;
    Ok(())
}
