// Command line surface: clap argument model and the process-level `run`
// that resolves configuration, handles the local verbs and hands remote
// verbs to the dispatcher.

use anyhow::Context;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

use crate::api::ApiClient;
use crate::config::{ConfigStore, Configuration, Overrides};
use crate::dispatch::{Dispatcher, Outcome};
use crate::ui::{self, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "pyencrypt-client",
    version,
    about = "Client for the Python code encryption service",
    long_about = "Upload Python sources or zip projects to the encryption service, then
list, download or delete the encrypted results.

QUICK START:
  pyencrypt-client init
  pyencrypt-client encrypt-file --file main.py --output ./dist/
  pyencrypt-client encrypt-file --file project.zip --output ./dist/
  pyencrypt-client encrypt-files --files main.py --files utils.py --output ./dist/"
)]
pub struct Cli {
    /// Without a verb, usage is printed and the process exits 0.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path (default: config.json next to the executable)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service URL, overrides the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds, overrides the config file
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            timeout: self.timeout,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update the config file interactively
    Init,

    /// Show the current configuration
    Config,

    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Verbs that talk to the service.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Check that the service is reachable
    Status,

    /// List the Python versions available on the service
    Versions,

    /// Encrypt a single file (.py or .zip project)
    EncryptFile(EncryptFileArgs),

    /// Encrypt several Python files in one request
    EncryptFiles(EncryptFilesArgs),

    /// Encrypt local files by sending their source text
    EncryptCode(EncryptCodeArgs),

    /// Encrypt source text given on the command line
    EncryptText(EncryptTextArgs),

    /// List downloadable output files
    #[command(aliases = &["ls"])]
    List,

    /// Download an output file
    Download(DownloadArgs),

    /// Delete an output file from the service
    #[command(aliases = &["rm"])]
    Delete(DeleteArgs),

    /// Print the README generated for an output
    Readme(ReadmeArgs),
}

/// Options shared by every encrypt verb.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Target Python version (default: from the config file)
    #[arg(long)]
    pub python_version: Option<String>,

    /// Download the result into this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptFileArgs {
    /// File to encrypt (.py or .zip)
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub options: UploadOptions,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptFilesArgs {
    /// Files to encrypt; repeat the flag for each file
    #[arg(short = 'f', long = "files")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub options: UploadOptions,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptCodeArgs {
    /// Files whose contents are sent as text; repeat the flag for each file
    #[arg(short = 'f', long = "files")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub options: UploadOptions,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptTextArgs {
    /// File name to give the code (e.g. test.py)
    #[arg(long)]
    pub name: Option<String>,

    /// Source code
    #[arg(long)]
    pub content: Option<String>,

    #[command(flatten)]
    pub options: UploadOptions,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DownloadArgs {
    pub filename: String,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DeleteArgs {
    pub filename: String,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReadmeArgs {
    pub filename: String,
}

/// Run one invocation and return its terminal outcome.
pub fn run(mut cli: Cli) -> Outcome {
    let Some(command) = cli.command.take() else {
        return match Cli::command().print_help() {
            Ok(()) => Outcome::Succeeded,
            Err(e) => {
                warn!("failed to print usage: {}", e);
                Outcome::Aborted
            }
        };
    };

    let store = ConfigStore::resolve(cli.config.clone());
    let config = store.load().with_overrides(&cli.overrides());
    let mut ui = Ui::stdout();

    match command {
        Commands::Init => match init(&store, &mut ui) {
            Ok(()) => Outcome::Succeeded,
            Err(e) => {
                ui.error(format!("init failed: {:#}", e));
                Outcome::Aborted
            }
        },
        Commands::Config => {
            ui.show_config(&store.path().display().to_string(), &config);
            if ui.is_broken() {
                Outcome::Aborted
            } else {
                Outcome::Succeeded
            }
        }
        Commands::Remote(command) => {
            let client = match ApiClient::new(&config) {
                Ok(client) => client,
                Err(e) => {
                    ui.error(format!("invalid configuration: {}", e));
                    return Outcome::Aborted;
                }
            };
            Dispatcher::new(client, config, ui).dispatch(command)
        }
    }
}

/// Interactive `init`: edit the stored values (not the overridden ones) and
/// save them back.
fn init<W: Write>(store: &ConfigStore, ui: &mut Ui<W>) -> anyhow::Result<()> {
    let location = store.path().display().to_string();
    ui.line(format!("Initializing config file: {}", location));
    ui.rule(40);

    let current: Configuration = store.load();
    let config = ui::prompt_config(&current)?;
    store
        .save(&config)
        .with_context(|| format!("failed to save {}", location))?;

    ui.line("");
    ui.success(format!("Config saved to: {}", location));
    ui.show_config(&location, &config);
    Ok(())
}
