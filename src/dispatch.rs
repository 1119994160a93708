// Command dispatcher: maps a remote verb to one API call, renders the
// result and decides the terminal outcome of the invocation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};

use crate::api::EncryptionApi;
use crate::cli::{
    DeleteArgs, DownloadArgs, EncryptCodeArgs, EncryptFileArgs, EncryptFilesArgs,
    EncryptTextArgs, ReadmeArgs, RemoteCommand, UploadOptions,
};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::models::{CodeFile, EncryptionResult, EncryptionStatus, UploadRequest};
use crate::ui::Ui;

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything the command asked for was done.
    Succeeded,
    /// An artifact was produced but some files failed to compile.
    PartialFailure,
    /// The service reported `success: false`.
    HardFailure,
    /// Validation, transport or protocol failure ended the command.
    Aborted,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Succeeded => 0,
            Outcome::PartialFailure | Outcome::HardFailure | Outcome::Aborted => 1,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::Status => "status",
            RemoteCommand::Versions => "versions",
            RemoteCommand::EncryptFile(_) => "encrypt-file",
            RemoteCommand::EncryptFiles(_) => "encrypt-files",
            RemoteCommand::EncryptCode(_) => "encrypt-code",
            RemoteCommand::EncryptText(_) => "encrypt-text",
            RemoteCommand::List => "list",
            RemoteCommand::Download(_) => "download",
            RemoteCommand::Delete(_) => "delete",
            RemoteCommand::Readme(_) => "readme",
        }
    }
}

pub struct Dispatcher<A, W: Write> {
    api: A,
    config: Configuration,
    ui: Ui<W>,
}

impl<A: EncryptionApi, W: Write> Dispatcher<A, W> {
    pub fn new(api: A, config: Configuration, ui: Ui<W>) -> Self {
        Self { api, config, ui }
    }

    pub fn into_ui(self) -> Ui<W> {
        self.ui
    }

    /// Run one verb. Any error aborts the command with a single line naming
    /// the cause.
    pub fn dispatch(&mut self, command: RemoteCommand) -> Outcome {
        let name = command.name();
        debug!("dispatching {}", name);
        let result = match command {
            RemoteCommand::Status => self.status(),
            RemoteCommand::Versions => self.versions(),
            RemoteCommand::EncryptFile(args) => self.encrypt_file(args),
            RemoteCommand::EncryptFiles(args) => self.encrypt_files(args),
            RemoteCommand::EncryptCode(args) => self.encrypt_code(args),
            RemoteCommand::EncryptText(args) => self.encrypt_text(args),
            RemoteCommand::List => self.list(),
            RemoteCommand::Download(args) => self.download(args),
            RemoteCommand::Delete(args) => self.delete(args),
            RemoteCommand::Readme(args) => self.readme(args),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.ui.error(failure_line(name, &e));
                Outcome::Aborted
            }
        };
        if self.ui.is_broken() {
            warn!("{}: output could not be written", name);
            return Outcome::Aborted;
        }
        outcome
    }

    fn status(&mut self) -> Result<Outcome> {
        let health = self.api.health_check()?;
        if health.is_ok() {
            self.ui
                .success(format!("Service is up: {}", self.config.base_url()));
            Ok(Outcome::Succeeded)
        } else {
            self.ui
                .warning(format!("Service reported status '{}'", health.status));
            Ok(Outcome::Aborted)
        }
    }

    fn versions(&mut self) -> Result<Outcome> {
        let versions = self.api.list_python_versions()?;

        self.ui.line("Available Python versions:");
        self.ui.rule(60);
        if versions.versions.is_empty() {
            self.ui.line("  No Python versions found");
        }
        for info in &versions.versions {
            let marker = if versions.is_default(info) { " (default)" } else { "" };
            self.ui.line(format!(
                "  Python {}: {}{}",
                info.version, info.full_version, marker
            ));
            self.ui.line(format!("    path: {}", info.path));
        }
        Ok(Outcome::Succeeded)
    }

    fn encrypt_file(&mut self, args: EncryptFileArgs) -> Result<Outcome> {
        let path = args
            .file
            .ok_or_else(|| Error::validation("--file is required"))?;
        let python_version = self.python_version(&args.options);

        self.ui.line(format!("Uploading file: {}", path.display()));
        let request = UploadRequest::SingleFile {
            path,
            python_version,
        };
        self.encrypt("encrypt-file", request, args.options.output.as_deref())
    }

    fn encrypt_files(&mut self, args: EncryptFilesArgs) -> Result<Outcome> {
        if args.files.is_empty() {
            return Err(Error::validation("at least one --files path is required"));
        }
        let python_version = self.python_version(&args.options);

        self.ui
            .line(format!("Uploading {} files...", args.files.len()));
        let request = UploadRequest::MultiFile {
            paths: args.files,
            python_version,
        };
        self.encrypt("encrypt-files", request, args.options.output.as_deref())
    }

    fn encrypt_code(&mut self, args: EncryptCodeArgs) -> Result<Outcome> {
        if args.files.is_empty() {
            return Err(Error::validation("at least one --files path is required"));
        }
        let files = args
            .files
            .iter()
            .map(|path| read_code_file(path))
            .collect::<Result<Vec<_>>>()?;
        let python_version = self.python_version(&args.options);

        self.ui.line(format!(
            "Encrypting {} files through the code text API...",
            files.len()
        ));
        let request = UploadRequest::InlineCode {
            files,
            python_version,
        };
        self.encrypt("encrypt-code", request, args.options.output.as_deref())
    }

    fn encrypt_text(&mut self, args: EncryptTextArgs) -> Result<Outcome> {
        let name = args
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::validation("--name is required"))?;
        let content = args
            .content
            .ok_or_else(|| Error::validation("--content is required"))?;
        let python_version = self.python_version(&args.options);

        self.ui.line(format!("Encrypting code text: {}", name));
        let request = UploadRequest::InlineCode {
            files: vec![CodeFile::new(name, content)],
            python_version,
        };
        self.encrypt("encrypt-text", request, args.options.output.as_deref())
    }

    fn encrypt(
        &mut self,
        command: &str,
        request: UploadRequest,
        output: Option<&Path>,
    ) -> Result<Outcome> {
        if let Some(version) = request.python_version() {
            self.ui.line(format!("Using Python version: {}", version));
        }

        let spinner = self.ui.spinner("Encrypting...");
        let result = self.api.encrypt(&request);
        spinner.finish_and_clear();

        Ok(self.report_encryption(command, &result?, output))
    }

    /// Shared interpretation of an encryption result for every encrypt verb:
    /// print it, download the artifact when asked, and pick the outcome.
    fn report_encryption(
        &mut self,
        command: &str,
        result: &EncryptionResult,
        output: Option<&Path>,
    ) -> Outcome {
        let outcome = match result.status() {
            EncryptionStatus::Rejected(reason) => {
                self.ui.line("");
                self.ui.error(format!("Encryption failed: {}", reason));
                debug!("{} rejected by service", command);
                return Outcome::HardFailure;
            }
            EncryptionStatus::Complete => {
                self.ui.line("");
                self.ui.success(&result.message);
                self.print_artifact(result);
                Outcome::Succeeded
            }
            EncryptionStatus::Partial(failed) => {
                self.ui.line("");
                self.ui.warning(&result.message);
                self.print_artifact(result);
                self.ui.line("");
                self.ui.line("Files that failed to compile:");
                for entry in failed {
                    self.ui
                        .line(format!("  - {}: {}", entry.filename, entry.error));
                }
                Outcome::PartialFailure
            }
        };

        let Some(dir) = output else {
            return outcome;
        };
        match self.download_artifact(result, dir) {
            Ok(path) => {
                self.ui.line(format!("Downloaded to: {}", path.display()));
                outcome
            }
            Err(e) => {
                self.ui.error(failure_line(command, &e));
                match outcome {
                    Outcome::Succeeded => Outcome::Aborted,
                    other => other,
                }
            }
        }
    }

    fn print_artifact(&mut self, result: &EncryptionResult) {
        self.ui.line(format!(
            "Output file: {}",
            result.output_file.as_deref().unwrap_or("-")
        ));
        if let Some(url) = &result.download_url {
            self.ui
                .line(format!("Download link: {}{}", self.config.base_url(), url));
        }
    }

    fn download_artifact(&mut self, result: &EncryptionResult, dir: &Path) -> Result<PathBuf> {
        let filename = result.output_file.as_deref().ok_or_else(|| {
            Error::ApplicationFailure("service did not name an output file".into())
        })?;
        let spinner = self.ui.spinner(format!("Downloading {}...", filename));
        let downloaded = self.api.download_output(filename, dir);
        spinner.finish_and_clear();
        downloaded
    }

    fn list(&mut self) -> Result<Outcome> {
        let files = self.api.list_outputs()?;
        if files.is_empty() {
            self.ui.line("No output files available");
            return Ok(Outcome::Succeeded);
        }

        self.ui.line(format!("{} files:", files.len()));
        self.ui.rule(80);
        self.ui
            .line(format!("{:<50} {:>15} {:>20}", "Name", "Size", "Modified"));
        self.ui.rule(80);
        for file in &files {
            let mtime = if file.mtime_iso.is_empty() { "N/A" } else { file.mtime_iso.as_str() };
            self.ui.line(format!(
                "{:<50} {:>15} {:>20}",
                file.name,
                file.display_size(),
                mtime
            ));
        }
        Ok(Outcome::Succeeded)
    }

    fn download(&mut self, args: DownloadArgs) -> Result<Outcome> {
        let spinner = self.ui.spinner(format!("Downloading {}...", args.filename));
        let downloaded = self.api.download_output(&args.filename, &args.output);
        spinner.finish_and_clear();

        self.ui
            .success(format!("Downloaded to: {}", downloaded?.display()));
        Ok(Outcome::Succeeded)
    }

    fn delete(&mut self, args: DeleteArgs) -> Result<Outcome> {
        if !self.api.delete_output(&args.filename)? {
            return Err(Error::ApplicationFailure(format!(
                "service refused to delete {}",
                args.filename
            )));
        }
        self.ui.success(format!("Deleted: {}", args.filename));
        Ok(Outcome::Succeeded)
    }

    fn readme(&mut self, args: ReadmeArgs) -> Result<Outcome> {
        let content = self.api.get_readme(&args.filename)?;
        self.ui.line(content);
        Ok(Outcome::Succeeded)
    }

    /// Per-command `--python-version`, falling back to the configured one.
    fn python_version(&self, options: &UploadOptions) -> Option<String> {
        options
            .python_version
            .clone()
            .or_else(|| self.config.python_version.clone())
            .filter(|v| !v.is_empty())
    }
}

fn read_code_file(path: &Path) -> Result<CodeFile> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::missing_file(path),
        io::ErrorKind::InvalidData => {
            Error::validation(format!("{} is not valid UTF-8 text", path.display()))
        }
        _ => Error::Io(e),
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::missing_file(path))?;
    Ok(CodeFile { filename, content })
}

/// The single line printed when a command aborts.
fn failure_line(command: &str, error: &Error) -> String {
    format!("{}: {}", command, error)
}
