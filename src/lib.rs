// Library root
// -----------
// Client library for the Python code encryption service, plus the pieces
// the `pyencrypt-client` binary is built from.
//
// Module responsibilities:
// - `api`: HTTP interactions with the service (uploads, listing, download,
//   deletion) behind the `EncryptionApi` trait.
// - `models`: request and response shapes.
// - `error`: the error taxonomy shared by client and dispatcher.
// - `config`: configuration file, defaults and command line overrides.
// - `cli`: argument parsing and the process entry point.
// - `dispatch`: one handler per remote verb, result rendering, exit codes.
// - `ui`: terminal output, spinner and interactive prompts.
//
// Library users normally only need `ApiClient` and the models:
//
//     let config = Configuration::default();
//     let client = ApiClient::new(&config)?;
//     let result = client.encrypt_single_file(Path::new("main.py"), Some("3.9"))?;
pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod ui;

#[cfg(test)]
mod tests;

pub use api::{ApiClient, EncryptionApi};
pub use config::{ConfigStore, Configuration};
pub use dispatch::Outcome;
pub use error::{Error, Result};
pub use models::{EncryptionResult, UploadRequest};
