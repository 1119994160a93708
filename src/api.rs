// API client module: a blocking HTTP client that talks to the encryption
// service. Each operation performs exactly one request and decodes the
// answer into a typed result or a typed error.

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::models::{
    CodeFile, DeleteBody, EncryptionResult, HealthStatus, InlineCodePayload, OutputFileInfo,
    OutputListing, PythonVersions, ReadmeBody, UploadRequest,
};

/// Bytes copied per write when streaming a download to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// Multipart field used for zip archives on the single-file endpoint.
pub const ZIP_FIELD: &str = "file";
/// Multipart field used for every other uploaded file, repeated per file.
pub const FILES_FIELD: &str = "files";
pub const PYTHON_VERSION_FIELD: &str = "python_version";

/// Operations offered by the encryption service. The dispatcher is written
/// against this trait so it can be driven by a mock in tests.
pub trait EncryptionApi {
    fn health_check(&self) -> Result<HealthStatus>;
    fn list_python_versions(&self) -> Result<PythonVersions>;
    fn encrypt(&self, request: &UploadRequest) -> Result<EncryptionResult>;
    fn list_outputs(&self) -> Result<Vec<OutputFileInfo>>;
    fn download_output(&self, filename: &str, destination_dir: &Path) -> Result<PathBuf>;
    fn delete_output(&self, filename: &str) -> Result<bool>;
    fn get_readme(&self, filename: &str) -> Result<String>;
}

/// Client for one service instance. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client from a resolved configuration. Fails with a validation
    /// error if the base URL or timeout is unusable.
    pub fn new(config: &Configuration) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(config.base_url())
            .map_err(|e| Error::validation(format!("invalid base_url: {}", e)))?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(ApiClient { client, base_url })
    }

    /// Upload a single `.py` file or `.zip` archive.
    pub fn encrypt_single_file(
        &self,
        path: &Path,
        python_version: Option<&str>,
    ) -> Result<EncryptionResult> {
        let form = UploadForm::single_file(path, python_version)?;
        self.send_form(form)
    }

    /// Upload several files in one request, preserving their order.
    pub fn encrypt_multiple_files(
        &self,
        paths: &[PathBuf],
        python_version: Option<&str>,
    ) -> Result<EncryptionResult> {
        let form = UploadForm::multiple_files(paths, python_version)?;
        self.send_form(form)
    }

    /// Send source text directly as a JSON body.
    pub fn encrypt_inline_code(
        &self,
        files: &[CodeFile],
        python_version: Option<&str>,
    ) -> Result<EncryptionResult> {
        let payload = InlineCodePayload {
            files,
            python_version: python_version.filter(|v| !v.is_empty()),
        };
        let endpoint = "/api/encrypt";
        let response = self.send(self.request(Method::POST, endpoint)?.json(&payload))?;
        decode(response, endpoint)
    }

    fn send_form(&self, form: UploadForm) -> Result<EncryptionResult> {
        let endpoint = "/api/encrypt-file";
        // The multipart body owns every opened file; it is dropped when this
        // call returns, whatever the outcome.
        let multipart = form.into_multipart()?;
        let response = self.send(self.request(Method::POST, endpoint)?.multipart(multipart))?;
        decode(response, endpoint)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::validation(format!("base_url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let segments: Vec<&str> = endpoint.split('/').filter(|s| !s.is_empty()).collect();
        self.request_segments(method, &segments)
    }

    fn request_segments(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        debug!("{} {}", method, url);
        Ok(self.client.request(method, url))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        Ok(response.error_for_status()?)
    }
}

impl EncryptionApi for ApiClient {
    fn health_check(&self) -> Result<HealthStatus> {
        let endpoint = "/health";
        let response = self.send(self.request(Method::GET, endpoint)?)?;
        decode(response, endpoint)
    }

    fn list_python_versions(&self) -> Result<PythonVersions> {
        let endpoint = "/api/python-versions";
        let response = self.send(self.request(Method::GET, endpoint)?)?;
        decode(response, endpoint)
    }

    fn encrypt(&self, request: &UploadRequest) -> Result<EncryptionResult> {
        let python_version = request.python_version();
        match request {
            UploadRequest::SingleFile { path, .. } => self.encrypt_single_file(path, python_version),
            UploadRequest::MultiFile { paths, .. } => self.encrypt_multiple_files(paths, python_version),
            UploadRequest::InlineCode { files, .. } => self.encrypt_inline_code(files, python_version),
        }
    }

    fn list_outputs(&self) -> Result<Vec<OutputFileInfo>> {
        let endpoint = "/outputs";
        let response = self.send(self.request(Method::GET, endpoint)?)?;
        let listing: OutputListing = decode(response, endpoint)?;
        Ok(listing.files)
    }

    /// Stream `/download/{filename}` into `destination_dir`. A failure
    /// mid-stream leaves whatever was already written on disk.
    fn download_output(&self, filename: &str, destination_dir: &Path) -> Result<PathBuf> {
        let local_name = Path::new(filename)
            .file_name()
            .ok_or_else(|| Error::validation(format!("invalid output file name: '{}'", filename)))?;

        let mut response = self.send(self.request_segments(Method::GET, &["download", filename])?)?;

        fs::create_dir_all(destination_dir)?;
        let target = destination_dir.join(local_name);
        let mut file = File::create(&target)?;
        let written = copy_chunked(&mut response, &mut file)?;
        file.flush()?;

        info!("downloaded {} ({} bytes) to {}", filename, written, target.display());
        Ok(target)
    }

    fn delete_output(&self, filename: &str) -> Result<bool> {
        let endpoint = format!("/outputs/{}", filename);
        let response = self.send(self.request_segments(Method::DELETE, &["outputs", filename])?)?;
        let body: DeleteBody = decode(response, &endpoint)?;
        Ok(body.success)
    }

    fn get_readme(&self, filename: &str) -> Result<String> {
        let endpoint = format!("/readme/{}", filename);
        let response = self.send(self.request_segments(Method::GET, &["readme", filename])?)?;
        let body: ReadmeBody = decode(response, &endpoint)?;
        Ok(body.content)
    }
}

/// Read the whole body, then decode it. Reading failures are transport
/// errors; a body of the wrong shape is a protocol error.
fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
    let bytes = response.bytes()?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Protocol {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Copy `reader` into `writer` through a fixed-size buffer.
pub fn copy_chunked<R: Read + ?Sized, W: Write + ?Sized>(reader: &mut R, writer: &mut W) -> io::Result<u64> {
    let mut buf = [0u8; DOWNLOAD_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Value of one multipart field before anything is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    File { path: PathBuf, filename: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub value: FieldValue,
}

/// Plan of a multipart upload to `/api/encrypt-file`. Building the plan
/// checks that every file exists; files are only opened when the plan is
/// turned into a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    fields: Vec<FormField>,
}

impl UploadForm {
    /// `.zip` archives (any case) go in the `file` field, anything else in
    /// `files`, the same field the multi-file upload repeats.
    pub fn single_file(path: &Path, python_version: Option<&str>) -> Result<Self> {
        let filename = existing_file_name(path)?;
        let field = if filename.to_ascii_lowercase().ends_with(".zip") {
            ZIP_FIELD
        } else {
            FILES_FIELD
        };
        let mut form = UploadForm::default();
        form.push_file(field, path, filename);
        form.push_python_version(python_version);
        Ok(form)
    }

    /// One `files` field per path, in order. Fails on the first missing path.
    pub fn multiple_files(paths: &[PathBuf], python_version: Option<&str>) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::validation("at least one file is required"));
        }
        let mut form = UploadForm::default();
        for path in paths {
            let filename = existing_file_name(path)?;
            form.push_file(FILES_FIELD, path, filename);
        }
        form.push_python_version(python_version);
        Ok(form)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| match &f.value {
            FieldValue::Text(value) if f.name == name => Some(value.as_str()),
            _ => None,
        })
    }

    fn push_file(&mut self, name: &'static str, path: &Path, filename: String) {
        self.fields.push(FormField {
            name,
            value: FieldValue::File {
                path: path.to_path_buf(),
                filename,
            },
        });
    }

    fn push_python_version(&mut self, python_version: Option<&str>) {
        if let Some(version) = python_version.filter(|v| !v.is_empty()) {
            self.fields.push(FormField {
                name: PYTHON_VERSION_FIELD,
                value: FieldValue::Text(version.to_string()),
            });
        }
    }

    /// Open every file and build the request body. If opening one file
    /// fails, the parts built so far are dropped along with their handles.
    fn into_multipart(self) -> Result<multipart::Form> {
        let mut form = multipart::Form::new();
        for field in self.fields {
            form = match field.value {
                FieldValue::File { path, filename } => {
                    let part = multipart::Part::file(&path)
                        .map_err(|e| match e.kind() {
                            io::ErrorKind::NotFound => Error::missing_file(&path),
                            _ => Error::Io(e),
                        })?
                        .file_name(filename);
                    form.part(field.name, part)
                }
                FieldValue::Text(value) => form.text(field.name, value),
            };
        }
        Ok(form)
    }
}

fn existing_file_name(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::missing_file(path));
    }
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::missing_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"print('hello')\n").unwrap();
        path
    }

    #[test]
    fn zip_archive_uses_file_field() {
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "project.zip");
        let form = UploadForm::single_file(&path, None).unwrap();
        assert_eq!(form.field_names(), vec![ZIP_FIELD]);
    }

    #[test]
    fn zip_suffix_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "Project.ZIP");
        let form = UploadForm::single_file(&path, None).unwrap();
        assert_eq!(form.field_names(), vec![ZIP_FIELD]);
    }

    #[test]
    fn python_source_uses_files_field_without_version() {
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "main.py");
        let form = UploadForm::single_file(&path, None).unwrap();
        assert_eq!(form.field_names(), vec![FILES_FIELD]);
        assert_eq!(form.text_value(PYTHON_VERSION_FIELD), None);
        match &form.fields()[0].value {
            FieldValue::File { filename, .. } => assert_eq!(filename, "main.py"),
            other => panic!("expected file field, got {:?}", other),
        }
    }

    #[test]
    fn python_version_becomes_text_field() {
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "main.py");
        let form = UploadForm::single_file(&path, Some("3.11")).unwrap();
        assert_eq!(form.field_names(), vec![FILES_FIELD, PYTHON_VERSION_FIELD]);
        assert_eq!(form.text_value(PYTHON_VERSION_FIELD), Some("3.11"));

        let blank = UploadForm::single_file(&path, Some("")).unwrap();
        assert_eq!(blank.text_value(PYTHON_VERSION_FIELD), None);
    }

    #[test]
    fn missing_single_file_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let err = UploadForm::single_file(&dir.path().join("gone.py"), None).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("gone.py")));
    }

    #[test]
    fn multiple_files_keep_order_and_repeat_field() {
        let dir = tempdir().unwrap();
        let paths = vec![
            touch(dir.path(), "main.py"),
            touch(dir.path(), "utils.py"),
            touch(dir.path(), "lib.zip"),
        ];
        let form = UploadForm::multiple_files(&paths, Some("3.9")).unwrap();
        assert_eq!(
            form.field_names(),
            vec![FILES_FIELD, FILES_FIELD, FILES_FIELD, PYTHON_VERSION_FIELD]
        );
        let names: Vec<&str> = form
            .fields()
            .iter()
            .filter_map(|f| match &f.value {
                FieldValue::File { filename, .. } => Some(filename.as_str()),
                FieldValue::Text(_) => None,
            })
            .collect();
        assert_eq!(names, vec!["main.py", "utils.py", "lib.zip"]);
    }

    #[test]
    fn multiple_files_report_first_missing_path() {
        let dir = tempdir().unwrap();
        let paths = vec![
            touch(dir.path(), "main.py"),
            dir.path().join("first_missing.py"),
            dir.path().join("second_missing.py"),
        ];
        let err = UploadForm::multiple_files(&paths, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("first_missing.py"));
        assert!(!msg.contains("second_missing.py"));
    }

    #[test]
    fn empty_file_list_is_rejected() {
        assert!(matches!(
            UploadForm::multiple_files(&[], None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn copy_chunked_reassembles_bodies_larger_than_a_chunk() {
        let body: Vec<u8> = (0..DOWNLOAD_CHUNK_SIZE * 3 + 17)
            .map(|i| (i % 251) as u8)
            .collect();
        let mut out = Vec::new();
        let written = copy_chunked(&mut Cursor::new(&body), &mut out).unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(out, body);
    }

    #[test]
    fn endpoint_urls_are_joined_onto_base_path() {
        let config = Configuration {
            base_url: "http://localhost:5000/svc/".into(),
            ..Default::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(
            client.url(&["api", "python-versions"]).unwrap().as_str(),
            "http://localhost:5000/svc/api/python-versions"
        );
        assert_eq!(
            client.url(&["download", "encrypted a.zip"]).unwrap().as_str(),
            "http://localhost:5000/svc/download/encrypted%20a.zip"
        );
    }

    #[test]
    fn client_rejects_invalid_configuration() {
        let config = Configuration {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(ApiClient::new(&config), Err(Error::Validation(_))));
    }
}
