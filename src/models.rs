// Request and response shapes exchanged with the encryption service.
// All of these live for a single command invocation: decoded from a
// response, rendered, then dropped.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One of the three upload shapes the service accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRequest {
    /// A single `.py` file or a `.zip` project archive.
    SingleFile {
        path: PathBuf,
        python_version: Option<String>,
    },
    /// Several files uploaded together, in the given order.
    MultiFile {
        paths: Vec<PathBuf>,
        python_version: Option<String>,
    },
    /// Source text sent as JSON, no local files involved.
    InlineCode {
        files: Vec<CodeFile>,
        python_version: Option<String>,
    },
}

impl UploadRequest {
    pub fn python_version(&self) -> Option<&str> {
        match self {
            UploadRequest::SingleFile { python_version, .. }
            | UploadRequest::MultiFile { python_version, .. }
            | UploadRequest::InlineCode { python_version, .. } => python_version.as_deref(),
        }
    }
}

/// A named chunk of source text for the inline-code endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    pub filename: String,
    pub content: String,
}

impl CodeFile {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// A file the server failed to compile without aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFileEntry {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionStats {
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub compiled_files: u64,
    #[serde(default)]
    pub failed_count: u64,
}

/// Response body of both encryption endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub readme_file: Option<String>,
    #[serde(default)]
    pub stats: EncryptionStats,
    #[serde(default)]
    pub failed_files: Vec<FailedFileEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

/// How a decoded `EncryptionResult` should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionStatus<'a> {
    /// Artifact produced and every file compiled.
    Complete,
    /// Artifact produced, but some files failed to compile.
    Partial(&'a [FailedFileEntry]),
    /// The service refused or failed the whole request.
    Rejected(&'a str),
}

impl EncryptionResult {
    pub fn status(&self) -> EncryptionStatus<'_> {
        if !self.success {
            let reason = self
                .error
                .as_deref()
                .filter(|e| !e.is_empty())
                .unwrap_or("unknown error");
            return EncryptionStatus::Rejected(reason);
        }
        if self.failed_files.is_empty() {
            EncryptionStatus::Complete
        } else {
            EncryptionStatus::Partial(&self.failed_files)
        }
    }
}

/// Entry of the `/outputs` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFileInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mtime: f64,
    #[serde(default)]
    pub mtime_iso: String,
}

impl OutputFileInfo {
    /// Human size: kilobytes with one decimal above 1 KiB, bytes otherwise.
    pub fn display_size(&self) -> String {
        if self.size > 1024 {
            format!("{:.1} KB", self.size as f64 / 1024.0)
        } else {
            format!("{} B", self.size)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonVersionInfo {
    pub version: String,
    #[serde(default)]
    pub full_version: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonVersions {
    #[serde(default)]
    pub versions: Vec<PythonVersionInfo>,
    #[serde(default)]
    pub default_version: Option<PythonVersionInfo>,
}

impl PythonVersions {
    pub fn is_default(&self, info: &PythonVersionInfo) -> bool {
        self.default_version
            .as_ref()
            .is_some_and(|d| d.version == info.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OutputListing {
    #[serde(default)]
    pub files: Vec<OutputFileInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReadmeBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteBody {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineCodePayload<'a> {
    pub files: &'a [CodeFile],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_failure_is_distinguished_from_success() {
        let result: EncryptionResult = serde_json::from_value(json!({
            "success": true,
            "message": "done",
            "output_file": "encrypted_abc.zip",
            "download_url": "/download/encrypted_abc.zip",
            "stats": {"total_files": 2, "compiled_files": 1, "failed_count": 1},
            "failed_files": [{"filename": "b.py", "error": "SyntaxError"}]
        }))
        .unwrap();

        match result.status() {
            EncryptionStatus::Partial(failed) => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].filename, "b.py");
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
    }

    #[test]
    fn failure_body_without_optional_fields_decodes() {
        let result: EncryptionResult =
            serde_json::from_value(json!({"success": false, "error": "quota exceeded"})).unwrap();
        assert_eq!(result.status(), EncryptionStatus::Rejected("quota exceeded"));
        assert!(result.output_file.is_none());
        assert_eq!(result.stats, EncryptionStats::default());
    }

    #[test]
    fn rejected_without_error_text_still_has_a_reason() {
        let result = EncryptionResult {
            success: false,
            ..Default::default()
        };
        assert_eq!(result.status(), EncryptionStatus::Rejected("unknown error"));
    }

    #[test]
    fn display_size_switches_to_kilobytes_above_1024() {
        let mut info = OutputFileInfo {
            name: "a.zip".into(),
            size: 1024,
            mtime: 0.0,
            mtime_iso: String::new(),
        };
        assert_eq!(info.display_size(), "1024 B");
        info.size = 2048;
        assert_eq!(info.display_size(), "2.0 KB");
    }

    #[test]
    fn inline_payload_omits_missing_python_version() {
        let files = vec![CodeFile::new("main.py", "print('hi')")];
        let payload = InlineCodePayload {
            files: &files,
            python_version: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"files": [{"filename": "main.py", "content": "print('hi')"}]})
        );
    }

    #[test]
    fn default_version_is_matched_by_version_string() {
        let versions: PythonVersions = serde_json::from_value(json!({
            "versions": [
                {"version": "3.9", "full_version": "Python 3.9.18", "path": "/usr/bin/python3.9"},
                {"version": "3.11", "full_version": "Python 3.11.4", "path": "/usr/bin/python3.11"}
            ],
            "default_version": {"version": "3.9", "full_version": "Python 3.9.18", "path": "/usr/bin/python3"}
        }))
        .unwrap();
        assert!(versions.is_default(&versions.versions[0]));
        assert!(!versions.is_default(&versions.versions[1]));
    }
}
