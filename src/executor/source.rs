//! Resolve source references into document text.
use std::io::Read as _;
use std::path::{Path, PathBuf};

use url::Url;
use walkdir::WalkDir;

use crate::config::fetch;
use crate::error::ConfigError;

/// What a source reference on the command line points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `-`: all of standard input.
    Stdin,
    /// Every `.yaml`/`.yml` file below a directory.
    Directory(PathBuf),
    /// One local file.
    File(PathBuf),
    /// A URL with a host, or any `file:` URL.
    Url(String),
    /// The reference itself is the document.
    Literal(String),
}

/// Text read from one document, or why it could not be read.
#[derive(Debug)]
pub struct Document {
    /// Path, URL or label identifying the document in logs and failures.
    pub origin: String,
    /// The document text.
    pub text: Result<String, ConfigError>,
}

impl Source {
    /// Classify `reference`; anything unrecognised is literal content.
    #[must_use]
    pub fn classify(reference: &str) -> Self {
        if reference == "-" {
            return Self::Stdin;
        }
        let path = Path::new(reference);
        if path.is_dir() {
            return Self::Directory(path.to_path_buf());
        }
        if path.is_file() {
            return Self::File(path.to_path_buf());
        }
        if is_url(reference) {
            return Self::Url(reference.to_string());
        }
        Self::Literal(reference.to_string())
    }

    /// Read every document this source yields, in traversal order.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        match self {
            Self::Stdin => {
                let mut text = String::new();
                let read = std::io::stdin()
                    .read_to_string(&mut text)
                    .map(|_| text)
                    .map_err(|source| ConfigError::Io {
                        path: "<stdin>".to_string(),
                        source,
                    });
                vec![Document {
                    origin: "<stdin>".to_string(),
                    text: read,
                }]
            }
            Self::Directory(dir) => walk(dir),
            Self::File(path) => vec![read_file(path)],
            Self::Url(url) => vec![Document {
                origin: url.clone(),
                text: fetch::fetch(url),
            }],
            Self::Literal(text) => vec![Document {
                origin: "<literal>".to_string(),
                text: Ok(text.clone()),
            }],
        }
    }
}

fn is_url(reference: &str) -> bool {
    Url::parse(reference)
        .is_ok_and(|u| u.scheme() == "file" || u.host_str().is_some_and(|h| !h.is_empty()))
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml")
}

fn read_file(path: &Path) -> Document {
    Document {
        origin: path.display().to_string(),
        text: std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn walk(dir: &Path) -> Vec<Document> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() && is_yaml(e.path()) => Some(read_file(e.path())),
            Ok(_) => None,
            Err(e) => {
                let origin = e
                    .path()
                    .map_or_else(|| dir.display().to_string(), |p| p.display().to_string());
                let message = e.to_string();
                Some(Document {
                    origin: origin.clone(),
                    text: Err(ConfigError::Io {
                        path: origin,
                        source: e
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other(message)),
                    }),
                })
            }
        })
        .collect()
}
