//! Writes the step's `files`.
use std::fs;
use std::io::Read as _;
use std::path::Path;

use anyhow::{Context as _, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;

use crate::config::{Directory, File, Step};
use crate::error::PluginError;

use super::helpers::{chmod, chown, ownership};
use super::{Context, Plugin, combine, directories};

/// Decodes, renders and writes each declared file.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsureFiles;

impl Plugin for EnsureFiles {
    fn name(&self) -> &'static str {
        "files"
    }

    fn run(&self, step: &Step, ctx: &Context) -> Result<()> {
        let errors = step
            .files
            .iter()
            .filter_map(|file| write_file(ctx, file).err())
            .collect();
        combine(errors)
    }
}

fn write_file(ctx: &Context, file: &File) -> Result<()> {
    ctx.log.debug(&format!("creating file {}", file.path));
    let path = ctx.resolve(&file.path);

    if let Some(parent) = Path::new(&file.path).parent()
        && !ctx.resolve(parent).exists()
    {
        // Parents must stay traversable by the owner.
        let permissions = if file.permissions < 0o700 {
            file.permissions | 0o100
        } else {
            file.permissions
        };
        directories::ensure(
            ctx,
            &Directory {
                path: parent.display().to_string(),
                permissions,
                owner: file.owner,
                group: file.group,
            },
        )
        .with_context(|| format!("failed to create parent of {}", file.path))?;
    }

    let decoded = decode(&file.encoding, &file.content)
        .with_context(|| format!("failed decoding content with encoding {}", file.encoding))?;
    let content = match String::from_utf8(decoded) {
        Ok(text) => ctx.render(&text).into_bytes(),
        Err(binary) => binary.into_bytes(),
    };

    fs::write(&path, content).with_context(|| format!("failed to write {}", file.path))?;
    chmod(&path, file.permissions)?;
    let owner = ownership(ctx, &file.owner_string, file.owner, file.group)
        .with_context(|| format!("failed resolving owner of {}", file.path))?;
    chown(&path, owner)
}

/// Decode `content` according to a cloud-init style `encoding` name.
///
/// # Errors
///
/// Returns [`PluginError::UnsupportedEncoding`] for unknown names, or the
/// decoder error for malformed content.
pub fn decode(encoding: &str, content: &str) -> Result<Vec<u8>> {
    match encoding {
        "" => Ok(content.as_bytes().to_vec()),
        "b64" | "base64" => base64(content),
        "gz" | "gzip" => gunzip(content.as_bytes()),
        "gz+b64" | "gzip+base64" | "gz+base64" | "gzip+b64" => gunzip(&base64(content)?),
        other => Err(PluginError::UnsupportedEncoding(other.to_string()).into()),
    }
}

fn base64(content: &str) -> Result<Vec<u8>> {
    let compact: String = content.split_whitespace().collect();
    STANDARD
        .decode(compact)
        .context("unable to decode base64")
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .context("unable to decode gzip")?;
    Ok(out)
}
