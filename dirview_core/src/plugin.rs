//! Unpacker / packer plugins.
//!
//! A plugin is a plain trait object registered with a [`PluginRegistry`].
//! Capabilities a plugin does not provide report
//! [`PluginError::NotImplemented`].

use dirview_common::DirViewError;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// When a plugin is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginEvent {
    /// Turns a file into something comparable before the compare, and packs
    /// it back when saving
    FileUnpacker,
    FilePacker,
    /// Rewrites a file copy before it is diffed
    FilePrediffer,
    /// Rewrites loaded text before it is diffed
    BufferPrediffer,
}

impl PluginEvent {
    pub fn label(self) -> &'static str {
        match self {
            PluginEvent::FileUnpacker => "file unpacker",
            PluginEvent::FilePacker => "file packer",
            PluginEvent::FilePrediffer => "file prediffer",
            PluginEvent::BufferPrediffer => "buffer prediffer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub event: PluginEvent,
    pub description: String,
    /// `;`-separated regular expressions matched against file names
    pub file_filters: String,
    /// Applied without the user picking the plugin
    pub is_automatic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackOutcome {
    pub changed: bool,
    /// Passed back to [`Plugin::pack`] to restore the original format
    pub subcode: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOutcome {
    pub changed: bool,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin does not implement {0}")]
    NotImplemented(&'static str),

    #[error("Invalid file filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Plugin '{0}' is already registered")]
    Duplicate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plugin failed: {0}")]
    Failed(String),
}

impl From<PluginError> for DirViewError {
    fn from(err: PluginError) -> Self {
        DirViewError::Plugin(err.to_string())
    }
}

pub trait Plugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Unpack `src` into `dst`
    fn unpack(&self, _src: &Path, _dst: &Path) -> Result<UnpackOutcome, PluginError> {
        Err(PluginError::NotImplemented("unpack"))
    }

    /// Pack `src` into `dst` using the `subcode` returned by unpacking
    fn pack(&self, _src: &Path, _dst: &Path, _subcode: i32) -> Result<PackOutcome, PluginError> {
        Err(PluginError::NotImplemented("pack"))
    }

    /// Show plugin settings; returns whether anything changed
    fn show_settings(&self) -> Result<bool, PluginError> {
        Err(PluginError::NotImplemented("settings"))
    }
}

struct RegisteredPlugin {
    plugin: Box<dyn Plugin>,
    filters: Vec<Regex>,
}

impl RegisteredPlugin {
    fn matches(&self, file_name: &str) -> bool {
        self.filters.iter().any(|filter| filter.is_match(file_name))
    }
}

fn compile_filters(filters: &str) -> Result<Vec<Regex>, PluginError> {
    filters
        .split(';')
        .map(str::trim)
        .filter(|filter| !filter.is_empty())
        .map(|filter| {
            RegexBuilder::new(filter)
                .case_insensitive(true)
                .build()
                .map_err(|e| PluginError::InvalidFilter {
                    filter: filter.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Plugins available to the compare, in registration order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the plugins compiled into this build
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "gzip-plugin")]
        {
            if let Err(e) = registry.register(Box::new(gzip::GzipPlugin::new())) {
                tracing::warn!("Failed to register gzip plugin: {}", e);
            }
        }
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let metadata = plugin.metadata();
        if self.find(&metadata.name).is_some() {
            return Err(PluginError::Duplicate(metadata.name.clone()));
        }
        let filters = compile_filters(&metadata.file_filters)?;
        debug!(
            "Registered plugin '{}' ({}, {} filters)",
            metadata.name,
            metadata.event.label(),
            filters.len()
        );
        self.plugins.push(RegisteredPlugin { plugin, filters });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> + '_ {
        self.plugins.iter().map(|entry| entry.plugin.as_ref())
    }

    pub fn by_event(&self, event: PluginEvent) -> impl Iterator<Item = &dyn Plugin> + '_ {
        self.iter().filter(move |plugin| plugin.metadata().event == event)
    }

    pub fn find(&self, name: &str) -> Option<&dyn Plugin> {
        self.iter()
            .find(|plugin| plugin.metadata().name.eq_ignore_ascii_case(name))
    }

    /// First automatic unpacker whose filters match the file name of `path`
    pub fn find_unpacker(&self, path: &Path) -> Option<&dyn Plugin> {
        let file_name = path.file_name()?.to_string_lossy();
        self.plugins
            .iter()
            .filter(|entry| {
                let metadata = entry.plugin.metadata();
                metadata.event == PluginEvent::FileUnpacker && metadata.is_automatic
            })
            .find(|entry| entry.matches(&file_name))
            .map(|entry| entry.plugin.as_ref())
    }

    /// Unpack `src` into `dst` with the matching automatic unpacker.
    /// Returns `None` when no plugin claims the file.
    pub fn unpack_file(&self, src: &Path, dst: &Path) -> Result<Option<(String, UnpackOutcome)>, PluginError> {
        let Some(plugin) = self.find_unpacker(src) else {
            return Ok(None);
        };
        let name = plugin.metadata().name.clone();
        let outcome = plugin.unpack(src, dst)?;
        info!("Unpacked {:?} with plugin '{}'", src, name);
        Ok(Some((name, outcome)))
    }
}

#[cfg(feature = "gzip-plugin")]
pub mod gzip {
    use super::{PackOutcome, Plugin, PluginError, PluginEvent, PluginMetadata, UnpackOutcome};
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::{self, BufReader, BufWriter, Write};
    use std::path::Path;

    /// Decompresses `.gz` files for comparison and compresses them back
    pub struct GzipPlugin {
        metadata: PluginMetadata,
    }

    impl GzipPlugin {
        pub fn new() -> Self {
            Self {
                metadata: PluginMetadata {
                    name: "Gzip".to_string(),
                    event: PluginEvent::FileUnpacker,
                    description: "Compare the contents of gzip-compressed files".to_string(),
                    file_filters: r"\.gz$;\.tgz$".to_string(),
                    is_automatic: true,
                },
            }
        }
    }

    impl Default for GzipPlugin {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Plugin for GzipPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }

        fn unpack(&self, src: &Path, dst: &Path) -> Result<UnpackOutcome, PluginError> {
            let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
            let mut output = BufWriter::new(File::create(dst)?);
            io::copy(&mut decoder, &mut output)
                .map_err(|e| PluginError::Failed(format!("{}: {}", src.display(), e)))?;
            output.flush()?;
            Ok(UnpackOutcome {
                changed: true,
                subcode: 0,
            })
        }

        fn pack(&self, src: &Path, dst: &Path, _subcode: i32) -> Result<PackOutcome, PluginError> {
            let mut input = BufReader::new(File::open(src)?);
            let mut encoder = GzEncoder::new(BufWriter::new(File::create(dst)?), Compression::default());
            io::copy(&mut input, &mut encoder)?;
            encoder.finish()?.flush()?;
            Ok(PackOutcome { changed: true })
        }
    }
}
