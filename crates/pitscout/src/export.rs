//! Export of selected submissions through one of three channels.
//!
//! The visual-code channel is bounded by [`VISUAL_CODE_CEILING`] and renders
//! an accepted payload as a QR code at the lowest error-correction level,
//! which holds the full ceiling. The clipboard and file channels take
//! selections of any size. Exporting never touches the store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use clipboard_rs::{Clipboard, ClipboardContext};
use qrcode::render::unicode::Dense1x2;
use qrcode::{EcLevel, QrCode};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::submission::Submission;

/// Largest selection, in serialized bytes, the visual-code channel accepts.
pub const VISUAL_CODE_CEILING: usize = 2400;

/// Name of the file written by the file channel.
pub const EXPORT_FILE_NAME: &str = "scouting_data.json";

/// Where an export goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportChannel {
    /// A size-bounded visual code for another device to scan.
    VisualCode,
    /// The system clipboard.
    Clipboard,
    /// A file in the export directory.
    File,
}

impl ExportChannel {
    /// Every channel.
    pub const ALL: [ExportChannel; 3] = [
        ExportChannel::VisualCode,
        ExportChannel::Clipboard,
        ExportChannel::File,
    ];

    /// Channel name as typed on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VisualCode => "qr",
            Self::Clipboard => "clipboard",
            Self::File => "file",
        }
    }

    /// The channel's size limit, if it has one.
    #[must_use]
    pub fn ceiling(self) -> Option<usize> {
        match self {
            Self::VisualCode => Some(VISUAL_CODE_CEILING),
            Self::Clipboard | Self::File => None,
        }
    }
}

impl fmt::Display for ExportChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportChannel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qr" | "visual" | "visual-code" => Ok(Self::VisualCode),
            "clipboard" => Ok(Self::Clipboard),
            "file" => Ok(Self::File),
            other => Err(format!(
                "unknown channel '{other}' (expected qr, clipboard or file)"
            )),
        }
    }
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReceipt {
    /// The selection was rendered as a visual code.
    VisualCode {
        /// Serialized selection carried by the code.
        payload: String,
        /// The code drawn with half-block characters, ready for a terminal.
        rendered: String,
    },
    /// The selection was placed on the clipboard.
    Clipboard {
        /// Bytes written.
        bytes: usize,
    },
    /// The selection was written to a file.
    File {
        /// Path of the written file.
        path: PathBuf,
        /// Bytes written.
        bytes: usize,
    },
}

/// Pick records by index, in the order given.
///
/// # Errors
///
/// Returns [`Error::IndexOutOfRange`] for an index past the end of `records`.
pub fn select(records: &[Submission], indices: &[usize]) -> Result<Vec<Submission>> {
    indices
        .iter()
        .map(|&index| {
            records.get(index).cloned().ok_or(Error::IndexOutOfRange {
                index,
                len: records.len(),
            })
        })
        .collect()
}

/// Compact serialized form of a selection.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize(selection: &[Submission]) -> Result<String> {
    Ok(serde_json::to_string(selection)?)
}

/// Serialized size of a selection in bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialized_size(selection: &[Submission]) -> Result<usize> {
    Ok(serialize(selection)?.len())
}

/// Payload for the visual-code channel, checked against the ceiling.
///
/// # Errors
///
/// Returns [`Error::EmptySelection`] for an empty selection, or
/// [`Error::CapacityExceeded`] when the selection does not fit.
pub fn visual_code_payload(selection: &[Submission]) -> Result<String> {
    if selection.is_empty() {
        return Err(Error::EmptySelection);
    }
    let payload = serialize(selection)?;
    if payload.len() > VISUAL_CODE_CEILING {
        warn!(
            size = payload.len(),
            ceiling = VISUAL_CODE_CEILING,
            "Selection too large for visual code"
        );
        return Err(Error::CapacityExceeded {
            size: payload.len(),
            ceiling: VISUAL_CODE_CEILING,
        });
    }
    Ok(payload)
}

/// Render a payload as a QR code drawn in text.
///
/// # Errors
///
/// Returns [`Error::VisualCode`] if the payload cannot be encoded.
pub fn render_visual_code(payload: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| Error::VisualCode(e.to_string()))?;
    debug!(version = ?code.version(), bytes = payload.len(), "Visual code encoded");
    Ok(code.render::<Dense1x2>().quiet_zone(true).build())
}

/// Check the selection against the ceiling, then render it.
///
/// # Errors
///
/// See [`visual_code_payload`] and [`render_visual_code`].
pub fn encode_visual_code(selection: &[Submission]) -> Result<ExportReceipt> {
    let payload = visual_code_payload(selection)?;
    let rendered = render_visual_code(&payload)?;
    Ok(ExportReceipt::VisualCode { payload, rendered })
}

/// Destination for clipboard exports.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    /// Replace the clipboard contents with `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Clipboard`] if the clipboard cannot be written.
    async fn write_text(&self, text: String) -> Result<()>;
}

/// The operating system clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn write_text(&self, text: String) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            let ctx = ClipboardContext::new().map_err(|e| Error::clipboard(e.to_string()))?;
            ctx.set_text(text)
                .map_err(|e| Error::clipboard(e.to_string()))
        })
        .await
        .map_err(|e| Error::internal(format!("clipboard task failed: {e}")))?
    }
}

/// Renders selections to channels.
#[derive(Clone)]
pub struct Exporter {
    directory: PathBuf,
    clipboard: Arc<dyn ClipboardSink>,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// An exporter writing files into `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, clipboard: Arc<dyn ClipboardSink>) -> Self {
        Self {
            directory: directory.into(),
            clipboard,
        }
    }

    /// An exporter using the system clipboard.
    #[must_use]
    pub fn with_system_clipboard(directory: impl Into<PathBuf>) -> Self {
        Self::new(directory, Arc::new(SystemClipboard))
    }

    /// Directory the file channel writes into.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Export `selection` through `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySelection`] before anything else for an empty
    /// selection, [`Error::CapacityExceeded`] when the selection does not
    /// fit the visual code, or the channel's own I/O failure.
    pub async fn export(
        &self,
        selection: &[Submission],
        channel: ExportChannel,
    ) -> Result<ExportReceipt> {
        if selection.is_empty() {
            return Err(Error::EmptySelection);
        }
        debug!(channel = %channel, records = selection.len(), "Exporting selection");

        let receipt = match channel {
            ExportChannel::VisualCode => encode_visual_code(selection)?,
            ExportChannel::Clipboard => {
                let text = serialize(selection)?;
                let bytes = text.len();
                self.clipboard.write_text(text).await?;
                ExportReceipt::Clipboard { bytes }
            }
            ExportChannel::File => {
                let text = serde_json::to_string_pretty(selection)?;
                let path = self.write_file(&text).await?;
                ExportReceipt::File {
                    path,
                    bytes: text.len(),
                }
            }
        };
        info!(channel = %channel, records = selection.len(), "Export complete");
        Ok(receipt)
    }

    async fn write_file(&self, text: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| Error::DirectoryCreate {
                path: self.directory.clone(),
                source,
            })?;
        let path = self.directory.join(EXPORT_FILE_NAME);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }
}
