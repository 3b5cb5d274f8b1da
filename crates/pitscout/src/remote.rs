//! Boundary to the remote spreadsheet a finished record is appended to.
//!
//! The network call itself lives outside this crate. The form commits a
//! record locally first and only then hands it to a [`SheetAppender`].

use async_trait::async_trait;

use crate::error::Result;
use crate::settings::Settings;
use crate::submission::Submission;

/// Where records are appended remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Spreadsheet identifier.
    pub spreadsheet_id: String,
    /// Sheet identifier inside the spreadsheet.
    pub sheet_id: String,
}

impl RemoteTarget {
    /// The configured target, if both identifiers are set.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        Some(Self {
            spreadsheet_id: settings.spreadsheet_id.clone()?,
            sheet_id: settings.sheet_id.clone()?,
        })
    }
}

/// Appends one finished record to a remote sheet.
#[async_trait]
pub trait SheetAppender: Send + Sync {
    /// Send `record`. Returns the collaborator's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`](crate::Error::Remote) when the append fails.
    async fn append(&self, record: &Submission, target: &RemoteTarget) -> Result<String>;
}
