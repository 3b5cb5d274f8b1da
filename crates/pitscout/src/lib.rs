//! `pitscout` - Offline-first scouting records for robotics competitions
//!
//! This library keeps match submissions in local storage, validates edits
//! field by field, keeps every open view in step, drives live counter and
//! stopwatch controls from the keyboard, and exports selections through
//! channels of different capacity.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod export;
pub mod form;
pub mod logging;
pub mod remote;
pub mod schema;
pub mod settings;
pub mod storage;
pub mod store;
pub mod submission;
pub mod sync;

pub use config::Config;
pub use controls::{ControlRegistry, KeyboardDispatcher, Stopwatch};
pub use error::{Error, Result};
pub use export::{ExportChannel, Exporter, VISUAL_CODE_CEILING};
pub use form::LiveForm;
pub use logging::init_logging;
pub use schema::{FieldPath, Phase, Value};
pub use settings::SettingsStore;
pub use storage::{Storage, StorageKey, StorageStats};
pub use store::SubmissionStore;
pub use submission::Submission;
pub use sync::SyncBus;
