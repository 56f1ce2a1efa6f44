//! Persistent download-queue engine for fetching, decrypting, remuxing,
//! tagging, and cataloguing audio tracks from a signed remote wire protocol
//! (spec.md). See `SPEC_FULL.md`/`DESIGN.md` for the module-to-component map.

pub mod client;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod models;
pub mod path;
pub mod probe;
pub mod signing;
pub mod store;
pub mod tagging;
pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;

pub use client::{Credential, ProtocolClient};
pub use controller::Controller;
pub use error::{CoreError, CoreResult};
pub use store::Store;

use engine::EngineSettings;

/// The process-wide handle: owns the Catalog Store and Protocol Client by
/// composition and exposes the Queue Controller as the single entry point
/// (REDESIGN FLAG: replaces the reference implementation's module-level
/// globals — no component is reachable except through a `Core` a caller
/// constructed itself).
pub struct Core {
    pub controller: Controller,
}

impl Core {
    /// Open (or create) the Catalog Store at `database_path`, resolve the
    /// credential via `config::load_credential`, and apply Catalog-Store
    /// settings (falling back to `config::DEFAULT_*` when a key is absent).
    /// `download_root_override` takes precedence over the persisted
    /// `download_path` setting when given (spec §3/§7).
    pub async fn init(
        database_path: &str,
        download_root_override: Option<PathBuf>,
    ) -> CoreResult<Self> {
        let credential = config::load_credential().map_err(|e| CoreError::Auth(e.to_string()))?;
        let client = Arc::new(ProtocolClient::new(credential)?);
        let store = Arc::new(Store::open(database_path).await?);

        let download_root = match download_root_override {
            Some(path) => path,
            None => {
                let path = store
                    .get_setting("download_path")
                    .await?
                    .unwrap_or_else(|| config::DEFAULT_DOWNLOAD_PATH.to_string());
                PathBuf::from(path)
            }
        };
        let file_template = store
            .get_setting("file_template")
            .await?
            .unwrap_or_else(|| config::DEFAULT_FILE_TEMPLATE.to_string());
        let folder_structure = store
            .get_setting("folder_structure")
            .await?
            .unwrap_or_else(|| config::DEFAULT_FOLDER_STRUCTURE.to_string());

        let settings = EngineSettings {
            download_root,
            file_template,
            folder_structure,
        };

        Ok(Self {
            controller: Controller::new(store, client, settings),
        })
    }
}
