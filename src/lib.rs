//! pan123 - A client for the 123pan open platform API.
//!
//! This library provides functionality to:
//! - Obtain, persist and refresh the platform access token
//! - List the files of a folder, one page at a time
//! - Materialize a whole folder into a nested in-memory tree
//! - Read the account profile and create share links
//!
//! # Example
//!
//! ```no_run
//! use pan123::{ClientConfig, PanClient, TreeMaterializer, ROOT_ID};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("client-id", "client-secret")
//!         .with_state_path(".token.json");
//!     let client = PanClient::new(config)?;
//!
//!     let tree = TreeMaterializer::new(&client).materialize(ROOT_ID).await?;
//!     print!("{}", tree);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod tree;

// Re-exports for convenience
pub use auth::{Credential, CredentialManager, CredentialStore};
pub use client::{ListQuery, OrderBy, OrderDirection, PanClient};
pub use config::ClientConfig;
pub use error::{PanError, Result};
pub use models::{Category, File, FileKind, FileList, ShareExpiry, ShareLink, UserProfile};
pub use tree::{
    DirectoryLister, DirectoryTree, TreeMaterializer, TreeNode, TreeOptions, TreeRoot, ROOT_ID,
};
