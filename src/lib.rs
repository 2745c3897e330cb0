//! Adminkit - headless engines for role-gated admin consoles.
//!
//! Adminkit provides the pieces an admin dashboard is built from, minus
//! the rendering:
//!
//! - **Config**: Layered configuration (file → env → CLI)
//! - **Auth**: Session token verification and identities
//! - **Permission**: Page-access lists and route-exact CRUD resolution
//! - **Access**: Per-session provider that loads the list and guards routes
//! - **Source**: Fetching the page-access list over HTTP
//! - **Table**: Server-driven data table with client and server modes
//!
//! # Example
//!
//! ```ignore
//! use adminkit::{AccessPolicy, AuthState, ConfigLoader, Guard, HttpSource, Provider};
//! use adminkit::config::Overrides;
//!
//! #[tokio::main]
//! async fn main() -> adminkit::Result<()> {
//!     let config = ConfigLoader::new("MYAPP").load(None, Overrides::default())?;
//!
//!     let identity = adminkit::auth::identity_from_token(&config.auth, &token)?;
//!     let provider = Provider::new(
//!         HttpSource::new(&config.access)?,
//!         AccessPolicy::from(&config.access),
//!     );
//!     provider.set_auth(AuthState::SignedIn(identity));
//!     provider.ready().await;
//!
//!     match provider.navigate("/users") {
//!         Guard::Allow => { /* render the page */ }
//!         Guard::Redirect(to) => { /* go to `to` */ }
//!         Guard::Pending => {}
//!     }
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod permission;
pub mod source;
pub mod table;

// Re-export main types at crate root
pub use access::{AccessPolicy, AuthState, Guard, Phase, Provider, Snapshot};
pub use auth::{Identity, RoleRef};
pub use config::{Config, ConfigLoader};
pub use error::{Error, Result};
pub use permission::{Action, Crud, PageAccessEntry, PageAccessList};
pub use source::{HttpSource, PageSource, StaticSource};
pub use table::{Column, Table, TableView};

// Re-export commonly used dependencies for convenience
pub use serde_json::json;
