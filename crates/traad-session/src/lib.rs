//! Traad Session - refactoring session state behind a fixed method surface.
//!
//! This crate owns the per-process refactoring session. A [`ProjectSession`]
//! is constructed once from a project directory and every transport front end
//! forwards into it. The session is deliberately opaque to the transports:
//! they only see the public method surface re-exported here, never the
//! history bookkeeping or resource discovery underneath.
//!
//! # Example
//!
//! ```rust,ignore
//! use traad_session::ProjectSession;
//!
//! fn main() -> traad_session::Result<()> {
//!     let mut session = ProjectSession::new("/path/to/project")?;
//!
//!     for resource in session.get_all_resources()? {
//!         println!("{} (folder: {})", resource.path, resource.is_folder);
//!     }
//!
//!     session.rename("src/lib.rs", "core.rs")?;
//!     session.undo()?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod history;
pub mod resources;

mod session;

pub use error::{Result, SessionError};
pub use history::ChangeDescription;
pub use resources::Resource;
pub use session::ProjectSession;
