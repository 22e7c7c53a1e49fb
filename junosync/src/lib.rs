//! # junosync
//!
//! Transactional configuration sync engine for Junos-style network devices.
//!
//! junosync turns typed resource models into ordered `set` / `delete`
//! statements, applies them to a device under its exclusive configuration
//! lock, commits them, and reads the result back from
//! `| display set relative` output.
//!
//! ## Features
//!
//! - One generic lifecycle engine (create, read, update, delete, import)
//! - Validation before any I/O, with a field locator on every failure
//! - Automatic discard of the change-set on error or cancellation
//! - Serialised reads on a shared connection
//! - In-memory device for tests and demos
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use junosync::{Engine, SessionHandle};
//! use junosync::resource::kinds::ProxyProfile;
//! use junosync::session::memory::MemoryDevice;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), junosync::Error> {
//!     let device = MemoryDevice::new();
//!     let session = SessionHandle::new(device.session());
//!     let engine = Engine::new();
//!
//!     let profile = ProxyProfile {
//!         name: "p1".to_string(),
//!         protocol_http_host: Some("10.0.0.1".to_string()),
//!         protocol_http_port: Some(3128),
//!     };
//!     let outcome = engine.create(&session, &profile).await?;
//!     println!("created {}", outcome.value.name);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod id;
pub mod resource;
pub mod session;
pub mod stanza;

// Re-export main types for convenience
pub use engine::{DeletePolicy, Engine, EngineBuilder, EngineConfig, Outcome};
pub use error::{Error, Result, TerminalState};
pub use resource::{AnyResource, Resource, ResourceKind};
pub use session::{Session, SessionHandle};
