//! Leaf Client Library
//!
//! Authenticates against the Nissan telematics gateway, caches the session
//! it gets back, and sends a fixed set of status and remote-control
//! commands within a caller-supplied time budget.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use leaf_client::{Deadline, LeafClient, LeafConfig, Region};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LeafConfig::new("me@example.com", "password", Region::Europe);
//!     let client = LeafClient::builder(config)
//!         .time_budget(Deadline::after(Duration::from_secs(8)))
//!         .on_login_failure(|| eprintln!("login failed"))
//!         .build()?;
//!
//!     // Logs in on first use, then reuses the session
//!     if let Ok(status) = client.battery_status().await {
//!         println!("{:?}", status);
//!     }
//!     client.preheat().await.ok();
//!
//!     // Carry the session into a later client
//!     let _saved = client.credentials();
//!     Ok(())
//! }
//! ```
//!
//! # Failures
//!
//! Commands return [`CommandResult`]. Every failure (no time left, transport
//! error, timeout, upstream rejection) is the same [`CommandFailed`] value;
//! the cause is logged through `tracing`. A failed login also fires the
//! login failure callback exactly once.
//!
//! # Testing
//!
//! The `testing` module provides a scripted mock gateway:
//!
//! ```rust,ignore
//! use leaf_client::testing::MockUpstream;
//!
//! let upstream = MockUpstream::start_happy().await?;
//! let client = LeafClient::new(upstream.config())?;
//! client.battery_status().await?;
//! assert_eq!(upstream.requests().len(), 3);
//! ```

mod budget;
mod client;
mod config;
mod encrypt;
mod error;
mod executor;
mod request;
pub mod session;
pub mod testing;

pub use budget::{Deadline, TimeBudget, DEFAULT_MARGIN};
pub use client::{Command, CommandResult, LeafClient, LeafClientBuilder};
pub use config::{LeafConfig, Region, DEFAULT_APP_STRINGS, DEFAULT_BASE_URL};
pub use encrypt::{BlowfishEncryptor, Encryptor};
pub use error::{CommandFailed, LeafClientError, Result};
pub use executor::RequestExecutor;
pub use request::CommandRequest;
pub use session::{Credentials, Session, SessionManager, SessionState};
