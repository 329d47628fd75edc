//! Tagline Fabric - Request/response correlation over an untagged stream
//!
//! A persistent transport delivers requests, responses and unrelated
//! notifications through one inbound channel. This crate tags outbound
//! requests, watches every frame in both directions, and hands each caller
//! exactly the response carrying its tag.
//!
//! # Example
//!
//! ```no_run
//! use tagline_fabric::{Config, Session, transport::TcpConnector};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new(Config::default())?;
//!
//! // Every transport is created through the session so its traffic is seen
//! let addr = "127.0.0.1:8080".parse()?;
//! let transport = session.connect(&TcpConnector::new(addr)).await?;
//!
//! // The host's own tagged traffic teaches the session the current tag
//! transport.send("17.--1,,[\"admin\",\"init\"]".into()).await?;
//!
//! // Correlated call
//! let correlator = session.correlator();
//! let data = correlator.send(&json!(["query", "Status"])).await?;
//! println!("{data}");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub mod registry;
pub mod sequencer;
pub mod session;
pub mod transport;
pub mod wait;

// Re-exports for convenience
pub use config::Config;
pub use correlator::{Correlator, SendOptions};
pub use error::{Error, Result, TimeoutKind};
pub use registry::{ListenerId, ListenerRegistry};
pub use sequencer::TagSequencer;
pub use session::Session;
pub use tagline_core::{Frame, Parsed, Tag};
