//! Async client for the Skywatch weather-analytics API.
//!
//! The crate is built around two pieces: an authenticated [`Session`] that
//! exchanges long-lived API credentials for short-lived bearer tokens
//! (persisted in a per-user [`TokenStore`] and refreshed transparently), and
//! a bounded-concurrency [`batch`] executor that fans independent API calls
//! out across a worker pool and returns partial-success results. Resource
//! clients for alerts, cameras, observations, and collections sit on top.
//!
//! ## Quick start
//!
//! Configure credentials via `SKYWATCH_CLIENT_ID`/`SKYWATCH_CLIENT_SECRET`
//! environment variables or `~/.config/skywatch/credentials.json`, then:
//!
//! ```no_run
//! use skywatch::{Alerts, Params, Session};
//!
//! # async fn run() -> skywatch::Result<()> {
//! let session = Session::new()?;
//!
//! let alerts = Alerts::new(&session);
//! let (collection, failures) = alerts
//!     .index(Params::new().set("state", "Maryland"))
//!     .await?;
//!
//! for feature in &collection.features {
//!     println!("{:?}", feature.id);
//! }
//! if !failures.is_empty() {
//!     eprintln!("{} pages could not be fetched", failures.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Batch calls never turn one item's failure into an error for the whole
//! call: fan-out operations return a [`batch::BatchOutcome`] whose
//! `failures` list must be inspected to detect degraded results.

#![forbid(unsafe_code)]

pub mod api;
pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod models;

pub use api::{Alerts, Cameras, Collections, Observations, Params};
pub use auth::{CredentialOverrides, Credentials, Session, SessionBuilder, Token, TokenStore};
pub use batch::{BatchFailure, BatchOutcome, CancelSignal};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Feature, FeatureCollection, ImageRecord, RecordCollection};
