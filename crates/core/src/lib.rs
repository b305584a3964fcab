//! Core domain layer for the StringSync lesson library.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services for the StringSync backend. It follows
//! hexagonal architecture principles - this is the innermost layer with
//! no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   stringsync (binary)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   stringsync-graphql                        │
//! │                   (API + HTTP server)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   stringsync-storage                        │
//! │                     (PostgreSQL)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   stringsync-core  ← YOU ARE HERE           │
//! │               (models, ports, services)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (User, Notation, Tag, etc.)
//! - [`ports`] - Interface traits for adapters to implement, including
//!   the cursor pagination engine
//! - [`services`] - Core business logic (auth, notations, notifications)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//! - [`testing`] - In-memory repositories and factories
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! Ports define interfaces that external adapters must implement:
//!
//! - [`ports::Repositories`] - Persist and query application data
//! - [`ports::Mailer`] - Deliver outbound email
//!
//! ## Pagination
//!
//! Every listing endpoint pages with Relay-style cursors through one
//! engine, [`ports::Pager`]. Repositories supply an entity finder; the
//! engine resolves `{first, after}` / `{last, before}` arguments,
//! drives the finder, and assembles a [`ports::Connection`] with
//! correct page-info flags. See the docs on [`ports::Pager`] for the
//! full contract.

pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;
pub mod testing;
