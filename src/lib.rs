//! # ClauseLens
//!
//! Retrieval-backed question answering and missing-clause detection for
//! legal agreements.
//!
//! A processed agreement is split into word-window fragments, embedded,
//! and compared against a set of named reference clauses; any reference
//! clause without a close enough fragment is reported as missing. The
//! fragments stay indexed so questions can be answered from the document
//! itself. The reference set is rebuilt offline by clustering sentences
//! from a corpus of sample agreements.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Document    │──▶│ Chunk+Embed  │──▶│ Session index│──▶ Q&A
//! │ PDF/DOCX/TXT │   │              │   │              │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           ▼
//!                    ┌──────────────┐   ┌──────────────┐
//!                    │  Coverage    │◀──│ Reference    │◀── lens discover
//!                    │  check       │   │ clauses      │
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! The algorithms (chunking, the vector index, coverage, clustering,
//! auto-tune) live in the I/O-free `clauselens-core` crate. This crate adds
//! configuration, providers, files, and the CLI and HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`retry`] | Failure classification and exponential backoff |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Text generation providers |
//! | [`extract`] | PDF, DOCX, and text extraction |
//! | [`clauses`] | Reference clause file load/save |
//! | [`persist`] | Vector store dump and reload |
//! | [`prompts`] | Prompt rendering and fallback texts |
//! | [`session`] | Document processing, summaries, answers |
//! | [`discover`] | Offline clause discovery |
//! | [`commands`] | CLI command output |
//! | [`server`] | HTTP server |

pub mod clauses;
pub mod commands;
pub mod config;
pub mod discover;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod persist;
pub mod prompts;
pub mod retry;
pub mod server;
pub mod session;
