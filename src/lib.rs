//! lexsum - authenticated legal document summarization service
//!
//! A small HTTP service that gates access behind username/password accounts
//! stored in a local SQLite table, extracts text from uploaded legal
//! documents (PDF, DOCX, plain text), and requests a one-shot summary from a
//! hosted LLM.
//!
//! # Core Modules
//!
//! - [`auth`] - Password hashing, sessions, and the signup/login state machine
//! - [`store`] - SQLite credential store
//! - [`extract`] - Multi-format document text extraction
//! - [`summarize`] - Hosted model client and the upload-and-summarize pipeline
//! - [`server`] - HTTP API surface
//! - [`error`] - Explicit error taxonomy with the user-facing message contract

pub mod auth;
pub mod error;
pub mod extract;
pub mod server;
pub mod store;
pub mod summarize;

// Re-export commonly used types
pub use auth::{hash_password, AuthService, Session, SessionManager, SessionState};
pub use error::{Error, Result};
pub use extract::{DocumentLoader, SUPPORTED_EXTENSIONS};
pub use server::Server;
pub use store::{CredentialStore, UserRecord};
pub use summarize::{build_prompt, summarize_document, SummaryClient, Summarizer};
