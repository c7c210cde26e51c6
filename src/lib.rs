//! Fast Skill Router - keyword-index skill routing for Claude Code hooks
//!
//! Routes a user prompt to the one or two most relevant skills by combining:
//! - phrase and word lookups in a prebuilt inverted keyword index
//! - analytical-verb amplification (English and French)
//! - typo correction and bounded edit-distance matching
//! - working-directory context (file extensions, marker files, folders)
//!
//! # Input (via stdin)
//! JSON with fields: prompt (or user_prompt), cwd, sessionId, transcriptPath, permissionMode
//!
//! # Output
//! Plain-text routing analysis on stdout, one-line summary on stderr
//!
//! # Performance
//! - index loaded once per process, lookups are map reads
//! - directory scans capped and cached for 30 seconds

pub mod config;
pub mod context;
pub mod error;
pub mod explain;
pub mod hook;
pub mod index;
pub mod logger;
pub mod render;
pub mod router;
pub mod stats;
pub mod tables;
pub mod tokenizer;

pub use config::RouterConfig;
pub use error::{Result, RouterError};
pub use index::InvertedIndex;
pub use router::{Router, RoutingResult};
