#![deny(missing_docs)]
//! Reelfetch core library.
//!
//! Media extraction pipeline: strategy dispatch, the yt-dlp strategy,
//! cookie jar validation and result normalization.

/// Configuration management.
pub mod config;
/// Extraction strategies, dispatcher and normalizer.
pub mod extractor;
/// Utility functions.
pub mod utils;
