//! Gemini feed aggregation.
//!
//! Fetches a list of gemlogs over the Gemini protocol, extracts their dated
//! entries (from Atom feeds or gemfeed-style link lists), and renders one
//! gemtext page with every entry grouped by date, newest first.

pub mod config;
pub mod feed;
pub mod gemini;
