//! Feed Console - a web console for an RSS feed list
//!
//! This crate renders and manages the feed list held by an external Feed API:
//! adding and removing feeds, listing the items of one feed, and showing all
//! feeds grouped into collapsible sections.

pub mod api;
pub mod config;
pub mod console;
pub mod routes;
