//! State tracking for crawl sessions
//!
//! This module defines the phases a crawl session moves through.

mod crawl_phase;

pub use crawl_phase::CrawlPhase;
