//! YouTube Data API v3 adapter for the catalog port.

mod client;
mod types;

pub use client::YoutubeClient;
