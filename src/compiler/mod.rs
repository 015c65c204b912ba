//! Compilation and asset processing.
//!
//! - **pages**: Render manifest pages through their templates
//! - **assets**: Copy, minify and delete single assets
//!
//! # Build Flow
//!
//! ```text
//! Manifest ──► compile_all() ──► SitemapEntry[] ──► sitemap.xml
//!
//! WatchEvent ──► classify() ──► SyncAction ──► apply()
//! ```

pub mod assets;
pub mod pages;

pub use assets::apply;
pub use pages::{SitemapEntry, compile_all};
