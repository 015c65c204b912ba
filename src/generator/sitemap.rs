//! Sitemap generation.
//!
//! Lists every compiled page for search engine indexing.
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//! 	<url><loc>https://example.com/index.html</loc><priority>1</priority></url>
//! </urlset>
//! ```

use crate::{compiler::SitemapEntry, log};
use anyhow::{Context, Result};
use quick_xml::escape::escape;
use std::{fmt::Write as _, fs, path::Path};

// ============================================================================
// Constants
// ============================================================================

/// XML namespace for sitemap
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Priority for pages that don't declare one.
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// Output file name inside `dest`.
pub const SITEMAP_FILE: &str = "sitemap.xml";

// ============================================================================
// Public API
// ============================================================================

/// Render the sitemap document for `entries` under `base_url`.
pub fn render(base_url: &str, entries: &[SitemapEntry]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut xml = String::with_capacity(128 + entries.len() * 96);

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(xml, r#"<urlset xmlns="{SITEMAP_NS}">"#);

    for entry in entries {
        let loc = format!("{base}/{}", entry.path.trim_start_matches('/'));
        let priority = entry.priority.unwrap_or(DEFAULT_PRIORITY);
        let _ = writeln!(
            xml,
            "\t<url><loc>{}</loc><priority>{priority}</priority></url>",
            escape(loc.as_str())
        );
    }

    xml.push_str("</urlset>");
    xml
}

/// Write `dest/sitemap.xml`, replacing any previous one.
pub fn write(dest: &Path, base_url: &str, entries: &[SitemapEntry]) -> Result<()> {
    let path = dest.join(SITEMAP_FILE);
    fs::write(&path, render(base_url, entries))
        .with_context(|| format!("Failed to write sitemap to {}", path.display()))?;

    log!("created"; "{}", path.display());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
