//! Site manifest: shared template globals and the page declarations.
//!
//! # Format
//!
//! ```toml
//! [globals]
//! siteName = "Website"
//!
//! [pages.index]
//! output = "index.html"            # required
//! template = "templates/index.ejs" # required, relative to [build.src]
//! priority = 1.0                   # optional sitemap priority in [0, 1]
//! title = "Website"                # everything else is passed to the template
//!
//! [pages.error]
//! output = "error.html"
//! template = "templates/error.ejs"
//! priority = 0
//! ```
//!
//! Pages keep their declaration order. The table key becomes the page `id`;
//! an `id` field written by the user is overwritten.
//!
//! Missing `template`/`output` fields are *not* load errors: they are reported
//! when that page is compiled, so the other pages still build.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

/// Manifest loading errors. A failed load never replaces a stored manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("manifest is not valid TOML")]
    Parse(#[from] toml::de::Error),

    #[error("invalid manifest: {0}")]
    Shape(String),
}

/// Parsed manifest, replaced wholesale on every reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// Variables visible to every page template.
    pub globals: Table,
    /// Page declarations in manifest order.
    pub pages: Vec<PageSpec>,
}

/// Top-level layout of the manifest file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default)]
    globals: Table,
    #[serde(default)]
    pages: Table,
}

/// One page declaration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageSpec {
    /// Key of the page in the `[pages]` table.
    #[serde(skip)]
    pub id: String,
    /// Template path relative to the source directory.
    pub template: Option<String>,
    /// Output path relative to the destination directory.
    pub output: Option<String>,
    /// Sitemap priority as declared (no default applied here).
    pub priority: Option<f64>,
    /// Every other field (title, description, ...), passed through to templates.
    #[serde(flatten)]
    pub extra: Table,
}

impl Manifest {
    /// Read and parse the manifest at `path`. Always hits the disk.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ManifestError::Io(path.to_path_buf(), err))?;
        Self::parse(&content)
    }

    /// Parse manifest text.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let raw: Table = toml::from_str(content)?;
        let RawManifest { globals, pages } =
            RawManifest::deserialize(Value::Table(raw)).map_err(|err| shape(err.to_string()))?;

        let pages = pages
            .into_iter()
            .map(|(id, value)| PageSpec::from_value(id, value))
            .collect::<Result<_, _>>()?;

        Ok(Self { globals, pages })
    }

    /// Template-facing view of every page, keyed by id.
    pub fn pages_table(&self) -> Table {
        self.pages
            .iter()
            .map(|page| (page.id.clone(), Value::Table(page.to_table())))
            .collect()
    }

    #[cfg(test)]
    fn page(&self, id: &str) -> Option<&PageSpec> {
        self.pages.iter().find(|page| page.id == id)
    }
}

impl PageSpec {
    fn from_value(id: String, value: Value) -> Result<Self, ManifestError> {
        let mut page =
            Self::deserialize(value).map_err(|err| shape(format!("page `{id}`: {}", err.to_string().trim())))?;
        page.extra.remove("id");
        page.id = id;
        Ok(page)
    }

    /// Page fields as a table: `id`, declared build fields, then extras.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.insert("id".into(), Value::String(self.id.clone()));
        if let Some(template) = &self.template {
            table.insert("template".into(), Value::String(template.clone()));
        }
        if let Some(output) = &self.output {
            table.insert("output".into(), Value::String(output.clone()));
        }
        if let Some(priority) = self.priority {
            table.insert("priority".into(), Value::Float(priority));
        }
        for (key, value) in &self.extra {
            table.insert(key.clone(), value.clone());
        }
        table
    }
}

fn shape(msg: String) -> ManifestError {
    ManifestError::Shape(msg)
}
