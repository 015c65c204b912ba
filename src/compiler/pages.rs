//! Page compilation: manifest pages rendered through templates into `dest`.
//!
//! Every page is compiled independently; a broken page is logged and skipped
//! while the rest of the site still builds.

use crate::{
    config::SiteConfig,
    error::PageError,
    log,
    manifest::{Manifest, PageSpec},
    utils::minify::minify_html,
};
use minijinja::{AutoEscape, Environment, UndefinedBehavior, path_loader};
use rayon::prelude::*;
use std::fs;
use toml::{Table, Value};

/// One `<url>` of the sitemap, derived from a compiled page.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Output path relative to `dest`.
    pub path: String,
    /// Declared priority; the sitemap default applies when `None`.
    pub priority: Option<f64>,
}

/// Compile every page of `manifest`, returning sitemap entries for the pages
/// that were written, in manifest order.
pub fn compile_all(manifest: &Manifest, config: &SiteConfig, debug: bool) -> Vec<SitemapEntry> {
    let env = environment(config);
    let pages = manifest.pages_table();

    manifest
        .pages
        .par_iter()
        .filter_map(|page| match compile_page(&env, page, manifest, &pages, config, debug) {
            Ok(entry) => Some(entry),
            Err(err) => {
                log!("error"; "page {}: {:#}", page.id, anyhow::Error::from(err));
                None
            }
        })
        .collect()
}

fn environment(config: &SiteConfig) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(&config.build.src));
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
    env
}

fn compile_page(
    env: &Environment<'_>,
    page: &PageSpec,
    manifest: &Manifest,
    pages: &Table,
    config: &SiteConfig,
    debug: bool,
) -> Result<SitemapEntry, PageError> {
    let template = required(page, page.template.as_deref(), "template")?;
    let output = required(page, page.output.as_deref(), "output")?;
    if let Some(priority) = page.priority
        && !(0.0..=1.0).contains(&priority)
    {
        return Err(PageError::InvalidPriority {
            id: page.id.clone(),
            priority,
        });
    }

    let template_path = config.build.src.join(template);
    let source = fs::read_to_string(&template_path)
        .map_err(|err| PageError::TemplateRead(template_path.clone(), err))?;

    let context = page_context(page, manifest, pages, debug);
    let html = env
        .render_named_str(template, &source, &context)
        .map_err(|err| PageError::Render(template_path, err))?;

    let out_path = config.build.dest.join(output);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|err| PageError::Write(parent.to_path_buf(), err))?;
    }
    fs::write(&out_path, minify_html(html.as_bytes()))
        .map_err(|err| PageError::Write(out_path.clone(), err))?;

    log!("created"; "{}", out_path.display());
    Ok(SitemapEntry {
        path: output.to_owned(),
        priority: page.priority,
    })
}

/// Template context: `DEBUG` and `pages`, then globals, then page fields.
/// Later entries win on key collision.
fn page_context(page: &PageSpec, manifest: &Manifest, pages: &Table, debug: bool) -> Table {
    let mut context = Table::new();
    context.insert("DEBUG".into(), Value::Boolean(debug));
    context.insert("pages".into(), Value::Table(pages.clone()));
    context.extend(manifest.globals.clone());
    context.extend(page.to_table());
    context
}

fn required<'a>(page: &PageSpec, value: Option<&'a str>, field: &'static str) -> Result<&'a str, PageError> {
    value.ok_or_else(|| PageError::MissingField {
        id: page.id.clone(),
        field,
    })
}
