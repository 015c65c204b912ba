//! Site-wide artifacts generated from the compiled pages.

pub mod sitemap;
