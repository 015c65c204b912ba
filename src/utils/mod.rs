//! Utility modules shared by the build and the dev server.

pub mod category;
pub mod exec;
pub mod minify;
