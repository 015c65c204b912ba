//! Minification utilities for pages and standalone scripts.
//!
//! Pages go through `minify_html`; standalone scripts go straight to
//! `minify_js`, the engine `minify_html` uses for embedded scripts.

use minify_js::{Session, TopLevelMode};

// ============================================================================
// HTML
// ============================================================================

/// Minify rendered page HTML.
///
/// Collapses insignificant whitespace and minifies embedded `<script>` and
/// `<style>` blocks.
pub fn minify_html(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}

// ============================================================================
// Scripts
// ============================================================================

/// Minify a standalone script file.
///
/// License comments (`/*! ... */`) are kept, in order, at the top of the
/// output. Fails with the parser's message when the script doesn't parse.
pub fn minify_script(source: &str) -> Result<String, String> {
    let session = Session::new();
    let mut body = Vec::with_capacity(source.len());
    minify_js::minify(&session, TopLevelMode::Global, source.as_bytes(), &mut body)
        .map_err(|err| err.to_string())?;
    let body = String::from_utf8(body).map_err(|err| err.to_string())?;

    let mut out = String::with_capacity(body.len());
    for comment in bang_comments(source) {
        out.push_str(comment);
        out.push('\n');
    }
    out.push_str(body.trim());
    Ok(out)
}

/// Collect `/*! ... */` comments in source order.
fn bang_comments(source: &str) -> Vec<&str> {
    let mut comments = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find("/*!") {
        let Some(len) = rest[start..].find("*/") else {
            break;
        };
        let end = start + len + 2;
        comments.push(&rest[start..end]);
        rest = &rest[end..];
    }
    comments
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"/*! widget v1.0 | MIT */
// toggles the menu
function toggleMenu(element) {
    var isOpen = element.classList.contains("open");
    if (isOpen) {
        element.classList.remove("open");
    } else {
        element.classList.add("open");
    }
    return !isOpen;
}
"#;

    #[test]
    fn test_minify_html_collapses_whitespace() {
        let html = b"<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let result = String::from_utf8(minify_html(html)).unwrap();

        assert!(!result.contains("\n  "));
        assert!(result.contains("<p>Hello</p>"));
        assert!(result.len() < html.len());
    }

    #[test]
    fn test_minify_html_preserves_text() {
        let result = minify_html(b"<p>Hello World</p>");
        assert!(String::from_utf8_lossy(&result).contains("Hello World"));
    }

    #[test]
    fn test_minify_html_embedded_script() {
        let html = b"<body><script>\n  var   answer   =   42;\n  console.log( answer );\n</script></body>";
        let result = String::from_utf8(minify_html(html)).unwrap();

        assert!(result.contains("<script>"));
        assert!(!result.contains("var   answer"));
        assert!(result.len() < html.len());
    }

    #[test]
    fn test_minify_script_shrinks() {
        let result = minify_script(SCRIPT).unwrap();

        assert_ne!(result, SCRIPT);
        assert!(result.len() < SCRIPT.len());
        assert!(!result.contains("toggles the menu"));
        assert!(result.contains("classList"));
    }

    #[test]
    fn test_minify_script_keeps_bang_comment() {
        let result = minify_script(SCRIPT).unwrap();
        assert!(result.starts_with("/*! widget v1.0 | MIT */"));
        assert_eq!(result.matches("widget v1.0").count(), 1);
    }

    #[test]
    fn test_minify_script_closing_tag_literal() {
        let result = minify_script("var tag = \"</script>\";\nconsole.log( tag );\n").unwrap();
        assert!(result.contains("</script>"));
        assert!(result.contains("console.log"));
        assert!(!result.contains("console.log( tag )"));
    }

    #[test]
    fn test_minify_script_rejects_syntax_error() {
        assert!(minify_script("function ( {{{ broken\n").is_err());
    }

    #[test]
    fn test_bang_comments() {
        let src = "/*! a */ x(); /* plain */ /*! b */ y(); /*! unterminated";
        assert_eq!(bang_comments(src), vec!["/*! a */", "/*! b */"]);
        assert!(bang_comments("var a = 1;").is_empty());
    }
}
