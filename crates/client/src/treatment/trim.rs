//! HTML reduction.
//!
//! `clean_html` drops everything that does not carry content (scripts, styles,
//! comments, inline handlers). `extract_section` keeps a single element by id.
//! `<meta>` tags survive cleaning since they carry refresh redirects.

use lol_html::{RewriteStrSettings, Selector, doc_comments, element, rewrite_str};
use pagecache_core::Error;
use scraper::Html;

const STRIP_ELEMENTS: &str = "script, style, noscript, link[rel=\"stylesheet\"]";

/// Strip scripts, styles and other non-content markup from `html`.
pub fn clean_html(html: &str) -> Result<String, Error> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(STRIP_ELEMENTS, |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let noisy: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on") || name == "style")
                        .collect();
                    for name in noisy {
                        el.remove_attribute(&name);
                    }
                    Ok(())
                }),
            ],
            document_content_handlers: vec![doc_comments!(|comment| {
                comment.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| Error::Classification(format!("failed to clean html: {e}")))
}

/// Keep only the element with id `keep`, minus any descendants whose ids are
/// listed in `drop`.
///
/// Returns `Ok(None)` when no element has id `keep`. Missing `drop` ids are
/// not an error.
pub fn extract_section(html: &str, keep: &str, drop: &[String]) -> Result<Option<String>, Error> {
    let keep_selector = scraper::Selector::parse(&format!("#{keep}"))
        .map_err(|e| Error::Classification(format!("invalid section id {keep:?}: {e}")))?;

    let section = {
        let document = Html::parse_document(html);
        match document.select(&keep_selector).next() {
            Some(element) => element.html(),
            None => return Ok(None),
        }
    };

    if drop.is_empty() {
        return Ok(Some(section));
    }

    let drop_selector = drop
        .iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ");
    drop_selector
        .parse::<Selector>()
        .map_err(|e| Error::Classification(format!("invalid drop ids {drop:?}: {e}")))?;

    let trimmed = rewrite_str(
        &section,
        RewriteStrSettings {
            element_content_handlers: vec![element!(drop_selector, |el| {
                el.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| Error::Classification(format!("failed to trim section #{keep}: {e}")))?;

    Ok(Some(trimmed))
}
