//! Web pages: fetch with `reqwest`, keep the visible text with `scraper`.

use reqwest::StatusCode;
use scraper::{Html, Node};

use crate::{errors::ExtractError, prelude::*};

/// Elements whose contents are never rendered as text.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Fetch `url` and return its visible text, one text node per line.
///
/// We make exactly one request, with the client's default redirect policy.
/// Anything other than `200 OK` is an error, and the body is not parsed.
#[instrument(level = "debug", skip(client))]
pub async fn extract_web_text(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, ExtractError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ExtractError::Fetch(error_chain(&err)))?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(ExtractError::HttpError { status });
    }
    let body = response
        .text()
        .await
        .map_err(|err| ExtractError::Fetch(error_chain(&err)))?;
    debug!(bytes = body.len(), "Fetched page");
    Ok(visible_text(&body))
}

/// `reqwest` errors hide the interesting part (DNS, refused connection) in
/// their sources.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        msg.push_str(": ");
        msg.push_str(&err.to_string());
        source = err.source();
    }
    msg
}

/// The text nodes of an HTML document, in document order, skipping
/// whitespace-only nodes and anything inside [`HIDDEN_ELEMENTS`].
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = vec![];
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|elem| HIDDEN_ELEMENTS.contains(&elem.name()))
        });
        if !hidden {
            lines.push(text);
        }
    }
    lines.join("\n")
}
