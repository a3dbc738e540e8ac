//! # SVG Cleanup Module
//!
//! Vector variant of the optimization engine: a multi-pass structural
//! cleanup of SVG documents, driven by streaming XML rewriting.
//!
//! ## What it does:
//! - Drops comments, doctype, XML declarations and processing instructions
//! - Drops `<metadata>` subtrees (configurable)
//! - Collapses whitespace-only text nodes
//! - Sorts element attributes by name (configurable)
//! - Injects `xmlns="http://www.w3.org/2000/svg"` on the root element
//!   when absent (configurable)
//!
//! ## What it deliberately leaves alone:
//! Numeric values, the viewBox, element IDs and path data are never
//! rewritten; the cleanup is purely structural and safe for inlining.
//!
//! Malformed XML propagates as an error to the caller - a file that
//! cannot be parsed is never emitted half-rewritten.

use crate::config::SvgOptions;
use crate::error::OptimizeError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const SVG_XMLNS: &str = "http://www.w3.org/2000/svg";

/// Optimize an SVG buffer according to the configured cleanup options.
pub fn optimize_svg(buffer: &[u8], options: &SvgOptions) -> Result<Vec<u8>, OptimizeError> {
    let source = std::str::from_utf8(buffer)
        .map_err(|e| OptimizeError::Svg(format!("SVG is not valid UTF-8: {}", e)))?;

    let mut output = cleanup_pass(source, options)?;

    if options.multipass {
        // Re-run until the document stops shrinking; structural cleanup
        // converges quickly so three passes is already conservative.
        for _ in 0..2 {
            let text = String::from_utf8(output.clone())
                .map_err(|e| OptimizeError::Svg(e.to_string()))?;
            let next = cleanup_pass(&text, options)?;
            if next.len() >= output.len() {
                break;
            }
            output = next;
        }
    }

    Ok(output)
}

/// One streaming rewrite of the whole document.
fn cleanup_pass(source: &str, options: &SvgOptions) -> Result<Vec<u8>, OptimizeError> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::new());

    let mut seen_root = false;
    // Depth of a <metadata> subtree currently being skipped
    let mut skip_depth: usize = 0;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| OptimizeError::Svg(format!("XML parse error: {}", e)))?;

        match event {
            Event::Eof => break,

            Event::Start(e) => {
                let name = element_name(&e)?;
                if skip_depth > 0 || (options.remove_metadata && name == "metadata") {
                    skip_depth += 1;
                    continue;
                }
                let is_root = !seen_root && name == "svg";
                seen_root = seen_root || is_root;
                let rewritten = rewrite_element(&e, &name, is_root, options)?;
                write_event(&mut writer, Event::Start(rewritten))?;
            }

            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let name = element_name(&e)?;
                if options.remove_metadata && name == "metadata" {
                    continue;
                }
                let is_root = !seen_root && name == "svg";
                seen_root = seen_root || is_root;
                let rewritten = rewrite_element(&e, &name, is_root, options)?;
                write_event(&mut writer, Event::Empty(rewritten))?;
            }

            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                let name = element_name_end(&e)?;
                write_event(&mut writer, Event::End(BytesEnd::new(name)))?;
            }

            Event::Text(e) => {
                if skip_depth > 0 {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|err| OptimizeError::Svg(format!("XML text error: {}", err)))?;
                if text.trim().is_empty() {
                    continue;
                }
                write_event(&mut writer, Event::Text(BytesText::new(&text)))?;
            }

            Event::CData(e) => {
                if skip_depth == 0 {
                    write_event(&mut writer, Event::CData(e))?;
                }
            }

            // Structural noise: dropped outright
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if !seen_root {
        return Err(OptimizeError::Svg("document has no <svg> root".to_string()));
    }

    Ok(writer.into_inner())
}

/// Rebuild an element with cleaned, optionally sorted attributes.
fn rewrite_element(
    element: &BytesStart<'_>,
    name: &str,
    is_root: bool,
    options: &SvgOptions,
) -> Result<BytesStart<'static>, OptimizeError> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| OptimizeError::Svg(format!("bad attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| OptimizeError::Svg(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| OptimizeError::Svg(format!("bad attribute value: {}", e)))?
            .into_owned();
        attributes.push((key, value));
    }

    if is_root && options.add_xmlns && !attributes.iter().any(|(k, _)| k == "xmlns") {
        attributes.push(("xmlns".to_string(), SVG_XMLNS.to_string()));
    }

    if options.sort_attributes {
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let mut rewritten = BytesStart::new(name.to_string());
    for (key, value) in &attributes {
        rewritten.push_attribute((key.as_str(), value.as_str()));
    }
    Ok(rewritten)
}

fn element_name(element: &BytesStart<'_>) -> Result<String, OptimizeError> {
    Ok(std::str::from_utf8(element.name().as_ref())
        .map_err(|e| OptimizeError::Svg(e.to_string()))?
        .to_string())
}

fn element_name_end(element: &BytesEnd<'_>) -> Result<String, OptimizeError> {
    Ok(std::str::from_utf8(element.name().as_ref())
        .map_err(|e| OptimizeError::Svg(e.to_string()))?
        .to_string())
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), OptimizeError> {
    writer
        .write_event(event)
        .map_err(|e| OptimizeError::Svg(format!("XML write error: {}", e)))
}
