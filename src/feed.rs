use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::BASE_URL;
use crate::parser::ListingRecord;

const FEED_TITLE: &str = "Diks Vehicles";
const LANGUAGE: &str = "en-US";
const PRODUCT_CATEGORY: &str = "404";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const NO_ID: &str = "No ID";
const NO_TITLE: &str = "No Title";
const NO_LINK: &str = "No Link";

/// Render records as the RSS feed document.
///
/// Output depends only on the records and `generated_at`.
pub fn serialize(records: &[ListingRecord], generated_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.get_mut().push(b'\n');

    writer.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &[], FEED_TITLE)?;
    writer.write_event(Event::Empty(BytesStart::new("link").with_attributes([
        ("rel", "self"),
        ("href", BASE_URL),
        ("crossorigin", "anonymous"),
    ])))?;
    let updated = generated_at.format(TIMESTAMP_FORMAT).to_string();
    text_element(&mut writer, "updated", &[], &updated)?;

    for record in records {
        write_item(&mut writer, record)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(writer.into_inner())
}

fn write_item<W: Write>(writer: &mut Writer<W>, record: &ListingRecord) -> Result<()> {
    let href = record.url().unwrap_or("");

    writer.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(writer, "id", &[], or_default(record.id(), NO_ID))?;
    text_element(writer, "title", &[], or_default(record.name(), NO_TITLE))?;
    text_element(
        writer,
        "link",
        &[("href", href), ("crossorigin", "anonymous")],
        or_default(record.url(), NO_LINK),
    )?;
    text_element(writer, "language", &[], LANGUAGE)?;
    text_element(writer, "google_product_category", &[], PRODUCT_CATEGORY)?;
    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new(tag).with_attributes(attrs.iter().copied()),
    ))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

// Empty strings get the placeholder too.
fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Write the feed document to its local destination.
pub fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
