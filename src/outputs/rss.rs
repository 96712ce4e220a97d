//! RSS 2.0 generation.
//!
//! [`synthesize`] maps the crawl's ordered records onto the feed model and
//! [`to_xml`] renders that model with `quick-xml`. The synthesizer neither
//! re-sorts nor deduplicates; it trusts the order it is given.

use crate::models::{Channel, Item, Record, Rss};
use serde::Serialize;
use std::error::Error;

/// Language code advertised by the channel.
pub const FEED_LANGUAGE: &str = "fi";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Build the feed document for one search.
///
/// # Arguments
///
/// * `records` - Articles in final order (newest first)
/// * `origin_url` - First results page, used as the channel link
/// * `query` - The search phrase, used in the title and description
pub fn synthesize(records: &[Record], origin_url: &str, query: &str) -> Rss {
    Rss {
        version: "2.0".to_string(),
        channel: Channel {
            title: format!("Yle Search Results for '{query}'"),
            link: origin_url.to_string(),
            description: format!("Articles from Yle generated via scraping for: {query}"),
            language: FEED_LANGUAGE.to_string(),
            items: records.iter().map(Item::from).collect(),
        },
    }
}

/// Serialize a feed to an indented XML document with declaration.
///
/// # Errors
///
/// Returns an error if `quick-xml` rejects the document.
pub fn to_xml(feed: &Rss) -> Result<String, Box<dyn Error>> {
    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    feed.serialize(serializer)?;

    Ok(format!("{XML_DECLARATION}\n{body}\n"))
}
