//! Site-specific scraping knowledge.
//!
//! Each submodule describes one search site: how its result page URLs are
//! built and how article records are pulled out of the rendered markup.
//! Rendering itself lives in [`crate::browser`] and pagination in
//! [`crate::crawl`].
//!
//! | Site | Module | Notes |
//! |------|--------|-------|
//! | Yle search | [`yle`] | Client-rendered; needs a browser |

pub mod yle;
