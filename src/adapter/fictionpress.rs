//! FictionPress adapter. The site runs the same software as FanFiction.Net, so
//! this adapter reuses the shared story-page parsing with its own host.

use crate::adapter::error::AdapterError;
use crate::adapter::fanfiction::parse_story_page;
use crate::adapter::{FetchClient, RawDocument, SiteAdapter};
use crate::model::StoryRecord;
use crate::queue::Identifier;

const FICTIONPRESS_BASE: &str = "https://www.fictionpress.com";

/// FictionPress adapter. Holds a reference to the shared polite client.
pub struct FictionPressAdapter<'a> {
    client: &'a mut FetchClient,
}

impl<'a> FictionPressAdapter<'a> {
    pub fn new(client: &'a mut FetchClient) -> Self {
        Self { client }
    }
}

impl SiteAdapter for FictionPressAdapter<'_> {
    fn fetch(&mut self, identifier: &Identifier) -> Result<RawDocument, AdapterError> {
        let url = identifier
            .as_remote_url()
            .ok_or_else(|| AdapterError::parse("identifier", identifier.to_string()))?;
        let body = self.client.get_text(url)?;
        Ok(RawDocument::remote(url, body))
    }

    fn parse(&self, document: &RawDocument) -> Result<StoryRecord, AdapterError> {
        parse_story_page(document, FICTIONPRESS_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_urls_use_the_fictionpress_host() -> Result<(), AdapterError> {
        let body = r#"<html><body>
<div id="profile_top">
<b class="xcontrast_txt">Paper Cranes</b>
<a class="xcontrast_txt" href="/u/77/inkwell">inkwell</a>
<span class="xgray xcontrast_txt">Rated: Fiction K+ - English - Chapters: 2 - Words: 4,100</span>
</div>
<select id="chap_select">
<option value="1">1. Fold</option>
<option value="2">2. Unfold</option>
</select>
</body></html>"#;
        let doc = RawDocument::remote("https://www.fictionpress.com/s/42/1/paper-cranes", body);
        let record = parse_story_page(&doc, FICTIONPRESS_BASE)?;
        assert_eq!(record.title, "Paper Cranes");
        assert_eq!(record.rating, "Fiction K+");
        assert_eq!(record.word_count, 4_100);
        assert_eq!(
            record.chapters[1].source_url,
            "https://www.fictionpress.com/s/42/2/paper-cranes"
        );
        Ok(())
    }
}
