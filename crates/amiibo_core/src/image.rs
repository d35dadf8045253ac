use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core_api::CoreError;
use crate::layout::{UID_PAGE_0, UID_PAGE_1};
use crate::uid::Uid;

/// Serialization-independent view of a tag dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagImage {
    pub pages: BTreeMap<u16, Vec<u8>>,
    /// Upper-case hex of the `UID:` declaration, whitespace removed.
    pub uid_field: Option<String>,
    pub format_version: Option<u32>,
}

impl TagImage {
    pub fn page(&self, index: u16) -> Option<&[u8]> {
        self.pages.get(&index).map(Vec::as_slice)
    }

    /// First four bytes of a page, if the page holds at least that many.
    pub fn page_word(&self, index: u16) -> Option<[u8; 4]> {
        let page = self.page(index)?;
        let word = page.get(..4)?;
        Some([word[0], word[1], word[2], word[3]])
    }

    pub fn set_page(&mut self, index: u16, bytes: Vec<u8>) {
        self.pages.insert(index, bytes);
    }

    pub fn has_uid_pages(&self) -> bool {
        self.pages.contains_key(&UID_PAGE_0) && self.pages.contains_key(&UID_PAGE_1)
    }

    pub fn uid(&self) -> Result<Uid, CoreError> {
        match (self.page(UID_PAGE_0), self.page(UID_PAGE_1)) {
            (Some(page0), Some(page1)) => Uid::from_pages(page0, page1),
            _ => Err(CoreError::missing_pages()),
        }
    }

    pub fn max_page_index(&self) -> Option<u16> {
        self.pages.keys().next_back().copied()
    }

    /// Page indices whose bytes differ from `original` (added pages included).
    pub fn changed_pages(&self, original: &TagImage) -> Vec<u16> {
        self.pages
            .iter()
            .filter(|(index, bytes)| original.pages.get(index) != Some(*bytes))
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn uid_field_changed(&self, original: &TagImage) -> bool {
        self.uid_field != original.uid_field
    }
}
