//! Raw `.bin` dumps: a flat page array, four bytes per page.

use std::io;

use crate::image::TagImage;
use crate::layout::{PAGE_SIZE, TRACKED_PAGES, page_range, validate_binary_len};

#[derive(Debug, Clone)]
pub struct Document {
    pub image: TagImage,
    original: TagImage,
    bytes: Vec<u8>,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        validate_binary_len(bytes.len())?;

        let mut image = TagImage::default();
        for page in TRACKED_PAGES {
            let range = page_range(page);
            image.set_page(page, bytes[range.start..range.end].to_vec());
        }

        Ok(Self {
            original: image.clone(),
            image,
            bytes: bytes.to_vec(),
        })
    }

    pub fn is_modified(&self) -> bool {
        self.image != self.original
    }

    pub fn to_bytes_unmodified(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn to_bytes_modified(&self) -> io::Result<Vec<u8>> {
        if self.image.uid_field.is_some() || self.image.format_version.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "binary dumps carry neither a UID declaration nor a version",
            ));
        }

        let mut out = self.bytes.clone();
        for page in self.image.changed_pages(&self.original) {
            if !TRACKED_PAGES.contains(&page) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("page {page} is not writable in a binary dump"),
                ));
            }
            let bytes = self.image.page(page).unwrap_or_default();
            if bytes.len() != PAGE_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("page {page} holds {} bytes, expected {PAGE_SIZE}", bytes.len()),
                ));
            }
            let range = page_range(page);
            out[range.start..range.end].copy_from_slice(bytes);
        }
        Ok(out)
    }
}
