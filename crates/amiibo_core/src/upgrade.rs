use std::fmt::Write as _;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::image::TagImage;
use crate::layout::{NTAG215_PAGE_COUNT, UID_PAGE_0, UID_PAGE_1};
use crate::uid::{Uid, spaced_hex};

pub const CURRENT_VERSION: u32 = 4;
pub const UPGRADABLE_VERSIONS: [u32; 2] = [2, 3];

const FALLBACK_UID: &str = "04 AB 73 54 B8 B6 0F";
const ZERO_PAGE: &str = "00 00 00 00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upgrade {
    AlreadyCurrent,
    Upgraded { from: u32, text: String },
}

pub fn is_upgradable(version: u32) -> bool {
    UPGRADABLE_VERSIONS.contains(&version)
}

pub fn upgrade_to_v4(image: &TagImage) -> Result<Upgrade, CoreError> {
    match image.format_version {
        Some(CURRENT_VERSION) => Ok(Upgrade::AlreadyCurrent),
        Some(from) if is_upgradable(from) => Ok(Upgrade::Upgraded {
            from,
            text: render_v4(image),
        }),
        Some(other) => Err(CoreError::new(
            CoreErrorCode::UnsupportedVersion,
            format!("Unsupported version: {other}"),
        )),
        None => Err(CoreError::new(
            CoreErrorCode::UnsupportedVersion,
            "Unsupported version: none declared",
        )),
    }
}

/// Builds a complete V4 NTAG215 device file around the pages of `image`.
pub fn render_v4(image: &TagImage) -> String {
    let uid = match (image.page(UID_PAGE_0), image.page(UID_PAGE_1)) {
        (Some(page0), Some(page1)) => Uid::from_pages(page0, page1)
            .map(|uid| uid.to_string())
            .unwrap_or_else(|_| FALLBACK_UID.to_string()),
        _ => FALLBACK_UID.to_string(),
    };
    // Never shorter than the chip: a V2 dump holding only pages 0 and 1 still
    // upgrades to a 135-page table.
    let page_count = image
        .max_page_index()
        .map(|last| last as usize + 1)
        .unwrap_or(0)
        .max(NTAG215_PAGE_COUNT);
    let signature = spaced_hex(&[0u8; 32]);

    let mut out = String::new();
    for line in [
        "Filetype: Flipper NFC device".to_string(),
        format!("Version: {CURRENT_VERSION}"),
        "# Device type can be ISO14443-3A, ISO14443-3B, ISO14443-4A, ISO14443-4B, ISO15693-3, FeliCa, NTAG/Ultralight, Mifare Classic, Mifare Plus, Mifare DESFire, SLIX, ST25TB, EMV".to_string(),
        "Device type: NTAG/Ultralight".to_string(),
        "# UID is common for all formats".to_string(),
        format!("UID: {uid}"),
        "# ISO14443-3A specific data".to_string(),
        "ATQA: 00 44".to_string(),
        "SAK: 00".to_string(),
        "# NTAG/Ultralight specific data".to_string(),
        "Data format version: 2".to_string(),
        "NTAG/Ultralight type: NTAG215".to_string(),
        format!("Signature: {signature}"),
        "Mifare version: 00 04 04 02 01 00 11 03".to_string(),
        "Counter 0: 0".to_string(),
        "Tearing 0: 00".to_string(),
        "Counter 1: 0".to_string(),
        "Tearing 1: 00".to_string(),
        "Counter 2: 0".to_string(),
        "Tearing 2: 00".to_string(),
        format!("Pages total: {page_count}"),
        format!("Pages read: {page_count}"),
    ] {
        writeln!(&mut out, "{line}").expect("writing to String cannot fail");
    }

    for index in 0..page_count {
        let data = u16::try_from(index)
            .ok()
            .and_then(|index| image.page(index))
            .map(spaced_hex)
            .unwrap_or_else(|| ZERO_PAGE.to_string());
        writeln!(&mut out, "Page {index}: {data}").expect("writing to String cannot fail");
    }
    writeln!(&mut out, "Failed authentication attempts: 0").expect("writing to String cannot fail");

    out
}
