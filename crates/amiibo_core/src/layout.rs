use std::io;

pub const PAGE_SIZE: usize = 4;

pub const UID_PAGE_0: u16 = 0;
pub const UID_PAGE_1: u16 = 1;
pub const BCC1_PAGE: u16 = 2;
pub const DLB_PAGE: u16 = 130;
pub const CFG0_PAGE: u16 = 131;
pub const CFG1_PAGE: u16 = 132;
pub const PASSWORD_PAGE: u16 = 133;
pub const PACK_PAGE: u16 = 134;

/// Pages the engine reads and may rewrite; every other page is opaque.
pub const TRACKED_PAGES: [u16; 8] = [
    UID_PAGE_0,
    UID_PAGE_1,
    BCC1_PAGE,
    DLB_PAGE,
    CFG0_PAGE,
    CFG1_PAGE,
    PASSWORD_PAGE,
    PACK_PAGE,
];

/// Full NTAG215 page count (pages 0..=134).
pub const NTAG215_PAGE_COUNT: usize = 135;

/// A binary dump must reach the end of the PACK page.
pub const MIN_BINARY_LEN: usize = (PACK_PAGE as usize + 1) * PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

pub fn page_range(page: u16) -> ByteRange {
    let start = page as usize * PAGE_SIZE;
    ByteRange {
        start,
        end: start + PAGE_SIZE,
    }
}

pub fn validate_binary_len(len: usize) -> io::Result<()> {
    if len < MIN_BINARY_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("binary dump is {len} bytes, expected at least {MIN_BINARY_LEN}"),
        ));
    }
    Ok(())
}
