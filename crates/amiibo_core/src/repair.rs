use std::collections::BTreeMap;
use std::fmt;

use rand::RngCore;
use rand::rngs::ThreadRng;
use serde::{Deserialize, Serialize};

use crate::core_api::CoreError;
use crate::derive::Expected;
use crate::diagnosis::Field;
use crate::image::TagImage;
use crate::layout::{
    BCC1_PAGE, CFG0_PAGE, CFG1_PAGE, DLB_PAGE, PACK_PAGE, PASSWORD_PAGE, UID_PAGE_0, UID_PAGE_1,
};
use crate::uid::{CASCADE_TAG, Uid, spaced_hex};

/// Which field groups the planner may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOptions {
    pub uid: bool,
    pub bcc: bool,
    pub password: bool,
    pub pack: bool,
    pub dlb: bool,
    pub cfg: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            uid: true,
            bcc: true,
            password: true,
            pack: true,
            dlb: true,
            cfg: true,
        }
    }
}

impl FixOptions {
    pub fn none() -> Self {
        Self {
            uid: false,
            bcc: false,
            password: false,
            pack: false,
            dlb: false,
            cfg: false,
        }
    }
}

/// Supplies replacement SN3 candidates.
pub trait ByteSource {
    fn next_byte(&mut self) -> u8;
}

#[derive(Debug)]
pub struct RandSource<R>(pub R);

impl RandSource<ThreadRng> {
    pub fn thread() -> Self {
        Self(rand::thread_rng())
    }
}

impl<R: RngCore> ByteSource for RandSource<R> {
    fn next_byte(&mut self) -> u8 {
        (self.0.next_u32() & 0xFF) as u8
    }
}

/// Deterministic [`ByteSource`] for tests and for callers that need
/// reproducible SN3 values. Replays a fixed byte sequence, wrapping around at
/// the end; an empty sequence yields `0`.
#[derive(Debug, Clone)]
pub struct ScriptedBytes {
    bytes: Vec<u8>,
    position: usize,
}

impl ScriptedBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            position: 0,
        }
    }
}

impl ByteSource for ScriptedBytes {
    fn next_byte(&mut self) -> u8 {
        if self.bytes.is_empty() {
            return 0;
        }
        let byte = self.bytes[self.position % self.bytes.len()];
        self.position += 1;
        byte
    }
}

/// Draws from `source` until the byte is not the cascade tag.
///
/// A source that only ever yields `0x88` never returns.
pub fn resample_sn3(source: &mut dyn ByteSource) -> u8 {
    loop {
        let candidate = source.next_byte();
        if candidate != CASCADE_TAG {
            return candidate;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub field: Field,
    pub page: Option<u16>,
    pub before: String,
    pub after: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Field::UidField => write!(
                f,
                "Fixed UID field to match pages: {} -> {}",
                self.before, self.after
            ),
            Field::Sn3 => write!(
                f,
                "Fixed CT in SN3 from 0x{} to 0x{}",
                self.before, self.after
            ),
            field => write!(
                f,
                "Fixed {}: {} -> {}",
                field.label(),
                self.before,
                self.after
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    changes: Vec<Change>,
    pages: BTreeMap<u16, Vec<u8>>,
    uid_field: Option<String>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn rewritten_pages(&self) -> Vec<u16> {
        self.pages.keys().copied().collect()
    }

    pub fn apply(self, image: &mut TagImage) -> Vec<Change> {
        for (index, bytes) in self.pages {
            image.set_page(index, bytes);
        }
        if let Some(uid_field) = self.uid_field {
            image.uid_field = Some(uid_field);
        }
        self.changes
    }

    fn rewrite_page(&mut self, image: &TagImage, index: u16, edit: impl FnOnce(&mut Vec<u8>)) {
        let mut page = self
            .pages
            .get(&index)
            .cloned()
            .or_else(|| image.page(index).map(<[u8]>::to_vec))
            .unwrap_or_default();
        edit(&mut page);
        self.pages.insert(index, page);
    }

    fn record(&mut self, field: Field, page: Option<u16>, before: String, after: String) {
        self.changes.push(Change {
            field,
            page,
            before,
            after,
        });
    }
}

pub fn plan_repair(
    image: &TagImage,
    options: &FixOptions,
    source: &mut dyn ByteSource,
) -> Result<RepairPlan, CoreError> {
    if !image.has_uid_pages() {
        return Err(CoreError::missing_pages());
    }
    let page_uid = image.uid()?;
    let mut uid = page_uid;
    let mut plan = RepairPlan::default();

    if options.uid {
        if uid.has_cascade_collision() {
            let sn3 = resample_sn3(source);
            uid = uid.with_sn3(sn3);
            plan.rewrite_page(image, UID_PAGE_1, |page| page[0] = sn3);
            plan.record(
                Field::Sn3,
                Some(UID_PAGE_1),
                format!("{CASCADE_TAG:02X}"),
                format!("{sn3:02X}"),
            );
        }

        if let Some(declared) = image.uid_field.as_deref() {
            let effective = uid.to_compact_hex();
            if declared != page_uid.to_compact_hex() {
                plan.changes.insert(
                    0,
                    Change {
                        field: Field::UidField,
                        page: None,
                        before: declared.to_string(),
                        after: effective.clone(),
                    },
                );
            }
            if declared != effective {
                plan.uid_field = Some(effective);
            }
        }
    }

    plan_derived(&mut plan, image, &uid, options);

    Ok(plan)
}

fn plan_derived(plan: &mut RepairPlan, image: &TagImage, uid: &Uid, options: &FixOptions) {
    let expected = Expected::for_uid(uid);

    if options.bcc {
        let current = image.page(UID_PAGE_0).and_then(|page| page.get(3).copied());
        if current != Some(expected.bcc0) {
            plan.rewrite_page(image, UID_PAGE_0, |page| {
                if page.len() < 4 {
                    page.resize(4, 0);
                }
                page[3] = expected.bcc0;
            });
            plan.record(
                Field::Bcc0,
                Some(UID_PAGE_0),
                byte_or_none(current),
                format!("{:02X}", expected.bcc0),
            );
        }

        let current = image.page(BCC1_PAGE).and_then(|page| page.first().copied());
        if let Some(current) = current.filter(|byte| *byte != expected.bcc1) {
            plan.rewrite_page(image, BCC1_PAGE, |page| page[0] = expected.bcc1);
            plan.record(
                Field::Bcc1,
                Some(BCC1_PAGE),
                format!("{current:02X}"),
                format!("{:02X}", expected.bcc1),
            );
        }
    }

    let words = [
        (options.password, Field::Password, PASSWORD_PAGE, expected.password),
        (options.pack, Field::Pack, PACK_PAGE, expected.pack),
        (options.dlb, Field::Dlb, DLB_PAGE, expected.dlb),
        (options.cfg, Field::Cfg0, CFG0_PAGE, expected.cfg0),
        (options.cfg, Field::Cfg1, CFG1_PAGE, expected.cfg1),
    ];
    for (enabled, field, index, wanted) in words {
        if !enabled {
            continue;
        }
        let Some(current) = image.page_word(index) else {
            continue;
        };
        if current == wanted {
            continue;
        }
        plan.rewrite_page(image, index, |page| page[..4].copy_from_slice(&wanted));
        plan.record(field, Some(index), spaced_hex(&current), spaced_hex(&wanted));
    }
}

fn byte_or_none(byte: Option<u8>) -> String {
    match byte {
        Some(byte) => format!("{byte:02X}"),
        None => "none".to_string(),
    }
}
