use crate::binary;
use crate::diagnosis::{self, Diagnosis};
use crate::image::TagImage;
use crate::repair::{self, ByteSource, Change, FixOptions, RepairPlan};
use crate::text;
use crate::upgrade::{self, Upgrade};

use super::error::{CoreError, CoreErrorCode};
use super::types::Format;

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

#[derive(Debug)]
enum LoadedDocument {
    Text(Box<text::Document>),
    Binary(Box<binary::Document>),
}

#[derive(Debug)]
pub struct Session {
    document: LoadedDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    NoChanges,
    Repaired(Vec<Change>),
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        format: Format,
    ) -> Result<Session, CoreError> {
        let bytes = bytes.as_ref();

        let document = match format {
            Format::Text => text::Document::parse_bytes(bytes)
                .map(|doc| LoadedDocument::Text(Box::new(doc)))
                .map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Decode,
                        format!("failed to decode text dump: {e}"),
                    )
                })?,
            Format::Binary => binary::Document::parse(bytes)
                .map(|doc| LoadedDocument::Binary(Box::new(doc)))
                .map_err(|e| {
                    CoreError::new(
                        CoreErrorCode::Decode,
                        format!("failed to decode binary dump: {e}"),
                    )
                })?,
        };

        Ok(Session { document })
    }
}

impl Session {
    pub fn image(&self) -> &TagImage {
        match &self.document {
            LoadedDocument::Text(doc) => &doc.image,
            LoadedDocument::Binary(doc) => &doc.image,
        }
    }

    fn image_mut(&mut self) -> &mut TagImage {
        match &mut self.document {
            LoadedDocument::Text(doc) => &mut doc.image,
            LoadedDocument::Binary(doc) => &mut doc.image,
        }
    }

    pub fn version(&self) -> Option<u32> {
        self.image().format_version
    }

    pub fn is_modified(&self) -> bool {
        match &self.document {
            LoadedDocument::Text(doc) => doc.is_modified(),
            LoadedDocument::Binary(doc) => doc.is_modified(),
        }
    }

    pub fn diagnose(&self) -> Diagnosis {
        diagnosis::diagnose(self.image())
    }

    pub fn plan_repair(
        &self,
        options: &FixOptions,
        source: &mut dyn ByteSource,
    ) -> Result<RepairPlan, CoreError> {
        repair::plan_repair(self.image(), options, source)
    }

    /// Plans and applies one repair pass to the in-memory image.
    pub fn repair(
        &mut self,
        options: &FixOptions,
        source: &mut dyn ByteSource,
    ) -> Result<RepairOutcome, CoreError> {
        let plan = self.plan_repair(options, source)?;
        if plan.is_empty() {
            return Ok(RepairOutcome::NoChanges);
        }
        Ok(RepairOutcome::Repaired(plan.apply(self.image_mut())))
    }

    pub fn upgrade_to_v4(&self) -> Result<Upgrade, CoreError> {
        match &self.document {
            LoadedDocument::Text(doc) => upgrade::upgrade_to_v4(&doc.image),
            LoadedDocument::Binary(_) => Err(CoreError::new(
                CoreErrorCode::UnsupportedVersion,
                "binary dumps have no format version to upgrade",
            )),
        }
    }

    pub fn to_bytes_unmodified(&self) -> Vec<u8> {
        match &self.document {
            LoadedDocument::Text(doc) => doc.to_string_unmodified().into_bytes(),
            LoadedDocument::Binary(doc) => doc.to_bytes_unmodified(),
        }
    }

    pub fn to_bytes_modified(&self) -> Result<Vec<u8>, CoreError> {
        match &self.document {
            LoadedDocument::Text(doc) => Ok(doc.to_string_modified().into_bytes()),
            LoadedDocument::Binary(doc) => doc.to_bytes_modified().map_err(|e| {
                CoreError::new(
                    CoreErrorCode::Write,
                    format!("failed to encode binary dump: {e}"),
                )
            }),
        }
    }
}
