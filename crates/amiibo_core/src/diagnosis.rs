use serde::{Deserialize, Serialize};

use crate::derive::Expected;
use crate::image::TagImage;
use crate::layout::{
    BCC1_PAGE, CFG0_PAGE, CFG1_PAGE, DLB_PAGE, PACK_PAGE, PASSWORD_PAGE, UID_PAGE_0,
};
use crate::uid::{CASCADE_TAG, UID_LEN, Uid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    UidField,
    Sn3,
    Bcc0,
    Bcc1,
    Password,
    Pack,
    Dlb,
    Cfg0,
    Cfg1,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::UidField,
        Field::Sn3,
        Field::Bcc0,
        Field::Bcc1,
        Field::Password,
        Field::Pack,
        Field::Dlb,
        Field::Cfg0,
        Field::Cfg1,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::UidField => "UID field",
            Field::Sn3 => "SN3",
            Field::Bcc0 => "BCC0",
            Field::Bcc1 => "BCC1",
            Field::Password => "PWD",
            Field::Pack => "PACK",
            Field::Dlb => "DLB",
            Field::Cfg0 => "CFG0",
            Field::Cfg1 => "CFG1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldCheck {
    pub ok: bool,
    pub observed: Option<Vec<u8>>,
    pub expected: Option<Vec<u8>>,
}

impl FieldCheck {
    fn compare(observed: Option<&[u8]>, expected: &[u8]) -> Self {
        Self {
            ok: observed == Some(expected),
            observed: observed.map(<[u8]>::to_vec),
            expected: Some(expected.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UidFieldCheck {
    pub ok: bool,
    pub declared: Option<String>,
    pub from_pages: Option<String>,
}

/// Why a diagnosis could not look at individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blocker {
    MissingPages,
    InsufficientData,
}

impl Blocker {
    pub fn message(&self) -> &'static str {
        match self {
            Blocker::MissingPages => "Missing required pages",
            Blocker::InsufficientData => "Invalid UID length",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub blocker: Option<Blocker>,
    pub uid: Option<Uid>,
    pub uid_field: UidFieldCheck,
    pub sn3: FieldCheck,
    pub bcc0: FieldCheck,
    pub bcc1: FieldCheck,
    pub password: FieldCheck,
    pub pack: FieldCheck,
    pub dlb: FieldCheck,
    pub cfg0: FieldCheck,
    pub cfg1: FieldCheck,
}

impl Diagnosis {
    fn blocked(blocker: Blocker, declared: Option<&str>) -> Self {
        Self {
            blocker: Some(blocker),
            uid: None,
            uid_field: UidFieldCheck {
                ok: false,
                declared: declared.map(str::to_string),
                from_pages: None,
            },
            sn3: FieldCheck::default(),
            bcc0: FieldCheck::default(),
            bcc1: FieldCheck::default(),
            password: FieldCheck::default(),
            pack: FieldCheck::default(),
            dlb: FieldCheck::default(),
            cfg0: FieldCheck::default(),
            cfg1: FieldCheck::default(),
        }
    }

    /// The UID declaration check is reported but does not take part here.
    pub fn all_valid(&self) -> bool {
        self.blocker.is_none()
            && self.sn3.ok
            && self.bcc0.ok
            && self.bcc1.ok
            && self.password.ok
            && self.pack.ok
            && self.dlb.ok
            && self.cfg0.ok
            && self.cfg1.ok
    }

    pub fn check(&self, field: Field) -> Option<&FieldCheck> {
        match field {
            Field::UidField => None,
            Field::Sn3 => Some(&self.sn3),
            Field::Bcc0 => Some(&self.bcc0),
            Field::Bcc1 => Some(&self.bcc1),
            Field::Password => Some(&self.password),
            Field::Pack => Some(&self.pack),
            Field::Dlb => Some(&self.dlb),
            Field::Cfg0 => Some(&self.cfg0),
            Field::Cfg1 => Some(&self.cfg1),
        }
    }

    pub fn is_ok(&self, field: Field) -> bool {
        match self.check(field) {
            Some(check) => check.ok,
            None => self.uid_field.ok,
        }
    }

    pub fn failing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| !self.is_ok(*field))
            .collect()
    }
}

pub fn diagnose(image: &TagImage) -> Diagnosis {
    let declared = image.uid_field.as_deref();
    if !image.has_uid_pages() {
        return Diagnosis::blocked(Blocker::MissingPages, declared);
    }
    let Ok(uid) = image.uid() else {
        return Diagnosis::blocked(Blocker::InsufficientData, declared);
    };

    let expected = Expected::for_uid(&uid);
    let from_pages = uid.to_compact_hex();
    let uid_field = UidFieldCheck {
        ok: match declared {
            Some(declared) => {
                declared.len() == UID_LEN * 2 && declared.eq_ignore_ascii_case(&from_pages)
            }
            None => true,
        },
        declared: declared.map(str::to_string),
        from_pages: Some(from_pages),
    };

    let sn3 = FieldCheck {
        ok: uid.sn3() != CASCADE_TAG,
        observed: Some(vec![uid.sn3()]),
        expected: None,
    };

    let bcc0_observed = image
        .page(UID_PAGE_0)
        .and_then(|page| page.get(3..4));
    let bcc1_observed = image.page(BCC1_PAGE).and_then(|page| page.get(..1));

    Diagnosis {
        blocker: None,
        uid: Some(uid),
        uid_field,
        sn3,
        bcc0: FieldCheck::compare(bcc0_observed, &[expected.bcc0]),
        bcc1: FieldCheck::compare(bcc1_observed, &[expected.bcc1]),
        password: compare_word(image, PASSWORD_PAGE, &expected.password),
        pack: compare_word(image, PACK_PAGE, &expected.pack),
        dlb: compare_word(image, DLB_PAGE, &expected.dlb),
        cfg0: compare_word(image, CFG0_PAGE, &expected.cfg0),
        cfg1: compare_word(image, CFG1_PAGE, &expected.cfg1),
    }
}

fn compare_word(image: &TagImage, page: u16, expected: &[u8; 4]) -> FieldCheck {
    let observed = image.page_word(page);
    FieldCheck::compare(observed.as_ref().map(|word| word.as_slice()), expected)
}
