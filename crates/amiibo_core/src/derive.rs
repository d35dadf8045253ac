//! Expected values for every tracked field, computed from the UID alone.

use crate::uid::{CASCADE_TAG, Uid};

pub const PACK: [u8; 4] = [0x80, 0x80, 0x00, 0x00];
pub const DLB: [u8; 4] = [0x01, 0x00, 0x0F, 0xBF];
pub const CFG0: [u8; 4] = [0x00, 0x00, 0x00, 0x04];
pub const CFG1: [u8; 4] = [0x5F, 0x00, 0x00, 0x00];

pub fn bcc0(uid: &Uid) -> u8 {
    CASCADE_TAG ^ uid.sn(0) ^ uid.sn(1) ^ uid.sn(2)
}

pub fn bcc1(uid: &Uid) -> u8 {
    uid.sn(3) ^ uid.sn(4) ^ uid.sn(5) ^ uid.sn(6)
}

pub fn password(uid: &Uid) -> [u8; 4] {
    [
        uid.sn(1) ^ uid.sn(3) ^ 0xAA,
        uid.sn(2) ^ uid.sn(4) ^ 0x55,
        uid.sn(3) ^ uid.sn(5) ^ 0xAA,
        uid.sn(4) ^ uid.sn(6) ^ 0x55,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub bcc0: u8,
    pub bcc1: u8,
    pub password: [u8; 4],
    pub pack: [u8; 4],
    pub dlb: [u8; 4],
    pub cfg0: [u8; 4],
    pub cfg1: [u8; 4],
}

impl Expected {
    pub fn for_uid(uid: &Uid) -> Self {
        Self {
            bcc0: bcc0(uid),
            bcc1: bcc1(uid),
            password: password(uid),
            pack: PACK,
            dlb: DLB,
            cfg0: CFG0,
            cfg1: CFG1,
        }
    }

    pub fn page0(&self, uid: &Uid) -> [u8; 4] {
        let [sn0, sn1, sn2] = uid.page0_prefix();
        [sn0, sn1, sn2, self.bcc0]
    }
}
