use amiibo_core::core_api::CoreErrorCode;
use amiibo_core::derive::{self, CFG0, CFG1, DLB, Expected, PACK};
use amiibo_core::diagnosis::diagnose;
use amiibo_core::image::TagImage;
use amiibo_core::uid::Uid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn image_from_uid(uid: Uid) -> TagImage {
    let expected = Expected::for_uid(&uid);
    let mut image = TagImage::default();
    image.set_page(0, expected.page0(&uid).to_vec());
    image.set_page(1, uid.page1().to_vec());
    image.set_page(2, vec![expected.bcc1, 0x48, 0x0F, 0xE0]);
    image.set_page(130, DLB.to_vec());
    image.set_page(131, CFG0.to_vec());
    image.set_page(132, CFG1.to_vec());
    image.set_page(133, expected.password.to_vec());
    image.set_page(134, PACK.to_vec());
    image
}

#[test]
fn bcc_values_match_known_table() {
    let table: [([u8; 7], u8, u8); 5] = [
        ([0x04, 0xAB, 0x73, 0x54, 0xB8, 0xB6, 0x0F], 0x54, 0x55),
        ([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66], 0xBF, 0x44),
        ([0x00; 7], 0x88, 0x00),
        ([0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03, 0x04], 0x77, 0x04),
        ([0x04, 0x01, 0x02, 0x03, 0x04, 0xA0, 0xB0], 0x8F, 0x17),
    ];

    for (bytes, bcc0, bcc1) in table {
        let uid = Uid::new(bytes);
        assert_eq!(derive::bcc0(&uid), bcc0, "BCC0 for {uid}");
        assert_eq!(derive::bcc1(&uid), bcc1, "BCC1 for {uid}");
    }
}

#[test]
fn password_is_deterministic_for_reference_uid() {
    let uid = Uid::new([0x04, 0xAB, 0x73, 0x54, 0xB8, 0xB6, 0x0F]);
    let first = derive::password(&uid);
    let second = derive::password(&uid);

    assert_eq!(first, [0x55, 0x9E, 0x48, 0xE2]);
    assert_eq!(first, second);
}

#[test]
fn password_depends_on_sn3() {
    let uid = Uid::new([0x04, 0xAB, 0x73, 0x88, 0xB8, 0xB6, 0x0F]);
    assert_eq!(derive::password(&uid), [0x89, 0x9E, 0x94, 0xE2]);
}

#[test]
fn uid_rebuilds_from_pages() {
    let uid = Uid::from_pages(&[0x04, 0xAB, 0x73, 0x54], &[0x54, 0xB8, 0xB6, 0x0F])
        .expect("seven bytes available");
    assert_eq!(uid.to_compact_hex(), "04AB7354B8B60F");
    assert_eq!(uid.to_string(), "04 AB 73 54 B8 B6 0F");
}

#[test]
fn short_uid_reports_insufficient_data() {
    let err = Uid::from_pages(&[0x04, 0xAB], &[0x54, 0xB8, 0xB6, 0x0F])
        .expect_err("six bytes cannot form a UID");
    assert_eq!(err.code, CoreErrorCode::InsufficientData);

    let err = Uid::from_slice(&[0x04, 0xAB, 0x73]).expect_err("three bytes");
    assert_eq!(err.code, CoreErrorCode::InsufficientData);
}

#[test]
fn images_built_from_any_legal_uid_are_valid() {
    let mut rng = StdRng::seed_from_u64(0x215);
    for _ in 0..500 {
        let mut bytes: [u8; 7] = rng.r#gen();
        if bytes[3] == 0x88 {
            bytes[3] = 0x00;
        }
        let uid = Uid::new(bytes);
        let diagnosis = diagnose(&image_from_uid(uid));
        assert!(diagnosis.all_valid(), "UID {uid} should validate");
        assert!(diagnosis.failing_fields().is_empty());
    }
}
