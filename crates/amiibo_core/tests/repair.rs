use std::fs;
use std::path::PathBuf;

use amiibo_core::core_api::{CoreErrorCode, Engine, Format, RepairOutcome};
use amiibo_core::derive::{CFG0, CFG1, DLB, Expected, PACK};
use amiibo_core::diagnosis::{Field, diagnose};
use amiibo_core::image::TagImage;
use amiibo_core::repair::{FixOptions, RandSource, ScriptedBytes, plan_repair, resample_sn3};
use amiibo_core::text::Document;
use amiibo_core::uid::Uid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn load_fixture(name: &str) -> String {
    let path = workspace_root().join("tests/fixtures").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {:?}: {}", path, e))
}

fn fixture_image(name: &str) -> TagImage {
    Document::parse(&load_fixture(name)).image
}

#[test]
fn resampling_skips_the_cascade_tag() {
    let mut source = ScriptedBytes::new([0x88, 0x88, 0x54]);
    assert_eq!(resample_sn3(&mut source), 0x54);
}

#[test]
fn seeded_rng_never_yields_the_cascade_tag() {
    let mut source = RandSource(StdRng::seed_from_u64(42));
    for _ in 0..10_000 {
        assert_ne!(resample_sn3(&mut source), 0x88);
    }
}

#[test]
fn collision_repair_rewrites_uid_and_dependents() {
    let image = fixture_image("sn3_collision.nfc");
    let mut source = ScriptedBytes::new([0x88, 0x54]);

    let plan = plan_repair(&image, &FixOptions::default(), &mut source).expect("plannable");
    assert_eq!(plan.rewritten_pages(), vec![0, 1, 2, 133, 134]);

    let fields: Vec<Field> = plan.changes().iter().map(|c| c.field).collect();
    assert_eq!(
        fields,
        vec![Field::Sn3, Field::Bcc0, Field::Bcc1, Field::Password, Field::Pack]
    );
    assert_eq!(
        plan.changes()[0].to_string(),
        "Fixed CT in SN3 from 0x88 to 0x54"
    );
    assert_eq!(
        plan.changes()[3].to_string(),
        "Fixed PWD: 89 9E 94 E2 -> 55 9E 48 E2"
    );

    let mut repaired = image.clone();
    plan.apply(&mut repaired);

    assert_eq!(repaired.uid_field.as_deref(), Some("04AB7354B8B60F"));
    assert_eq!(repaired.page(1), Some(&[0x54, 0xB8, 0xB6, 0x0F][..]));
    for untouched in [130, 131, 132] {
        assert_eq!(repaired.page(untouched), image.page(untouched));
    }
    let diagnosis = diagnose(&repaired);
    assert!(diagnosis.all_valid());
    assert!(diagnosis.uid_field.ok);
}

#[test]
fn repairing_a_repaired_image_is_a_no_op() {
    let mut image = fixture_image("sn3_collision.nfc");
    let mut source = ScriptedBytes::new([0x54]);
    plan_repair(&image, &FixOptions::default(), &mut source)
        .expect("first pass")
        .apply(&mut image);

    let second = plan_repair(&image, &FixOptions::default(), &mut source).expect("second pass");
    assert!(second.is_empty());
    assert!(second.rewritten_pages().is_empty());
}

/// Image whose pages are consistent with `uid`, including a declared UID.
fn image_from_uid(uid: Uid) -> TagImage {
    let expected = Expected::for_uid(&uid);
    let mut image = TagImage::default();
    image.uid_field = Some(uid.to_compact_hex());
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
fn any_cascade_collision_repairs_to_a_stable_valid_image() {
    let mut rng = StdRng::seed_from_u64(0x88);
    let mut source = RandSource(StdRng::seed_from_u64(0x215));

    for _ in 0..2000 {
        let mut bytes: [u8; 7] = rng.r#gen();
        bytes[3] = 0x88;
        let mut image = image_from_uid(Uid::new(bytes));
        assert!(!diagnose(&image).sn3.ok);

        plan_repair(&image, &FixOptions::default(), &mut source)
            .expect("first pass")
            .apply(&mut image);

        let diagnosis = diagnose(&image);
        let uid = diagnosis.uid.expect("pages 0 and 1 present");
        assert!(!uid.has_cascade_collision(), "SN3 still 0x88 for {uid}");
        assert!(diagnosis.all_valid(), "repaired {uid} should validate");
        assert!(diagnosis.uid_field.ok);

        let second = plan_repair(&image, &FixOptions::default(), &mut source)
            .expect("second pass");
        assert!(second.is_empty(), "second pass on {uid} changed {:?}", second.changes());
    }
}

#[test]
fn valid_image_needs_no_changes() {
    let image = fixture_image("valid_v4.nfc");
    let plan = plan_repair(&image, &FixOptions::default(), &mut ScriptedBytes::new([0x00]))
        .expect("plannable");
    assert!(plan.is_empty());
}

#[test]
fn disabled_groups_are_left_alone() {
    let image = fixture_image("sn3_collision.nfc");
    let options = FixOptions {
        uid: false,
        pack: false,
        ..FixOptions::default()
    };

    let plan = plan_repair(&image, &options, &mut ScriptedBytes::new([0x54])).expect("plannable");
    let fields: Vec<Field> = plan.changes().iter().map(|c| c.field).collect();

    // BCC values follow the unrepaired UID when SN3 stays 0x88.
    assert_eq!(fields, vec![Field::Bcc0, Field::Bcc1]);
    assert_eq!(plan.changes()[1].after, "89");
    assert_eq!(plan.rewritten_pages(), vec![0, 2]);
}

#[test]
fn no_enabled_fixes_means_an_empty_plan() {
    let image = fixture_image("sn3_collision.nfc");
    let plan = plan_repair(&image, &FixOptions::none(), &mut ScriptedBytes::new([0x54]))
        .expect("plannable");
    assert!(plan.is_empty());
}

#[test]
fn uid_declaration_is_realigned_with_pages() {
    let mut image = fixture_image("valid_v4.nfc");
    image.uid_field = Some("04AB7354B8B6FF".to_string());

    let plan = plan_repair(&image, &FixOptions::default(), &mut ScriptedBytes::new([0x00]))
        .expect("plannable");
    assert_eq!(plan.changes().len(), 1);
    assert_eq!(
        plan.changes()[0].to_string(),
        "Fixed UID field to match pages: 04AB7354B8B6FF -> 04AB7354B8B60F"
    );
    assert!(plan.rewritten_pages().is_empty());

    plan.apply(&mut image);
    assert!(diagnose(&image).uid_field.ok);
}

#[test]
fn missing_pages_cannot_be_planned() {
    let mut image = fixture_image("valid_v4.nfc");
    image.pages.remove(&0);

    let err = plan_repair(&image, &FixOptions::default(), &mut ScriptedBytes::new([0x00]))
        .expect_err("page 0 is required");
    assert_eq!(err.code, CoreErrorCode::MissingPages);
}

#[test]
fn session_repair_re_encodes_only_changed_lines() {
    let original = load_fixture("sn3_collision.nfc");
    let mut session = Engine::new()
        .open_bytes(original.as_bytes(), Format::Text)
        .expect("text dump");

    let outcome = session
        .repair(&FixOptions::default(), &mut ScriptedBytes::new([0x88, 0x54]))
        .expect("repairable");
    assert!(matches!(outcome, RepairOutcome::Repaired(ref changes) if changes.len() == 5));
    assert!(session.is_modified());

    let encoded = String::from_utf8(session.to_bytes_modified().expect("encodable"))
        .expect("utf-8 text");
    let changed: Vec<(&str, &str)> = original
        .split('\n')
        .zip(encoded.split('\n'))
        .filter(|(before, after)| before != after)
        .collect();

    assert_eq!(
        changed,
        vec![
            ("UID: 04 AB 73 88 B8 B6 0F", "UID: 04 AB 73 54 B8 B6 0F"),
            ("Page 0: 04 AB 73 00", "Page 0: 04 AB 73 54"),
            ("Page 1: 88 B8 B6 0F", "Page 1: 54 B8 B6 0F"),
            ("Page 2: 00 48 0F E0", "Page 2: 55 48 0F E0"),
            ("Page 133: 89 9E 94 E2", "Page 133: 55 9E 48 E2"),
            ("Page 134: 00 00 00 00", "Page 134: 80 80 00 00"),
        ]
    );
}
