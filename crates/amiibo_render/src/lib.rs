use std::fmt::Write as _;

use amiibo_core::core_api::{Format, Mode};
use amiibo_core::diagnosis::{Diagnosis, Field, FieldCheck};
use amiibo_core::doctor::{FileReport, RunReport, Summary, UpgradeStatus};
use amiibo_core::uid::spaced_hex;
use serde_json::{Map as JsonMap, Value as JsonValue};

const RULE_WIDTH: usize = 70;
const DETAIL_INDENT: &str = "       ";

/// Order in which per-file checks and the issue breakdown are listed.
const REPORT_ORDER: [Field; 9] = [
    Field::UidField,
    Field::Sn3,
    Field::Bcc0,
    Field::Bcc1,
    Field::Dlb,
    Field::Cfg0,
    Field::Cfg1,
    Field::Password,
    Field::Pack,
];

pub fn render_text_report(report: &RunReport) -> String {
    let mut out = String::new();
    let dry_run = report.mode.is_dry_run();

    let conversion_note = if report.upgrade_requested {
        " + V2/V3 to V4"
    } else {
        ""
    };
    writeln!(
        &mut out,
        "{}: Scanning {} for NTAG215 NFC and BIN files{}...",
        if dry_run { "DRY RUN" } else { "FIXING" },
        report.root.display(),
        conversion_note
    )
    .expect("writing to String cannot fail");
    if dry_run {
        writeln!(&mut out, "DRY RUN MODE - No files will be modified!")
            .expect("writing to String cannot fail");
    }

    let valid: Vec<&FileReport> = report.valid_files().collect();
    if !valid.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        write_section_header(&mut out, "VALID FILES:");
        for file in valid {
            write_file_entry(&mut out, file);
        }
    }

    let problems: Vec<&FileReport> = report.problem_files().collect();
    if !problems.is_empty() {
        writeln!(&mut out).expect("writing to String cannot fail");
        write_section_header(
            &mut out,
            if dry_run {
                "ISSUES FOUND:"
            } else {
                "ISSUES (could not be fixed):"
            },
        );
        for file in problems {
            write_file_entry(&mut out, file);
        }
    }

    write_summary(&mut out, report, &report.summary());
    out
}

fn write_section_header(out: &mut String, title: &str) {
    writeln!(out, "{title}").expect("writing to String cannot fail");
    writeln!(out, "{}", "-".repeat(RULE_WIDTH)).expect("writing to String cannot fail");
}

fn write_file_entry(out: &mut String, file: &FileReport) {
    let uid = file
        .uid()
        .map(|uid| uid.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    writeln!(
        out,
        "{} [{}]: UID {}",
        file.relative_path.display(),
        format_tag(file),
        uid
    )
    .expect("writing to String cannot fail");

    if let Some(upgrade) = &file.upgrade {
        writeln!(out, "{DETAIL_INDENT}{}", upgrade_text(upgrade))
            .expect("writing to String cannot fail");
    }
    for change in &file.changes {
        writeln!(out, "{DETAIL_INDENT}{change}").expect("writing to String cannot fail");
    }
    if let Some(backup) = &file.backup {
        writeln!(out, "{DETAIL_INDENT}Backed up to {}", backup.display())
            .expect("writing to String cannot fail");
    }

    if let Some(error) = &file.error {
        writeln!(out, "{DETAIL_INDENT}Error: {error}").expect("writing to String cannot fail");
    }
    if let Some(diagnosis) = &file.diagnosis {
        match diagnosis.blocker {
            Some(blocker) => writeln!(out, "{DETAIL_INDENT}{} ✗", blocker.message())
                .expect("writing to String cannot fail"),
            None => {
                // Binary dumps carry no UID declaration to check.
                for field in REPORT_ORDER.into_iter().filter(|field| {
                    !(file.format == Format::Binary && *field == Field::UidField)
                }) {
                    writeln!(out, "{DETAIL_INDENT}{}", check_line(diagnosis, field))
                        .expect("writing to String cannot fail");
                }
            }
        }
    }
    writeln!(out).expect("writing to String cannot fail");
}

fn format_tag(file: &FileReport) -> String {
    match (file.format, file.version) {
        (Format::Text, Some(version)) => format!("{} v{version}", file.format.label()),
        (Format::Text, None) => format!("{} v?", file.format.label()),
        (Format::Binary, _) => file.format.label().to_string(),
    }
}

fn upgrade_text(status: &UpgradeStatus) -> String {
    match status {
        UpgradeStatus::AlreadyCurrent => "Already V4".to_string(),
        UpgradeStatus::WouldUpgrade { from } => format!("Would convert V{from} to V4"),
        UpgradeStatus::Upgraded { from } => format!("Converted V{from} to V4"),
        UpgradeStatus::Skipped { reason } => format!("Not converted: {reason}"),
    }
}

/// One `NAME=value ✓` or `NAME=value ✗ (expected ...)` line.
fn check_line(diagnosis: &Diagnosis, field: Field) -> String {
    match field {
        Field::UidField => {
            let check = &diagnosis.uid_field;
            if check.ok {
                "UID field ✓".to_string()
            } else {
                format!(
                    "UID field mismatch (field={}, pages={})",
                    check.declared.as_deref().unwrap_or("none"),
                    check.from_pages.as_deref().unwrap_or("none")
                )
            }
        }
        Field::Sn3 => {
            let value = byte_value(diagnosis.sn3.observed.as_deref());
            format!("SN3={value} {}", mark(diagnosis.sn3.ok))
        }
        Field::Bcc0 => field_line(field, &diagnosis.bcc0, byte_value),
        Field::Bcc1 => field_line(field, &diagnosis.bcc1, byte_value),
        Field::Password => field_line(field, &diagnosis.password, word_value),
        Field::Pack => field_line(field, &diagnosis.pack, word_value),
        Field::Dlb => field_line(field, &diagnosis.dlb, word_value),
        Field::Cfg0 => field_line(field, &diagnosis.cfg0, word_value),
        Field::Cfg1 => field_line(field, &diagnosis.cfg1, word_value),
    }
}

fn field_line(field: Field, check: &FieldCheck, show: fn(Option<&[u8]>) -> String) -> String {
    let observed = show(check.observed.as_deref());
    if check.ok {
        format!("{}={observed} ✓", field.label())
    } else {
        format!(
            "{}={observed} ✗ (expected {})",
            field.label(),
            show(check.expected.as_deref())
        )
    }
}

fn byte_value(bytes: Option<&[u8]>) -> String {
    match bytes.and_then(|b| b.first()) {
        Some(byte) => format!("0x{byte:02X}"),
        None => "none".to_string(),
    }
}

fn word_value(bytes: Option<&[u8]>) -> String {
    match bytes {
        Some(bytes) => spaced_hex(bytes),
        None => "none".to_string(),
    }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

fn breakdown_label(field: Field) -> &'static str {
    match field {
        Field::UidField => "UID field mismatch:",
        Field::Sn3 => "CT in SN3 (0x88):",
        Field::Bcc0 => "BCC0 incorrect:",
        Field::Bcc1 => "BCC1 incorrect:",
        Field::Password => "Password incorrect:",
        Field::Pack => "PACK incorrect:",
        Field::Dlb => "DLB incorrect:",
        Field::Cfg0 => "CFG0 incorrect:",
        Field::Cfg1 => "CFG1 incorrect:",
    }
}

fn version_label(version: Option<u32>) -> String {
    match version {
        Some(version) => format!("v{version}"),
        None => "v?".to_string(),
    }
}

fn write_summary(out: &mut String, report: &RunReport, summary: &Summary) {
    let dry_run = report.mode.is_dry_run();

    writeln!(out, "{}", "=".repeat(RULE_WIDTH)).expect("writing to String cannot fail");
    writeln!(
        out,
        "{}",
        if dry_run {
            "Scan complete!"
        } else {
            "Processing complete!"
        }
    )
    .expect("writing to String cannot fail");
    writeln!(
        out,
        "Total files checked: {} ({} NFC, {} BIN)",
        summary.total, summary.text_files, summary.binary_files
    )
    .expect("writing to String cannot fail");

    if !summary.versions.is_empty() {
        let breakdown: Vec<String> = summary
            .versions
            .iter()
            .map(|v| format!("{} {}", v.count, version_label(v.version)))
            .collect();
        writeln!(out, "NFC versions: {}", breakdown.join(", "))
            .expect("writing to String cannot fail");
    }

    writeln!(out, "Valid files: {}", summary.valid).expect("writing to String cannot fail");
    writeln!(out, "Problem files: {}", summary.problems).expect("writing to String cannot fail");
    if !dry_run {
        if summary.fixed > 0 {
            writeln!(out, "Files fixed: {}", summary.fixed)
                .expect("writing to String cannot fail");
        }
        if summary.converted > 0 {
            writeln!(out, "Files converted to V4: {}", summary.converted)
                .expect("writing to String cannot fail");
        }
    }

    if summary.problems > 0 {
        writeln!(out).expect("writing to String cannot fail");
        writeln!(out, "ISSUES BREAKDOWN:").expect("writing to String cannot fail");
        for field in REPORT_ORDER {
            writeln!(
                out,
                "   {:<22}{} files",
                breakdown_label(field),
                summary.issues_for(field)
            )
            .expect("writing to String cannot fail");
        }
        writeln!(out).expect("writing to String cannot fail");
        writeln!(out, "Total issues: {}", summary.total_issues)
            .expect("writing to String cannot fail");

        writeln!(out).expect("writing to String cannot fail");
        if dry_run {
            writeln!(out, "Found {} files with issues!", summary.problems)
                .expect("writing to String cannot fail");
            if summary.would_convert > 0 {
                writeln!(
                    out,
                    "Found {} V2/V3 files that would be converted to V4!",
                    summary.would_convert
                )
                .expect("writing to String cannot fail");
            }
            writeln!(out, "Use --fix to actually modify them.")
                .expect("writing to String cannot fail");
        } else {
            writeln!(
                out,
                "{} files still have issues that could not be fixed.",
                summary.problems
            )
            .expect("writing to String cannot fail");
        }
    } else {
        writeln!(out).expect("writing to String cannot fail");
        writeln!(out, "All files passed validation!").expect("writing to String cannot fail");
    }

    if !dry_run && (summary.fixed > 0 || summary.converted > 0) {
        let mut actions = Vec::new();
        if summary.fixed > 0 {
            actions.push(format!("{} files have been fixed", summary.fixed));
        }
        if summary.converted > 0 {
            actions.push(format!(
                "{} files have been converted to V4",
                summary.converted
            ));
        }
        writeln!(out).expect("writing to String cannot fail");
        writeln!(out, "{}!", actions.join(" and ")).expect("writing to String cannot fail");
        if let Some(dir) = &report.backup_dir {
            writeln!(out, "Original files backed up to {}", dir.display())
                .expect("writing to String cannot fail");
        }
    }
}

pub fn render_json_report(report: &RunReport) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "root".to_string(),
        JsonValue::String(report.root.display().to_string()),
    );
    out.insert(
        "mode".to_string(),
        JsonValue::String(mode_key(report.mode).to_string()),
    );
    out.insert(
        "upgrade_requested".to_string(),
        JsonValue::Bool(report.upgrade_requested),
    );
    out.insert(
        "backup_dir".to_string(),
        report
            .backup_dir
            .as_ref()
            .map(|dir| JsonValue::String(dir.display().to_string()))
            .unwrap_or(JsonValue::Null),
    );
    out.insert(
        "files".to_string(),
        JsonValue::Array(report.files.iter().map(file_to_json).collect()),
    );
    out.insert("summary".to_string(), summary_to_json(&report.summary()));
    JsonValue::Object(out)
}

fn mode_key(mode: Mode) -> &'static str {
    match mode {
        Mode::DryRun => "dry_run",
        Mode::Fix => "fix",
    }
}

fn field_key(field: Field) -> &'static str {
    match field {
        Field::UidField => "uid_field",
        Field::Sn3 => "sn3",
        Field::Bcc0 => "bcc0",
        Field::Bcc1 => "bcc1",
        Field::Password => "password",
        Field::Pack => "pack",
        Field::Dlb => "dlb",
        Field::Cfg0 => "cfg0",
        Field::Cfg1 => "cfg1",
    }
}

fn optional_string(value: Option<String>) -> JsonValue {
    value.map(JsonValue::String).unwrap_or(JsonValue::Null)
}

fn file_to_json(file: &FileReport) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "path".to_string(),
        JsonValue::String(file.relative_path.display().to_string()),
    );
    m.insert(
        "format".to_string(),
        JsonValue::String(file.format.label().to_ascii_lowercase()),
    );
    m.insert(
        "version".to_string(),
        file.version.map(JsonValue::from).unwrap_or(JsonValue::Null),
    );
    m.insert(
        "uid".to_string(),
        optional_string(file.uid().map(|uid| uid.to_string())),
    );
    m.insert("valid".to_string(), JsonValue::Bool(file.is_valid()));
    m.insert(
        "blocker".to_string(),
        optional_string(
            file.diagnosis
                .as_ref()
                .and_then(|d| d.blocker)
                .map(|b| b.message().to_string()),
        ),
    );
    m.insert(
        "checks".to_string(),
        file.diagnosis
            .as_ref()
            .map(checks_to_json)
            .unwrap_or(JsonValue::Null),
    );
    m.insert(
        "changes".to_string(),
        JsonValue::Array(
            file.changes
                .iter()
                .map(|change| JsonValue::String(change.to_string()))
                .collect(),
        ),
    );
    m.insert("was_fixed".to_string(), JsonValue::Bool(file.was_fixed));
    m.insert(
        "was_converted".to_string(),
        JsonValue::Bool(file.was_converted),
    );
    m.insert(
        "upgrade".to_string(),
        optional_string(file.upgrade.as_ref().map(upgrade_text)),
    );
    m.insert(
        "backup".to_string(),
        optional_string(file.backup.as_ref().map(|p| p.display().to_string())),
    );
    m.insert(
        "error".to_string(),
        match &file.error {
            Some(error) => {
                let mut e = JsonMap::new();
                e.insert(
                    "code".to_string(),
                    JsonValue::String(format!("{:?}", error.code)),
                );
                e.insert(
                    "message".to_string(),
                    JsonValue::String(error.message.clone()),
                );
                JsonValue::Object(e)
            }
            None => JsonValue::Null,
        },
    );
    JsonValue::Object(m)
}

fn checks_to_json(diagnosis: &Diagnosis) -> JsonValue {
    let mut m = JsonMap::new();

    let mut uid_field = JsonMap::new();
    uid_field.insert("ok".to_string(), JsonValue::Bool(diagnosis.uid_field.ok));
    uid_field.insert(
        "declared".to_string(),
        optional_string(diagnosis.uid_field.declared.clone()),
    );
    uid_field.insert(
        "from_pages".to_string(),
        optional_string(diagnosis.uid_field.from_pages.clone()),
    );
    m.insert(
        field_key(Field::UidField).to_string(),
        JsonValue::Object(uid_field),
    );

    for field in Field::ALL {
        let Some(check) = diagnosis.check(field) else {
            continue;
        };
        let mut c = JsonMap::new();
        c.insert("ok".to_string(), JsonValue::Bool(check.ok));
        c.insert(
            "observed".to_string(),
            optional_string(check.observed.as_deref().map(spaced_hex)),
        );
        c.insert(
            "expected".to_string(),
            optional_string(check.expected.as_deref().map(spaced_hex)),
        );
        m.insert(field_key(field).to_string(), JsonValue::Object(c));
    }
    JsonValue::Object(m)
}

fn summary_to_json(summary: &Summary) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("total".to_string(), JsonValue::from(summary.total));
    m.insert("nfc".to_string(), JsonValue::from(summary.text_files));
    m.insert("bin".to_string(), JsonValue::from(summary.binary_files));

    let mut versions = JsonMap::new();
    for entry in &summary.versions {
        versions.insert(version_label(entry.version), JsonValue::from(entry.count));
    }
    m.insert("versions".to_string(), JsonValue::Object(versions));

    m.insert("valid".to_string(), JsonValue::from(summary.valid));
    m.insert("problems".to_string(), JsonValue::from(summary.problems));
    m.insert("fixed".to_string(), JsonValue::from(summary.fixed));
    m.insert("converted".to_string(), JsonValue::from(summary.converted));
    m.insert(
        "would_convert".to_string(),
        JsonValue::from(summary.would_convert),
    );

    let mut issues = JsonMap::new();
    for entry in &summary.field_issues {
        issues.insert(
            field_key(entry.field).to_string(),
            JsonValue::from(entry.count),
        );
    }
    m.insert("issues".to_string(), JsonValue::Object(issues));
    m.insert(
        "total_issues".to_string(),
        JsonValue::from(summary.total_issues),
    );
    JsonValue::Object(m)
}
