use crate::export::{discard_temp, sha256_hex};
use anyhow::{anyhow, Context};
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const SUMMARY_ENTRY: &str = "summary.csv";
pub const BUNDLE_FORMAT_V1: &str = "attendease-transcript-v1";

/// One file inside a transcript bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_id: String,
    pub bundle_format: String,
    pub entry_count: usize,
}

/// Zip a student's transcript: `summary.csv` first, then one text report per
/// subject, with a manifest recording each entry's digest.
pub fn write_transcript_bundle(
    out_path: &Path,
    student_id: i64,
    academic_year: &str,
    summary_csv: &[u8],
    reports: &[BundleEntry],
) -> anyhow::Result<BundleSummary> {
    let mut seen = std::collections::HashSet::new();
    for entry in reports {
        let reserved = entry.name == MANIFEST_ENTRY || entry.name == SUMMARY_ENTRY;
        if reserved || !seen.insert(&entry.name) {
            return Err(anyhow!("duplicate bundle entry name: {}", entry.name));
        }
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let tmp_path = out_path.with_extension("zip.writing");
    let bundle_id = Uuid::new_v4().to_string();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "bundleId": bundle_id,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "studentId": student_id,
        "academicYear": academic_year,
        "entries": entry_digests(summary_csv, reports),
    });

    let written = write_zip(&tmp_path, &manifest, summary_csv, reports).and_then(|()| {
        std::fs::rename(&tmp_path, out_path).with_context(|| {
            format!(
                "failed to move bundle into place at {}",
                out_path.to_string_lossy()
            )
        })
    });
    if let Err(e) = written {
        discard_temp(&tmp_path);
        return Err(e);
    }

    Ok(BundleSummary {
        bundle_id,
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: reports.len() + 2,
    })
}

fn entry_digests(summary_csv: &[u8], reports: &[BundleEntry]) -> Vec<serde_json::Value> {
    let mut digests = vec![json!({
        "name": SUMMARY_ENTRY,
        "bytes": summary_csv.len(),
        "sha256": sha256_hex(summary_csv),
    })];
    for entry in reports {
        digests.push(json!({
            "name": entry.name,
            "bytes": entry.contents.len(),
            "sha256": sha256_hex(&entry.contents),
        }));
    }
    digests
}

fn write_zip(
    tmp_path: &Path,
    manifest: &serde_json::Value,
    summary_csv: &[u8],
    reports: &[BundleEntry],
) -> anyhow::Result<()> {
    let out_file = File::create(tmp_path).with_context(|| {
        format!(
            "failed to create output file {}",
            tmp_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SUMMARY_ENTRY, opts)
        .context("failed to start summary entry")?;
    zip.write_all(summary_csv)
        .context("failed to write summary entry")?;

    for entry in reports {
        zip.start_file(entry.name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry.name))?;
        zip.write_all(&entry.contents)
            .with_context(|| format!("failed to write entry {}", entry.name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;
    Ok(())
}
