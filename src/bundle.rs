use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DRAFT_ENTRY: &str = "setup/draft.json";
pub const BUNDLE_FORMAT_V1: &str = "setupd-draft-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportedBundle {
    pub bundle_format_detected: String,
    pub session_key: String,
    pub payload: serde_json::Value,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `payload` (a saved draft) plus a manifest carrying its checksum.
pub fn export_setup_bundle(
    session_key: &str,
    payload: &serde_json::Value,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let draft_bytes =
        serde_json::to_vec_pretty(payload).context("failed to serialize draft payload")?;
    let digest = sha256_hex(&draft_bytes);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "sessionKey": session_key,
        "sha256": digest,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DRAFT_ENTRY, opts)
        .context("failed to start draft entry")?;
    zip.write_all(&draft_bytes)
        .context("failed to write draft entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        sha256: digest,
    })
}

pub fn import_setup_bundle(in_path: &Path) -> anyhow::Result<ImportedBundle> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest.json missing sha256"))?
        .to_string();
    let session_key = manifest
        .get("sessionKey")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut draft_bytes = Vec::new();
    archive
        .by_name(DRAFT_ENTRY)
        .context("bundle missing setup/draft.json")?
        .read_to_end(&mut draft_bytes)
        .context("failed to read draft entry")?;
    let actual = sha256_hex(&draft_bytes);
    if actual != expected {
        return Err(anyhow!(
            "draft checksum mismatch: manifest {} but entry hashes to {}",
            expected,
            actual
        ));
    }

    let payload = serde_json::from_slice(&draft_bytes).context("draft entry is invalid JSON")?;
    Ok(ImportedBundle {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        session_key,
        payload,
    })
}
