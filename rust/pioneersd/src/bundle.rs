use anyhow::{anyhow, Context};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const TOWNS_ENTRY: &str = "towns.csv";
pub const CHARACTERS_ENTRY: &str = "characters.csv";
pub const BUNDLE_FORMAT: &str = "pioneers-export-v1";

#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub town_rows: usize,
    pub character_rows: usize,
}

#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub bundle_format: String,
    pub exported_at: Option<String>,
    pub entries_checked: usize,
    /// Entries whose content no longer matches the manifest checksum.
    pub mismatched: Vec<String>,
}

impl VerifySummary {
    pub fn is_intact(&self) -> bool {
        self.mismatched.is_empty()
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn data_rows(csv: &str) -> usize {
    csv.lines().count().saturating_sub(1)
}

/// Write both exports plus a manifest with per-entry checksums into one zip.
pub fn export_bundle(
    out_path: &Path,
    towns_csv: &str,
    characters_csv: &str,
) -> anyhow::Result<BundleSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries = [(TOWNS_ENTRY, towns_csv), (CHARACTERS_ENTRY, characters_csv)];
    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "entries": entries
            .iter()
            .map(|(name, body)| json!({
                "name": name,
                "rows": data_rows(body),
                "sha256": sha256_hex(body.as_bytes()),
            }))
            .collect::<Vec<_>>(),
    });

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, body) in entries {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start {} entry", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write {} entry", name))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(BundleSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: entries.len() + 1,
        town_rows: data_rows(towns_csv),
        character_rows: data_rows(characters_csv),
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle missing {}", name))?
        .read_to_end(&mut buf)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(buf)
}

pub fn verify_bundle(in_path: &Path) -> anyhow::Result<VerifySummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest: Value = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let entries = manifest
        .get("entries")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("manifest.json has no entries"))?;

    let mut mismatched = Vec::new();
    for entry in entries {
        let name = entry
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("manifest entry without name"))?;
        let expected = entry.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
        let body = read_entry(&mut archive, name)?;
        if sha256_hex(&body) != expected {
            mismatched.push(name.to_string());
        }
    }

    Ok(VerifySummary {
        bundle_format: format.to_string(),
        exported_at: manifest
            .get("exportedAt")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        entries_checked: entries.len(),
        mismatched,
    })
}
