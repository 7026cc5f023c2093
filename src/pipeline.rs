//! End-to-end entry points: parse, pick a normalizer, serialize.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::gpx_types::GpxDocument;
use crate::options::NormalizeOptions;
use crate::parser::{parse_gpx, parse_gpx_file};
use crate::services;
use crate::writer;

/// Suffix appended to the input stem for canonical output.
pub const CONVERTED_SUFFIX: &str = "_converted";
/// Suffix appended to the input stem for Runkeeper output.
pub const RUNKEEPER_SUFFIX: &str = "_runkeeper";

/// Run the normalizer selected by `opts` (detected by default).
pub fn normalize_document(doc: GpxDocument, opts: &NormalizeOptions) -> GpxDocument {
    let service = opts.service.resolve(&doc);
    tracing::debug!(%service, creator = %doc.creator, "normalizing");
    services::normalize(doc, service)
}

/// Parse and normalize GPX text without serializing it.
pub fn inspect(xml: &str, opts: &NormalizeOptions) -> Result<GpxDocument> {
    Ok(normalize_document(parse_gpx(xml)?, opts))
}

/// GPX text in, canonical GPX text out.
pub fn normalize_str(xml: &str, opts: &NormalizeOptions) -> Result<String> {
    let doc = inspect(xml, opts)?;
    writer::to_canonical_xml(&doc, opts)
}

/// Normalize the file at `input` into `output`, returning the document
/// that was written.
pub fn normalize_path(input: &Path, output: &Path, opts: &NormalizeOptions) -> Result<GpxDocument> {
    let doc = normalize_document(parse_gpx_file(input)?, opts);
    writer::write_canonical(&doc, output, opts)?;
    Ok(doc)
}

/// Like [`normalize_path`], reporting only success. Failures are logged.
pub fn normalize_file(input: impl AsRef<Path>, output: impl AsRef<Path>, opts: &NormalizeOptions) -> bool {
    let (input, output) = (input.as_ref(), output.as_ref());
    match normalize_path(input, output, opts) {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(input = %input.display(), error = %e, "conversion failed");
            false
        }
    }
}

/// `dir/walk.gpx` + `_converted` -> `dir/walk_converted.gpx`.
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(file_name)
}
