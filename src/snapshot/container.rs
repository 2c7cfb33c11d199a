//! Snapshot container writer: one XML document inside a zip archive.
//!
//! Layout of `<snapshotId>.zip`:
//! - `<snapshotId>.xml` (root `SlothWatch`)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::FileOptions;

use crate::error::PersistenceError;
use crate::snapshot::model::{InvocationRecord, SnapshotContainer, ValueSnapshot};

pub const ROOT_TAG: &str = "SlothWatch";
pub const ARCHIVE_EXTENSION: &str = "zip";
pub const DOCUMENT_EXTENSION: &str = "xml";

/// Archive path for a snapshot id inside `dir`.
pub fn archive_path(dir: &Path, snapshot_id: &str) -> PathBuf {
    dir.join(format!("{snapshot_id}.{ARCHIVE_EXTENSION}"))
}

/// Document entry name inside the archive.
pub fn document_name(snapshot_id: &str) -> String {
    format!("{snapshot_id}.{DOCUMENT_EXTENSION}")
}

/// Serialize `container` and write it to `<dir>/<snapshotId>.zip`.
pub fn write_container(
    dir: &Path,
    container: &SnapshotContainer,
) -> Result<PathBuf, PersistenceError> {
    fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let out_path = archive_path(dir, &container.snapshot_id);
    let document = render_document(container)?;
    let io_err = |source| PersistenceError::Io {
        path: out_path.clone(),
        source,
    };

    let zip_file = File::create(&out_path).map_err(io_err)?;
    let mut zip = zip::ZipWriter::new(zip_file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(document_name(&container.snapshot_id), options)?;
    zip.write_all(document.as_bytes()).map_err(io_err)?;

    let mut zip_file = zip.finish()?;
    zip_file.flush().map_err(io_err)?;

    tracing::info!(
        path = %out_path.display(),
        records = container.len(),
        "snapshot container written"
    );
    Ok(out_path)
}

/// Render the XML document for a container.
pub fn render_document(container: &SnapshotContainer) -> Result<String, PersistenceError> {
    let mut doc = DocumentWriter::new();
    doc.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    doc.open(ROOT_TAG)?;
    doc.leaf("instance_name", &container.instance_id)?;
    doc.leaf("snapshot_name", &container.snapshot_id)?;
    doc.leaf("session_id", &container.session_id)?;
    doc.open("functions_list")?;
    for record in &container.records {
        write_record(&mut doc, record)?;
    }
    doc.close("functions_list")?;
    doc.close(ROOT_TAG)?;

    doc.finish()
}

fn write_record(doc: &mut DocumentWriter, record: &InvocationRecord) -> Result<(), PersistenceError> {
    doc.open("function")?;
    doc.leaf("run_id", &record.run_id.to_string())?;
    doc.leaf("scope_name", &record.scope_path)?;
    doc.leaf("class_name", &record.class_name)?;
    doc.leaf("class_dump", &record.class_snapshot)?;
    doc.leaf("function_name", &record.function_name)?;
    doc.leaf("call_stack", &record.call_stack)?;

    doc.open("arguments_list")?;
    for argument in &record.arguments {
        write_value(doc, "argument", argument)?;
    }
    doc.close("arguments_list")?;

    doc.open("results_list")?;
    for result in &record.results {
        write_value(doc, "result", result)?;
    }
    doc.close("results_list")?;

    doc.close("function")
}

fn write_value(
    doc: &mut DocumentWriter,
    tag: &str,
    value: &ValueSnapshot,
) -> Result<(), PersistenceError> {
    doc.open(tag)?;
    doc.leaf("par_type", &value.type_tag)?;
    doc.leaf("par_name", &value.name)?;
    doc.leaf("par_value", &value.value)?;
    doc.leaf("par_state", value.role.code())?;
    doc.leaf("par_simple", if value.is_primitive { "True" } else { "False" })?;
    doc.leaf("additional_info", &value.note)?;
    doc.close(tag)
}

struct DocumentWriter {
    writer: Writer<Vec<u8>>,
}

impl DocumentWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), PersistenceError> {
        self.writer
            .write_event(event)
            .map_err(|e| PersistenceError::Document(e.to_string()))
    }

    fn open(&mut self, tag: &str) -> Result<(), PersistenceError> {
        self.event(Event::Start(BytesStart::new(tag)))
    }

    fn close(&mut self, tag: &str) -> Result<(), PersistenceError> {
        self.event(Event::End(BytesEnd::new(tag)))
    }

    fn leaf(&mut self, tag: &str, text: &str) -> Result<(), PersistenceError> {
        // An indented `<tag></tag>` pair would read back as whitespace text.
        if text.is_empty() {
            return self.event(Event::Empty(BytesStart::new(tag)));
        }
        self.open(tag)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(tag)
    }

    fn finish(self) -> Result<String, PersistenceError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| PersistenceError::Document(e.to_string()))
    }
}
