//! Whole-container conversion into a test file and its data file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConvertConfig;
use crate::error::{ConvertError, ReconstructionError};
use crate::reconstruct::codegen::{reconstruct, DATA_ALIAS};
use crate::reconstruct::document::extract_container;
use crate::snapshot::model::SnapshotContainer;
use crate::snapshot::tree::read_container;

/// Paths written by one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOutput {
    pub test_file: PathBuf,
    pub data_file: PathBuf,
    pub records: usize,
}

/// Rendered text of both artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSources {
    pub test_source: String,
    pub data_source: String,
}

#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: ConvertConfig,
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn test_file_name(&self, pack: &str) -> String {
        format!("{}_{pack}.rs", self.config.test_prefix)
    }

    pub fn data_file_name(&self, pack: &str) -> String {
        format!("{}_{pack}.rs", self.config.data_module)
    }

    /// Convert `archive` and write both files into `to_dir`.
    ///
    /// Nothing is written unless every record reconstructs.
    pub fn convert_file(&self, archive: &Path, to_dir: &Path) -> Result<ConvertOutput, ConvertError> {
        let pack = pack_name(archive)?;
        tracing::info!(archive = %archive.display(), pack = %pack, "converting");

        let root = read_container(archive)?;
        let container = extract_container(&root)?;
        let sources = self.render(&pack, &container)?;

        fs::create_dir_all(to_dir).map_err(|source| ConvertError::Io {
            path: to_dir.to_path_buf(),
            source,
        })?;
        let data_file = to_dir.join(self.data_file_name(&pack));
        let test_file = to_dir.join(self.test_file_name(&pack));

        fs::write(&data_file, &sources.data_source).map_err(|source| ConvertError::Io {
            path: data_file.clone(),
            source,
        })?;
        if let Err(source) = fs::write(&test_file, &sources.test_source) {
            let _ = fs::remove_file(&data_file);
            return Err(ConvertError::Io {
                path: test_file,
                source,
            });
        }

        tracing::info!(
            test_file = %test_file.display(),
            data_file = %data_file.display(),
            records = container.len(),
            "conversion finished"
        );
        Ok(ConvertOutput {
            test_file,
            data_file,
            records: container.len(),
        })
    }

    /// Render both artifacts for a container without touching the disk.
    pub fn render(
        &self,
        pack: &str,
        container: &SnapshotContainer,
    ) -> Result<GeneratedSources, ReconstructionError> {
        let data_file_name = self.data_file_name(pack);

        let mut test_source = format!(
            "//! Regression tests reconstructed from snapshot `{pack}` by slothwatch.\n\
             #![allow(unused_mut, non_snake_case, clippy::let_unit_value)]\n\n\
             #[path = \"{data_file_name}\"]\nmod {DATA_ALIAS};\n\n"
        );
        let mut data_source = format!(
            "//! Values captured in snapshot `{pack}` (instance `{}`, session {}).\n\
             #![allow(dead_code, non_snake_case, clippy::approx_constant)]\n\n",
            container.instance_id, container.session_id
        );

        for record in &container.records {
            let (test, data) = reconstruct(record, &self.config)?;
            test_source.push_str(test.as_str());
            test_source.push('\n');
            data_source.push_str(data.as_str());
        }

        Ok(GeneratedSources {
            test_source,
            data_source,
        })
    }
}

/// Pack name of an archive: its file stem, made safe for file and module names.
pub fn pack_name(archive: &Path) -> Result<String, ConvertError> {
    let stem = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConvertError::ArchiveName(archive.to_path_buf()))?;
    Ok(stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect())
}
