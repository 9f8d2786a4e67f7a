use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExtractError;
use crate::manifest::Manifest;

pub const ZIP_MIME: &str = "application/zip";

/// Builds the response archive in memory.
///
/// Entries keep the order they were added in. Adding a name twice replaces
/// the earlier content, so the archive holds one entry per name.
#[derive(Debug, Default)]
pub struct ArchiveAssembler {
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an entry with the same name was overwritten.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> bool {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|(entry, _)| *entry == name) {
            existing.1 = bytes;
            return true;
        }
        self.entries.push((name, bytes));
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every image entry followed by the manifest.
    pub fn assemble(self, manifest_name: &str, manifest: &Manifest) -> Result<Vec<u8>, ExtractError> {
        let manifest_json = manifest.to_json()?;
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, bytes) in self.entries {
            writer.start_file(name, options)?;
            writer.write_all(&bytes)?;
        }
        writer.start_file(manifest_name, options)?;
        writer.write_all(manifest_json.as_bytes())?;

        Ok(writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestBuilder, ManifestHeader, OriginalImage};
    use crate::scale::ScaleFactors;
    use std::io::Read;
    use zip::ZipArchive;

    fn manifest() -> Manifest {
        ManifestBuilder::new(ManifestHeader {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            project_type: "letter_extraction".to_string(),
            alphabet_type: "custom".to_string(),
            name_prefix: String::new(),
            original_image: OriginalImage {
                width: 10,
                height: 10,
                filename: None,
            },
            canvas_info: serde_json::json!({}),
            scale_factors: ScaleFactors { x: 1.0, y: 1.0 },
        })
        .finish()
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).expect("entry");
        let mut data = Vec::new();
        file.read_to_end(&mut data).expect("read");
        data
    }

    #[test]
    fn writes_entries_then_manifest() {
        let mut assembler = ArchiveAssembler::new();
        assembler.add("A.png", vec![1, 2, 3]);
        assembler.add("B.png", vec![4, 5]);
        let bytes = assembler.assemble("batch.json", &manifest()).expect("zip");

        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive");
        let names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
        assert_eq!(names.len(), 3);
        assert_eq!(archive.by_index(2).expect("last").name(), "batch.json");
        assert_eq!(
            archive.by_index(0).expect("first").compression(),
            CompressionMethod::Deflated
        );
        assert_eq!(read_entry(&mut archive, "B.png"), vec![4, 5]);

        let json = String::from_utf8(read_entry(&mut archive, "batch.json")).expect("utf8");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["alphabet_type"], "custom");
    }

    #[test]
    fn later_entry_overwrites_same_name() {
        let mut assembler = ArchiveAssembler::new();
        assert!(!assembler.add("A.png", vec![1]));
        assert!(assembler.add("A.png", vec![2]));
        assert_eq!(assembler.len(), 1);

        let bytes = assembler.assemble("m.json", &manifest()).expect("zip");
        let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive");
        assert_eq!(archive.len(), 2);
        assert_eq!(read_entry(&mut archive, "A.png"), vec![2]);
    }

    #[test]
    fn manifest_only_archive_is_valid() {
        let assembler = ArchiveAssembler::new();
        assert!(assembler.is_empty());
        let bytes = assembler.assemble("m.json", &manifest()).expect("zip");
        let archive = ZipArchive::new(Cursor::new(bytes)).expect("archive");
        assert_eq!(archive.len(), 1);
    }
}
