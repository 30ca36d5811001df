use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use roxmltree::{Document, Node};
use thiserror::Error;

use crate::map::codec::{format_csv_rows, parse_csv_tokens, TileDataError};

use super::archive::{map_entry_name, ArchiveError, SaveArchive};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("map entry {name:?} is not valid base64 text: {message}")]
    EntryEncoding { name: String, message: String },
    #[error("map entry {name:?} is not valid XML: {message}")]
    Xml { name: String, message: String },
    #[error("map entry {name:?} has no csv-encoded layer data to patch")]
    NoCsvLayer { name: String },
    #[error("map entry {name:?} tile data is invalid: {source}")]
    Data {
        name: String,
        #[source]
        source: TileDataError,
    },
    #[error("patch index {index} is outside the {len}-cell tile data of entry {name:?}")]
    OutOfBounds {
        name: String,
        index: usize,
        len: usize,
    },
}

/// Persists one map's document inside a save archive: seeds and reads the
/// entry, and patches single CSV cells in place.
///
/// The archive stores the whole original document rather than a delta, so
/// a patch re-emits only the CSV payload and leaves every other byte of
/// the document untouched. Full round-trip fidelity of the XML is not
/// promised beyond that.
#[derive(Debug, Clone)]
pub struct MapPersistence {
    archive: SaveArchive,
    entry_name: String,
}

impl MapPersistence {
    pub fn new(archive: SaveArchive, map_key: &str) -> Self {
        Self {
            archive,
            entry_name: map_entry_name(map_key),
        }
    }

    pub fn archive(&self) -> &SaveArchive {
        &self.archive
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Reads the stored entry and decodes it back to document text.
    pub fn read_document(&self) -> Result<String, PatchError> {
        let stored = self.archive.read_entry(&self.entry_name)?;
        let text = String::from_utf8(stored).map_err(|error| PatchError::EntryEncoding {
            name: self.entry_name.clone(),
            message: error.to_string(),
        })?;
        let decoded =
            BASE64_STANDARD
                .decode(text.trim())
                .map_err(|error| PatchError::EntryEncoding {
                    name: self.entry_name.clone(),
                    message: error.to_string(),
                })?;
        String::from_utf8(decoded).map_err(|error| PatchError::EntryEncoding {
            name: self.entry_name.clone(),
            message: error.to_string(),
        })
    }

    /// Stores document text as the entry, base64-encoded so the archive
    /// holds text-safe bytes. Replacement is delete-then-recreate.
    pub fn write_document(&self, document: &str) -> Result<(), PatchError> {
        let encoded = BASE64_STANDARD.encode(document.as_bytes());
        self.archive.replace_entry(&self.entry_name, encoded.as_bytes())?;
        Ok(())
    }

    /// Rewrites exactly one cell of the stored document's first CSV layer.
    ///
    /// Any failure before the final write leaves the stored entry
    /// byte-for-byte unchanged. The sequence is read-modify-write over the
    /// whole archive and must not run concurrently with itself; every edit
    /// pays a full rewrite, a deliberate durability-over-throughput
    /// tradeoff so a crash between edits loses at most the one in flight.
    pub fn patch_tile(
        &self,
        x: u32,
        y: u32,
        new_id: u32,
        row_width: u32,
    ) -> Result<(), PatchError> {
        let document = self.read_document()?;
        let patched = patch_csv_cell(&document, &self.entry_name, x, y, new_id, row_width)?;
        self.write_document(&patched)
    }
}

fn patch_csv_cell(
    document: &str,
    entry_name: &str,
    x: u32,
    y: u32,
    new_id: u32,
    row_width: u32,
) -> Result<String, PatchError> {
    let doc = Document::parse(document).map_err(|error| PatchError::Xml {
        name: entry_name.to_string(),
        message: error.to_string(),
    })?;

    let data = first_csv_data_node(&doc).ok_or_else(|| PatchError::NoCsvLayer {
        name: entry_name.to_string(),
    })?;

    let (payload, span) = match data.children().find(|child| child.is_text()) {
        Some(node) => (node.text().unwrap_or_default(), node.range()),
        None => ("", 0..0),
    };
    let mut values = parse_csv_tokens(payload).map_err(|source| PatchError::Data {
        name: entry_name.to_string(),
        source,
    })?;

    let index = y as usize * row_width as usize + x as usize;
    if index >= values.len() {
        // Also covers an empty <data> element: no tokens, nothing to patch.
        return Err(PatchError::OutOfBounds {
            name: entry_name.to_string(),
            index,
            len: values.len(),
        });
    }
    values[index] = new_id;
    let rebuilt = format_csv_rows(&values, row_width);

    // Splice over the data element's text span only; attributes, sibling
    // layers and comments survive byte-for-byte.
    let mut out = String::with_capacity(document.len() + 16);
    out.push_str(&document[..span.start]);
    out.push('\n');
    out.push_str(&rebuilt);
    out.push('\n');
    out.push_str(&document[span.end..]);
    Ok(out)
}

/// First `layer/data` element in document order whose encoding is csv.
/// Layers carrying other encodings cannot be patch targets.
fn first_csv_data_node<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    doc.root_element()
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "layer")
        .find_map(|layer| {
            layer
                .children()
                .find(|child| child.is_element() && child.tag_name().name() == "data")
                .filter(|data| data.attribute("encoding") == Some("csv"))
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const CSV_DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="2" height="2" tilewidth="16" tileheight="16">
 <!-- hand-tuned starter field -->
 <tileset firstgid="1" name="farmland" tilewidth="16" tileheight="16">
  <image source="farmland.png" width="64" height="64"/>
 </tileset>
 <layer name="ground" width="2" height="2">
  <data encoding="csv">
1,2,
3,4
  </data>
 </layer>
 <objectgroup name="spawns">
  <object id="1" name="start" type="spawn" x="8" y="8"/>
 </objectgroup>
</map>
"#;

    fn persistence_with(dir: &TempDir, document: &str) -> MapPersistence {
        let archive = SaveArchive::new(dir.path().join("slot_0.save"));
        archive
            .write_entries(&std::collections::BTreeMap::new())
            .expect("empty archive");
        let persistence = MapPersistence::new(archive, "farm");
        persistence.write_document(document).expect("seed entry");
        persistence
    }

    #[test]
    fn document_round_trips_through_the_entry() {
        let dir = TempDir::new().expect("temp dir");
        let persistence = persistence_with(&dir, CSV_DOCUMENT);
        assert_eq!(persistence.entry_name(), "maps/farm.tmx");
        assert_eq!(persistence.read_document().expect("read"), CSV_DOCUMENT);
    }

    #[test]
    fn patch_rewrites_one_cell_and_reemits_rows() {
        let dir = TempDir::new().expect("temp dir");
        let persistence = persistence_with(&dir, CSV_DOCUMENT);

        persistence.patch_tile(1, 0, 9, 2).expect("patch");

        let document = persistence.read_document().expect("read");
        assert!(document.contains("1,9,\n3,4"), "got: {document}");
        let tokens = parse_csv_tokens(
            document
                .split("<data encoding=\"csv\">")
                .nth(1)
                .and_then(|rest| rest.split("</data>").next())
                .expect("data text"),
        )
        .expect("tokens");
        assert_eq!(tokens, vec![1, 9, 3, 4]);

        // Everything outside the data text survives byte-for-byte.
        assert!(document.contains("<!-- hand-tuned starter field -->"));
        assert!(document.contains(r#"<object id="1" name="start" type="spawn" x="8" y="8"/>"#));
        assert!(document.contains(r#"<image source="farmland.png" width="64" height="64"/>"#));
    }

    #[test]
    fn patch_decodes_blank_tokens_as_zero() {
        let dir = TempDir::new().expect("temp dir");
        let document = CSV_DOCUMENT.replace("1,2,\n3,4", "1,,\n,4");
        let persistence = persistence_with(&dir, &document);

        persistence.patch_tile(0, 1, 7, 2).expect("patch");

        let patched = persistence.read_document().expect("read");
        assert!(patched.contains("1,0,\n7,4"), "got: {patched}");
    }

    #[test]
    fn out_of_bounds_patch_leaves_the_entry_unchanged() {
        let dir = TempDir::new().expect("temp dir");
        let persistence = persistence_with(&dir, CSV_DOCUMENT);
        let stored_before = persistence
            .archive()
            .read_entry(persistence.entry_name())
            .expect("stored");

        let err = persistence.patch_tile(0, 2, 9, 2).unwrap_err();
        assert!(matches!(
            err,
            PatchError::OutOfBounds { index: 4, len: 4, .. }
        ));

        let stored_after = persistence
            .archive()
            .read_entry(persistence.entry_name())
            .expect("stored");
        assert_eq!(stored_after, stored_before);
    }

    #[test]
    fn non_csv_document_is_not_patchable_and_stays_unchanged() {
        let dir = TempDir::new().expect("temp dir");
        let document = CSV_DOCUMENT.replace("encoding=\"csv\"", "encoding=\"base64\"");
        let persistence = persistence_with(&dir, &document);
        let stored_before = persistence
            .archive()
            .read_entry(persistence.entry_name())
            .expect("stored");

        let err = persistence.patch_tile(0, 0, 9, 2).unwrap_err();
        assert!(matches!(err, PatchError::NoCsvLayer { .. }));

        let stored_after = persistence
            .archive()
            .read_entry(persistence.entry_name())
            .expect("stored");
        assert_eq!(stored_after, stored_before);
    }

    #[test]
    fn patch_targets_the_first_csv_layer_not_the_first_layer() {
        let dir = TempDir::new().expect("temp dir");
        let document = r#"<map width="2" height="1" tilewidth="16" tileheight="16">
 <layer name="scenery" width="2" height="1">
  <data encoding="base64">AQAAAAIAAAA=</data>
 </layer>
 <layer name="ground" width="2" height="1">
  <data encoding="csv">5,6</data>
 </layer>
</map>
"#;
        let persistence = persistence_with(&dir, document);

        persistence.patch_tile(0, 0, 8, 2).expect("patch");

        let patched = persistence.read_document().expect("read");
        assert!(patched.contains("AQAAAAIAAAA="), "base64 layer untouched");
        assert!(patched.contains("8,6"), "got: {patched}");
    }

    #[test]
    fn missing_entry_is_reported_through_the_archive_error() {
        let dir = TempDir::new().expect("temp dir");
        let archive = SaveArchive::new(dir.path().join("slot_0.save"));
        archive
            .write_entries(&std::collections::BTreeMap::new())
            .expect("empty archive");
        let persistence = MapPersistence::new(archive, "farm");

        let err = persistence.patch_tile(0, 0, 1, 2).unwrap_err();
        assert!(matches!(
            err,
            PatchError::Archive(ArchiveError::EntryMissing { .. })
        ));
    }
}
