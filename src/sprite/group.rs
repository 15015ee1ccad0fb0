//! Extraction records and their grouping into sprite sheets.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::tree::NodePath;

/// Index of a stylesheet within a run.
pub type FileId = usize;

/// One tagged background declaration found during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRecord {
    pub file: FileId,
    /// Position among the records of the same file.
    pub ordinal: usize,
    /// The declaration node.
    pub node: NodePath,
    /// The declaration list holding the node.
    pub parent: NodePath,
    /// Selectors of the enclosing rule; empty outside a rule.
    pub selectors: Vec<String>,
    pub property: String,
    /// Declaration value as written, used to find the node again.
    pub original_value: String,
    pub tag: String,
    /// Absolute, normalized image path.
    pub image: PathBuf,
}

/// All records sharing a tag, across every stylesheet of the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpriteGroup {
    pub tag: String,
    pub records: Vec<ExtractionRecord>,
}

impl SpriteGroup {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            records: vec![],
        }
    }

    pub fn push(&mut self, record: ExtractionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct image paths in first-reference order.
    pub fn unique_paths(&self) -> Vec<PathBuf> {
        let mut seen: HashSet<&Path> = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.image.as_path()))
            .map(|r| r.image.clone())
            .collect()
    }
}

/// Group records by tag. Groups come out sorted by tag; records keep
/// their input order within a group.
pub fn group_records<I>(records: I) -> BTreeMap<String, SpriteGroup>
where
    I: IntoIterator<Item = ExtractionRecord>,
{
    let mut groups: BTreeMap<String, SpriteGroup> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.tag.clone())
            .or_insert_with(|| SpriteGroup::new(record.tag.clone()))
            .push(record);
    }
    groups
}

#[cfg(test)]
pub(crate) fn record(file: FileId, ordinal: usize, tag: &str, image: &str) -> ExtractionRecord {
    use crate::tree::Segment;

    let parent = NodePath::from_segments(vec![
        Segment::Key("stylesheet".to_string()),
        Segment::Key("rules".to_string()),
        Segment::Index(ordinal),
        Segment::Key("declarations".to_string()),
    ]);
    ExtractionRecord {
        file,
        ordinal,
        node: parent.child(Segment::Index(0)),
        parent,
        selectors: vec![format!(".r{}", ordinal)],
        property: "background".to_string(),
        original_value: format!("url({}?__{})", image, tag),
        tag: tag.to_string(),
        image: PathBuf::from(image),
    }
}
