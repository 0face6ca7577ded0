//! Document outline (bookmarks).
//!
//! The tree is held in an arena and linked by `NodeId`. It is turned into PDF outline item
//! dictionaries in one pass once the whole tree is known.

use std::io;

use lopdf::{Dictionary, Object, ObjectId, StringFormat};

use super::ObjectSink;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    /// The page object this item jumps to
    pub destination: Option<ObjectId>,
    /// Whether the children are shown when the document is opened
    pub open: bool,
    parent: Option<NodeId>,
    /// Index of this node in the children of its parent
    position: usize,
    children: Vec<NodeId>,
}

/// A tree of outline items below an unlabelled root.
///
/// Ids of another outline are not members of this one. Lookups with an id this outline did
/// not hand out return `None`.
#[derive(Debug, Clone)]
pub struct Outline {
    nodes: Vec<Node>,
}

impl Default for Outline {
    fn default() -> Self {
        Outline::new()
    }
}

impl Outline {
    pub fn new() -> Self {
        Outline {
            nodes: vec![Node {
                label: String::new(),
                destination: None,
                open: true,
                parent: None,
                position: 0,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child to `parent`. Children are kept in insertion order.
    ///
    /// Returns `None` if `parent` is not a node of this outline.
    pub fn add(
        &mut self,
        parent: NodeId,
        label: impl Into<String>,
        destination: Option<ObjectId>,
    ) -> Option<NodeId> {
        let id = NodeId(self.nodes.len());
        let siblings = &mut self.nodes.get_mut(parent.0)?.children;
        let position = siblings.len();
        siblings.push(id);
        self.nodes.push(Node {
            label: label.into(),
            destination,
            open: true,
            parent: Some(parent),
            position,
            children: Vec::new(),
        });
        Some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Children of `id`, empty for a node that is not in this outline.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        let siblings = self.children(node.parent?);
        siblings.get(node.position + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        let siblings = self.children(node.parent?);
        siblings.get(node.position.checked_sub(1)?).copied()
    }

    /// Number of items below the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of descendants of every node that are visible when the document is opened,
    /// indexed by node.
    fn visible_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nodes.len()];
        // Children are always added after their parent
        for (index, node) in self.nodes.iter().enumerate().rev() {
            let count = node
                .children
                .iter()
                .map(|child| {
                    let shown = if self.nodes[child.0].open {
                        counts[child.0]
                    } else {
                        0
                    };
                    1 + shown
                })
                .sum();
            counts[index] = count;
        }
        counts
    }

    /// Write the outline dictionary and its items. Returns the id of the `/Outlines`
    /// dictionary for the catalog, or `None` if there are no items.
    pub fn write<S: ObjectSink>(&self, sink: &mut S) -> io::Result<Option<ObjectId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let ids = self
            .nodes
            .iter()
            .map(|_| sink.alloc_id())
            .collect::<Vec<_>>();
        let counts = self.visible_counts();

        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index);
            let mut dict = Dictionary::new();
            if index == 0 {
                dict.set("Type", Object::Name(b"Outlines".to_vec()));
            } else {
                dict.set("Title", text_string(&node.label));
            }
            if let Some(parent) = node.parent {
                dict.set("Parent", Object::Reference(ids[parent.0]));
            }
            if let Some(prev) = self.prev_sibling(id) {
                dict.set("Prev", Object::Reference(ids[prev.0]));
            }
            if let Some(next) = self.next_sibling(id) {
                dict.set("Next", Object::Reference(ids[next.0]));
            }
            if let (Some(first), Some(last)) = (node.children.first(), node.children.last()) {
                dict.set("First", Object::Reference(ids[first.0]));
                dict.set("Last", Object::Reference(ids[last.0]));
                let count = if node.open || index == 0 {
                    counts[index] as i64
                } else {
                    -(node.children.len() as i64)
                };
                dict.set("Count", Object::Integer(count));
            }
            if let Some(page) = node.destination {
                dict.set(
                    "Dest",
                    Object::Array(vec![
                        Object::Reference(page),
                        Object::Name(b"XYZ".to_vec()),
                        Object::Null,
                        Object::Null,
                        Object::Null,
                    ]),
                );
            }
            sink.write_object(ids[index], Object::Dictionary(dict))?;
        }
        Ok(Some(ids[0]))
    }
}

/// A PDF text string: PDFDocEncoding for ASCII, otherwise UTF-16BE with a byte order mark.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    use lopdf::Document;

    fn sample() -> (Outline, NodeId, NodeId, NodeId) {
        let mut outline = Outline::new();
        let root = outline.root();
        let first = outline.add(root, "Summary", Some((100, 0))).unwrap();
        let second = outline.add(root, "Details", None).unwrap();
        let child = outline.add(second, "Région", Some((101, 0))).unwrap();
        (outline, first, second, child)
    }

    fn item(doc: &Document, id: ObjectId) -> &Dictionary {
        doc.get_object(id).and_then(Object::as_dict).unwrap()
    }

    fn reference(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
        dict.get(key).and_then(Object::as_reference).ok()
    }

    fn count(dict: &Dictionary) -> i64 {
        dict.get(b"Count").and_then(Object::as_i64).unwrap()
    }

    #[test]
    fn test_links() {
        let (outline, first, second, child) = sample();
        assert_eq!(outline.len(), 3);
        assert_eq!(outline.children(outline.root()), &[first, second]);
        assert_eq!(outline.next_sibling(first), Some(second));
        assert_eq!(outline.prev_sibling(second), Some(first));
        assert_eq!(outline.prev_sibling(first), None);
        assert_eq!(outline.next_sibling(child), None);
        assert_eq!(outline.parent(child), Some(second));
        assert_eq!(outline.visible_counts()[0], 3);
    }

    #[test]
    fn test_foreign_ids() {
        let (mut outline, ..) = sample();
        let mut bigger = Outline::new();
        let mut last = bigger.root();
        for depth in 0..10 {
            last = bigger.add(last, format!("Level {}", depth), None).unwrap();
        }
        assert!(outline.node(last).is_none());
        assert!(outline.node_mut(last).is_none());
        assert!(outline.children(last).is_empty());
        assert_eq!(outline.parent(last), None);
        assert_eq!(outline.next_sibling(last), None);
        assert_eq!(outline.prev_sibling(last), None);
        assert_eq!(outline.add(last, "Stray", None), None);
        assert_eq!(outline.len(), 3);
    }

    #[test]
    fn test_many_siblings() {
        let mut outline = Outline::new();
        let root = outline.root();
        let items = (0..5000)
            .map(|page| outline.add(root, format!("Page {}", page), None).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(outline.next_sibling(items[2500]), Some(items[2501]));
        assert_eq!(outline.prev_sibling(items[2500]), Some(items[2499]));
        assert_eq!(outline.next_sibling(items[4999]), None);

        let mut doc = Document::with_version("1.7");
        let root_id = outline.write(&mut doc).unwrap().unwrap();
        assert_eq!(count(item(&doc, root_id)), 5000);
        assert_eq!(doc.objects.len(), 5001);
    }

    #[test]
    fn test_write() {
        let (mut outline, _, second, _) = sample();
        let mut doc = Document::with_version("1.7");
        let root = outline.write(&mut doc).unwrap().unwrap();
        assert_eq!(root, (1, 0));

        let outlines = item(&doc, root);
        assert_eq!(
            outlines.get(b"Type").and_then(Object::as_name).unwrap(),
            b"Outlines"
        );
        assert_eq!(reference(outlines, b"First"), Some((2, 0)));
        assert_eq!(reference(outlines, b"Last"), Some((3, 0)));
        assert_eq!(count(outlines), 3);

        let summary = item(&doc, (2, 0));
        assert_eq!(
            summary.get(b"Title").and_then(Object::as_str).unwrap(),
            b"Summary"
        );
        assert_eq!(reference(summary, b"Parent"), Some((1, 0)));
        assert_eq!(reference(summary, b"Next"), Some((3, 0)));
        assert_eq!(reference(summary, b"Prev"), None);
        let dest = summary.get(b"Dest").and_then(Object::as_array).unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), (100, 0));
        assert_eq!(dest[1].as_name().unwrap(), b"XYZ");
        assert_eq!(dest.len(), 5);

        let details = item(&doc, (3, 0));
        assert_eq!(reference(details, b"Prev"), Some((2, 0)));
        assert_eq!(reference(details, b"First"), Some((4, 0)));
        assert_eq!(reference(details, b"Last"), Some((4, 0)));
        assert_eq!(count(details), 1);
        assert!(details.get(b"Dest").is_err());

        let region = item(&doc, (4, 0));
        assert_eq!(
            region.get(b"Title").and_then(Object::as_str).unwrap(),
            &[0xFE, 0xFF, 0, b'R', 0, 0xE9, 0, b'g', 0, b'i', 0, b'o', 0, b'n'][..]
        );

        outline.node_mut(second).unwrap().open = false;
        let mut doc = Document::with_version("1.7");
        let root = outline.write(&mut doc).unwrap().unwrap();
        assert_eq!(count(item(&doc, root)), 2);
        assert_eq!(count(item(&doc, (3, 0))), -1);
    }

    #[test]
    fn test_empty_outline() {
        let mut doc = Document::with_version("1.7");
        assert_eq!(Outline::new().write(&mut doc).unwrap(), None);
        assert!(doc.objects.is_empty());
    }
}
