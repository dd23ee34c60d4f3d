//! In-memory model of an annotation document.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use xmltree::{Element, EmitterConfig, XMLNode};

use super::DocumentError;
use crate::geometry::{BBox, MAX_COORDINATE};

/// Name of the box node inside every symbol.
pub const BBOX_TAG: &str = "bbox";

/// Name of the provenance container under the root.
pub const PROVENANCE_TAG: &str = "deterioration";

/// One annotated symbol.
///
/// The symbol's own element (name, attributes, other children) is opaque
/// metadata and is written back unchanged; only the box is modelled.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    node: usize,
    kind: String,
    bbox: BBox,
    /// Box as parsed; an unchanged box keeps its source attribute text.
    parsed: BBox,
}

impl Symbol {
    /// Element name of the symbol node.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }
}

/// A record of one applied distortion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEntry {
    pub tag: String,
    pub parameters: Vec<(String, String)>,
}

impl ProvenanceEntry {
    pub fn new(tag: impl Into<String>, parameters: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.into(),
            parameters,
        }
    }

    /// Look up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new(&self.tag);
        for (key, value) in &self.parameters {
            element.attributes.insert(key.clone(), value.clone());
        }
        element
    }

    fn from_element(element: &Element) -> Self {
        Self {
            tag: element.name.clone(),
            parameters: element
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// A parsed annotation document.
///
/// Symbols keep source order. Provenance is kept newest first.
#[derive(Debug, Clone)]
pub struct AnnotationDocument {
    root: Element,
    symbols: Vec<Symbol>,
    provenance: Vec<ProvenanceEntry>,
    provenance_node: Option<usize>,
}

impl AnnotationDocument {
    /// Load a document from disk.
    ///
    /// # Errors
    ///
    /// `DocumentError::NotFound` if the path does not exist,
    /// `DocumentError::Parse` if the XML is malformed or a `bbox` is invalid.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| DocumentError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a document from an XML string.
    pub fn parse_str(xml: &str) -> Result<Self, DocumentError> {
        Self::from_reader(xml.as_bytes())
    }

    /// Parse a document from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DocumentError> {
        let root = Element::parse(reader).map_err(|e| DocumentError::Parse(e.to_string()))?;

        let mut symbols = Vec::new();
        let mut provenance = Vec::new();
        let mut provenance_node = None;

        for (index, node) in root.children.iter().enumerate() {
            let Some(element) = node.as_element() else {
                continue;
            };

            if element.name == PROVENANCE_TAG {
                if provenance_node.is_some() {
                    return Err(DocumentError::Parse(format!(
                        "more than one <{PROVENANCE_TAG}> node"
                    )));
                }
                provenance_node = Some(index);
                provenance.extend(
                    element
                        .children
                        .iter()
                        .filter_map(XMLNode::as_element)
                        .map(ProvenanceEntry::from_element),
                );
                continue;
            }

            let mut boxes = element
                .children
                .iter()
                .filter_map(XMLNode::as_element)
                .filter(|child| child.name == BBOX_TAG);
            let Some(bbox_element) = boxes.next() else {
                continue;
            };
            if boxes.next().is_some() {
                return Err(DocumentError::Parse(format!(
                    "symbol <{}> at position {index} has more than one <{BBOX_TAG}>",
                    element.name
                )));
            }

            let bbox = parse_bbox(bbox_element)?;
            symbols.push(Symbol {
                node: index,
                kind: element.name.clone(),
                bbox,
                parsed: bbox,
            });
        }

        Ok(Self {
            root,
            symbols,
            provenance,
            provenance_node,
        })
    }

    /// Name of the root element.
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Boxes of all symbols, in document order.
    pub fn boxes(&self) -> Vec<BBox> {
        self.symbols.iter().map(|s| s.bbox).collect()
    }

    /// Provenance entries, newest first.
    pub fn provenance(&self) -> &[ProvenanceEntry] {
        &self.provenance
    }

    /// Read an attribute of a symbol's own element.
    pub fn symbol_attribute(&self, symbol: &Symbol, name: &str) -> Option<&str> {
        self.root
            .children
            .get(symbol.node)
            .and_then(XMLNode::as_element)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    /// Replace every box with `f(box)`, in document order.
    pub fn for_each_symbol<F>(&mut self, mut f: F)
    where
        F: FnMut(BBox) -> BBox,
    {
        for symbol in &mut self.symbols {
            symbol.bbox = f(symbol.bbox);
        }
    }

    /// Replace every box with `f(box)`, or leave all boxes untouched if any call fails.
    pub fn try_for_each_symbol<F, E>(&mut self, f: F) -> Result<(), E>
    where
        F: FnMut(BBox) -> Result<BBox, E>,
    {
        let updated = self
            .symbols
            .iter()
            .map(|s| s.bbox)
            .map(f)
            .collect::<Result<Vec<_>, E>>()?;
        for (symbol, bbox) in self.symbols.iter_mut().zip(updated) {
            symbol.bbox = bbox;
        }
        Ok(())
    }

    /// Record an applied distortion as the newest provenance entry.
    pub fn append_provenance(&mut self, tag: &str, parameters: Vec<(String, String)>) {
        self.provenance.insert(0, ProvenanceEntry::new(tag, parameters));
    }

    /// Serialise the full tree into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), DocumentError> {
        let tree = self.to_tree();
        tree.write_with_config(writer, EmitterConfig::new().perform_indent(true))
            .map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Serialise the full tree to a string.
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| DocumentError::Serialize(e.to_string()))
    }

    /// Write the document to `path`, replacing any existing file.
    ///
    /// The tree is written to a temporary file in the same directory and
    /// renamed over `path`, so a crash never leaves a truncated document.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let io_error = |message: String| DocumentError::Io {
            path: path.to_path_buf(),
            message,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".scorenoise-")
            .suffix(".xml")
            .tempfile_in(dir)
            .map_err(|e| io_error(e.to_string()))?;

        self.write_to(tmp.as_file_mut())?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| io_error(e.to_string()))?;
        tmp.persist(path).map_err(|e| io_error(e.error.to_string()))?;
        Ok(())
    }

    fn to_tree(&self) -> Element {
        let mut root = self.root.clone();

        for symbol in self.symbols.iter().filter(|s| s.bbox != s.parsed) {
            let bbox_element = root
                .children
                .get_mut(symbol.node)
                .and_then(XMLNode::as_mut_element)
                .and_then(|e| e.get_mut_child(BBOX_TAG));
            if let Some(element) = bbox_element {
                write_bbox(element, symbol.bbox);
            }
        }

        if self.provenance_node.is_none() && self.provenance.is_empty() {
            return root;
        }

        let mut container = Element::new(PROVENANCE_TAG);
        container.children = self
            .provenance
            .iter()
            .map(|entry| XMLNode::Element(entry.to_element()))
            .collect();

        match self.provenance_node {
            Some(index) => root.children[index] = XMLNode::Element(container),
            None => root.children.push(XMLNode::Element(container)),
        }
        root
    }
}

fn parse_bbox(element: &Element) -> Result<BBox, DocumentError> {
    let field = |name: &str| -> Result<i64, DocumentError> {
        let raw = element.attributes.get(name).ok_or_else(|| {
            DocumentError::Parse(format!("<{BBOX_TAG}> is missing attribute '{name}'"))
        })?;
        raw.trim().parse::<i64>().map_err(|_| {
            DocumentError::Parse(format!(
                "<{BBOX_TAG}> attribute '{name}' is not an integer: {raw:?}"
            ))
        })
    };

    let (x, y, w, h) = (field("x")?, field("y")?, field("w")?, field("h")?);
    if w < 0 || h < 0 {
        return Err(DocumentError::Parse(format!(
            "<{BBOX_TAG}> has negative size {w}x{h}"
        )));
    }
    BBox::new(x, y, w, h).ok_or_else(|| {
        DocumentError::Parse(format!(
            "<{BBOX_TAG}> ({x}, {y}, {w}, {h}) exceeds the coordinate range ±{MAX_COORDINATE}"
        ))
    })
}

fn write_bbox(element: &mut Element, bbox: BBox) {
    element.attributes.insert("x".to_string(), bbox.x().to_string());
    element.attributes.insert("y".to_string(), bbox.y().to_string());
    element.attributes.insert("w".to_string(), bbox.width().to_string());
    element.attributes.insert("h".to_string(), bbox.height().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore>
  <Symbol shape="noteheadBlack">
    <bbox x="40" y="40" w="20" h="20"/>
  </Symbol>
  <Symbol shape="gClef">
    <bbox x="0" y="0" w="10" h="10"/>
  </Symbol>
  <page number="1"/>
</museScore>
"#;

    fn bbox(x: i64, y: i64, w: i64, h: i64) -> BBox {
        BBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_parse_symbols_in_order() {
        let doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        assert_eq!(doc.root_name(), "museScore");
        assert_eq!(doc.boxes(), vec![bbox(40, 40, 20, 20), bbox(0, 0, 10, 10)]);
        assert_eq!(doc.symbols()[0].kind(), "Symbol");
        assert_eq!(
            doc.symbol_attribute(&doc.symbols()[1], "shape"),
            Some("gClef")
        );
        assert!(doc.provenance().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let err = AnnotationDocument::parse_str("<museScore><Symbol>").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_non_integer_bbox_is_parse_error() {
        let xml = r#"<root><s><bbox x="1.5" y="0" w="1" h="1"/></s></root>"#;
        let err = AnnotationDocument::parse_str(xml).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_missing_bbox_attribute_is_parse_error() {
        let xml = r#"<root><s><bbox x="1" y="0" w="1"/></s></root>"#;
        assert!(matches!(
            AnnotationDocument::parse_str(xml),
            Err(DocumentError::Parse(_))
        ));
    }

    #[test]
    fn test_negative_size_is_parse_error() {
        let xml = r#"<root><s><bbox x="1" y="0" w="-1" h="1"/></s></root>"#;
        assert!(AnnotationDocument::parse_str(xml).is_err());
    }

    #[test]
    fn test_out_of_range_bbox_is_parse_error() {
        let xml = r#"<root><s><bbox x="9223372036854775807" y="0" w="1" h="1"/></s></root>"#;
        assert!(matches!(
            AnnotationDocument::parse_str(xml),
            Err(DocumentError::Parse(_))
        ));
        let xml = r#"<root><s><bbox x="0" y="-3000000000" w="1" h="1"/></s></root>"#;
        assert!(AnnotationDocument::parse_str(xml).is_err());
    }

    #[test]
    fn test_unchanged_boxes_keep_source_text() {
        let xml = r#"<root><a><bbox x="040" y="+4" w="3" h="4"/></a><b><bbox x="07" y="0" w="1" h="1"/></b></root>"#;
        let mut doc = AnnotationDocument::parse_str(xml).unwrap();
        assert_eq!(doc.boxes()[0], bbox(40, 4, 3, 4));

        doc.try_for_each_symbol(|b| -> Result<BBox, ()> {
            if b.x() == 7 {
                Ok(bbox(8, 0, 1, 1))
            } else {
                Ok(b)
            }
        })
        .unwrap();
        let out = doc.to_xml_string().unwrap();
        assert!(out.contains(r#"x="040""#), "{out}");
        assert!(out.contains(r#"y="+4""#), "{out}");
        assert!(out.contains(r#"x="8""#), "{out}");
        assert!(!out.contains(r#"x="07""#), "{out}");
    }

    #[test]
    fn test_two_boxes_in_one_symbol_is_parse_error() {
        let xml = r#"<root><s><bbox x="1" y="0" w="1" h="1"/><bbox x="1" y="0" w="1" h="1"/></s></root>"#;
        assert!(AnnotationDocument::parse_str(xml).is_err());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = AnnotationDocument::load(Path::new("/nonexistent/annotations.xml")).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[test]
    fn test_for_each_symbol_preserves_order() {
        let mut doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        let mut seen = Vec::new();
        doc.for_each_symbol(|b| {
            seen.push(b);
            bbox(b.x() + 1, b.y(), b.width(), b.height())
        });
        assert_eq!(seen, vec![bbox(40, 40, 20, 20), bbox(0, 0, 10, 10)]);
        assert_eq!(doc.boxes(), vec![bbox(41, 40, 20, 20), bbox(1, 0, 10, 10)]);
    }

    #[test]
    fn test_try_for_each_symbol_is_all_or_nothing() {
        let mut doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        let result: Result<(), &str> = doc.try_for_each_symbol(|b| {
            if b.x() == 0 {
                Err("boom")
            } else {
                Ok(bbox(0, 0, 1, 1))
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(doc.boxes(), vec![bbox(40, 40, 20, 20), bbox(0, 0, 10, 10)]);
    }

    #[test]
    fn test_provenance_is_newest_first() {
        let mut doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        doc.append_provenance("rotation", vec![("angle".to_string(), "2".to_string())]);
        doc.append_provenance("speckleNoise", vec![("amount".to_string(), "0.01".to_string())]);

        let tags: Vec<&str> = doc.provenance().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["speckleNoise", "rotation"]);
        assert_eq!(doc.provenance()[1].parameter("angle"), Some("2"));
    }

    #[test]
    fn test_round_trip_keeps_metadata_and_provenance() {
        let mut doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        doc.for_each_symbol(|b| bbox(b.x(), b.y(), b.width() + 5, b.height()));
        doc.append_provenance(
            "saltAndPepperNoise",
            vec![
                ("saltVsPepperRatio".to_string(), "0.5".to_string()),
                ("amount".to_string(), "0.01".to_string()),
            ],
        );

        let xml = doc.to_xml_string().unwrap();
        let reloaded = AnnotationDocument::parse_str(&xml).unwrap();

        assert_eq!(reloaded.boxes(), vec![bbox(40, 40, 25, 20), bbox(0, 0, 15, 10)]);
        assert_eq!(
            reloaded.symbol_attribute(&reloaded.symbols()[0], "shape"),
            Some("noteheadBlack")
        );
        assert_eq!(reloaded.provenance(), doc.provenance());
        assert!(xml.contains("<page number=\"1\""));
    }

    #[test]
    fn test_existing_provenance_is_extended_in_place() {
        let xml = r#"<root>
  <deterioration><gaussianNoise mean="0" standardDeviation="3"/></deterioration>
  <s><bbox x="1" y="2" w="3" h="4"/></s>
</root>"#;
        let mut doc = AnnotationDocument::parse_str(xml).unwrap();
        assert_eq!(doc.provenance().len(), 1);

        doc.append_provenance("rotation", vec![("angle".to_string(), "1".to_string())]);
        let out = doc.to_xml_string().unwrap();
        let reloaded = AnnotationDocument::parse_str(&out).unwrap();

        let tags: Vec<&str> = reloaded.provenance().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["rotation", "gaussianNoise"]);
        // The container stays ahead of the symbol it preceded.
        assert!(out.find("<deterioration").unwrap() < out.find("<s>").unwrap());
    }

    #[test]
    fn test_save_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.xml");
        std::fs::write(&path, "stale").unwrap();

        let mut doc = AnnotationDocument::parse_str(SOURCE).unwrap();
        doc.append_provenance("opening", vec![("size".to_string(), "3".to_string())]);
        doc.save(&path).unwrap();

        let reloaded = AnnotationDocument::load(&path).unwrap();
        assert_eq!(reloaded.boxes(), doc.boxes());
        assert_eq!(reloaded.provenance()[0].tag, "opening");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
