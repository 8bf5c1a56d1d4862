use std::collections::{HashMap, HashSet};

use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use crate::error::{CorpusError, CorpusResult};
use crate::heuristics::extract_offsets;
use crate::models::{AnnotationSet, LabelTaxonomy};

/// Execute Stage 1: extract labels and their offsets from a CATMA TEI export
///
/// Returns `Ok(None)` when the export tags nothing; such a protocol is valid
/// but has nothing to contribute.
pub fn execute_stage1(xml: &str) -> CorpusResult<Option<AnnotationSet>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)?;

    let text = single_element(&doc, "text")?;
    let encoding_desc = single_element(&doc, "encodingDesc")?;

    let segment_labels = build_segment_labels(text)?;
    if segment_labels.is_empty() {
        return Ok(None);
    }

    let taxonomy = build_taxonomy(encoding_desc)?;
    let segment_offsets = build_segment_offsets(text)?;
    check_segment_ids(&segment_labels, &segment_offsets)?;
    let untagged_spans = build_untagged_spans(text, &segment_labels)?;

    debug!(
        "Stage 1: {} label types, {} tagged segments, {} untagged spans",
        taxonomy.len(),
        segment_labels.len(),
        untagged_spans.len()
    );

    Ok(Some(AnnotationSet {
        taxonomy,
        segment_labels,
        segment_offsets,
        untagged_spans,
    }))
}

/// The only element with the given local name
fn single_element<'a, 'input>(
    doc: &'a Document<'input>,
    name: &str,
) -> CorpusResult<Node<'a, 'input>> {
    let mut found = doc.descendants().filter(|n| is_element(n, name));
    match (found.next(), found.next()) {
        (Some(node), None) => Ok(node),
        (None, _) => Err(CorpusError::MalformedAnnotation(format!(
            "expected one <{}> element, found none",
            name
        ))),
        (Some(_), Some(_)) => Err(CorpusError::MalformedAnnotation(format!(
            "expected one <{}> element, found {}",
            name,
            2 + found.count()
        ))),
    }
}

fn is_element(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn required_attr<'a>(node: &Node<'a, '_>, attr: &str) -> CorpusResult<&'a str> {
    node.attribute(attr).ok_or_else(|| {
        CorpusError::MalformedAnnotation(format!(
            "<{}> without {} attribute",
            node.tag_name().name(),
            attr
        ))
    })
}

/// Segment ids referenced by a `<seg ana="#a #b">` element
fn ana_ids<'a>(node: &Node<'a, '_>) -> impl Iterator<Item = &'a str> {
    node.attribute("ana")
        .unwrap_or("")
        .split_whitespace()
        .map(|id| id.trim_start_matches('#'))
}

/// `<fsDecl type=.. baseTypes=..><fsDescr>NAME</fsDescr></fsDecl>` in document order
fn build_taxonomy(encoding_desc: Node) -> CorpusResult<LabelTaxonomy> {
    let mut taxonomy = LabelTaxonomy::default();

    for decl in encoding_desc
        .descendants()
        .filter(|n| is_element(n, "fsDecl"))
    {
        let label_type = required_attr(&decl, "type")?;
        let descriptor: String = decl
            .children()
            .find(|n| is_element(n, "fsDescr"))
            .map(|d| {
                d.descendants()
                    .filter(|t| t.is_text())
                    .filter_map(|t| t.text())
                    .collect()
            })
            .unwrap_or_default();
        let base_type = decl.attribute("baseTypes").filter(|b| !b.is_empty());

        taxonomy.declare(label_type, &descriptor, base_type)?;
    }

    Ok(taxonomy)
}

/// `<fs xml:id=SEGMENT type=LABEL>` inside the text container
fn build_segment_labels(text: Node) -> CorpusResult<Vec<(String, String)>> {
    let mut seen = HashSet::new();
    let mut labels = Vec::new();

    for fs in text.descendants().filter(|n| is_element(n, "fs")) {
        let segment_id = fs
            .attribute((roxmltree::NS_XML_URI, "id"))
            .ok_or_else(|| CorpusError::MalformedAnnotation("<fs> without xml:id".to_string()))?;
        let label_type = required_attr(&fs, "type")?;

        if !seen.insert(segment_id) {
            return Err(CorpusError::MalformedAnnotation(format!(
                "segment id {} is tagged more than once",
                segment_id
            )));
        }
        labels.push((segment_id.to_string(), label_type.to_string()));
    }

    Ok(labels)
}

/// Pointer offsets of every `<seg ana=..>`, fragments merged per segment id.
/// A fragment must start exactly where the previous one of the same id ended.
fn build_segment_offsets(text: Node) -> CorpusResult<HashMap<String, (usize, usize)>> {
    let mut offsets: HashMap<String, (usize, usize)> = HashMap::new();

    for seg in text
        .descendants()
        .filter(|n| is_element(n, "seg") && n.has_attribute("ana"))
    {
        let ptr = seg
            .descendants()
            .find(|n| is_element(n, "ptr"))
            .ok_or_else(|| CorpusError::MalformedAnnotation("<seg> without <ptr>".to_string()))?;
        let (start, end) = extract_offsets(required_attr(&ptr, "target")?)?;

        for segment_id in ana_ids(&seg) {
            match offsets.get_mut(segment_id) {
                Some(span) if span.1 == start => {
                    *span = (span.0.min(start), span.1.max(end));
                }
                Some(span) => {
                    return Err(CorpusError::MalformedAnnotation(format!(
                        "segment {} has non-contiguous fragments ({}, {}) and ({}, {})",
                        segment_id, span.0, span.1, start, end
                    )));
                }
                None => {
                    offsets.insert(segment_id.to_string(), (start, end));
                }
            }
        }
    }

    Ok(offsets)
}

/// Both mappings must describe exactly the same segments
fn check_segment_ids(
    segment_labels: &[(String, String)],
    segment_offsets: &HashMap<String, (usize, usize)>,
) -> CorpusResult<()> {
    let labeled: HashSet<&str> = segment_labels.iter().map(|(id, _)| id.as_str()).collect();
    let with_offsets: HashSet<&str> = segment_offsets.keys().map(String::as_str).collect();

    if labeled == with_offsets {
        return Ok(());
    }

    let mut only_labeled: Vec<String> = labeled
        .difference(&with_offsets)
        .map(|s| s.to_string())
        .collect();
    let mut only_offsets: Vec<String> = with_offsets
        .difference(&labeled)
        .map(|s| s.to_string())
        .collect();
    only_labeled.sort();
    only_offsets.sort();

    Err(CorpusError::Consistency {
        only_labeled,
        only_offsets,
    })
}

/// Pointers whose parent is not a segment carrying any known label
fn build_untagged_spans(
    text: Node,
    segment_labels: &[(String, String)],
) -> CorpusResult<Vec<(usize, usize)>> {
    let labeled: HashSet<&str> = segment_labels.iter().map(|(id, _)| id.as_str()).collect();

    text.descendants()
        .filter(|n| is_element(n, "ptr"))
        .filter(|ptr| {
            !ptr.parent_element().is_some_and(|parent| {
                is_element(&parent, "seg") && ana_ids(&parent).any(|id| labeled.contains(id))
            })
        })
        .map(|ptr| extract_offsets(required_attr(&ptr, "target")?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tei(decls: &str, body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <encodingDesc>
      <fsdDecl>{}</fsdDecl>
    </encodingDesc>
  </teiHeader>
  <text>
    <body>
      <ab type="catma">{}</ab>
    </body>
  </text>
</TEI>"#,
            decls, body
        )
    }

    const DECLS: &str = r#"
        <fsDecl type="T_ARG"><fsDescr>Argument</fsDescr></fsDecl>
        <fsDecl type="T_LEGAL" baseTypes="T_ARG"><fsDescr>Legal</fsDescr></fsDecl>"#;

    #[test]
    fn test_extract_labels_and_offsets() {
        let xml = tei(
            DECLS,
            r##"
            <ptr target="catma://D#char=0,5" type="inclusion"/>
            <seg ana="#seg1"><ptr target="catma://D#char=5,10" type="inclusion"/></seg>
            <seg ana="#seg1 #seg2"><ptr target="catma://D#char=10,15" type="inclusion"/></seg>
            <fs xml:id="seg1" type="T_ARG"/>
            <fs xml:id="seg2" type="T_LEGAL"/>"##,
        );

        let set = execute_stage1(&xml).unwrap().unwrap();

        assert_eq!(set.segment_offsets["seg1"], (5, 15));
        assert_eq!(set.segment_offsets["seg2"], (10, 15));
        assert_eq!(set.untagged_spans, vec![(0, 5)]);

        let spans = set.label_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].label, "Argument");
        assert_eq!((spans[0].start, spans[0].end), (5, 15));
        assert_eq!(spans[1].label, "Argument_Legal");
    }

    #[test]
    fn test_fragment_gap_is_fatal() {
        let xml = tei(
            DECLS,
            r##"
            <seg ana="#seg1"><ptr target="catma://D#char=5,10"/></seg>
            <seg ana="#seg1"><ptr target="catma://D#char=12,15"/></seg>
            <fs xml:id="seg1" type="T_ARG"/>"##,
        );

        assert!(matches!(
            execute_stage1(&xml),
            Err(CorpusError::MalformedAnnotation(_))
        ));
    }

    #[test]
    fn test_duplicate_segment_id_is_fatal() {
        let xml = tei(
            DECLS,
            r##"
            <seg ana="#seg1"><ptr target="catma://D#char=5,10"/></seg>
            <fs xml:id="seg1" type="T_ARG"/>
            <fs xml:id="seg1" type="T_LEGAL"/>"##,
        );

        assert!(matches!(
            execute_stage1(&xml),
            Err(CorpusError::MalformedAnnotation(_))
        ));
    }

    #[test]
    fn test_segment_id_mismatch() {
        let xml = tei(
            DECLS,
            r##"
            <seg ana="#seg1"><ptr target="catma://D#char=5,10"/></seg>
            <seg ana="#seg9"><ptr target="catma://D#char=10,12"/></seg>
            <fs xml:id="seg1" type="T_ARG"/>
            <fs xml:id="seg2" type="T_ARG"/>"##,
        );

        match execute_stage1(&xml) {
            Err(CorpusError::Consistency {
                only_labeled,
                only_offsets,
            }) => {
                assert_eq!(only_labeled, vec!["seg2"]);
                assert_eq!(only_offsets, vec!["seg9"]);
            }
            other => panic!("expected consistency error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_annotation_file() {
        let xml = tei(DECLS, r#"<ptr target="catma://D#char=0,100"/>"#);

        assert!(execute_stage1(&xml).unwrap().is_none());
    }

    #[test]
    fn test_base_type_declared_after_child() {
        let decls = r#"
            <fsDecl type="T_LEGAL" baseTypes="T_ARG"><fsDescr>Legal</fsDescr></fsDecl>
            <fsDecl type="T_ARG"><fsDescr>Argument</fsDescr></fsDecl>"#;
        let xml = tei(
            decls,
            r##"<seg ana="#seg1"><ptr target="catma://D#char=0,4"/></seg>
            <fs xml:id="seg1" type="T_LEGAL"/>"##,
        );

        assert!(matches!(
            execute_stage1(&xml),
            Err(CorpusError::TaxonomyOrder { .. })
        ));
    }

    #[test]
    fn test_two_text_containers() {
        let xml = r#"<TEI><teiHeader><encodingDesc/></teiHeader><text/><text/></TEI>"#;

        assert!(matches!(
            execute_stage1(xml),
            Err(CorpusError::MalformedAnnotation(_))
        ));
    }

    #[test]
    fn test_missing_encoding_desc() {
        let xml = r#"<TEI><text><fs type="A"/></text></TEI>"#;

        assert!(matches!(
            execute_stage1(xml),
            Err(CorpusError::MalformedAnnotation(_))
        ));
    }

    #[test]
    fn test_pointer_without_offsets() {
        let xml = tei(
            DECLS,
            r##"<seg ana="#seg1"><ptr target="catma://D#line=3"/></seg>
            <fs xml:id="seg1" type="T_ARG"/>"##,
        );

        assert!(matches!(
            execute_stage1(&xml),
            Err(CorpusError::MalformedPointer(_))
        ));
    }
}
