use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, CorpusResult};

/// One annotated transcript region, fragments already merged
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSpan {
    /// Annotation-tool identifier of the tagged segment
    pub segment_id: String,
    /// Resolved label name
    pub label: String,
    pub start: usize,
    pub end: usize,
}

/// Label type id -> human readable name, with base-type names folded in
#[derive(Debug, Clone, Default)]
pub struct LabelTaxonomy {
    names: HashMap<String, String>,
    /// Declaration order, for display
    order: Vec<String>,
}

impl LabelTaxonomy {
    /// Declare a label type. A type with a base is named `<base name>_<own name>`,
    /// and the base must already be declared.
    pub fn declare(
        &mut self,
        label_type: &str,
        descriptor: &str,
        base_type: Option<&str>,
    ) -> CorpusResult<()> {
        let name = match base_type {
            Some(base) => {
                let base_name =
                    self.names
                        .get(base)
                        .ok_or_else(|| CorpusError::TaxonomyOrder {
                            label_type: label_type.to_string(),
                            base_type: base.to_string(),
                        })?;
                format!("{}_{}", base_name, descriptor)
            }
            None => descriptor.to_string(),
        };

        if self.names.insert(label_type.to_string(), name).is_none() {
            self.order.push(label_type.to_string());
        }
        Ok(())
    }

    /// Resolved name of a label type
    pub fn resolve(&self, label_type: &str) -> Option<&str> {
        self.names.get(label_type).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `(type id, resolved name)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|t| self.names.get(t).map(|n| (t.as_str(), n.as_str())))
    }
}

/// Everything extracted from one annotation export
#[derive(Debug, Clone)]
pub struct AnnotationSet {
    pub taxonomy: LabelTaxonomy,
    /// Segment id -> label type id, in document order
    pub segment_labels: Vec<(String, String)>,
    /// Segment id -> merged (start, end)
    pub segment_offsets: HashMap<String, (usize, usize)>,
    /// Pointer spans that no label refers to
    pub untagged_spans: Vec<(usize, usize)>,
}

impl AnnotationSet {
    /// Join labels, taxonomy and offsets into label spans, in document order
    pub fn label_spans(&self) -> CorpusResult<Vec<LabelSpan>> {
        self.segment_labels
            .iter()
            .map(|(segment_id, label_type)| {
                let label = self.taxonomy.resolve(label_type).ok_or_else(|| {
                    CorpusError::MalformedAnnotation(format!(
                        "segment {} uses undeclared label type {}",
                        segment_id, label_type
                    ))
                })?;
                let (start, end) = self.segment_offsets.get(segment_id).ok_or_else(|| {
                    CorpusError::MalformedAnnotation(format!(
                        "segment {} has no offsets",
                        segment_id
                    ))
                })?;
                Ok(LabelSpan {
                    segment_id: segment_id.clone(),
                    label: label.to_string(),
                    start: *start,
                    end: *end,
                })
            })
            .collect()
    }
}
