use std::collections::HashMap;
use std::fmt;

use crate::datetime::DicomDateTime;
use crate::tag::{Tag, tags};
use crate::transfer_syntax::TransferSyntax;
use crate::value::{Element, SequenceItem, Value};

/// The decoded elements of one DICOM stream, keyed by tag.
///
/// Lookups fall back to a depth-first search of nested sequences, since
/// enhanced multi-frame objects keep most geometry inside functional group
/// items.
#[derive(Debug, Clone, Default)]
pub struct DicomHeader {
    elements: HashMap<Tag, Element>,
    transfer_syntax: Option<TransferSyntax>,
}

impl DicomHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an element, replacing an earlier one with the same tag.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        self.elements.insert(element.tag, element)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.elements.remove(&tag)
    }

    /// Top-level element only.
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    /// Top-level element, otherwise the first match in nested sequences.
    pub fn find(&self, tag: Tag) -> Option<&Element> {
        self.get(tag).or_else(|| {
            self.sorted()
                .into_iter()
                .filter_map(|e| e.value.items())
                .flatten()
                .find_map(|item| item.find(tag))
        })
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Top-level elements in ascending tag order.
    pub fn sorted(&self) -> Vec<&Element> {
        let mut elements: Vec<_> = self.elements.values().collect();
        elements.sort_by_key(|e| e.tag);
        elements
    }

    pub fn transfer_syntax(&self) -> Option<&TransferSyntax> {
        self.transfer_syntax.as_ref()
    }

    pub fn set_transfer_syntax(&mut self, syntax: TransferSyntax) {
        self.transfer_syntax = Some(syntax);
    }

    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        self.find(tag)?.value.to_int()
    }

    /// Integer value of `tag`, or `default` when it is absent or unreadable.
    pub fn int_value_or(&self, tag: Tag, default: i64) -> i64 {
        match self.find(tag) {
            None => default,
            Some(element) => element.value.to_int().unwrap_or_else(|| {
                tracing::warn!(%tag, value = %element.value.to_text(), default, "unreadable integer, using default");
                default
            }),
        }
    }

    pub fn decimal_value(&self, tag: Tag) -> Option<f64> {
        self.find(tag)?.value.to_decimal()
    }

    /// Decimal value of `tag`, or `default` when it is absent or unreadable.
    pub fn decimal_value_or(&self, tag: Tag, default: f64) -> f64 {
        match self.find(tag) {
            None => default,
            Some(element) => element.value.to_decimal().unwrap_or_else(|| {
                tracing::warn!(%tag, value = %element.value.to_text(), default, "unreadable decimal, using default");
                default
            }),
        }
    }

    pub fn multi_int_value(&self, tag: Tag) -> Option<Vec<i64>> {
        self.find(tag)?.value.to_ints()
    }

    pub fn multi_decimal_value(&self, tag: Tag) -> Option<Vec<f64>> {
        self.find(tag)?.value.to_decimals()
    }

    /// All values of `tag` joined by the value separator.
    pub fn string_value(&self, tag: Tag) -> Option<String> {
        let element = self.find(tag)?;
        match &element.value {
            Value::Empty | Value::Sequence(_) => None,
            value => Some(value.to_text().into_owned()),
        }
    }

    pub fn multi_string_value(&self, tag: Tag) -> Option<Vec<String>> {
        self.find(tag)?.value.to_strings()
    }

    pub fn date_time(&self, tag: Tag) -> Option<DicomDateTime> {
        self.find(tag)?.value.to_date_time()
    }

    pub fn sequence(&self, tag: Tag) -> Option<&[SequenceItem]> {
        self.find(tag)?.value.items()
    }

    pub fn number_of_frames(&self) -> usize {
        self.int_value_or(tags::NUMBER_OF_FRAMES, 1).max(1) as usize
    }

    /// The view of this header seen by a single frame of a multi-frame
    /// object.
    ///
    /// Elements of the shared and then the per-frame functional groups of
    /// `frame` are lifted to the top level, so that geometry lookups find
    /// the frame's own values first.
    pub fn frame_header(&self, frame: usize) -> DicomHeader {
        let mut header = self.clone();
        if let Some(shared) = self.get(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE) {
            if let Some(item) = shared.value.items().and_then(|items| items.first()) {
                header.lift(item);
            }
        }
        if let Some(per_frame) = self.get(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE) {
            if let Some(item) = per_frame.value.items().and_then(|items| items.get(frame)) {
                header.lift(item);
            }
        }
        header
    }

    fn lift(&mut self, item: &SequenceItem) {
        for element in item.elements() {
            match element.value.items() {
                Some(items) => {
                    for nested in items {
                        self.lift(nested);
                    }
                }
                None => {
                    self.insert(element.clone());
                }
            }
        }
    }
}

impl fmt::Display for DicomHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(syntax) = &self.transfer_syntax {
            writeln!(f, "Transfer syntax: {syntax}")?;
        }
        for element in self.sorted() {
            writeln!(f, "{element}")?;
        }
        Ok(())
    }
}
