//! Converts an element into a bounded, JSON-serializable semantic descriptor
//! for the decision service, in place of raw DOM structure.

use crate::config::EnrichmentConfig;
use crate::page::{NodeId, PageModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const COMMON_ATTRIBUTES: [&str; 5] = ["id", "className", "title", "aria-label", "aria-labelledby"];

fn tag_attributes(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title", "rel", "target"],
        "label" => &["for"],
        "input" => &["type", "name", "placeholder", "checked", "maximumlength"],
        "textarea" => &["placeholder", "maximumlength"],
        "button" => &["type"],
        "select" => &["name", "multiple"],
        "div" => &["role"],
        "iframe" => &["src"],
        "img" => &["src", "alt"],
        _ => &[],
    }
}

/// Bounded description of a labeled hint. A sorted attribute map keeps the
/// serialized form stable for the decision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedHint {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// For a `<label for=...>`, the described control it points at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Box<EnrichedHint>>,
    #[serde(rename = "hintString", skip_serializing_if = "String::is_empty", default)]
    pub hint_string: String,
}

impl EnrichedHint {
    pub fn with_hint_string(mut self, label: &str) -> Self {
        self.hint_string = label.to_string();
        self
    }
}

pub fn describe(page: &PageModel, element: NodeId, config: &EnrichmentConfig) -> EnrichedHint {
    describe_depth(page, element, config, 0)
}

fn describe_depth(
    page: &PageModel,
    element: NodeId,
    config: &EnrichmentConfig,
    depth: usize,
) -> EnrichedHint {
    let tag = page.tag(element).to_string();
    let mut attributes = BTreeMap::new();
    add_attributes(page, element, &COMMON_ATTRIBUTES, config, &mut attributes);
    add_attributes(page, element, tag_attributes(&tag), config, &mut attributes);
    add_data_attributes(page, element, config, &mut attributes);

    // Nested targets are a single level deep; a label's target describing
    // another label stops here.
    let target = if tag == "label" && depth == 0 {
        page.attr(element, "for")
            .and_then(|for_attr| page.by_id(for_attr))
            .map(|control| Box::new(describe_depth(page, control, config, depth + 1)))
    } else {
        None
    };

    EnrichedHint {
        content: content_for(page, element, &tag, config),
        tag,
        attributes,
        target,
        hint_string: String::new(),
    }
}

fn content_for(
    page: &PageModel,
    element: NodeId,
    tag: &str,
    config: &EnrichmentConfig,
) -> Option<String> {
    let raw = match tag {
        "input" | "textarea" => Some(page.node(element).value.clone()),
        "div" | "iframe" | "img" | "body" => None,
        // a, button, select, label, and the fallback for everything else.
        _ => Some(page.rendered_text(element)),
    };
    raw.filter(|text| !text.is_empty())
        .map(|text| truncate(&text, config.max_content_length))
}

fn add_attributes(
    page: &PageModel,
    element: NodeId,
    names: &[&str],
    config: &EnrichmentConfig,
    out: &mut BTreeMap<String, String>,
) {
    for name in names {
        // The DOM property spelling "className" maps to the class attribute.
        let lookup = if *name == "className" { "class" } else { name };
        if let Some(value) = page.attr(element, lookup) {
            out.insert(name.to_string(), truncate(value, config.max_attribute_length));
        }
    }
}

fn add_data_attributes(
    page: &PageModel,
    element: NodeId,
    config: &EnrichmentConfig,
    out: &mut BTreeMap<String, String>,
) {
    let mut data_attrs: Vec<(&String, &String)> = page
        .node(element)
        .attributes
        .iter()
        .filter(|(name, _)| name.starts_with("data-"))
        .collect();
    data_attrs.sort_by_key(|(name, _)| name.as_str());
    for (i, (name, value)) in data_attrs.into_iter().enumerate() {
        out.insert(name.clone(), truncate(value, config.max_attribute_length));
        // One entry above the cap is tolerated; everything after is skipped.
        if i + 1 > config.max_data_attributes {
            break;
        }
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
