//! Builds a [`PageModel`] from HTML markup via `scraper`.
//!
//! Layout is not recomputed: geometry comes from inline `style` declarations
//! (`left`/`top`/`width`/`height` in px). The custom property
//! `--scroll-height` declares modeled overflow content for scroll heuristics.

use super::geometry::{Rect, Style};
use super::{ElementData, NodeId, PageModel, Scope, TextRun};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::OnceLock;

pub fn parse_page(url: &str, html: &str) -> PageModel {
    let document = Html::parse_document(html);
    let mut page = PageModel::empty(url);
    let root = document.root_element();
    let root_id = insert_subtree(&mut page, root, None, Scope::Document);
    page.set_document_element(root_id);

    let elements = page.all_elements();
    if let Some(body) = elements.iter().find(|n| page.tag(**n) == "body") {
        page.set_body(*body);
    }
    if let Some(title) = elements.iter().find(|n| page.tag(**n) == "title") {
        page.title = page.rendered_text(*title);
    }
    page
}

/// Graft a parsed fragment under `host` as its shadow tree.
pub fn attach_shadow(page: &mut PageModel, host: NodeId, fragment: &str) {
    let parsed = Html::parse_fragment(fragment);
    let root = parsed.root_element();
    let mut roots = Vec::new();
    for child in root.children() {
        if let Some(el) = ElementRef::wrap(child) {
            let id = insert_subtree(page, el, Some(host), Scope::Shadow(host));
            roots.push(id);
        }
    }
    page.node_mut(host).shadow_children = roots;
}

fn insert_subtree(
    page: &mut PageModel,
    el: ElementRef,
    parent: Option<NodeId>,
    scope: Scope,
) -> NodeId {
    let tag = el.value().name().to_lowercase();
    let mut attributes = HashMap::new();
    for (name, value) in el.value().attrs() {
        attributes.insert(name.to_lowercase(), value.to_string());
    }

    // Text runs remember which child slot they precede, so mixed content
    // like `a <b>b</b> c` keeps its order.
    let mut text_runs: Vec<TextRun> = Vec::new();
    let mut slot = 0;
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            text_runs.push(TextRun {
                slot,
                text: text.to_string(),
            });
        } else if ElementRef::wrap(child).is_some() {
            slot += 1;
        }
    }

    let (style, rect, scroll_height) = parse_style(attributes.get("style").map(|s| s.as_str()));

    let value = match tag.as_str() {
        "input" => attributes.get("value").cloned().unwrap_or_default(),
        "textarea" => text_runs
            .iter()
            .map(|r| r.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => String::new(),
    };

    let id = page.push_node(ElementData {
        tag,
        attributes,
        text_runs,
        value,
        rect,
        style,
        parent,
        children: Vec::new(),
        shadow_children: Vec::new(),
        scope,
        scroll_height,
        detached: false,
    });

    let mut children = Vec::new();
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            children.push(insert_subtree(page, child_el, Some(id), scope));
        }
    }
    page.node_mut(id).children = children;
    id
}

fn px_pattern() -> &'static Regex {
    static PX: OnceLock<Regex> = OnceLock::new();
    PX.get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)(?:px)?$").unwrap())
}

fn parse_px(value: &str) -> Option<f64> {
    px_pattern()
        .captures(value.trim())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_style(style: Option<&str>) -> (Style, Option<Rect>, Option<f64>) {
    let mut declarations: HashMap<String, String> = HashMap::new();
    if let Some(style) = style {
        for rule in style.split(';') {
            if let Some((name, value)) = rule.split_once(':') {
                declarations.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
        }
    }

    let style = Style {
        display_none: declarations.get("display").map(|v| v == "none").unwrap_or(false),
        visibility_hidden: declarations
            .get("visibility")
            .map(|v| v == "hidden")
            .unwrap_or(false),
        cursor: declarations.get("cursor").cloned(),
        overflow_y: declarations
            .get("overflow-y")
            .or_else(|| declarations.get("overflow"))
            .cloned(),
        z_index: declarations
            .get("z-index")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
    };

    let width = declarations.get("width").and_then(|v| parse_px(v));
    let height = declarations.get("height").and_then(|v| parse_px(v));
    let rect = match (width, height) {
        (Some(w), Some(h)) => Some(Rect::new(
            declarations.get("left").and_then(|v| parse_px(v)).unwrap_or(0.0),
            declarations.get("top").and_then(|v| parse_px(v)).unwrap_or(0.0),
            w,
            h,
        )),
        _ => None,
    };

    let scroll_height = declarations.get("--scroll-height").and_then(|v| parse_px(v));
    (style, rect, scroll_height)
}
