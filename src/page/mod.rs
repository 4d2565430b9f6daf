pub mod geometry;
pub mod html;

pub use geometry::{Rect, Style};

use crate::errors::{AgentError, Result};
use std::collections::HashMap;

/// Handle into the page's element arena. The arena owns every element; a
/// NodeId is only meaningful for the page it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Which tree an element belongs to for hit-testing purposes: the document
/// itself, or the shadow tree of a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Document,
    Shadow(NodeId),
}

/// Upper bound on ancestor walks, so adversarial parent chains cannot spin.
const MAX_ANCESTOR_WALK: usize = 1024;

/// A run of text owned directly by an element. `slot` is the index of the
/// child the run precedes (`children.len()` for trailing text), which keeps
/// text interleaved with inline children in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub slot: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    /// Text owned directly by this element (not descendants).
    pub text_runs: Vec<TextRun>,
    /// Live value for form controls, mutated by simulated typing.
    pub value: String,
    pub rect: Option<Rect>,
    pub style: Style,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Direct children of this element's shadow root, if it has one.
    pub shadow_children: Vec<NodeId>,
    pub scope: Scope,
    /// Modeled content height; layout is not recomputed, so overflow must be
    /// declared by whoever builds the page.
    pub scroll_height: Option<f64>,
    pub detached: bool,
}

/// A rendered hint marker. Markers live in an overlay layer above the page
/// rather than in the element arena, so removing them cannot disturb NodeIds.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOverlay {
    pub label: String,
    pub rect: Rect,
    pub z_index: i64,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Click,
    Focus,
    KeyDown { key: char },
    KeyUp { key: char },
    Change,
    /// Value mutation record, logged so tests can assert typing order.
    ValueAppended { ch: char },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEvent {
    pub target: NodeId,
    pub kind: EventKind,
    pub bubbles: bool,
    pub cancelable: bool,
}

/// In-memory model of one loaded page: element arena, viewport geometry,
/// hit-testing, the marker overlay and a synthetic-event log.
#[derive(Debug, Clone)]
pub struct PageModel {
    pub url: String,
    pub title: String,
    nodes: Vec<ElementData>,
    document_element: Option<NodeId>,
    body: Option<NodeId>,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    window_focused: bool,
    markers: Option<Vec<MarkerOverlay>>,
    events: Vec<PageEvent>,
    focused: Option<NodeId>,
    pending_navigation: Option<String>,
}

impl PageModel {
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            nodes: Vec::new(),
            document_element: None,
            body: None,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            window_focused: true,
            markers: None,
            events: Vec::new(),
            focused: None,
            pending_navigation: None,
        }
    }

    pub(crate) fn push_node(&mut self, data: ElementData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ElementData {
        &mut self.nodes[id.0]
    }

    pub fn node(&self, id: NodeId) -> &ElementData {
        &self.nodes[id.0]
    }

    pub(crate) fn set_document_element(&mut self, id: NodeId) {
        self.document_element = Some(id);
    }

    pub(crate) fn set_body(&mut self, id: NodeId) {
        self.body = Some(id);
    }

    pub fn body(&self) -> Option<NodeId> {
        self.body
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0].attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.nodes[id.0].attributes.contains_key(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn viewport(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn scroll_offset(&self) -> (f64, f64) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn set_scroll_offset(&mut self, x: f64, y: f64) {
        self.scroll_x = x;
        self.scroll_y = y;
    }

    pub fn window_focused(&self) -> bool {
        self.window_focused
    }

    pub fn set_window_focused(&mut self, focused: bool) {
        self.window_focused = focused;
    }

    pub fn set_scroll_height(&mut self, id: NodeId, height: f64) {
        self.nodes[id.0].scroll_height = Some(height);
    }

    /// Remove an element from its parent. Later event dispatch to it fails,
    /// which is how mid-typing DOM churn shows up.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        self.nodes[id.0].detached = true;
    }

    /// Every element in traversal order: document order, with each shadow
    /// subtree inlined immediately after its host.
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(root) = self.document_element else {
            return out;
        };
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.nodes[id.0].detached {
                continue;
            }
            out.push(id);
            let el = &self.nodes[id.0];
            for child in el.children.iter().rev() {
                stack.push(*child);
            }
            for child in el.shadow_children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// True when `a` is `b` or an ancestor of `b`. Parent links cross shadow
    /// boundaries (a shadow child's parent is its host).
    pub fn is_ancestor_or_self(&self, a: NodeId, b: NodeId) -> bool {
        let mut current = Some(b);
        let mut hops = 0;
        while let Some(id) = current {
            if id == a {
                return true;
            }
            hops += 1;
            if hops > MAX_ANCESTOR_WALK {
                return false;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    fn effectively_hidden(&self, id: NodeId) -> bool {
        if self.nodes[id.0].style.visibility_hidden {
            return true;
        }
        let mut current = Some(id);
        let mut hops = 0;
        while let Some(node) = current {
            if self.nodes[node.0].style.display_none {
                return true;
            }
            hops += 1;
            if hops > MAX_ANCESTOR_WALK {
                break;
            }
            current = self.nodes[node.0].parent;
        }
        false
    }

    /// Top-most element at (x, y), descending into shadow roots until an
    /// ordinary element is hit. Paint order is modeled as (z-index, document
    /// order) within one tree scope.
    pub fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let mut scope = Scope::Document;
        let mut visited: Vec<NodeId> = Vec::new();
        loop {
            let mut best: Option<usize> = None;
            for (i, el) in self.nodes.iter().enumerate() {
                if el.detached || el.scope != scope {
                    continue;
                }
                let Some(rect) = el.rect else {
                    continue;
                };
                if !rect.contains(x, y) || self.effectively_hidden(NodeId(i)) {
                    continue;
                }
                best = match best {
                    None => Some(i),
                    Some(b) => {
                        let incumbent = (self.nodes[b].style.z_index, b);
                        if (el.style.z_index, i) >= incumbent {
                            Some(i)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            let top = match (best, scope) {
                (Some(i), _) => NodeId(i),
                // A shadow tree with nothing at this point resolves to the host.
                (None, Scope::Shadow(host)) => return Some(host),
                (None, Scope::Document) => return None,
            };
            if visited.contains(&top) {
                return Some(top);
            }
            visited.push(top);
            if !self.nodes[top.0].shadow_children.is_empty() {
                scope = Scope::Shadow(top);
                continue;
            }
            return Some(top);
        }
    }

    /// The element's bounding rectangle clipped to the viewport, or None when
    /// it has no box, is hidden, or lies entirely off screen.
    pub fn visible_client_rect(&self, id: NodeId) -> Option<Rect> {
        let el = &self.nodes[id.0];
        if el.detached {
            return None;
        }
        let rect = el.rect?;
        if rect.width <= 0.0 || rect.height <= 0.0 || self.effectively_hidden(id) {
            return None;
        }
        let viewport = Rect::new(0.0, 0.0, self.viewport_width, self.viewport_height);
        rect.clip(&viewport)
    }

    /// Whether the element actually scrolls: declared overflow content plus a
    /// scroll-permitting overflow style (the root always may).
    pub fn is_scrollable(&self, id: NodeId) -> bool {
        let el = &self.nodes[id.0];
        let Some(rect) = el.rect else {
            return false;
        };
        let Some(scroll_height) = el.scroll_height else {
            return false;
        };
        if scroll_height <= rect.height {
            return false;
        }
        el.tag == "body"
            || matches!(el.style.overflow_y.as_deref(), Some("auto") | Some("scroll"))
    }

    /// Overflowed without necessarily being scrollable (clientHeight <
    /// scrollHeight).
    pub fn is_overflowed(&self, id: NodeId) -> bool {
        let el = &self.nodes[id.0];
        match (el.rect, el.scroll_height) {
            (Some(rect), Some(scroll)) => rect.height < scroll,
            _ => false,
        }
    }

    /// First element in the document with the given id attribute.
    pub fn by_id(&self, dom_id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(dom_id))
    }

    /// The `<area>` children of `<map name="...">`, for image maps.
    pub fn map_areas(&self, map_name: &str) -> Vec<NodeId> {
        let Some(map) = self
            .all_elements()
            .into_iter()
            .find(|n| self.tag(*n) == "map" && self.attr(*n, "name") == Some(map_name))
        else {
            return Vec::new();
        };
        let mut areas = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[map.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.tag(id) == "area" {
                areas.push(id);
            }
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        areas
    }

    /// The control a `<label>` refers to: its `for` target, or the first form
    /// control nested inside it.
    pub fn label_control(&self, label: NodeId) -> Option<NodeId> {
        if let Some(target) = self.attr(label, "for") {
            return self.by_id(target);
        }
        let mut stack: Vec<NodeId> = self.nodes[label.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if matches!(
                self.tag(id),
                "input" | "textarea" | "select" | "button" | "meter" | "progress"
            ) {
                return Some(id);
            }
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        None
    }

    /// Whitespace-normalized text of the element and its light descendants,
    /// in document order (text runs interleaved with child subtrees).
    pub fn rendered_text(&self, id: NodeId) -> String {
        let mut parts: Vec<String> = Vec::new();
        self.collect_text(id, &mut parts);
        parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn collect_text(&self, id: NodeId, parts: &mut Vec<String>) {
        let el = &self.nodes[id.0];
        for slot in 0..=el.children.len() {
            for run in el.text_runs.iter().filter(|r| r.slot == slot) {
                if !run.text.trim().is_empty() {
                    parts.push(run.text.trim().to_string());
                }
            }
            if let Some(child) = el.children.get(slot) {
                self.collect_text(*child, parts);
            }
        }
    }

    // --- synthetic input --------------------------------------------------

    pub fn focus(&mut self, id: NodeId) -> Result<()> {
        self.dispatch(id, EventKind::Focus, false, false)?;
        self.focused = Some(id);
        Ok(())
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn simulate_click(&mut self, id: NodeId) -> Result<()> {
        self.dispatch(id, EventKind::Click, true, true)
    }

    pub fn append_to_value(&mut self, id: NodeId, ch: char) -> Result<()> {
        if self.nodes[id.0].detached {
            return Err(AgentError::NodeNotFound);
        }
        self.nodes[id.0].value.push(ch);
        self.dispatch(id, EventKind::ValueAppended { ch }, false, false)
    }

    pub fn append_to_text(&mut self, id: NodeId, ch: char) -> Result<()> {
        if self.nodes[id.0].detached {
            return Err(AgentError::NodeNotFound);
        }
        let slot = self.nodes[id.0].children.len();
        let el = &mut self.nodes[id.0];
        match el.text_runs.last_mut() {
            Some(run) if run.slot == slot => run.text.push(ch),
            _ => el.text_runs.push(TextRun {
                slot,
                text: ch.to_string(),
            }),
        }
        self.dispatch(id, EventKind::ValueAppended { ch }, false, false)
    }

    pub fn dispatch(
        &mut self,
        target: NodeId,
        kind: EventKind,
        bubbles: bool,
        cancelable: bool,
    ) -> Result<()> {
        if target.0 >= self.nodes.len() || self.nodes[target.0].detached {
            return Err(AgentError::NodeNotFound);
        }
        self.events.push(PageEvent {
            target,
            kind,
            bubbles,
            cancelable,
        });
        Ok(())
    }

    pub fn events(&self) -> &[PageEvent] {
        &self.events
    }

    // --- marker overlay ---------------------------------------------------

    pub fn install_markers(&mut self, markers: Vec<MarkerOverlay>) {
        if self.markers.is_none() {
            self.markers = Some(markers);
        }
    }

    pub fn remove_markers(&mut self) {
        self.markers = None;
    }

    pub fn markers_installed(&self) -> bool {
        self.markers.is_some()
    }

    pub fn installed_markers(&self) -> Option<&[MarkerOverlay]> {
        self.markers.as_deref()
    }

    // --- navigation -------------------------------------------------------

    pub fn navigate(&mut self, target: &str) -> Result<()> {
        let parsed = url::Url::parse(target)
            .map_err(|e| AgentError::NavigationFailed(format!("{}: {}", target, e)))?;
        self.url = parsed.to_string();
        self.pending_navigation = Some(self.url.clone());
        Ok(())
    }

    pub fn take_pending_navigation(&mut self) -> Option<String> {
        self.pending_navigation.take()
    }
}
