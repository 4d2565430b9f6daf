//! Walks the document, including shadow trees, and classifies every element
//! as clickable or not, producing raw hint candidates in document order.

use super::Hint;
use crate::page::{NodeId, PageModel, Rect};
use tracing::trace;

const CLICKABLE_ROLES: [&str; 8] = [
    "button",
    "tab",
    "link",
    "checkbox",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "radio",
];

/// Input types whose content remains selectable when the control is
/// read-only; clicking those is pointless, so they yield no hint.
const SELECTABLE_INPUT_TYPES: [&str; 11] = [
    "text",
    "search",
    "url",
    "tel",
    "password",
    "email",
    "number",
    "date",
    "datetime-local",
    "month",
    "time",
];

/// Label targets are checked recursively; a label pointing at another label
/// is cut off here rather than followed.
const MAX_LABEL_RECURSION: usize = 2;

struct ScanContext {
    /// Whether any element on the page carries an AngularJS scope marker;
    /// only then are ng-click-style attributes worth probing for.
    angular_page: bool,
}

/// Full detection pass over the page. Output order is document order, with
/// shadow subtrees visited as encountered.
pub fn scan(page: &PageModel) -> Vec<Hint> {
    if page.body().is_none() {
        return Vec::new();
    }
    let ctx = ScanContext {
        angular_page: page.all_elements().iter().any(|n| {
            page.attr(*n, "class")
                .map(|c| c.split_whitespace().any(|cls| cls == "ng-scope"))
                .unwrap_or(false)
        }),
    };
    let mut hints = Vec::new();
    for element in page.all_elements() {
        hints.extend(hints_for_element(page, element, &ctx, 0));
    }
    trace!(candidates = hints.len(), "scanner pass finished");
    hints
}

fn hints_for_element(
    page: &PageModel,
    element: NodeId,
    ctx: &ScanContext,
    depth: usize,
) -> Vec<Hint> {
    let tag = page.tag(element).to_string();
    let mut is_clickable = false;
    let mut only_has_tabindex = false;
    let mut possible_false_positive = false;
    let mut reason: Option<&'static str> = None;
    let mut image_map_areas: Vec<(NodeId, Rect)> = Vec::new();

    // Image maps: each area contributes one hint, with the image kept as a
    // back-reference for the overlap resolver.
    if tag == "img" {
        if let Some(map_name) = page.attr(element, "usemap") {
            let map_name = map_name.trim_start_matches('#').to_string();
            if let Some(img_rect) = page.node(element).rect {
                let areas = page.map_areas(&map_name);
                if !areas.is_empty() {
                    is_clickable = true;
                    for area in areas {
                        if let Some(rect) = area_rect(page, area, &img_rect) {
                            image_map_areas.push((area, rect));
                        }
                    }
                }
            }
        }
    }

    // aria-disabled vetoes everything else.
    if let Some(aria_disabled) = page.attr(element, "aria-disabled") {
        if aria_disabled.is_empty() || aria_disabled.eq_ignore_ascii_case("true") {
            return Vec::new();
        }
    }

    if !is_clickable && ctx.angular_page && has_angular_click_binding(page, element) {
        is_clickable = true;
    }

    if page.has_attr(element, "onclick") {
        is_clickable = true;
    } else if let Some(role) = page.attr(element, "role") {
        if CLICKABLE_ROLES.contains(&role.to_lowercase().as_str()) {
            is_clickable = true;
        }
    }
    if !is_clickable {
        if let Some(editable) = page.attr(element, "contenteditable") {
            if matches!(
                editable.to_lowercase().as_str(),
                "" | "contenteditable" | "true" | "plaintext-only"
            ) {
                is_clickable = true;
            }
        }
    }

    if !is_clickable {
        if let Some(jsaction) = page.attr(element, "jsaction") {
            is_clickable = jsaction_binds_click(jsaction);
        }
    }

    let disabled = page.has_attr(element, "disabled");
    let read_only = page.has_attr(element, "readonly");
    match tag.as_str() {
        "a" => is_clickable = true,
        "textarea" => is_clickable |= !disabled && !read_only,
        "input" => {
            let hidden = page
                .attr(element, "type")
                .map(|t| t.eq_ignore_ascii_case("hidden"))
                .unwrap_or(false);
            is_clickable |= !(hidden || disabled || (read_only && is_selectable_input(page, element)));
        }
        "button" | "select" => is_clickable |= !disabled,
        "object" | "embed" => is_clickable = true,
        "label" => {
            if !is_clickable && depth < MAX_LABEL_RECURSION {
                if let Some(control) = page.label_control(element) {
                    is_clickable = !page.has_attr(control, "disabled")
                        && hints_for_element(page, control, ctx, depth + 1).is_empty();
                }
            }
        }
        "body" => {
            let (vw, vh) = page.viewport();
            if !is_clickable
                && Some(element) == page.body()
                && !page.window_focused()
                && vw > 3.0
                && vh > 3.0
            {
                is_clickable = true;
                reason = Some("Frame.");
            }
            if !is_clickable
                && Some(element) == page.body()
                && page.window_focused()
                && page.is_scrollable(element)
            {
                is_clickable = true;
                reason = Some("Scroll.");
            }
        }
        "img" => {
            let zoom_cursor = matches!(
                page.node(element).style.cursor.as_deref(),
                Some("zoom-in") | Some("zoom-out")
            );
            is_clickable |= zoom_cursor;
        }
        "div" | "ol" | "ul" => {
            if !is_clickable && page.is_overflowed(element) && page.is_scrollable(element) {
                is_clickable = true;
                reason = Some("Scroll.");
            }
        }
        "details" => {
            is_clickable = true;
            reason = Some("Open.");
        }
        _ => {}
    }

    // Real clickables are often wrapped in elements whose class name merely
    // mentions "button"; such matches are marked unreliable.
    if !is_clickable {
        if let Some(class) = page.attr(element, "class") {
            if class.to_lowercase().contains("button") {
                is_clickable = true;
                possible_false_positive = true;
            }
        }
    }

    if !is_clickable {
        if let Some(tabindex) = page.attr(element, "tabindex") {
            if tabindex.trim().parse::<f64>().map(|v| v >= 0.0).unwrap_or(false) {
                is_clickable = true;
                only_has_tabindex = true;
            }
        }
    }

    if !is_clickable {
        return Vec::new();
    }

    if !image_map_areas.is_empty() {
        return image_map_areas
            .into_iter()
            .map(|(area, rect)| Hint {
                element: area,
                image: Some(element),
                rect,
                second_class_citizen: only_has_tabindex,
                possible_false_positive,
                reason,
            })
            .collect();
    }

    match page.visible_client_rect(element) {
        Some(rect) => vec![Hint {
            element,
            image: None,
            rect,
            second_class_citizen: only_has_tabindex,
            possible_false_positive,
            reason,
        }],
        None => Vec::new(),
    }
}

fn has_angular_click_binding(page: &PageModel, element: NodeId) -> bool {
    for prefix in ["", "data-", "x-"] {
        for separator in ["-", ":", "_"] {
            let attr = format!("{}ng{}click", prefix, separator);
            if page.has_attr(element, &attr) {
                return true;
            }
        }
    }
    false
}

/// Declarative action bindings: `;`-separated rules of the form
/// `event:namespace.action` (event defaults to click). A rule binds a click
/// when the event is "click", the namespace isn't "none" and an action name
/// is actually present.
fn jsaction_binds_click(jsaction: &str) -> bool {
    for rule in jsaction.split(';') {
        let rule = rule.trim();
        let parts: Vec<&str> = rule.split(':').collect();
        if parts.is_empty() || parts.len() > 2 {
            continue;
        }
        let (event_type, binding) = if parts.len() == 1 {
            ("click", parts[0].trim())
        } else {
            (parts[0].trim(), parts[1].trim())
        };
        let mut segments = binding.split('.');
        let namespace = segments.next().unwrap_or("");
        let action_name = segments.next().unwrap_or("_");
        if event_type == "click" && namespace != "none" && action_name != "_" {
            return true;
        }
    }
    false
}

fn is_selectable_input(page: &PageModel, element: NodeId) -> bool {
    let input_type = page.attr(element, "type").unwrap_or("text").to_lowercase();
    SELECTABLE_INPUT_TYPES.contains(&input_type.as_str())
}

/// Rectangle of an `<area>` within its image, in viewport coordinates.
/// Supports rect, circle and polygon (bounding box) shapes.
fn area_rect(page: &PageModel, area: NodeId, img_rect: &Rect) -> Option<Rect> {
    let coords: Vec<f64> = page
        .attr(area, "coords")?
        .split(',')
        .filter_map(|c| c.trim().parse().ok())
        .collect();
    let shape = page.attr(area, "shape").unwrap_or("rect").to_lowercase();
    let local = match shape.as_str() {
        "circle" | "circ" => match coords[..] {
            [cx, cy, r] => Rect::new(cx - r, cy - r, r * 2.0, r * 2.0),
            _ => return None,
        },
        "poly" | "polygon" => {
            if coords.len() < 6 {
                return None;
            }
            let xs: Vec<f64> = coords.iter().step_by(2).copied().collect();
            let ys: Vec<f64> = coords.iter().skip(1).step_by(2).copied().collect();
            let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
        }
        _ => match coords[..] {
            [x1, y1, x2, y2] => Rect::new(x1, y1, x2 - x1, y2 - y1),
            _ => return None,
        },
    };
    Some(local.translate(img_rect.x, img_rect.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::html::parse_page;

    fn scan_ids(page: &PageModel) -> Vec<String> {
        scan(page)
            .iter()
            .map(|h| page.attr(h.element, "id").unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn native_affordances_are_detected() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="link" href="/x" style="left:0;top:0;width:50px;height:20px">go</a>
                <button id="btn" style="left:0;top:30px;width:50px;height:20px">ok</button>
                <button id="off" disabled style="left:0;top:60px;width:50px;height:20px">no</button>
                <input id="field" style="left:0;top:90px;width:50px;height:20px">
                <input id="ghost" type="hidden">
                <select id="pick" style="left:0;top:120px;width:50px;height:20px"></select>
                <details id="more" style="left:0;top:150px;width:50px;height:20px">x</details>
            </body></html>"#,
        );
        let ids = scan_ids(&page);
        assert_eq!(ids, ["link", "btn", "field", "pick", "more"]);
        let details = scan(&page).into_iter().last().unwrap();
        assert_eq!(details.reason, Some("Open."));
    }

    #[test]
    fn aria_disabled_vetoes_everything() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="dead" href="/x" aria-disabled="true" style="left:0;top:0;width:50px;height:20px">x</a>
                <button id="also" aria-disabled="" style="left:0;top:30px;width:50px;height:20px">y</button>
            </body></html>"#,
        );
        assert!(scan(&page).is_empty());
    }

    #[test]
    fn role_contenteditable_and_jsaction_qualify() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <span id="rolebtn" role="menuitem" style="left:0;top:0;width:40px;height:16px">m</span>
                <div id="editor" contenteditable="plaintext-only" style="left:0;top:20px;width:40px;height:16px"></div>
                <div id="declared" jsaction="click:pane.open" style="left:0;top:40px;width:40px;height:16px"></div>
                <div id="nonaction" jsaction="click:none.open" style="left:0;top:60px;width:40px;height:16px"></div>
                <div id="keyonly" jsaction="keydown:pane.open" style="left:0;top:80px;width:40px;height:16px"></div>
            </body></html>"#,
        );
        assert_eq!(scan_ids(&page), ["rolebtn", "editor", "declared"]);
    }

    #[test]
    fn default_event_in_binding_syntax_is_click() {
        assert!(jsaction_binds_click("pane.open"));
        assert!(jsaction_binds_click("foo;click:pane.select"));
        assert!(!jsaction_binds_click("click:pane"));
        assert!(!jsaction_binds_click("none.open; mousedown:x.y"));
    }

    #[test]
    fn class_name_and_tabindex_flag_weak_candidates() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="maybe" class="fancyButton" style="left:0;top:0;width:40px;height:16px"></div>
                <div id="tabby" tabindex="0" style="left:0;top:20px;width:40px;height:16px"></div>
                <div id="negative" tabindex="-1" style="left:0;top:40px;width:40px;height:16px"></div>
            </body></html>"#,
        );
        let hints = scan(&page);
        assert_eq!(hints.len(), 2);
        assert!(hints[0].possible_false_positive);
        assert!(!hints[0].second_class_citizen);
        assert!(hints[1].second_class_citizen);
    }

    #[test]
    fn label_is_skipped_when_its_control_is_hinted() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <label id="covered" for="field" style="left:0;top:0;width:40px;height:16px">Name</label>
                <input id="field" style="left:0;top:20px;width:40px;height:16px">
                <label id="orphan" for="ghost" style="left:0;top:40px;width:40px;height:16px">Ghost</label>
                <input id="ghost" type="hidden">
            </body></html>"#,
        );
        // "covered" is skipped because its control hints itself; "orphan"
        // hints because its hidden control produced zero hints.
        assert_eq!(scan_ids(&page), ["field", "orphan"]);
    }

    #[test]
    fn body_hints_as_frame_target_only_when_window_unfocused() {
        let html = r#"<html><body style="left:0;top:0;width:1280px;height:720px"></body></html>"#;
        let mut page = parse_page("https://example.com", html);
        assert!(scan(&page).is_empty());
        page.set_window_focused(false);
        let hints = scan(&page);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].reason, Some("Frame."));
    }

    #[test]
    fn scroll_containers_hint_with_scroll_caption() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="pane" style="left:0;top:0;width:100px;height:50px;overflow-y:scroll;--scroll-height:400px"></div>
                <div id="static" style="left:0;top:60px;width:100px;height:50px"></div>
            </body></html>"#,
        );
        let hints = scan(&page);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].reason, Some("Scroll."));
    }

    #[test]
    fn image_map_areas_each_produce_a_hint() {
        let page = parse_page(
            "https://example.com",
            r##"<html><body>
                <img id="pic" usemap="#nav" style="left:100px;top:100px;width:200px;height:100px">
                <map name="nav">
                  <area id="left" shape="rect" coords="0,0,100,100" href="/l">
                  <area id="right" shape="rect" coords="100,0,200,100" href="/r">
                </map>
            </body></html>"##,
        );
        let pic = page.by_id("pic").unwrap();
        let hints = scan(&page);
        let areas: Vec<&Hint> = hints.iter().filter(|h| h.image == Some(pic)).collect();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].rect, Rect::new(100.0, 100.0, 100.0, 100.0));
        assert_eq!(areas[1].rect, Rect::new(200.0, 100.0, 100.0, 100.0));
    }

    #[test]
    fn elements_without_visible_rect_yield_nothing() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="boxless" href="/x">no box</a>
                <a id="offscreen" href="/y" style="left:5000px;top:0;width:50px;height:20px">gone</a>
            </body></html>"#,
        );
        assert!(scan(&page).is_empty());
    }

    #[test]
    fn shadow_tree_elements_are_scanned() {
        let mut page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="host" style="left:0;top:0;width:100px;height:100px"></div>
            </body></html>"#,
        );
        let host = page.by_id("host").unwrap();
        crate::page::html::attach_shadow(
            &mut page,
            host,
            r#"<button id="inner" style="left:10px;top:10px;width:50px;height:20px">go</button>"#,
        );
        assert_eq!(scan_ids(&page), ["inner"]);
    }
}
