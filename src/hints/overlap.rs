//! Decides which raw hint candidates are actually exposed to pointer input.
//!
//! Both passes walk the scanner's output reversed, so descendants (painted
//! later) are evaluated before their ancestors. The surviving list is
//! re-reversed into document order and translated into page-absolute
//! coordinates.

use super::Hint;
use crate::config::DetectionConfig;
use crate::page::{NodeId, PageModel};

pub fn resolve(page: &PageModel, hints: Vec<Hint>, config: &DetectionConfig) -> Vec<Hint> {
    let mut reversed: Vec<Hint> = hints.into_iter().rev().collect();
    reversed = prune_false_positives(page, reversed, config);

    let mut surviving: Vec<Hint> = reversed
        .into_iter()
        .filter(|hint| is_reachable_by_pointer(page, hint, config))
        .collect();

    surviving.reverse();
    let (scroll_x, scroll_y) = page.scroll_offset();
    for hint in &mut surviving {
        hint.rect = hint.rect.translate(scroll_x, scroll_y);
    }
    surviving
}

/// A class-name-only candidate is dropped when a nearby already-clickable
/// entry turns out to be its descendant: the ancestor's class-name match was
/// spurious. Nearby means within the lookback window of prior entries, each
/// walked up a fixed number of parent links.
fn prune_false_positives(
    page: &PageModel,
    hints: Vec<Hint>,
    config: &DetectionConfig,
) -> Vec<Hint> {
    let mut keep = Vec::with_capacity(hints.len());
    for position in 0..hints.len() {
        keep.push(!is_false_positive(page, &hints, position, config));
    }
    hints
        .into_iter()
        .zip(keep)
        .filter_map(|(hint, keep)| keep.then_some(hint))
        .collect()
}

fn is_false_positive(
    page: &PageModel,
    hints: &[Hint],
    position: usize,
    config: &DetectionConfig,
) -> bool {
    let hint = &hints[position];
    if !hint.possible_false_positive {
        return false;
    }
    let start = position.saturating_sub(config.false_positive_lookback);
    for prior in &hints[start..position] {
        let mut candidate: Option<NodeId> = Some(prior.element);
        for _ in 0..config.false_positive_ancestor_hops {
            candidate = candidate.and_then(|c| page.parent(c));
            if candidate == Some(hint.element) {
                return true;
            }
        }
    }
    false
}

/// Samples the hint's center and four inset corners against the top-most
/// element lookup. The hint survives when any sample lands on itself, an
/// ancestor, a descendant, or (for image-map areas) the associated image.
/// Tabindex-only candidates are discarded outright.
fn is_reachable_by_pointer(page: &PageModel, hint: &Hint, config: &DetectionConfig) -> bool {
    if hint.second_class_citizen {
        return false;
    }
    let rect = hint.rect;

    // Middle first; it is the most likely to succeed.
    let (cx, cy) = rect.center();
    if let Some(found) = page.element_from_point(cx, cy) {
        if intersects(page, hint.element, found) {
            return true;
        }
        if page.tag(hint.element) == "area" && Some(found) == hint.image {
            return true;
        }
    }

    let inset = config.corner_inset;
    let vertical = [rect.y + inset, rect.bottom() - inset];
    let horizontal = [rect.x + inset, rect.right() - inset];
    for y in vertical {
        for x in horizontal {
            if let Some(found) = page.element_from_point(x, y) {
                if intersects(page, hint.element, found) {
                    return true;
                }
            }
        }
    }
    false
}

fn intersects(page: &PageModel, a: NodeId, b: NodeId) -> bool {
    page.is_ancestor_or_self(a, b) || page.is_ancestor_or_self(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::scanner;
    use crate::page::html::parse_page;

    fn detect(page: &PageModel) -> Vec<Hint> {
        resolve(page, scanner::scan(page), &DetectionConfig::default())
    }

    fn ids(page: &PageModel, hints: &[Hint]) -> Vec<String> {
        hints
            .iter()
            .map(|h| page.attr(h.element, "id").unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn fully_covered_element_is_excluded() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="buried" href="/x" style="left:10px;top:10px;width:100px;height:20px">x</a>
                <div id="lid" style="left:0;top:0;width:400px;height:400px"></div>
            </body></html>"#,
        );
        assert!(detect(&page).is_empty());
    }

    #[test]
    fn partially_exposed_element_survives() {
        // The cover misses the link's right edge, so a corner sample lands.
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="peek" href="/x" style="left:10px;top:10px;width:100px;height:20px">x</a>
                <div id="lid" style="left:0;top:0;width:60px;height:400px"></div>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["peek"]);
    }

    #[test]
    fn sample_on_own_descendant_counts_as_reachable() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="wrap" href="/x" style="left:0;top:0;width:100px;height:40px">
                  <span id="icon" style="left:0;top:0;width:100px;height:40px">*</span>
                </a>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["wrap"]);
    }

    #[test]
    fn second_class_citizens_are_always_discarded() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="tabby" tabindex="0" style="left:0;top:0;width:60px;height:20px"></div>
                <a id="real" href="/x" style="left:0;top:40px;width:60px;height:20px">x</a>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["real"]);
    }

    #[test]
    fn false_positive_ancestor_with_clickable_descendant_is_pruned() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="wrapper" class="cta-button" style="left:0;top:0;width:200px;height:60px">
                  <a id="real" href="/x" style="left:10px;top:10px;width:100px;height:20px;z-index:1">x</a>
                </div>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["real"]);
    }

    #[test]
    fn false_positive_without_clickable_descendant_is_retained() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="lonely" class="button-like" style="left:0;top:0;width:200px;height:60px"></div>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["lonely"]);
    }

    #[test]
    fn false_positive_beyond_lookback_window_is_retained() {
        // Seven deeply nested links (beyond the 3-hop ancestor walk) separate
        // the wrapper from its shallow descendant in reversed order, pushing
        // that descendant outside the window of 6.
        let mut body = String::from(
            r#"<div id="wrapper" class="menuButton" style="left:0;top:0;width:600px;height:400px">"#,
        );
        for i in 0..7 {
            body.push_str(&format!(
                r#"<div><div><div><a id="deep{i}" href="/{i}" style="left:5px;top:{}px;width:40px;height:10px;z-index:1">d</a></div></div></div>"#,
                5 + i * 15
            ));
        }
        body.push_str(
            r#"<a id="inside" href="/i" style="left:5px;top:150px;width:40px;height:10px;z-index:1">i</a></div>"#,
        );
        let page = parse_page(
            "https://example.com",
            &format!("<html><body>{}</body></html>", body),
        );
        let hints = detect(&page);
        assert!(ids(&page, &hints).contains(&"wrapper".to_string()));
    }

    #[test]
    fn false_positive_within_ancestor_hops_is_pruned_via_any_window_entry() {
        // The descendant is three parent hops below the wrapper, the walk's
        // limit, and still prunes it.
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <div id="wrapper" class="iconButton" style="left:0;top:0;width:300px;height:100px">
                  <div><div>
                    <a id="nested" href="/x" style="left:5px;top:5px;width:40px;height:10px;z-index:1">x</a>
                  </div></div>
                </div>
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["nested"]);
    }

    #[test]
    fn surviving_rects_are_translated_by_scroll_offset() {
        let mut page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="link" href="/x" style="left:10px;top:10px;width:50px;height:20px">x</a>
            </body></html>"#,
        );
        page.set_scroll_offset(100.0, 250.0);
        let hints = detect(&page);
        assert_eq!(hints[0].rect.x, 110.0);
        assert_eq!(hints[0].rect.y, 260.0);
    }

    #[test]
    fn visible_unoccluded_elements_map_one_to_one() {
        let page = parse_page(
            "https://example.com",
            r#"<html><body>
                <a id="a" href="/a" style="left:0;top:0;width:50px;height:20px">a</a>
                <button id="b" style="left:0;top:30px;width:50px;height:20px">b</button>
                <input id="c" style="left:0;top:60px;width:50px;height:20px">
            </body></html>"#,
        );
        let hints = detect(&page);
        assert_eq!(ids(&page, &hints), ["a", "b", "c"]);
    }
}
