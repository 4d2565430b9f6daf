pub mod labels;
pub mod overlap;
pub mod scanner;

use crate::config::DetectionConfig;
use crate::enrich::{self, EnrichedHint};
use crate::errors::{AgentError, Result};
use crate::page::{MarkerOverlay, NodeId, PageModel, Rect};
use tracing::debug;

/// A candidate interactive region detected on the page. Created fresh on
/// every detection pass and never persisted.
#[derive(Debug, Clone)]
pub struct Hint {
    pub element: NodeId,
    /// For `<area>` hints, the image the area belongs to.
    pub image: Option<NodeId>,
    pub rect: Rect,
    /// The element's only qualifying signal was a non-negative tabindex.
    pub second_class_citizen: bool,
    /// The element's only qualifying signal was the class-name heuristic.
    pub possible_false_positive: bool,
    /// Caption shown when the reason an element is hintable isn't obvious.
    pub reason: Option<&'static str>,
}

/// A generated label paired with its hint. Labels are stored upper-cased and
/// are unique within one capture cycle.
#[derive(Debug, Clone)]
pub struct HintMarker {
    pub label: String,
    pub hint: Hint,
}

/// Owns all per-cycle detection state: the surviving hints, their labels and
/// the on-page marker overlay. Built at the start of a capture cycle and torn
/// down before the next one begins.
#[derive(Debug)]
pub struct CaptureSession {
    markers: Vec<HintMarker>,
    markers_installed: bool,
}

impl CaptureSession {
    /// Run the full detection pipeline (scan, resolve overlaps, label) and
    /// render the hint markers onto the page.
    pub fn begin(page: &mut PageModel, config: &DetectionConfig) -> Self {
        let raw = scanner::scan(page);
        let surviving = overlap::resolve(page, raw, config);
        let labels = labels::generate(&config.label_alphabet, surviving.len());
        debug!(hints = surviving.len(), "detection pass complete");

        let markers: Vec<HintMarker> = surviving
            .into_iter()
            .zip(labels)
            .map(|(hint, label)| HintMarker {
                label: label.to_uppercase(),
                hint,
            })
            .collect();

        let overlays: Vec<MarkerOverlay> = markers
            .iter()
            .enumerate()
            .map(|(i, m)| MarkerOverlay {
                label: m.label.clone(),
                rect: m.hint.rect,
                z_index: config.marker_z_index + i as i64,
                caption: m.hint.reason.map(|r| r.to_string()),
            })
            .collect();
        page.install_markers(overlays);

        Self {
            markers,
            markers_installed: true,
        }
    }

    pub fn markers(&self) -> &[HintMarker] {
        &self.markers
    }

    /// Resolve a label (case-insensitively) to the element it marks.
    pub fn element_for(&self, label: &str) -> Result<NodeId> {
        let wanted = label.to_uppercase();
        self.markers
            .iter()
            .find(|m| m.label == wanted)
            .map(|m| m.hint.element)
            .ok_or_else(|| AgentError::HintNotFound(label.to_string()))
    }

    /// Describe every labeled hint for the decision service.
    pub fn enrich(
        &self,
        page: &PageModel,
        config: &crate::config::EnrichmentConfig,
    ) -> Vec<EnrichedHint> {
        self.markers
            .iter()
            .map(|m| enrich::describe(page, m.hint.element, config).with_hint_string(&m.label))
            .collect()
    }

    /// Remove the rendered markers. Safe to call more than once.
    pub fn remove_markers(&mut self, page: &mut PageModel) {
        if self.markers_installed {
            page.remove_markers();
            self.markers_installed = false;
        }
    }
}
