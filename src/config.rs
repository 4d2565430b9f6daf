use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub decision: DecisionConfig,
    pub detection: DetectionConfig,
    pub enrichment: EnrichmentConfig,
    pub executor: ExecutorConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Alphabet used to enumerate hint label strings.
    pub label_alphabet: String,
    /// How many prior (descendant) hints to inspect when pruning
    /// class-name false positives.
    pub false_positive_lookback: usize,
    /// How many parent links to walk from each candidate descendant.
    pub false_positive_ancestor_hops: usize,
    /// Inset applied to rect corners before hit-test sampling.
    pub corner_inset: f64,
    /// Base stacking order for rendered hint markers.
    pub marker_z_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub max_attribute_length: usize,
    pub max_content_length: usize,
    pub max_data_attributes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Cadence of simulated keystrokes while typing.
    pub type_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay before the next loop iteration is attempted.
    pub step_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            decision: DecisionConfig::default(),
            detection: DetectionConfig::default(),
            enrichment: EnrichmentConfig::default(),
            executor: ExecutorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.pagepilot.dev/nextAction".to_string(),
            request_timeout_ms: 30000,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            label_alphabet: "sadfjklewcmpgh".to_string(),
            false_positive_lookback: 6,
            false_positive_ancestor_hops: 3,
            corner_inset: 0.1,
            marker_z_index: 2_140_000_000,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_attribute_length: 500,
            max_content_length: 1000,
            max_data_attributes: 10,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            type_interval_ms: 50,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 2000,
        }
    }
}
