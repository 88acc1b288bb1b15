use crate::{gate::WaitPolicy, pixmap::ScaleFilter, transition::TransitionSpec};

/// Quality tier for cached-bitmap rendering and scaled blits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderQuality {
    Draft,
    Balanced,
    High,
}

impl RenderQuality {
    pub fn scale_filter(self) -> ScaleFilter {
        match self {
            Self::Draft => ScaleFilter::Nearest,
            Self::Balanced | Self::High => ScaleFilter::Bilinear,
        }
    }
}

/// Per-surface engine configuration. A primary presentation surface and a
/// notification overlay differ only in values here and in their output
/// dimensions.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Skip animating the background when outgoing and incoming slides
    /// share one continuously playing background video.
    pub smart_transitions: bool,
    pub quality: RenderQuality,
    pub wait_policy: WaitPolicy,
    /// Used when a request carries no explicit transition.
    pub default_transition: TransitionSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smart_transitions: true,
            quality: RenderQuality::Balanced,
            wait_policy: WaitPolicy::CoalesceLatest,
            default_transition: TransitionSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = EngineConfig::default();
        assert!(cfg.smart_transitions);
        assert_eq!(cfg.wait_policy, WaitPolicy::CoalesceLatest);
        assert_eq!(cfg.quality.scale_filter(), ScaleFilter::Bilinear);
    }

    #[test]
    fn json_round_trip() {
        let cfg = EngineConfig {
            smart_transitions: false,
            quality: RenderQuality::Draft,
            wait_policy: WaitPolicy::ForceImmediate,
            default_transition: TransitionSpec::fade(250),
        };
        let s = serde_json::to_string(&cfg).unwrap();
        let de: EngineConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(de, cfg);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let de: EngineConfig = serde_json::from_str(r#"{"smart_transitions": false}"#).unwrap();
        assert!(!de.smart_transitions);
        assert_eq!(de.quality, RenderQuality::Balanced);
    }
}
