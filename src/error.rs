pub type LimelightResult<T> = Result<T, LimelightError>;

/// Engine error taxonomy.
///
/// `Resource` failures are fatal to the surface that raised them and are
/// surfaced before any state is mutated. `Media` failures degrade the
/// affected component and never abort a transition. `Concurrency` failures
/// mean a queued request was cancelled; resubmission is safe.
#[derive(thiserror::Error, Debug)]
pub enum LimelightError {
    #[error("resource error: {0}")]
    Resource(String),

    #[error("media error: slide '{slide}', component '{component}', asset '{asset}': {msg}")]
    Media {
        slide: String,
        component: String,
        asset: String,
        msg: String,
    },

    #[error("concurrency error: {0}")]
    Concurrency(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LimelightError {
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn media(
        slide: impl Into<String>,
        component: impl Into<String>,
        asset: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Media {
            slide: slide.into(),
            component: component.into(),
            asset: asset.into(),
            msg: msg.into(),
        }
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the failure only degrades one component rather than the
    /// whole operation.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Media { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            LimelightError::resource("x")
                .to_string()
                .contains("resource error:")
        );
        assert!(
            LimelightError::concurrency("x")
                .to_string()
                .contains("concurrency error:")
        );
        assert!(
            LimelightError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn media_errors_carry_full_context() {
        let err = LimelightError::media("slide-3", "lyric-line", "v1.mp4", "decode failed");
        let s = err.to_string();
        assert!(s.contains("slide-3"));
        assert!(s.contains("lyric-line"));
        assert!(s.contains("v1.mp4"));
        assert!(err.is_media());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = LimelightError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
