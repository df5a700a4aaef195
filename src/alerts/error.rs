use thiserror::Error;

/// Step of the per-search pipeline, used for error reporting and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStage {
    Lease,
    Fetch,
    Search,
    Compose,
    Delivery,
    Watermark,
}

impl AlertStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStage::Lease => "lease",
            AlertStage::Fetch => "fetch",
            AlertStage::Search => "search",
            AlertStage::Compose => "compose",
            AlertStage::Delivery => "delivery",
            AlertStage::Watermark => "watermark",
        }
    }
}

impl std::fmt::Display for AlertStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("failed to acquire run lease: {0}")]
    Lease(String),

    #[error("failed to list active saved searches: {0}")]
    Fetch(String),

    #[error("inventory search failed: {0}")]
    Search(String),

    #[error("failed to compose alert: {0}")]
    Compose(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("failed to advance watermark: {0}")]
    Watermark(String),

    #[error("{stage} call timed out after {timeout_secs}s")]
    Timeout { stage: AlertStage, timeout_secs: u64 },
}

impl AlertError {
    /// Wraps a collaborator failure into the variant for `stage`.
    pub fn at(stage: AlertStage, err: anyhow::Error) -> Self {
        let msg = format!("{:#}", err);
        match stage {
            AlertStage::Lease => AlertError::Lease(msg),
            AlertStage::Fetch => AlertError::Fetch(msg),
            AlertStage::Search => AlertError::Search(msg),
            AlertStage::Compose => AlertError::Compose(msg),
            AlertStage::Delivery => AlertError::Delivery(msg),
            AlertStage::Watermark => AlertError::Watermark(msg),
        }
    }

    pub fn stage(&self) -> AlertStage {
        match self {
            AlertError::Lease(_) => AlertStage::Lease,
            AlertError::Fetch(_) => AlertStage::Fetch,
            AlertError::Search(_) => AlertStage::Search,
            AlertError::Compose(_) => AlertStage::Compose,
            AlertError::Delivery(_) => AlertStage::Delivery,
            AlertError::Watermark(_) => AlertStage::Watermark,
            AlertError::Timeout { stage, .. } => *stage,
        }
    }
}
