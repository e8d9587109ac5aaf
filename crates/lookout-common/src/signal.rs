//! Typed monitoring signal attached to prediction responses.

use serde::{Deserialize, Serialize};

/// Model-internal values a monitoring layer may aggregate.
///
/// The prediction handler inserts this into the HTTP response extensions; the
/// metrics side-channel reads it back after the response is finalized. The
/// handler never touches the metrics library.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSignal {
    pub score: f64,
    pub label: usize,
    /// Reported (clamped) outlier score, when an outlier detector is loaded.
    pub outlier_score: Option<f64>,
}

impl ModelSignal {
    /// Header names mirrored on the response for external clients.
    pub const SCORE_HEADER: &'static str = "model-score";
    pub const LABEL_HEADER: &'static str = "model-label";
    pub const OUTLIER_HEADER: &'static str = "model-outlierscore";

    /// `(header name, string value)` pairs for the response metadata.
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (Self::SCORE_HEADER, self.score.to_string()),
            (Self::LABEL_HEADER, self.label.to_string()),
        ];
        if let Some(outlier) = self.outlier_score {
            pairs.push((Self::OUTLIER_HEADER, outlier.to_string()));
        }
        pairs
    }
}
