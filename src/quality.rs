//! Match-quality visualization colors.

use crate::correspondence::{CorrespondenceSet, MatchQuality};
use crate::types::VertexColor;

/// Map each target vertex's match quality to a diagnostic color.
///
/// Blue for perfect matches, green for good, yellow for acceptable,
/// red for unmatched (inpainted) vertices.
pub fn quality_colors(correspondence: &CorrespondenceSet) -> Vec<VertexColor> {
    correspondence
        .entries
        .iter()
        .map(|entry| match entry.quality {
            MatchQuality::Perfect => VertexColor::from_float(0.0, 0.5, 1.0),
            MatchQuality::Good => VertexColor::from_float(0.0, 1.0, 0.0),
            MatchQuality::Acceptable => VertexColor::from_float(1.0, 1.0, 0.0),
            MatchQuality::Unmatched => VertexColor::from_float(1.0, 0.0, 0.0),
        })
        .collect()
}
