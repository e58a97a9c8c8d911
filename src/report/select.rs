use anyhow::{anyhow, Result};

use crate::detect::{Detection, DetectionSet};

/// How the reportable detection is picked from a detection set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// First detection in emission order. The detector's ordering is trusted
    /// as-is and never re-sorted.
    #[default]
    First,
    /// Maximum confidence; ties go to the earliest detection.
    HighestConfidence,
}

impl SelectionPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "highest_confidence" => Ok(Self::HighestConfidence),
            other => Err(anyhow!("unknown selection policy '{}'", other)),
        }
    }
}

/// Pick the detection to report, or `None` for an empty set.
pub fn select_detection(set: &DetectionSet, policy: SelectionPolicy) -> Option<&Detection> {
    match policy {
        SelectionPolicy::First => set.first(),
        SelectionPolicy::HighestConfidence => set.iter().fold(None, |best, candidate| match best {
            Some(current) if current.confidence >= candidate.confidence => Some(current),
            _ => Some(candidate),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection::new(class_id, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn empty_set_selects_nothing() {
        let set = DetectionSet::empty();
        assert!(select_detection(&set, SelectionPolicy::First).is_none());
        assert!(select_detection(&set, SelectionPolicy::HighestConfidence).is_none());
    }

    #[test]
    fn first_policy_is_positional_not_ranked() {
        let set = DetectionSet::new(vec![det(2, 0.3), det(0, 0.9)]);
        let selected = select_detection(&set, SelectionPolicy::First).unwrap();
        assert_eq!(selected.class_id, 2);
    }

    #[test]
    fn highest_confidence_prefers_earliest_on_ties() {
        let set = DetectionSet::new(vec![det(2, 0.3), det(0, 0.9), det(1, 0.9)]);
        let selected = select_detection(&set, SelectionPolicy::HighestConfidence).unwrap();
        assert_eq!(selected.class_id, 0);
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!(SelectionPolicy::parse("First").unwrap(), SelectionPolicy::First);
        assert_eq!(
            SelectionPolicy::parse(" highest_confidence ").unwrap(),
            SelectionPolicy::HighestConfidence
        );
        assert!(SelectionPolicy::parse("largest").is_err());
    }
}
