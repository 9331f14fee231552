//! Segment classification from recency and frequency scores

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Result, RfmError};

/// Named customer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Hibernating,
    AtRisk,
    CantLose,
    AboutToSlip,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    pub const ALL: [Segment; 10] = [
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::CantLose,
        Segment::AboutToSlip,
        Segment::NeedAttention,
        Segment::LoyalCustomers,
        Segment::Promising,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::Champions,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Hibernating => "Hibernating",
            Segment::AtRisk => "At-Risk",
            Segment::CantLose => "Can't Lose",
            Segment::AboutToSlip => "About to Slip",
            Segment::NeedAttention => "Need Attention",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::Promising => "Promising",
            Segment::NewCustomers => "New Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::Champions => "Champions",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One pattern over the two-digit `(recency, frequency)` code.
#[derive(Debug, Clone)]
pub struct SegmentRule {
    pub recency: RangeInclusive<u8>,
    pub frequency: RangeInclusive<u8>,
    pub segment: Segment,
}

impl SegmentRule {
    fn matches(&self, recency: u8, frequency: u8) -> bool {
        self.recency.contains(&recency) && self.frequency.contains(&frequency)
    }
}

const fn rule(recency: RangeInclusive<u8>, frequency: RangeInclusive<u8>, segment: Segment) -> SegmentRule {
    SegmentRule {
        recency,
        frequency,
        segment,
    }
}

/// Rules in precedence order; the first match wins.
pub const SEGMENT_RULES: [SegmentRule; 10] = [
    rule(1..=2, 1..=2, Segment::Hibernating),
    rule(1..=2, 3..=4, Segment::AtRisk),
    rule(1..=2, 5..=5, Segment::CantLose),
    rule(3..=3, 1..=2, Segment::AboutToSlip),
    rule(3..=3, 3..=3, Segment::NeedAttention),
    rule(3..=4, 4..=5, Segment::LoyalCustomers),
    rule(4..=4, 1..=1, Segment::Promising),
    rule(5..=5, 1..=1, Segment::NewCustomers),
    rule(4..=5, 2..=3, Segment::PotentialLoyalists),
    rule(5..=5, 4..=5, Segment::Champions),
];

/// Map a score pair to its segment.
///
/// A pair matched by no rule is reported as an internal inconsistency,
/// never defaulted.
pub fn classify(recency_score: u8, frequency_score: u8) -> Result<Segment> {
    SEGMENT_RULES
        .iter()
        .find(|r| r.matches(recency_score, frequency_score))
        .map(|r| r.segment)
        .ok_or_else(|| RfmError::ClassificationGap(format!("{recency_score}{frequency_score}")))
}

/// Classify a two-character code such as `"54"` (recency first).
pub fn classify_code(code: &str) -> Result<Segment> {
    let digits: Vec<u8> = code
        .trim()
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<_>>()
        .unwrap_or_default();
    match digits.as_slice() {
        [recency, frequency] => classify(*recency, *frequency),
        _ => Err(RfmError::ClassificationGap(code.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_score_pair_has_exactly_one_rule() {
        for r in 1..=5u8 {
            for f in 1..=5u8 {
                let hits = SEGMENT_RULES.iter().filter(|rule| rule.matches(r, f)).count();
                assert_eq!(hits, 1, "code {r}{f} matched {hits} rules");
                assert!(!classify(r, f).unwrap().label().is_empty());
            }
        }
    }

    #[test]
    fn test_segment_table() {
        let expected = [
            // f = 1..=5 per recency row
            [
                "Hibernating",
                "Hibernating",
                "At-Risk",
                "At-Risk",
                "Can't Lose",
            ],
            [
                "Hibernating",
                "Hibernating",
                "At-Risk",
                "At-Risk",
                "Can't Lose",
            ],
            [
                "About to Slip",
                "About to Slip",
                "Need Attention",
                "Loyal Customers",
                "Loyal Customers",
            ],
            [
                "Promising",
                "Potential Loyalists",
                "Potential Loyalists",
                "Loyal Customers",
                "Loyal Customers",
            ],
            [
                "New Customers",
                "Potential Loyalists",
                "Potential Loyalists",
                "Champions",
                "Champions",
            ],
        ];
        for (r, row) in expected.iter().enumerate() {
            for (f, label) in row.iter().enumerate() {
                let segment = classify(r as u8 + 1, f as u8 + 1).unwrap();
                assert_eq!(segment.label(), *label, "code {}{}", r + 1, f + 1);
            }
        }
    }

    #[test]
    fn test_every_segment_reachable() {
        for segment in Segment::ALL {
            assert!(SEGMENT_RULES.iter().any(|r| r.segment == segment));
        }
    }

    #[test]
    fn test_out_of_domain_scores_are_gaps() {
        assert!(matches!(classify(0, 3), Err(RfmError::ClassificationGap(code)) if code == "03"));
        assert!(matches!(classify(6, 5), Err(RfmError::ClassificationGap(_))));
    }

    #[test]
    fn test_classify_code() {
        assert_eq!(classify_code("55").unwrap(), Segment::Champions);
        assert_eq!(classify_code("44").unwrap(), Segment::LoyalCustomers);
        assert_eq!(classify_code(" 41 ").unwrap(), Segment::Promising);
        assert!(classify_code("5").is_err());
        assert!(classify_code("5x").is_err());
        assert!(classify_code("555").is_err());
    }

    #[test]
    fn test_segment_serializes_as_label() {
        let json = serde_json::to_string(&Segment::CantLose).unwrap();
        assert_eq!(json, "\"Can't Lose\"");
    }
}
