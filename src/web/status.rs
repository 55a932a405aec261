use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Review lifecycle of a submitted performance. `Reviewed` is terminal:
/// no transition ever leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    Pending,
    InProgress,
    Reviewed,
}

impl PerformanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceStatus::Pending => "PENDING",
            PerformanceStatus::InProgress => "IN_PROGRESS",
            PerformanceStatus::Reviewed => "REVIEWED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(PerformanceStatus::Pending),
            "IN_PROGRESS" => Some(PerformanceStatus::InProgress),
            "REVIEWED" => Some(PerformanceStatus::Reviewed),
            _ => None,
        }
    }

    /// Allowed moves: PENDING -> IN_PROGRESS, PENDING -> REVIEWED,
    /// IN_PROGRESS -> REVIEWED.
    pub fn can_transition_to(&self, next: PerformanceStatus) -> bool {
        match (self, next) {
            (PerformanceStatus::Pending, PerformanceStatus::InProgress) => true,
            (PerformanceStatus::Pending, PerformanceStatus::Reviewed) => true,
            (PerformanceStatus::InProgress, PerformanceStatus::Reviewed) => true,
            _ => false,
        }
    }
}

impl Serialize for PerformanceStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PerformanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        PerformanceStatus::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown performance status: {value}")))
    }
}

/// Closed feedback-tier type, decoded once at the submission boundary and
/// never re-interpreted as a raw string downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTier {
    Free,
    Paid,
}

impl FeedbackTier {
    /// Maps the UI feedback choice: "premium" buys a paid review, anything
    /// else falls back to the free tier.
    pub fn from_choice(choice: &str) -> Self {
        if choice.eq_ignore_ascii_case("premium") {
            FeedbackTier::Paid
        } else {
            FeedbackTier::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackTier::Free => "FREE",
            FeedbackTier::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FREE" => Some(FeedbackTier::Free),
            "PAID" => Some(FeedbackTier::Paid),
            _ => None,
        }
    }
}

impl Serialize for FeedbackTier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FeedbackTier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        FeedbackTier::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown feedback tier: {value}")))
    }
}

/// Lifecycle of a direct performer-to-judge request: a single transition out
/// of `Pending`, then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "declined" => Some(RequestStatus::Declined),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl Serialize for RequestStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        RequestStatus::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown request status: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewed_is_terminal() {
        let reviewed = PerformanceStatus::Reviewed;
        assert!(!reviewed.can_transition_to(PerformanceStatus::Pending));
        assert!(!reviewed.can_transition_to(PerformanceStatus::InProgress));
        assert!(!reviewed.can_transition_to(PerformanceStatus::Reviewed));
    }

    #[test]
    fn pending_may_skip_in_progress() {
        assert!(PerformanceStatus::Pending.can_transition_to(PerformanceStatus::Reviewed));
        assert!(PerformanceStatus::Pending.can_transition_to(PerformanceStatus::InProgress));
        assert!(PerformanceStatus::InProgress.can_transition_to(PerformanceStatus::Reviewed));
        assert!(!PerformanceStatus::InProgress.can_transition_to(PerformanceStatus::Pending));
    }

    #[test]
    fn tier_decodes_from_ui_choice() {
        assert_eq!(FeedbackTier::from_choice("premium"), FeedbackTier::Paid);
        assert_eq!(FeedbackTier::from_choice("Premium"), FeedbackTier::Paid);
        assert_eq!(FeedbackTier::from_choice("free"), FeedbackTier::Free);
        assert_eq!(FeedbackTier::from_choice(""), FeedbackTier::Free);
    }

    #[test]
    fn request_status_round_trips() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Declined,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert!(RequestStatus::parse("cancelled").is_none());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }
}
