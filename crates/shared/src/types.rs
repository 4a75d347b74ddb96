//! Common types used across JobTrail

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of a tracked job application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum ApplicationStatus {
    Draft,
    Applied,
    Interview,
    Offer,
    Rejected,
    Archived,
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "Draft",
            Self::Applied => "Applied",
            Self::Interview => "Interview",
            Self::Offer => "Offer",
            Self::Rejected => "Rejected",
            Self::Archived => "Archived",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Applied" => Ok(Self::Applied),
            "Interview" => Ok(Self::Interview),
            "Offer" => Ok(Self::Offer),
            "Rejected" => Ok(Self::Rejected),
            "Archived" => Ok(Self::Archived),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

/// User-assigned priority of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum ApplicationPriority {
    High,
    Medium,
    Low,
}

impl Default for ApplicationPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for ApplicationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        write!(f, "{}", s)
    }
}

/// Time horizon of a career goal. One goal per horizon per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum CareerGoalType {
    #[serde(rename = "3-year")]
    #[sqlx(rename = "3-year")]
    ThreeYear,
    #[serde(rename = "5-year")]
    #[sqlx(rename = "5-year")]
    FiveYear,
    #[serde(rename = "10-year")]
    #[sqlx(rename = "10-year")]
    TenYear,
}

impl std::fmt::Display for CareerGoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ThreeYear => "3-year",
            Self::FiveYear => "5-year",
            Self::TenYear => "10-year",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Per-user profile row. Holds the premium entitlement flag and the lazily
/// created Stripe customer reference (write-once for the life of the account).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub has_premium: bool,
    pub stripe_customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A tracked job application
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub job_title: String,
    pub application_url: Option<String>,
    pub status: ApplicationStatus,
    pub priority: ApplicationPriority,
    pub application_date: time::Date,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub motivation: Option<String>,
    pub fit_notes: Option<String>,
    pub pitch_text: Option<String>,
    pub company_research: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A career goal for one time horizon
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CareerGoal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_type: CareerGoalType,
    pub title: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// An interview round attached to an application
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationInterview {
    pub id: Uuid,
    pub application_id: Uuid,
    pub round_number: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub interview_date: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub feedback: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A prepared question/answer pair attached to an application
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationQuestion {
    pub id: Uuid,
    pub application_id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_application_status_round_trip() {
        for s in ["Draft", "Applied", "Interview", "Offer", "Rejected", "Archived"] {
            let status = ApplicationStatus::from_str(s).unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!(ApplicationStatus::from_str("draft").is_err());
    }

    #[test]
    fn test_goal_type_serde_names() {
        let json = serde_json::to_string(&CareerGoalType::ThreeYear).unwrap();
        assert_eq!(json, "\"3-year\"");
        let back: CareerGoalType = serde_json::from_str("\"10-year\"").unwrap();
        assert_eq!(back, CareerGoalType::TenYear);
    }
}
