//! Database models and parameter types.

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use medlens_core::JwtSubject;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Well-known role names as stored in `users.role`.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";
}

/// Consent categories recorded in `consent_logs.consent_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentType {
    /// Permission to send the uploaded image to the prediction service.
    ImageAnalysis,
    /// Permission to keep assessment results and chat history.
    DataStorage,
    /// Acceptance of the terms of use.
    TermsOfUse,
}

impl ConsentType {
    pub const ALL: [Self; 3] = [Self::ImageAnalysis, Self::DataStorage, Self::TermsOfUse];

    /// Returns the string representation as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImageAnalysis => "image_analysis",
            Self::DataStorage => "data_storage",
            Self::TermsOfUse => "terms_of_use",
        }
    }
}

impl std::fmt::Display for ConsentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image_analysis" => Ok(Self::ImageAnalysis),
            "data_storage" => Ok(Self::DataStorage),
            "terms_of_use" => Ok(Self::TermsOfUse),
            other => Err(format!("Unknown consent type: {other}")),
        }
    }
}

// =============================================================================
// Database models
// =============================================================================

/// User model from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JwtSubject for User {
    fn user_id(&self) -> Uuid {
        self.id
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn name(&self) -> &str {
        &self.full_name
    }

    fn role(&self) -> &str {
        &self.role
    }
}

/// Stored assessment from the `assessments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assessment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub predicted_label: String,
    pub normalized_label: String,
    pub display_name: String,
    pub confidence: f64,
    pub urgency: String,
    pub low_confidence: bool,
    pub chat_available: bool,
    pub raw_prediction: JsonValue,
    pub image_filename: Option<String>,
    pub image_content_type: String,
    pub image_size_bytes: i32,
    pub created_at: DateTime<Utc>,
}

/// One question/answer exchange from the `chat_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assessment_id: Option<Uuid>,
    pub message: String,
    pub response: String,
    pub sources: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Consent decision from the `consent_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConsentLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consent_type: String,
    pub granted: bool,
    pub consent_version: String,
    #[serde(serialize_with = "serialize_ip")]
    pub ip_address: Option<IpNetwork>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[allow(clippy::ref_option)] // serde passes the field by reference
fn serialize_ip<S: serde::Serializer>(
    ip: &Option<IpNetwork>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match ip {
        Some(net) => serializer.serialize_some(&net.ip().to_string()),
        None => serializer.serialize_none(),
    }
}

// =============================================================================
// Parameter types (borrow from caller)
// =============================================================================

/// Parameters for creating a user.
#[derive(Debug, Clone, Copy)]
pub struct CreateUserParams<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: &'a str,
}

/// Parameters for storing an assessment.
#[derive(Debug, Clone)]
pub struct CreateAssessmentParams<'a> {
    pub user_id: Uuid,
    pub predicted_label: &'a str,
    pub normalized_label: &'a str,
    pub display_name: &'a str,
    pub confidence: f64,
    pub urgency: &'a str,
    pub low_confidence: bool,
    pub chat_available: bool,
    pub raw_prediction: &'a JsonValue,
    pub image_filename: Option<&'a str>,
    pub image_content_type: &'a str,
    pub image_size_bytes: i32,
}

/// Parameters for storing a chat exchange.
#[derive(Debug, Clone)]
pub struct CreateChatEntryParams<'a> {
    pub user_id: Uuid,
    pub assessment_id: Option<Uuid>,
    pub message: &'a str,
    pub response: &'a str,
    pub sources: &'a JsonValue,
}

/// Parameters for appending a consent decision.
#[derive(Debug, Clone)]
pub struct CreateConsentLogParams<'a> {
    pub user_id: Uuid,
    pub consent_type: ConsentType,
    pub granted: bool,
    pub consent_version: &'a str,
    pub ip_address: Option<IpNetwork>,
    pub user_agent: Option<&'a str>,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Build a page, clamping `limit` to `1..=max` and `offset` to `>= 0`.
    #[must_use]
    pub fn clamped(limit: Option<i64>, offset: Option<i64>, default: i64, max: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default).clamp(1, max),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_type_round_trips_through_str() {
        for ty in ConsentType::ALL {
            assert_eq!(ty.as_str().parse::<ConsentType>().unwrap(), ty);
        }
        assert_eq!(
            " Image_Analysis ".parse::<ConsentType>().unwrap(),
            ConsentType::ImageAnalysis
        );
        assert!("marketing".parse::<ConsentType>().is_err());
    }

    #[test]
    fn page_is_clamped() {
        assert_eq!(
            Page::clamped(None, None, 20, 100),
            Page { limit: 20, offset: 0 }
        );
        assert_eq!(
            Page::clamped(Some(500), Some(-3), 20, 100),
            Page { limit: 100, offset: 0 }
        );
        assert_eq!(Page::clamped(Some(0), Some(40), 20, 100).limit, 1);
    }

    #[test]
    fn consent_log_serializes_bare_ip() {
        let log = ConsentLog {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            consent_type: "data_storage".to_string(),
            granted: true,
            consent_version: "v1".to_string(),
            ip_address: Some(IpNetwork::from("203.0.113.7".parse::<std::net::IpAddr>().unwrap())),
            user_agent: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["ip_address"], "203.0.113.7");
    }
}
