use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::compliance::{compute_compliance, Compliance};

/// Implements the string mapping plus the sqlx text codec for an enum
/// persisted as a constrained `TEXT` column.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }

            fn parse_normalized(value: &str) -> Result<Self, $crate::domain::models::EnumParseError> {
                match value {
                    $($text => Ok($ty::$variant),)+
                    _ => Err($crate::domain::models::EnumParseError::new($kind, value)),
                }
            }
        }

        impl ::std::convert::TryFrom<&str> for $ty {
            type Error = $crate::domain::models::EnumParseError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                let normalized = value.trim().to_ascii_lowercase();
                $ty::parse_normalized(&normalized)
            }
        }

        impl ::std::str::FromStr for $ty {
            type Err = $crate::domain::models::EnumParseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                <$ty as ::std::convert::TryFrom<&str>>::try_from(value)
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::sqlx::Type<::sqlx::Postgres> for $ty {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <&str as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                use ::sqlx::TypeInfo;
                matches!(
                    ty.name(),
                    "TEXT" | "VARCHAR" | "BPCHAR" | "text" | "varchar" | "bpchar"
                )
            }
        }

        impl<'q> ::sqlx::Encode<'q, ::sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                let value = self.as_str();
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&value, buf)
            }

            fn size_hint(&self) -> usize {
                let value = self.as_str();
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::size_hint(&value)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $ty {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, ::sqlx::error::BoxDynError> {
                let raw = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                <$ty as ::std::convert::TryFrom<&str>>::try_from(raw)
                    .map_err(|err| Box::new(err) as ::sqlx::error::BoxDynError)
            }
        }
    };
}

pub(crate) use text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unit,
    Admin,
    Auditor,
}

text_enum!(Role, "role", {
    Unit => "unit",
    Admin => "admin",
    Auditor => "auditor",
});

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Unit => "Unit",
            Role::Admin => "Administrator",
            Role::Auditor => "Auditor",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumParseError {
    kind: &'static str,
    value: String,
}

impl EnumParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StrategicObjective {
    pub id: Uuid,
    pub description: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

text_enum!(ProjectState, "project state", {
    Draft => "draft",
    Submitted => "submitted",
    Approved => "approved",
    Rejected => "rejected",
});

impl ProjectState {
    /// Human-facing label used by the report emitters.
    pub fn label(&self) -> &'static str {
        match self {
            ProjectState::Draft => "Draft",
            ProjectState::Submitted => "Submitted",
            ProjectState::Approved => "Approved",
            ProjectState::Rejected => "Rejected",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, ProjectState::Draft | ProjectState::Rejected)
    }

    pub const ALL: [ProjectState; 4] = [
        ProjectState::Draft,
        ProjectState::Submitted,
        ProjectState::Approved,
        ProjectState::Rejected,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub name: String,
    pub year: i32,
    pub unit_objective: String,
    pub state: ProjectState,
    pub rejection_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub is_unplanned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub description: String,
    pub unit_of_measure: String,
    pub planned_quantity: i64,
    pub is_quantifiable: bool,
    pub verification_method: String,
    pub resource_description: String,
    pub resource_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonthlyProgress {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub month: i16,
    pub year: i32,
    pub planned_quantity: i64,
    pub realized_quantity: i64,
    pub compliance: Option<Decimal>,
    pub is_unplanned: bool,
    pub non_compliance_cause: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyProgress {
    /// Recomputes compliance from the stored quantities rather than trusting
    /// the persisted column.
    pub fn compliance(&self) -> Compliance {
        compute_compliance(self.planned_quantity, self.realized_quantity)
    }

    /// Quantity realized beyond the monthly plan.
    pub fn surplus(&self) -> i64 {
        (self.realized_quantity - self.planned_quantity).max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Document,
    Photo,
    Video,
    Url,
    Audio,
}

text_enum!(EvidenceKind, "evidence kind", {
    Document => "document",
    Photo => "photo",
    Video => "video",
    Url => "url",
    Audio => "audio",
});

impl EvidenceKind {
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceKind::Document => "Document",
            EvidenceKind::Photo => "Photo",
            EvidenceKind::Video => "Video",
            EvidenceKind::Url => "URL",
            EvidenceKind::Audio => "Audio",
        }
    }

    pub fn requires_file(&self) -> bool {
        !matches!(self, EvidenceKind::Url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Evidence {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub month: Option<i16>,
    pub kind: EvidenceKind,
    pub description: String,
    pub file_key: Option<String>,
    pub file_name: Option<String>,
    pub size_bytes: Option<i64>,
    pub url: Option<String>,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Approve,
    Reject,
    Export,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
            AuditAction::Export => "EXPORT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<Uuid>,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub origin_address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Audit entry joined with the actor's email for listings and exports.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: AuditEntry,
    pub actor_email: Option<String>,
}

/// User joined with the name of the unit it belongs to.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub unit_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::try_from(" Admin ").unwrap(), Role::Admin);
        assert_eq!("AUDITOR".parse::<Role>().unwrap(), Role::Auditor);
        assert!(Role::try_from("finance").is_err());
    }

    #[test]
    fn only_draft_and_rejected_projects_are_editable() {
        let editable: Vec<_> = ProjectState::ALL
            .iter()
            .filter(|state| state.is_editable())
            .collect();
        assert_eq!(editable, vec![&ProjectState::Draft, &ProjectState::Rejected]);
    }

    #[test]
    fn evidence_kind_round_trips_through_text() {
        for kind in [
            EvidenceKind::Document,
            EvidenceKind::Photo,
            EvidenceKind::Video,
            EvidenceKind::Url,
            EvidenceKind::Audio,
        ] {
            assert_eq!(kind.as_str().parse::<EvidenceKind>().unwrap(), kind);
        }
        assert!(!EvidenceKind::Url.requires_file());
    }

    #[test]
    fn surplus_never_goes_negative() {
        let progress = MonthlyProgress {
            id: Uuid::nil(),
            activity_id: Uuid::nil(),
            month: 3,
            year: 2024,
            planned_quantity: 10,
            realized_quantity: 15,
            compliance: None,
            is_unplanned: true,
            non_compliance_cause: None,
            updated_at: Utc::now(),
        };
        assert_eq!(progress.surplus(), 5);
        assert_eq!(progress.compliance(), Compliance::Percent(Decimal::ONE_HUNDRED));

        let under = MonthlyProgress {
            realized_quantity: 4,
            ..progress
        };
        assert_eq!(under.surplus(), 0);
    }
}
