//! Export generation for the admin and auditor surfaces.
//!
//! One service backs both routers; the scope it is built with decides which
//! role may call it. Every artifact that is produced gets an `EXPORT` audit
//! entry; failed generations leave no trace in the log.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::models::{AuditAction, ProjectState, Role, Unit, UserRecord},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    reporting::{
        self, builders,
        document::ReportDocument,
        layout::{build_tracking_layout, TrackingInput},
        pdf,
        snapshot::{ProjectSnapshot, UnitPerformance},
        xlsx, ExportArtifact, ExportFormat, ReportError,
    },
};

use super::{
    access,
    audit::{self, AuditDraft},
    errors::ServiceError,
    snapshots::{self, ProjectFilter},
};

/// Which router a request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    Admin,
    Auditor,
}

impl ExportScope {
    fn role(&self) -> Role {
        match self {
            ExportScope::Admin => Role::Admin,
            ExportScope::Auditor => Role::Auditor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatQuery {
    #[serde(default = "default_format")]
    pub format: ExportFormat,
}

fn default_format() -> ExportFormat {
    ExportFormat::Xlsx
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingQuery {
    pub unit_id: Uuid,
    pub year: i32,
    #[serde(default)]
    pub strategic_objective_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuarterlyQuery {
    #[serde(default = "default_format")]
    pub format: ExportFormat,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditExportQuery {
    #[serde(default = "default_format")]
    pub format: ExportFormat,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(FromRow)]
struct UnitCounts {
    #[sqlx(flatten)]
    unit: Unit,
    total_projects: i64,
    approved_projects: i64,
}

pub struct ReportService {
    pub state: Arc<AppState>,
    pub scope: ExportScope,
}

impl ReportService {
    pub fn new(state: Arc<AppState>, scope: ExportScope) -> Self {
        Self { state, scope }
    }

    fn authorize(&self, actor: &AuthenticatedUser) -> Result<(), ServiceError> {
        actor.ensure_role(&[self.scope.role()])
    }

    /// The unit's approved planned projects for the year, then its
    /// unplanned bucket in its own section.
    pub async fn tracking(
        &self,
        actor: &AuthenticatedUser,
        query: TrackingQuery,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let unit = sqlx::query_as::<_, Unit>("SELECT id, name, active, created_at FROM units WHERE id = $1")
            .bind(query.unit_id)
            .fetch_optional(&self.state.pool)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let objective = match query.strategic_objective_id {
            Some(id) => Some(
                sqlx::query_scalar::<_, String>(
                    "SELECT description FROM strategic_objectives WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.state.pool)
                .await?
                .ok_or(ServiceError::NotFound)?,
            ),
            None => None,
        };
        let filter = ProjectFilter {
            unit_id: Some(unit.id),
            year: Some(query.year),
            state: Some(ProjectState::Approved),
            ..ProjectFilter::default()
        };
        let (unplanned, planned): (Vec<ProjectSnapshot>, Vec<ProjectSnapshot>) =
            snapshots::load_snapshots(&self.state.pool, &filter)
                .await?
                .into_iter()
                .partition(|snapshot| snapshot.project.is_unplanned);

        let generated_at = Utc::now();
        let layout = build_tracking_layout(&TrackingInput {
            unit_name: &unit.name,
            year: query.year,
            strategic_objective: objective.as_deref(),
            planned: &planned,
            unplanned: unplanned.first(),
        });
        let bytes = xlsx::tracking_workbook(&layout, generated_at)?;
        let artifact = ExportArtifact {
            filename: reporting::tracking_filename(&unit.name, query.year),
            format: ExportFormat::Xlsx,
            bytes,
        };
        self.log_export(
            actor,
            "units",
            Some(unit.id),
            json!({
                "export": "tracking",
                "year": query.year,
                "projects": planned.len(),
                "unplanned_projects": unplanned.len(),
                "rows": layout.rows.len(),
            }),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn project_detail(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
        format: ExportFormat,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let snapshot = snapshots::load_snapshot(&self.state.pool, project_id).await?;
        access::ensure_can_view(actor, &snapshot.project)?;
        let generated_at = Utc::now();
        let report = builders::project_detail(&snapshot, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::project_detail_filename(
                &snapshot.unit_name,
                snapshot.project.year,
                generated_at,
                format,
            ),
            format,
            bytes: emit(&report, format)?,
        };
        self.log_export(
            actor,
            "projects",
            Some(project_id),
            json!({
                "export": "project_detail",
                "goals": snapshot.goal_count(),
                "activities": snapshot.activity_count(),
                "evidence": snapshot.evidence_count(),
            }),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn units(
        &self,
        actor: &AuthenticatedUser,
        format: ExportFormat,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let units = self.unit_performance().await?;
        let generated_at = Utc::now();
        let report = builders::unit_roster(&units, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::units_filename(generated_at, format),
            format,
            bytes: emit(&report, format)?,
        };
        self.log_export(
            actor,
            "units",
            None,
            json!({"export": "units", "units": units.len()}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn quarterly(
        &self,
        actor: &AuthenticatedUser,
        query: QuarterlyQuery,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let units = self.unit_performance().await?;
        let generated_at = Utc::now();
        let search = query.search.as_deref();
        let report = builders::quarterly(&units, search, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::quarterly_filename(generated_at, query.format),
            format: query.format,
            bytes: emit(&report, query.format)?,
        };
        self.log_export(
            actor,
            "units",
            None,
            json!({"export": "quarterly", "units": units.len(), "search": search}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn consolidated(
        &self,
        actor: &AuthenticatedUser,
        format: ExportFormat,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let projects = snapshots::load_snapshots(&self.state.pool, &ProjectFilter::default()).await?;
        let generated_at = Utc::now();
        let report = builders::consolidated(&projects, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::consolidated_filename(generated_at, format),
            format,
            bytes: emit(&report, format)?,
        };
        self.log_export(
            actor,
            "projects",
            None,
            json!({"export": "consolidated", "projects": projects.len()}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    /// The newest `limit` audit entries.
    pub async fn audit_log(
        &self,
        actor: &AuthenticatedUser,
        query: AuditExportQuery,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let records = audit::recent(&self.state.pool, query.limit).await?;
        let generated_at = Utc::now();
        let report = builders::audit_log(&records, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::audit_log_filename(generated_at, query.format),
            format: query.format,
            bytes: emit(&report, query.format)?,
        };
        self.log_export(
            actor,
            "audit_log",
            None,
            json!({"export": "audit_log", "entries": records.len()}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn users(
        &self,
        actor: &AuthenticatedUser,
        format: ExportFormat,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let users = sqlx::query_as::<_, UserRecord>(
            "SELECT u.id, u.email, u.role, u.unit_id, u.created_at, un.name AS unit_name
             FROM users u
             LEFT JOIN units un ON un.id = u.unit_id
             ORDER BY u.role, u.email",
        )
        .fetch_all(&self.state.pool)
        .await?;
        let generated_at = Utc::now();
        let report = builders::user_roster(&users, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::users_filename(generated_at, format),
            format,
            bytes: emit(&report, format)?,
        };
        self.log_export(
            actor,
            "users",
            None,
            json!({"export": "users", "users": users.len()}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    pub async fn statistics(
        &self,
        actor: &AuthenticatedUser,
        format: ExportFormat,
        origin: Option<String>,
    ) -> Result<ExportArtifact, ServiceError> {
        self.authorize(actor)?;
        let projects = snapshots::load_snapshots(&self.state.pool, &ProjectFilter::default()).await?;
        let units = self.unit_performance().await?;
        let generated_at = Utc::now();
        let report =
            builders::statistics_report(&projects, &units, &self.state.config.reports, generated_at);
        let artifact = ExportArtifact {
            filename: reporting::statistics_filename(generated_at, format),
            format,
            bytes: emit(&report, format)?,
        };
        self.log_export(
            actor,
            "projects",
            None,
            json!({"export": "statistics", "projects": projects.len(), "units": units.len()}),
            &artifact,
            origin,
        )
        .await?;
        Ok(artifact)
    }

    /// Every unit with its project counts and the rollup over its approved
    /// planned projects.
    async fn unit_performance(&self) -> Result<Vec<UnitPerformance>, ServiceError> {
        let counts = sqlx::query_as::<_, UnitCounts>(
            "SELECT u.id, u.name, u.active, u.created_at,
                    COUNT(p.id) AS total_projects,
                    COUNT(p.id) FILTER (WHERE p.state = 'approved') AS approved_projects
             FROM units u
             LEFT JOIN projects p ON p.unit_id = u.id
             GROUP BY u.id
             ORDER BY u.name",
        )
        .fetch_all(&self.state.pool)
        .await?;
        let approved = snapshots::load_snapshots(&self.state.pool, &ProjectFilter::approved()).await?;
        Ok(rank_units(counts, approved))
    }

    async fn log_export(
        &self,
        actor: &AuthenticatedUser,
        table_name: &'static str,
        record_id: Option<Uuid>,
        mut details: serde_json::Value,
        artifact: &ExportArtifact,
        origin: Option<String>,
    ) -> Result<(), ServiceError> {
        if let Some(map) = details.as_object_mut() {
            map.insert("format".into(), json!(artifact.format));
            map.insert("filename".into(), json!(artifact.filename));
            map.insert("bytes".into(), json!(artifact.bytes.len()));
        }
        let mut conn = self
            .state
            .pool
            .acquire()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        audit::record(
            &mut conn,
            AuditDraft {
                actor_id: actor.user_id,
                action: AuditAction::Export,
                table_name,
                record_id,
                before: None,
                after: Some(details),
                origin,
            },
        )
        .await?;
        info!(
            actor = %actor.user_id,
            kind = table_name,
            filename = %artifact.filename,
            bytes = artifact.bytes.len(),
            "export generated"
        );
        Ok(())
    }
}

fn rank_units(counts: Vec<UnitCounts>, approved: Vec<ProjectSnapshot>) -> Vec<UnitPerformance> {
    let mut by_unit: HashMap<Uuid, Vec<ProjectSnapshot>> = HashMap::new();
    for snapshot in approved {
        by_unit.entry(snapshot.project.unit_id).or_default().push(snapshot);
    }
    counts
        .into_iter()
        .map(|row| {
            let projects = by_unit.remove(&row.unit.id).unwrap_or_default();
            UnitPerformance::new(row.unit, row.total_projects, row.approved_projects, &projects)
        })
        .collect()
}

pub fn emit(report: &ReportDocument, format: ExportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ExportFormat::Pdf => pdf::render(report),
        ExportFormat::Xlsx => xlsx::sheets_workbook(report),
    }
}
