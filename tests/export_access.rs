use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use poa_tracker::domain::models::Role;
use sqlx::PgPool;


use test_harness::{run_test, TestApp};

fn get(uri: &str, token: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?)
}

#[tokio::test]
async fn exports_are_scoped_by_role() -> Result<()> {
    run_test(export_scenario).await
}

async fn export_scenario(pool: PgPool) -> Result<()> {
    let app = TestApp::new(pool)?;
    let unit_id = app.unit("Public Works").await?;
    let unit = app.user(Role::Unit, Some(unit_id)).await?;
    let admin = app.user(Role::Admin, None).await?;
    let auditor = app.user(Role::Auditor, None).await?;
    app.approved_project(&unit, &admin, 2025).await?;

    let tracking = format!("/api/admin/exports/tracking?unit_id={unit_id}&year=2025");
    let request = Request::builder().uri(&tracking).body(Body::empty())?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(get(&tracking, &unit)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(get(&tracking, &auditor)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = tower::ServiceExt::oneshot(app.router.clone(), get(&tracking, &admin)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str()?.to_string();
    assert!(disposition.starts_with("attachment; filename=\"POA_Public_Works_"));
    assert!(disposition.ends_with("_2025.xlsx\""));

    let (status, bytes) = app
        .send(get("/api/auditor/exports/units?format=pdf", &auditor)?)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"%PDF"));

    let (status, _) = app.send(get("/api/auditor/exports/units", &admin)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(get("/api/admin/audit-log", &admin)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json("GET", "/api/auditor/audit-log?limit=5000", &auditor, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().map(Vec::len).unwrap_or_default();
    assert!(entries >= 1 && entries <= 1000);

    let exports: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_log a JOIN users u ON u.id = a.actor_id
         WHERE a.action = 'EXPORT' AND u.role = 'admin' AND a.after_state->>'export' = 'tracking'
           AND a.after_state->>'filename' LIKE '%_2025.xlsx'",
    )
    .fetch_one(&app.pool)
    .await?;
    assert!(exports >= 1);

    Ok(())
}

#[tokio::test]
async fn roster_statistics_and_audit_exports_cover_both_formats() -> Result<()> {
    run_test(roster_scenario).await
}

async fn roster_scenario(pool: PgPool) -> Result<()> {
    let app = TestApp::new(pool)?;
    let unit_id = app.unit("Culture").await?;
    let unit = app.user(Role::Unit, Some(unit_id)).await?;
    let admin = app.user(Role::Admin, None).await?;
    let auditor = app.user(Role::Auditor, None).await?;
    app.approved_project(&unit, &admin, 2025).await?;

    for (scope, token) in [("admin", &admin), ("auditor", &auditor)] {
        for export in ["users", "statistics", "audit-log"] {
            let (status, bytes) = app
                .send(get(&format!("/api/{scope}/exports/{export}?format=pdf"), token)?)
                .await?;
            assert_eq!(status, StatusCode::OK, "{scope} {export} pdf");
            assert!(bytes.starts_with(b"%PDF"));

            let (status, bytes) = app
                .send(get(&format!("/api/{scope}/exports/{export}?format=xlsx"), token)?)
                .await?;
            assert_eq!(status, StatusCode::OK, "{scope} {export} xlsx");
            assert_eq!(&bytes[..2], b"PK");
        }
    }

    for export in ["users", "statistics", "audit-log"] {
        let (status, _) = app
            .send(get(&format!("/api/admin/exports/{export}"), &unit)?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app
            .send(get(&format!("/api/auditor/exports/{export}"), &admin)?)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        get("/api/auditor/exports/users?format=pdf", &auditor)?,
    )
    .await?;
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str()?.to_string();
    assert!(disposition.starts_with("attachment; filename=\"Users_Report_"));
    assert!(disposition.ends_with(".pdf\""));

    for (export, role) in [("users", "auditor"), ("statistics", "admin"), ("audit_log", "admin")] {
        let logged: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log a JOIN users u ON u.id = a.actor_id
             WHERE a.action = 'EXPORT' AND u.role = $1 AND a.after_state->>'export' = $2
               AND a.after_state->>'format' = 'pdf'",
        )
        .bind(role)
        .bind(export)
        .fetch_one(&app.pool)
        .await?;
        assert!(logged >= 1, "{export} by {role}");
    }

    Ok(())
}
