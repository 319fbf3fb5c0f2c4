use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use poa_tracker::domain::models::Role;
use serde_json::Value;
use sqlx::PgPool;


use test_harness::{run_test, TestApp};

const BOUNDARY: &str = "poa-boundary-7MA4YWxkTrZu0gW";

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, token: &str, body: Vec<u8>) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?)
}

#[tokio::test]
async fn evidence_uploads_enforce_limits() -> Result<()> {
    run_test(upload_scenario).await
}

async fn upload_scenario(pool: PgPool) -> Result<()> {
    let app = TestApp::new(pool)?;
    let unit_id = app.unit("Environment").await?;
    let unit = app.user(Role::Unit, Some(unit_id)).await?;
    let admin = app.user(Role::Admin, None).await?;
    let (_, activity_id) = app.approved_project(&unit, &admin, 2025).await?;
    let uri = format!("/api/activities/{activity_id}/evidence");

    let oversized = vec![0u8; 31 * 1024 * 1024];
    let request = upload_request(
        &uri,
        &unit,
        multipart_body(&[("kind", "document")], Some(("minutes.pdf", &oversized))),
    )?;
    let (status, bytes) = app.send(request).await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(
        body["error"],
        "upload rejected: file exceeds the maximum size of 30 MB"
    );

    let request = upload_request(
        &uri,
        &unit,
        multipart_body(&[("kind", "document")], Some(("payload.exe", b"MZ"))),
    )?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listed) = app.json("GET", &uri, &unit, None).await?;
    assert_eq!(listed["evidence"].as_array().map(Vec::len), Some(0));

    let request = upload_request(
        &uri,
        &unit,
        multipart_body(
            &[("kind", "document"), ("month", "3"), ("description", "Signed attendance list")],
            Some(("attendance.pdf", b"%PDF-1.4 attendance")),
        ),
    )?;
    let (status, bytes) = app.send(request).await?;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["evidence"]["file_name"], "attendance.pdf");
    assert_eq!(body["evidence"]["month"], 3);
    let evidence_id = body["evidence"]["id"].as_str().unwrap_or_default().to_string();
    assert_eq!(
        body["evidence"]["download_url"],
        format!("/api/evidence/{evidence_id}/file")
    );

    let request = upload_request(
        &uri,
        &unit,
        multipart_body(&[("kind", "url"), ("url", "https://example.org/gallery")], None),
    )?;
    let (status, bytes) = app.send(request).await?;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["evidence"]["download_url"], "https://example.org/gallery");

    let (status, listed) = app.json("GET", &uri, &unit, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["evidence"].as_array().map(Vec::len), Some(2));

    Ok(())
}

fn get(uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

#[tokio::test]
async fn evidence_files_are_served_to_viewers_only() -> Result<()> {
    run_test(download_scenario).await
}

async fn download_scenario(pool: PgPool) -> Result<()> {
    let app = TestApp::new(pool)?;
    let owner_unit = app.unit("Mobility").await?;
    let other_unit = app.unit("Sports").await?;
    let owner = app.user(Role::Unit, Some(owner_unit)).await?;
    let outsider = app.user(Role::Unit, Some(other_unit)).await?;
    let admin = app.user(Role::Admin, None).await?;
    let auditor = app.user(Role::Auditor, None).await?;
    let (_, activity_id) = app.approved_project(&owner, &admin, 2025).await?;
    let uri = format!("/api/activities/{activity_id}/evidence");

    let request = upload_request(
        &uri,
        &owner,
        multipart_body(
            &[("kind", "photo"), ("month", "4"), ("description", "Bike lane")],
            Some(("bike lane.jpg", b"\xFF\xD8\xFF jpeg")),
        ),
    )?;
    let (status, bytes) = app.send(request).await?;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes)?;
    let file_uri = body["evidence"]["download_url"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(file_uri.ends_with("/file"));

    let response = tower::ServiceExt::oneshot(app.router.clone(), get(&file_uri, Some(&owner))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"bike_lane.jpg\""
    );

    let (status, bytes) = app.send(get(&file_uri, Some(&owner))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"\xFF\xD8\xFF jpeg");

    for token in [&admin, &auditor] {
        let (status, _) = app.send(get(&file_uri, Some(token))?).await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app.send(get(&file_uri, Some(&outsider))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(get(&file_uri, None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = upload_request(
        &uri,
        &owner,
        multipart_body(&[("kind", "url"), ("url", "https://example.org/route")], None),
    )?;
    let (_, bytes) = app.send(request).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    let link_id = body["evidence"]["id"].as_str().unwrap_or_default().to_string();
    let (status, _) = app
        .send(get(&format!("/api/evidence/{link_id}/file"), Some(&owner))?)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
