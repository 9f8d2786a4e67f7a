use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::archive::ZIP_MIME;
use crate::manifest::format_timestamp;
use crate::settings;

use super::models::{HealthResponse, ServiceInfo};
use super::process::{ServerError, content_disposition, process_upload, read_upload};
use super::state::ServerState;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let body_limit = settings.max_upload_bytes();
    let state = Arc::new(ServerState { settings });
    let app = router(state, body_limit);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    tracing::info!(%addr, "letter extractor listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<ServerState>, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/process", post(process))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn index() -> Json<ServiceInfo> {
    let endpoints = BTreeMap::from([
        ("/health", "GET - server liveness check"),
        ("/process", "POST - extract annotated letters into a zip archive"),
    ]);
    Json(ServiceInfo {
        message: "Ancient Alphabet Extractor API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Fast, pixel-exact extraction of ancient alphabet letters",
        endpoints,
    })
}

async fn health() -> impl IntoResponse {
    match format_timestamp(OffsetDateTime::now_utc()) {
        Ok(timestamp) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                timestamp,
            }),
        )
            .into_response(),
        Err(err) => ServerError::internal(err).into_response(),
    }
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static("content-disposition"),
    );
}

async fn process(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Result<Response<Body>, ServerError> {
    let upload = read_upload(&mut multipart).await?;
    let options = state.settings.extraction.clone();
    let output = tokio::task::spawn_blocking(move || process_upload(&options, upload))
        .await
        .map_err(|err| ServerError::internal(format!("extraction task failed: {}", err)))??;

    tracing::info!(
        archive = %output.archive_name,
        letters = output.manifest.extracted_letters.len(),
        skipped = output.skipped.len(),
        "sending archive"
    );
    let disposition = HeaderValue::from_str(&content_disposition(&output.archive_name))
        .map_err(ServerError::internal)?;
    let mut response = Response::new(Body::from(output.archive));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ZIP_MIME));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let Json(info) = index().await;
        assert!(info.endpoints.contains_key("/process"));
        assert!(info.endpoints.contains_key("/health"));
        let value = serde_json::to_value(&info).expect("json");
        assert_eq!(value["message"], "Ancient Alphabet Extractor API");
    }

    async fn spawn_app() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = Arc::new(ServerState {
            settings: settings::Settings::default(),
        });
        let app = router(state, 8 * 1024 * 1024);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{}", addr)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([12, 34, 56]));
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .expect("png");
        buffer.into_inner()
    }

    fn image_part(filename: Option<&str>) -> reqwest::multipart::Part {
        let part = reqwest::multipart::Part::bytes(png_bytes(40, 40));
        match filename {
            Some(name) => part.file_name(name.to_string()),
            None => part,
        }
    }

    fn descriptor() -> String {
        serde_json::json!({
            "imageInfo": {"width": 40, "height": 40},
            "alphabetType": "greek",
            "namePrefix": "set",
            "letters": [
                {"name": "Alpha", "coordinates": {"x": 0, "y": 0, "width": 10, "height": 10}},
                {"name": "Beta", "coordinates": {"x": 20, "y": 20, "width": 10, "height": 10}}
            ]
        })
        .to_string()
    }

    async fn post(base: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/process", base))
            .multipart(form)
            .send()
            .await
            .expect("send")
    }

    #[tokio::test]
    async fn process_returns_zip_attachment() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .part("image", image_part(Some("Tablet Scan.png")))
            .text("regions", descriptor());
        let response = post(&base, form).await;

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE.as_str()], "application/zip");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION.as_str()],
            "attachment; filename=\"set_tablet_scan_greek.zip\""
        );
        assert_eq!(headers["access-control-allow-origin"], "*");

        let body = response.bytes().await.expect("body");
        let mut archive =
            zip::ZipArchive::new(std::io::Cursor::new(body.to_vec())).expect("zip");
        let names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"Alpha.png".to_string()));
        assert!(names.contains(&"Beta.png".to_string()));
        assert!(names.contains(&"set_tablet_scan_greek.json".to_string()));
        assert!(archive.by_name("Alpha.png").is_ok());
    }

    #[tokio::test]
    async fn letters_field_is_accepted_for_regions() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .part("image", image_part(Some("tablet.png")))
            .text("letters", descriptor());
        let response = post(&base, form).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE.as_str()],
            "application/zip"
        );
    }

    #[tokio::test]
    async fn missing_regions_is_a_json_bad_request() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new().part("image", image_part(Some("tablet.png")));
        let response = post(&base, form).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("json");
        assert_eq!(body, serde_json::json!({"error": "no letter data was sent"}));
    }

    #[tokio::test]
    async fn image_without_filename_is_rejected() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .part("image", image_part(None))
            .text("regions", descriptor());
        let response = post(&base, form).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("json");
        assert_eq!(body["error"], "no image was selected");
    }

    #[tokio::test]
    async fn malformed_descriptor_reports_details() {
        let base = spawn_app().await;
        let form = reqwest::multipart::Form::new()
            .part("image", image_part(Some("tablet.png")))
            .text("regions", "{not json".to_string());
        let response = post(&base, form).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("json");
        assert_eq!(body["error"], "invalid letter data");
        assert!(body["details"].is_string());
    }

    #[test]
    fn cors_headers_are_permissive() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET,POST,OPTIONS");
    }
}
