//! HTTP surface for the generation endpoint.
//!
//! Every route delegates to [`GenerationEndpoint`]; this module only moves
//! requests and responses across the actix boundary.
//!
//! # Endpoints
//!
//! | Method            | Path                                | Description            |
//! |-------------------|-------------------------------------|------------------------|
//! | GET/POST/OPTIONS  | `/api/image`                        | Health probe, generate |
//! | GET/POST/OPTIONS  | `/.netlify/functions/image-gen`     | Same handler           |
//! | GET/POST/OPTIONS  | `/.netlify/functions/openai-image`  | Same handler           |
//! | GET/POST/OPTIONS  | `/.netlify/functions/img-gen`       | Same handler           |
//! | GET/OPTIONS       | `/api/key-check`                    | Key diagnostics        |
//! | GET/OPTIONS       | `/.netlify/functions/key-check`     | Same handler           |
//! | GET               | `/api/hello`                        | Liveness               |

use actix_web::{
    http::StatusCode,
    web::{self, Bytes},
    App, HttpRequest, HttpResponse, HttpServer,
};

use crate::{
    config::Config,
    discovery::DEFAULT_CANDIDATES,
    endpoint::{EndpointResponse, GenerationEndpoint},
    error::{Result, StudioError},
    models::HelloReport,
    provider::ProviderClient,
};

pub const KEY_CHECK_PATHS: [&str; 2] = ["/api/key-check", "/.netlify/functions/key-check"];
pub const HELLO_PATH: &str = "/api/hello";

fn into_http(response: EndpointResponse) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &response.headers {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    builder.body(response.body)
}

async fn generate(req: HttpRequest, body: Bytes, endpoint: web::Data<GenerationEndpoint>) -> HttpResponse {
    into_http(endpoint.handle(req.method().as_str(), &body).await)
}

async fn key_check(req: HttpRequest, endpoint: web::Data<GenerationEndpoint>) -> HttpResponse {
    into_http(endpoint.handle_key_check(req.method().as_str()).await)
}

async fn hello() -> HttpResponse {
    HttpResponse::Ok().json(HelloReport {
        ok: true,
        msg: "Functions are working.".to_string(),
    })
}

/// Mounts every route on an actix app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    for path in DEFAULT_CANDIDATES {
        cfg.service(web::resource(path).to(generate));
    }
    for path in KEY_CHECK_PATHS {
        cfg.service(web::resource(path).to(key_check));
    }
    cfg.service(web::resource(HELLO_PATH).route(web::get().to(hello)));
}

/// Serves until the process is stopped.
pub async fn run(config: Config) -> Result<()> {
    let provider = ProviderClient::new(config.provider.clone(), config.retry.clone())?;
    if !provider.has_key() {
        log::warn!("OPENAI_API_KEY is not set; generation requests will answer 500");
    }
    let endpoint = web::Data::new(GenerationEndpoint::new(provider));
    let bind = (config.server.host.clone(), config.server.port);

    log::info!("Listening on http://{}:{}", bind.0, bind.1);
    HttpServer::new(move || App::new().app_data(endpoint.clone()).configure(configure))
        .bind(bind)
        .map_err(|e| StudioError::ConfigError(format!("Cannot bind server: {}", e)))?
        .run()
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::models::{HealthReport, KeyCheckReport};
    use crate::provider::image_client::tests::{fast_retry, inline_png_body, ScriptedTransport};
    use actix_web::{http::Method, test};
    use std::sync::Arc;

    fn endpoint(transport: Arc<ScriptedTransport>, key: Option<&str>) -> web::Data<GenerationEndpoint> {
        let mut provider = ProviderConfig::new();
        if let Some(key) = key {
            provider = provider.with_api_key(key);
        }
        web::Data::new(GenerationEndpoint::new(ProviderClient::with_transport(
            transport,
            provider,
            fast_retry(),
        )))
    }

    #[actix_web::test]
    async fn every_generation_path_shares_the_handler() {
        let transport = Arc::new(ScriptedTransport::always(200, &inline_png_body(b"\x89PNG")));
        let app = test::init_service(
            App::new()
                .app_data(endpoint(transport.clone(), Some("sk-test")))
                .configure(configure),
        )
        .await;

        for path in DEFAULT_CANDIDATES {
            let req = test::TestRequest::post()
                .uri(path)
                .set_payload(r#"{"prompt":"neon skyline"}"#)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", path);
            assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
            assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
            assert!(resp.headers().contains_key("x-elapsed"));
            let body = test::read_body(resp).await;
            assert_eq!(&body[..], b"\x89PNG");
        }
        assert_eq!(transport.call_count(), DEFAULT_CANDIDATES.len());
    }

    #[actix_web::test]
    async fn preflight_health_and_method_checks() {
        let transport = Arc::new(ScriptedTransport::always(500, ""));
        let app = test::init_service(
            App::new()
                .app_data(endpoint(transport.clone(), None))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/image")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers().get("access-control-allow-methods").unwrap(),
            "GET,POST,OPTIONS"
        );

        let req = test::TestRequest::get().uri("/.netlify/functions/img-gen").to_request();
        let report: HealthReport = test::call_and_read_body_json(&app, req).await;
        assert!(report.ok);
        assert!(!report.has_key);

        let req = test::TestRequest::put().uri("/api/image").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let req = test::TestRequest::post().uri("/api/image").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"Missing OPENAI_API_KEY env var");

        assert_eq!(transport.call_count(), 0);
    }

    #[actix_web::test]
    async fn key_check_without_key_reports_reason() {
        let transport = Arc::new(ScriptedTransport::always(200, "{}"));
        let app = test::init_service(
            App::new()
                .app_data(endpoint(transport.clone(), None))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/key-check").to_request();
        let report: KeyCheckReport = test::call_and_read_body_json(&app, req).await;
        assert!(!report.ok);
        assert!(!report.has_key);
        assert!(report.reason.is_some());
        assert_eq!(transport.call_count(), 0);
    }

    #[actix_web::test]
    async fn hello_answers() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri(HELLO_PATH).to_request();
        let report: HelloReport = test::call_and_read_body_json(&app, req).await;
        assert!(report.ok);
        assert_eq!(report.msg, "Functions are working.");
    }
}
