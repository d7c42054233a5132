use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::web::{self, Data, Json, JsonConfig, Path};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::Context;
use cinder_shared::{PasteContents, PasteCreated, SubmitPasteRequest};
use cinder_srv::config::{ServerConfig, StoreKind};
use cinder_srv::errors::ServerError;
use cinder_srv::service::PasteService;
use cinder_srv::store::{EphemeralStore, MemoryStore, RedisStore};
use cinder_srv::ttl::format_validity;
use log::{LevelFilter, error, info, warn};
use std::sync::Arc;

/// Shared across workers. The key never goes in here.
struct AppState {
    service: PasteService,
    base_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    pretty_env_logger::formatted_timed_builder()
        .format_timestamp_millis()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let config = ServerConfig::from_env();
    info!("Initializing with {:?} store", config.store);

    let store: Arc<dyn EphemeralStore> = match config.store {
        StoreKind::Memory => {
            let store = MemoryStore::new();
            store.spawn_sweeper(config.sweep_interval);
            Arc::new(store)
        }
        StoreKind::Redis => Arc::new(
            RedisStore::connect(&config.redis_url, config.service.store_timeout)
                .await
                .context("Error initializing storage")?,
        ),
    };

    let state = Data::new(AppState {
        service: PasteService::new(store, config.service.clone()),
        base_path: config.base_path.clone(),
    });
    let max_size = config.max_size;

    info!("Webserver is starting on {}:{}", config.address, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config(max_size))
            .configure(|cfg| routes(cfg, &state.base_path))
    })
    .bind((config.address.as_str(), config.port))
    .context("Error binding webserver")?
    .run()
    .await?;

    info!("Goodbye!");
    Ok(())
}

/// Bodies over `max_size` get a 413, other malformed JSON a 400.
fn json_config(max_size: usize) -> JsonConfig {
    JsonConfig::default()
        .limit(max_size)
        .error_handler(|err, _| {
            let response = match &err {
                JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                    HttpResponse::PayloadTooLarge().body("Payload too large")
                }
                _ => HttpResponse::BadRequest().body(err.to_string()),
            };
            InternalError::from_response(err, response).into()
        })
}

fn routes(cfg: &mut web::ServiceConfig, base_path: &str) {
    cfg.service(
        web::scope(base_path)
            .route("/ping", web::get().to(heartbeat))
            .route("/paste/submit", web::post().to(submit_paste))
            .route("/paste/{id}/{key}", web::get().to(get_paste)),
    );
}

async fn heartbeat() -> HttpResponse {
    HttpResponse::Ok().body(".")
}

async fn submit_paste(
    req: HttpRequest,
    state: Data<AppState>,
    payload: Json<SubmitPasteRequest>,
) -> HttpResponse {
    if let Err(e) = state.service.ping().await {
        return server_error_to_response(e);
    }

    let payload = payload.into_inner();
    let validity = payload.validity.as_deref();

    match state.service.submit(&payload.paste, validity).await {
        Ok(sub) => {
            let info = req.connection_info();
            let url = format!(
                "{}://{}{}/paste/{}/{}",
                info.scheme(),
                info.host(),
                state.base_path,
                sub.id,
                sub.key
            );
            HttpResponse::Ok().json(PasteCreated {
                validity: format_validity(sub.ttl),
                ttl_secs: sub.ttl.as_secs(),
                expires_at: sub.expires_at,
                id: sub.id,
                key: sub.key,
                url,
            })
        }
        Err(e) => server_error_to_response(e),
    }
}

async fn get_paste(path: Path<(String, String)>, state: Data<AppState>) -> HttpResponse {
    if let Err(e) = state.service.ping().await {
        return server_error_to_response(e);
    }

    let (id, key) = path.into_inner();
    info!("Getting paste with id: {id}");

    state
        .service
        .retrieve(&id, &key)
        .await
        .map_or_else(server_error_to_response, |paste| {
            HttpResponse::Ok().json(PasteContents { paste })
        })
}

fn server_error_to_response(e: ServerError) -> HttpResponse {
    if e.is_unavailable_paste() {
        return HttpResponse::NotFound().body("paste unavailable");
    }

    match e {
        ServerError::BackendUnavailable(e) => {
            warn!("Storage unavailable: {e}");
            HttpResponse::ServiceUnavailable().body("storage service is unavailable")
        }
        e => {
            error!("Internal error: {e}");
            HttpResponse::InternalServerError().body("internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use cinder_srv::config::ServiceConfig;
    use cinder_srv::errors::StoreError;
    use std::time::Duration;

    struct DownStore;

    #[async_trait::async_trait]
    impl EphemeralStore for DownStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::BackendUnavailable("down".into()))
        }
        async fn put_ex(&self, _: &str, _: Vec<u8>, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::BackendUnavailable("down".into()))
        }
        async fn get(&self, _: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::BackendUnavailable("down".into()))
        }
        async fn del(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::BackendUnavailable("down".into()))
        }
        async fn take(&self, _: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::BackendUnavailable("down".into()))
        }
    }

    fn state(store: Arc<dyn EphemeralStore>, base_path: &str) -> Data<AppState> {
        Data::new(AppState {
            service: PasteService::new(store, ServiceConfig::default()),
            base_path: base_path.to_string(),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            app!($state, cinder_srv::config::MAX_SIZE)
        };
        ($state:expr, $max_size:expr) => {{
            let state = $state;
            let base_path = state.base_path.clone();
            test::init_service(
                App::new()
                    .app_data(state)
                    .app_data(json_config($max_size))
                    .configure(move |cfg| routes(cfg, &base_path)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn submit_then_read_once() {
        let app = app!(state(Arc::new(MemoryStore::new()), ""));

        let req = test::TestRequest::post()
            .uri("/paste/submit")
            .set_json(SubmitPasteRequest {
                paste: "hello world".into(),
                validity: Some("15m".into()),
            })
            .to_request();
        let created: PasteCreated = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.ttl_secs, 900);
        assert_eq!(created.validity, "15m");
        assert!(created.url.ends_with(&format!("/paste/{}/{}", created.id, created.key)));

        let uri = format!("/paste/{}/{}", created.id, created.key);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let contents: PasteContents = test::call_and_read_body_json(&app, req).await;
        assert_eq!(contents.paste, "hello world");

        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn wrong_key_and_unknown_id_look_the_same() {
        let app = app!(state(Arc::new(MemoryStore::new()), "/burn"));

        let req = test::TestRequest::post()
            .uri("/burn/paste/submit")
            .set_json(SubmitPasteRequest {
                paste: "secret".into(),
                validity: Some("banana".into()),
            })
            .to_request();
        let created: PasteCreated = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created.ttl_secs, 15 * 60);

        let wrong = format!("/burn/paste/{}/{}", created.id, "ab".repeat(32));
        let resp = test::call_service(&app, test::TestRequest::get().uri(&wrong).to_request()).await;
        assert_eq!(resp.status(), 404);
        let wrong_body = test::read_body(resp).await;

        let unknown = format!("/burn/paste/{}/{}", "0".repeat(32), created.key);
        let resp =
            test::call_service(&app, test::TestRequest::get().uri(&unknown).to_request()).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(test::read_body(resp).await, wrong_body);
    }

    #[actix_web::test]
    async fn oversized_body_is_rejected() {
        let store = MemoryStore::new();
        let app = app!(state(Arc::new(store.clone()), ""), 64);

        let req = test::TestRequest::post()
            .uri("/paste/submit")
            .set_json(SubmitPasteRequest {
                paste: "x".repeat(128),
                validity: None,
            })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 413);
        assert!(store.is_empty().unwrap());

        let req = test::TestRequest::post()
            .uri("/paste/submit")
            .set_json(SubmitPasteRequest {
                paste: "x".into(),
                validity: None,
            })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    #[actix_web::test]
    async fn malformed_body_is_bad_request() {
        let app = app!(state(Arc::new(MemoryStore::new()), ""));
        let req = test::TestRequest::post()
            .uri("/paste/submit")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn dead_backend_is_service_unavailable() {
        let app = app!(state(Arc::new(DownStore), ""));

        let req = test::TestRequest::post()
            .uri("/paste/submit")
            .set_json(SubmitPasteRequest {
                paste: "x".into(),
                validity: None,
            })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);

        let uri = format!("/paste/{}/{}", "0".repeat(32), "0".repeat(64));
        let req = test::TestRequest::get().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);

        let req = test::TestRequest::get().uri("/ping").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
