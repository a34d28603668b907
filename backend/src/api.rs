use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{
    http::{header, StatusCode},
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer, ResponseError,
};
use chrono::Utc;
use common::req::{ErrorResponse, SaveDataResponse};

use crate::config::Config;
use crate::db::Storage;
use crate::measurement::{EnvironmentalData, InvalidData};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid data: {0}")]
    InvalidData(#[from] InvalidData),
    #[error("malformed JSON body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidData(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::InvalidData(_) | ApiError::MalformedBody(_) => ErrorResponse::new("Invalid data"),
            ApiError::Storage(_) => ErrorResponse::new("Failed to save data"),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

async fn api_save_data<S>(
    body: web::Bytes,
    storage: web::Data<Arc<Mutex<S>>>,
) -> Result<HttpResponse, ApiError>
where
    S: Storage + Send + 'static,
{
    let result = save_data(&body, storage.get_ref().clone()).await;
    if let Err(err) = &result {
        match err {
            ApiError::Storage(_) => log::error!("Cannot save environmental data: {err:#}"),
            _ => log::warn!("Rejected environmental data: {err}"),
        }
    }
    result
}

async fn save_data<S>(body: &[u8], storage: Arc<Mutex<S>>) -> Result<HttpResponse, ApiError>
where
    S: Storage + Send + 'static,
{
    let payload: serde_json::Value = serde_json::from_slice(body)?;
    let data = EnvironmentalData::from_payload(&payload, Utc::now())?;

    // diesel is synchronous, keep the write off the worker thread
    web::block(move || {
        let mut storage = storage
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        storage.persist_environmental_data(&data)
    })
    .await
    .map_err(|err| anyhow::anyhow!("storage thread pool unavailable: {err}"))??;

    Ok(HttpResponse::Created().json(SaveDataResponse::saved()))
}

/// Registers the ingestion routes. Expects `Data<Arc<Mutex<S>>>` as app data.
pub fn configure<S>(cfg: &mut web::ServiceConfig)
where
    S: Storage + Send + 'static,
{
    cfg.service(web::resource("/api/data").route(web::post().to(api_save_data::<S>)));
}

fn cors(allowed_origin: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["POST"])
        .allowed_headers(vec![header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600);

    match allowed_origin {
        Some(origin) => cors.allowed_origin(origin),
        None => cors,
    }
}

pub async fn new_http_server<S>(storage: Arc<Mutex<S>>, config: &Config) -> std::io::Result<()>
where
    S: Storage + Send + 'static,
{
    let allowed_origin = config.cors_allowed_origin.clone();
    log::info!("Listening on {}:{}", config.bind_address, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(storage.clone()))
            .configure(configure::<S>)
            .wrap(cors(allowed_origin.as_deref()))
            .wrap(Logger::default())
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::RecordingStorage;
    use actix_web::{body::MessageBody, dev::ServiceResponse, test};
    use common::req::EnvironmentalReading;
    use serde_json::json;

    async fn post(storage: &Arc<Mutex<RecordingStorage>>, payload: String) -> ServiceResponse<impl MessageBody> {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(storage.clone()))
                .configure(configure::<RecordingStorage>),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/data")
            .insert_header(header::ContentType::json())
            .set_payload(payload)
            .to_request();
        test::call_service(&app, req).await
    }

    fn reading() -> EnvironmentalReading {
        EnvironmentalReading {
            temperature: 21.5,
            humidity: 40.0,
            pressure: 1013.25,
            co2: 415.0,
            created: "2024-03-01T11:59:00Z".to_string(),
        }
    }

    #[actix_web::test]
    async fn saves_valid_reading() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let payload = serde_json::to_string(&reading()).unwrap();

        let resp = post(&storage, payload).await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: SaveDataResponse = test::read_body_json(resp).await;
        assert_eq!(body.message, "Data saved successfully");

        let storage = storage.lock().unwrap();
        assert_eq!(storage.environmental.len(), 1);
        let saved = &storage.environmental[0];
        assert_eq!(saved.temperature, 21.5);
        assert_eq!(saved.humidity, 40.0);
        assert_eq!(saved.pressure, 1013.25);
        assert_eq!(saved.co2, 415.0);
        assert_eq!(saved.measured_at.to_rfc3339(), "2024-03-01T11:59:00+00:00");
    }

    #[actix_web::test]
    async fn saves_reading_with_minutes_only_timestamp() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let mut payload = serde_json::to_value(reading()).unwrap();
        payload["created"] = json!("2024-03-01T11:59Z");

        let resp = post(&storage, payload.to_string()).await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let storage = storage.lock().unwrap();
        assert_eq!(storage.environmental.len(), 1);
        assert_eq!(
            storage.environmental[0].measured_at.to_rfc3339(),
            "2024-03-01T11:59:00+00:00"
        );
    }

    #[actix_web::test]
    async fn write_runs_off_the_request_thread() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let payload = serde_json::to_string(&reading()).unwrap();

        let resp = post(&storage, payload).await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let storage = storage.lock().unwrap();
        assert_eq!(storage.writer_threads.len(), 1);
        assert_ne!(storage.writer_threads[0], std::thread::current().id());
    }

    #[actix_web::test]
    async fn repeated_readings_are_all_saved() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let payload = serde_json::to_string(&reading()).unwrap();

        for _ in 0..3 {
            let resp = post(&storage, payload.clone()).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        assert_eq!(storage.lock().unwrap().environmental.len(), 3);
    }

    #[actix_web::test]
    async fn coerces_numeric_strings() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let payload = json!({
            "temperature": "21.5", "humidity": "40", "pressure": 1013, "co2": "415ppm",
            "created": "2024-03-01 11:59:00"
        });

        let resp = post(&storage, payload.to_string()).await;

        assert_eq!(resp.status(), StatusCode::CREATED);
        let storage = storage.lock().unwrap();
        assert_eq!(storage.environmental[0].temperature, 21.5);
        assert_eq!(storage.environmental[0].co2, 415.0);
    }

    #[actix_web::test]
    async fn rejects_missing_keys_without_writing() {
        for key in ["temperature", "humidity", "pressure", "co2", "created"] {
            let storage = Arc::new(Mutex::new(RecordingStorage::default()));
            let mut payload = serde_json::to_value(reading()).unwrap();
            payload.as_object_mut().unwrap().remove(key);

            let resp = post(&storage, payload.to_string()).await;

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "without {key}");
            let body: ErrorResponse = test::read_body_json(resp).await;
            assert_eq!(body.error, "Invalid data");
            assert!(storage.lock().unwrap().environmental.is_empty());
        }
    }

    #[actix_web::test]
    async fn rejects_malformed_timestamp() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let mut payload = serde_json::to_value(reading()).unwrap();
        payload["created"] = json!("last tuesday");

        let resp = post(&storage, payload.to_string()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body, ErrorResponse::new("Invalid data"));
        assert!(storage.lock().unwrap().environmental.is_empty());
    }

    #[actix_web::test]
    async fn rejects_malformed_json() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));

        let resp = post(&storage, "{\"temperature\": ".to_string()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(storage.lock().unwrap().environmental.is_empty());
    }

    #[actix_web::test]
    async fn reports_storage_failure() {
        let storage = Arc::new(Mutex::new(RecordingStorage::failing()));
        let payload = serde_json::to_string(&reading()).unwrap();

        let resp = post(&storage, payload).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Failed to save data");
    }

    #[actix_web::test]
    async fn only_post_is_routed() {
        let storage = Arc::new(Mutex::new(RecordingStorage::default()));
        let app = test::init_service(
            App::new()
                .app_data(Data::new(storage.clone()))
                .configure(configure::<RecordingStorage>),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/data").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
