use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use paru_core::{pipeline::AppCore, schema::ErrorBody};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::services::ServeFile;

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
}

/// JSON endpoints + static pages. `/metrics` is mounted by `main`.
pub fn router(core: Arc<AppCore>) -> Router {
    let pages = core.cfg.pages_dir.clone();
    Router::new()
        .route_service("/", ServeFile::new(pages.join("index.html")))
        .route_service("/prediksi", ServeFile::new(pages.join("predic.html")))
        .route_service("/visualisasi", ServeFile::new(pages.join("visualisasi.html")))
        .route_service("/tentang", ServeFile::new(pages.join("tentang.html")))
        .route("/predict", post(predict))
        .route("/visualisasi-data", get(visualisasi_data))
        .route("/riwayat-prediksi", get(riwayat_prediksi))
        .route("/visualisasi-kategori/:kolom", get(visualisasi_kategori))
        .with_state(AppState { core })
}

// JSON endpoints always answer 200; success and failure differ only by body shape
fn reply<T: Serialize>(endpoint: &'static str, res: anyhow::Result<T>) -> Response {
    match res {
        Ok(v) => Json(v).into_response(),
        Err(e) => {
            let msg = format!("{e:#}");
            tracing::error!(endpoint, err = %msg, "request failed");
            metrics::counter!("request_error_total", "endpoint" => endpoint).increment(1);
            Json(ErrorBody::new(msg)).into_response()
        }
    }
}

/// Store/query work is blocking file I/O.
async fn blocking<T, F>(core: Arc<AppCore>, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AppCore) -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&core)).await?
}

async fn predict(State(st): State<AppState>, body: Bytes) -> Response {
    let res = match serde_json::from_slice::<Map<String, Value>>(&body) {
        Ok(obj) => blocking(st.core, move |core| core.predict(&obj)).await,
        Err(e) => Err(anyhow::anyhow!("invalid request body: {e}")),
    };
    reply("predict", res)
}

async fn visualisasi_data(State(st): State<AppState>) -> Response {
    reply(
        "visualisasi-data",
        blocking(st.core, |core| core.summary()).await,
    )
}

async fn riwayat_prediksi(State(st): State<AppState>) -> Response {
    reply(
        "riwayat-prediksi",
        blocking(st.core, |core| core.history()).await,
    )
}

async fn visualisasi_kategori(
    State(st): State<AppState>,
    Path(kolom): Path<String>,
) -> Response {
    reply(
        "visualisasi-kategori",
        blocking(st.core, move |core| core.breakdown(&kolom)).await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use paru_core::config::Config;
    use serde_json::json;
    use std::fs;
    use tower::ServiceExt;

    /// Model dir with an all-zero logistic model (p = 0.5 for every input) and a scratch data dir.
    fn test_app(dir: &std::path::Path) -> Router {
        let model_dir = dir.join("model");
        fs::create_dir_all(&model_dir).unwrap();
        fs::write(
            model_dir.join("feature_names.json"),
            serde_json::to_string(&paru_core::features::FEATURE_ORDER).unwrap(),
        )
        .unwrap();
        fs::write(
            model_dir.join("model.json"),
            json!({"kind": "logistic", "bias": 0.0, "weights": vec![0.0; 18]}).to_string(),
        )
        .unwrap();

        let pages_dir = dir.join("pages");
        fs::create_dir_all(&pages_dir).unwrap();
        fs::write(pages_dir.join("index.html"), "<h1>paru</h1>").unwrap();

        let cfg = Config {
            model_dir,
            data_dir: dir.join("data"),
            pages_dir,
            ..Config::default()
        };
        router(Arc::new(AppCore::new(cfg).unwrap()))
    }

    fn sample() -> Value {
        json!({
            "usia_tua": 1, "jenis_kelamin_wanita": 0, "merokok_pasif": 0,
            "bekerja_ya": 1, "rumah_tangga_ya": 1, "aktivitas_begadang_ya": 0,
            "aktivitas_olahraga_sering": 1, "asuransi_tidak": 0, "penyakit_bawaan_tidak": 1
        })
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        call(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(app: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        call(app, req).await
    }

    #[tokio::test]
    async fn test_predict_then_dashboards() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (status, body) = post_json(&app, sample().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"prediction": 1, "probability": 0.5}));

        let (_, body) = get_json(&app, "/visualisasi-data").await;
        assert_eq!(body, json!({"berisiko": 1, "tidak_berisiko": 0}));

        let (_, body) = get_json(&app, "/riwayat-prediksi").await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["no"], 1);
        assert_eq!(rows[0]["probability"], "50.00%");
        assert!(rows[0].get("usia_muda").is_none());

        let (_, body) = get_json(&app, "/visualisasi-kategori/jenis_kelamin_wanita").await;
        assert_eq!(
            body,
            json!({"labels": ["Pria"], "berisiko": [1], "tidak_berisiko": [0]})
        );
    }

    #[tokio::test]
    async fn test_errors_are_200_with_error_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        // nothing logged yet
        let (status, body) = get_json(&app, "/visualisasi-data").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let mut partial = sample();
        partial.as_object_mut().unwrap().remove("merokok_pasif");
        let (status, body) = post_json(&app, partial.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "missing field 'merokok_pasif'"}));

        let (status, body) = post_json(&app, "not json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));

        post_json(&app, sample().to_string()).await;
        let (status, body) = get_json(&app, "/visualisasi-kategori/golongan_darah").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"error": "Kolom 'golongan_darah' tidak ditemukan dalam data."})
        );
    }

    #[tokio::test]
    async fn test_static_page() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"<h1>paru</h1>");
    }
}
