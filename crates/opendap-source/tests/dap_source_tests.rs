//! DapSource against an in-process DAP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use grid_cache::{EngineConfig, GridSource, Period, PrecipEngine, PrecipError};
use opendap_source::{DapConfig, DapSource};

const ROWS: usize = 2;
const COLS: usize = 3;
const TIMES: usize = 8;
const JAN_2025: Period = Period::ym(2025, 1);

/// Serves `/dods/{period}/pr_{period}` for a fixed set of periods.
///
/// Sample `t` at pixel `k` reads `k + t`.
#[derive(Default)]
struct FakeDap {
    periods: Vec<String>,
    without_pr: bool,
    fail_next: AtomicUsize,
    requests: AtomicUsize,
}

impl FakeDap {
    fn new(periods: &[Period]) -> Self {
        Self {
            periods: periods.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    fn dds(&self) -> String {
        let pr = if self.without_pr {
            String::new()
        } else {
            format!("  Float32 pr[time = {TIMES}][lat = {ROWS}][lon = {COLS}];\n")
        };
        format!(
            "Dataset {{\n{pr}  Float64 time[time = {TIMES}];\n  Float64 lat[lat = {ROWS}];\n  Float64 lon[lon = {COLS}];\n}} pr;\n"
        )
    }

    fn coords(&self) -> String {
        format!("lat, [{ROWS}]\n-10, -9\nlon, [{COLS}]\n100, 101, 102\n")
    }

    fn slice(&self, t: usize) -> String {
        let mut body = format!("pr, [1][{ROWS}][{COLS}]\n");
        for r in 0..ROWS {
            let row: Vec<String> = (0..COLS).map(|c| (r * COLS + c + t).to_string()).collect();
            body.push_str(&format!("[0][{r}], {}\n", row.join(", ")));
        }
        body
    }
}

async fn dap(State(server): State<Arc<FakeDap>>, uri: Uri) -> Response {
    server.requests.fetch_add(1, Ordering::SeqCst);
    if server
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let path = uri.path();
    let known = server
        .periods
        .iter()
        .any(|p| path.starts_with(&format!("/dods/{p}/pr_{p}")));
    if !known {
        return StatusCode::NOT_FOUND.into_response();
    }

    let query = uri.query().unwrap_or("").replace("%5B", "[").replace("%5D", "]");
    if path.ends_with(".dds") {
        server.dds().into_response()
    } else if query == "lat,lon" {
        server.coords().into_response()
    } else if let Some(rest) = query.strip_prefix("pr[") {
        let t = rest.split(':').next().and_then(|t| t.parse().ok());
        match t {
            Some(t) if t < TIMES => server.slice(t).into_response(),
            _ => StatusCode::BAD_REQUEST.into_response(),
        }
    } else {
        StatusCode::BAD_REQUEST.into_response()
    }
}

async fn serve(server: Arc<FakeDap>) -> String {
    let app = Router::new().fallback(dap).with_state(server);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/dods/{{period}}/pr_{{period}}")
}

fn config(url_template: String) -> DapConfig {
    DapConfig {
        url_template,
        max_retries: 2,
        initial_retry_delay_ms: 1,
        ..DapConfig::default()
    }
}

#[tokio::test]
async fn test_open_reads_shape_and_coordinates() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();

    let handle = source.open(JAN_2025).await.unwrap();
    assert_eq!(handle.latitudes(), &[-10.0, -9.0]);
    assert_eq!(handle.longitudes(), &[100.0, 101.0, 102.0]);
    assert_eq!(handle.time_count(), TIMES);
    assert_eq!(handle.times()[4].to_string(), "2025-01-02 00:00:00");
    assert_eq!(server.requests.load(Ordering::SeqCst), 2);

    let slice = handle.read_slice(3).await.unwrap();
    assert_eq!(slice, vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
}

#[tokio::test]
async fn test_unknown_period_is_upstream_error() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    let source = DapSource::new(config(serve(server).await)).unwrap();

    let err = source.open(Period::ym(2030, 1)).await.err().unwrap();
    assert!(matches!(err, PrecipError::UpstreamUnavailable(msg) if msg.contains("404")));
}

#[tokio::test]
async fn test_missing_variable_fails_reads_only() {
    let server = Arc::new(FakeDap {
        without_pr: true,
        ..FakeDap::new(&[JAN_2025])
    });
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();

    let handle = source.open(JAN_2025).await.unwrap();
    let err = handle.read_slice(0).await.unwrap_err();
    assert_eq!(err, PrecipError::MissingVariable("pr".to_string()));
    assert_eq!(server.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_out_of_range_slice_makes_no_request() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();

    let handle = source.open(JAN_2025).await.unwrap();
    let err = handle.read_slice(TIMES).await.unwrap_err();
    assert_eq!(err, PrecipError::invalid_index(TIMES, TIMES));
    assert_eq!(server.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    server.fail_next.store(2, Ordering::SeqCst);
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();

    source.open(JAN_2025).await.unwrap();
    // two 503s on the DDS, then DDS and coordinates
    assert_eq!(server.requests.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    server.fail_next.store(10, Ordering::SeqCst);
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();

    let err = source.open(JAN_2025).await.err().unwrap();
    assert!(matches!(err, PrecipError::UpstreamUnavailable(msg) if msg.contains("503")));
    assert_eq!(server.requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_engine_tiles_over_dap() {
    let server = Arc::new(FakeDap::new(&[JAN_2025]));
    let source = DapSource::new(config(serve(Arc::clone(&server)).await)).unwrap();
    let engine_config = EngineConfig {
        unit_scale: 1.0,
        reference_period: JAN_2025,
        ..EngineConfig::default()
    };
    let engine = PrecipEngine::new(Arc::new(source), engine_config, vec![JAN_2025]).unwrap();

    assert_eq!(engine.day_count(JAN_2025).await.unwrap(), 2);
    let tile = engine.tile(JAN_2025, 1, 1, false).await.unwrap();
    // pixel 5 over samples 4..8 averages to 5 + 5.5
    assert_eq!(tile.grid.get(1, 2), Some(10.5));
    assert_eq!((tile.raw_start, tile.raw_end), (4, 8));
}
