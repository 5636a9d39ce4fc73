//! Fetch scheduler concurrency-bound tests.
//!
//! Verifies that a scheduler configured with concurrency K never holds more
//! than K requests in flight, regardless of batch size, using a mock
//! endpoint that records request arrival times.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use stockpix_core::{
    config::FetcherConfig, ContentStore, FetchScheduler, FsStore, Registry, SqliteRegistry,
};

/// Response delay applied by the probe; long enough that overlapping
/// requests are clearly visible in the arrival log.
const HOLD: Duration = Duration::from_millis(300);

/// Responder that records when each request arrived and holds the
/// connection open for a fixed delay.
struct ConcurrencyProbe {
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for ConcurrencyProbe {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_bytes(b"payload".to_vec())
            .set_delay(HOLD)
    }
}

/// Maximum number of requests simultaneously in flight, reconstructed from
/// arrival times: request i occupies [t_i, t_i + HOLD).
fn max_overlap(arrivals: &[Instant]) -> usize {
    arrivals
        .iter()
        .map(|&t| {
            arrivals
                .iter()
                .filter(|&&other| other <= t && t < other + HOLD)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_in_flight_requests_never_exceed_limit() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .respond_with(ConcurrencyProbe {
            arrivals: Arc::clone(&arrivals),
        })
        .mount(&server)
        .await;

    let store_dir = TempDir::new().unwrap();
    let registry = Arc::new(SqliteRegistry::in_memory(0).unwrap());
    let store = Arc::new(FsStore::new(store_dir.path()));

    let scheduler = FetchScheduler::new(
        Arc::clone(&registry) as Arc<dyn Registry>,
        store as Arc<dyn ContentStore>,
        FetcherConfig {
            concurrency: 5,
            timeout_secs: 10,
            chunk_size: 50,
            max_attempts: 0,
        },
    );

    let urls: Vec<String> = (0..20)
        .map(|i| format!("{}/img/{}.jpg", server.uri(), i))
        .collect();
    let stats = scheduler.run(&urls).await.unwrap();

    assert_eq!(stats.attempted, 20);
    assert_eq!(stats.fetched, 20);

    let arrivals = arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 20);
    let peak = max_overlap(&arrivals);
    assert!(peak <= 5, "observed {} simultaneous requests", peak);
}

#[tokio::test]
async fn test_queued_work_still_completes() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .respond_with(ConcurrencyProbe {
            arrivals: Arc::clone(&arrivals),
        })
        .mount(&server)
        .await;

    let store_dir = TempDir::new().unwrap();
    let registry = Arc::new(SqliteRegistry::in_memory(0).unwrap());
    let store = Arc::new(FsStore::new(store_dir.path()));

    // Concurrency 1 serializes everything; all items must still land.
    let scheduler = FetchScheduler::new(
        Arc::clone(&registry) as Arc<dyn Registry>,
        store as Arc<dyn ContentStore>,
        FetcherConfig {
            concurrency: 1,
            timeout_secs: 10,
            chunk_size: 3,
            max_attempts: 0,
        },
    );

    let urls: Vec<String> = (0..6)
        .map(|i| format!("{}/img/{}.jpg", server.uri(), i))
        .collect();
    let stats = scheduler.run(&urls).await.unwrap();

    assert_eq!(stats.fetched, 6);
    assert_eq!(registry.stats().unwrap().fetched, 6);
    assert_eq!(max_overlap(&arrivals.lock().unwrap()), 1);
}
