//! Post-deploy pre-warming.
//!
//! After a full deploy every static GET route is requested once so the first
//! real visitor does not pay the cold-start cost. Failures are reported but
//! never fail the deployment.
//!
//! The target is the discovered endpoint, or the configured base URL when
//! discovery came back empty.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::PrewarmConfig;
use crate::error::{Result, ShipError};
use crate::routes::Route;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Result of warming a single route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmCheck {
    /// Route path.
    pub path: String,
    /// Requested URL.
    pub url: String,
    /// HTTP status code (if a response arrived).
    pub status_code: Option<u16>,
    /// Response time in milliseconds.
    pub response_time_ms: Option<u64>,
    /// Error message (if any).
    pub error: Option<String>,
}

impl WarmCheck {
    /// Returns true if the route answered with a non-server-error status.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status_code, Some(code) if code < 500)
    }
}

/// Outcome of a pre-warm run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrewarmReport {
    /// One entry per warmed route, in route order.
    pub checks: Vec<WarmCheck>,
}

impl PrewarmReport {
    /// Returns the number of routes that answered.
    #[must_use]
    pub fn warmed(&self) -> usize {
        self.checks.iter().filter(|c| c.is_ok()).count()
    }

    /// Returns the checks that failed.
    #[must_use]
    pub fn failures(&self) -> Vec<&WarmCheck> {
        self.checks.iter().filter(|c| !c.is_ok()).collect()
    }
}

/// Something that can warm a deployed application.
#[async_trait]
pub trait Prewarmer: Send + Sync {
    /// Warms the static GET routes among `routes`.
    ///
    /// `endpoint` is the discovered public endpoint, if any.
    async fn prewarm(&self, endpoint: Option<&str>, routes: &[Route]) -> PrewarmReport;
}

/// Warms routes with plain HTTP GET requests.
#[derive(Debug, Clone)]
pub struct HttpPrewarmer {
    /// HTTP client.
    client: Client,
    /// Requests in flight at once.
    concurrency: usize,
    /// Fallback target when no endpoint was discovered.
    base_url: Option<String>,
}

impl HttpPrewarmer {
    /// Creates a prewarmer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &PrewarmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ShipError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            concurrency: config.concurrency.max(1),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl Prewarmer for HttpPrewarmer {
    async fn prewarm(&self, endpoint: Option<&str>, routes: &[Route]) -> PrewarmReport {
        let static_routes = routes.iter().filter(|r| r.is_static_get());

        let Some(base) = endpoint.or(self.base_url.as_deref()) else {
            warn!("No endpoint or prewarm.base_url to warm, reporting routes as unwarmed");
            return PrewarmReport {
                checks: static_routes
                    .map(|r| WarmCheck {
                        path: r.display_path(),
                        url: String::new(),
                        status_code: None,
                        response_time_ms: None,
                        error: Some(String::from("no endpoint")),
                    })
                    .collect(),
            };
        };

        let targets: Vec<(String, String)> = static_routes
            .map(|r| (r.display_path(), route_url(base, r)))
            .collect();

        info!("Prewarming {} routes on {base}", targets.len());
        let mut report = PrewarmReport::default();

        for chunk in targets.chunks(self.concurrency) {
            let mut workers = JoinSet::new();
            for (index, (path, url)) in chunk.iter().cloned().enumerate() {
                let client = self.client.clone();
                workers.spawn(async move { (index, warm_url(&client, path, url).await) });
            }

            let mut batch: Vec<Option<WarmCheck>> = vec![None; chunk.len()];
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((index, check)) => batch[index] = Some(check),
                    Err(e) => warn!("Prewarm worker failed: {e}"),
                }
            }
            report.checks.extend(batch.into_iter().flatten());
        }

        info!(
            "Prewarmed {}/{} routes",
            report.warmed(),
            report.checks.len()
        );
        report
    }
}

/// Builds the URL of a route under an endpoint.
#[must_use]
pub fn route_url(endpoint: &str, route: &Route) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        route.path.trim_start_matches('/')
    )
}

async fn warm_url(client: &Client, path: String, url: String) -> WarmCheck {
    let start = Instant::now();

    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            let response_time = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            if status.is_server_error() {
                warn!("Prewarm of {url} returned {status}");
            } else {
                debug!("Prewarmed {url} ({status}, {response_time}ms)");
            }

            WarmCheck {
                path,
                url,
                status_code: Some(status.as_u16()),
                response_time_ms: Some(response_time),
                error: if status.is_server_error() {
                    Some(format!("HTTP {status}"))
                } else {
                    None
                },
            }
        }
        Err(e) => {
            warn!("Prewarm failed for {url}: {e}");

            WarmCheck {
                path,
                url,
                status_code: None,
                response_time_ms: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::HttpMethod;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> PrewarmConfig {
        PrewarmConfig {
            enable: true,
            concurrency: 2,
            timeout_secs: 5,
            base_url: None,
        }
    }

    #[test]
    fn test_route_url() {
        let root = Route::new(HttpMethod::Get, "", "HomeController", "index");
        let posts = Route::new(HttpMethod::Get, "/posts", "PostsController", "index");

        assert_eq!(route_url("https://x.example/dev/", &root), "https://x.example/dev/");
        assert_eq!(route_url("https://x.example/dev", &posts), "https://x.example/dev/posts");
    }

    #[tokio::test]
    async fn test_warms_only_static_get_routes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let routes = vec![
            Route::new(HttpMethod::Get, "", "HomeController", "index"),
            Route::new(HttpMethod::Get, "posts", "PostsController", "index"),
            Route::new(HttpMethod::Get, "posts/:id", "PostsController", "show"),
            Route::new(HttpMethod::Post, "posts", "PostsController", "create"),
            Route::new(HttpMethod::Get, "about", "PagesController", "about"),
        ];

        let report = HttpPrewarmer::new(&config())
            .unwrap()
            .prewarm(Some(server.uri().as_str()), &routes)
            .await;

        let paths: Vec<&str> = report.checks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/posts", "/about"]);
        assert_eq!(report.warmed(), 3);
        assert!(report.failures().is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_are_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let routes = vec![Route::new(HttpMethod::Get, "broken", "PagesController", "broken")];
        let report = HttpPrewarmer::new(&config())
            .unwrap()
            .prewarm(Some(server.uri().as_str()), &routes)
            .await;

        assert_eq!(report.warmed(), 0);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].status_code, Some(502));
        assert_eq!(failures[0].error.as_deref(), Some("HTTP 502 Bad Gateway"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let routes = vec![Route::new(HttpMethod::Get, "", "HomeController", "index")];
        let report = HttpPrewarmer::new(&config())
            .unwrap()
            .prewarm(Some("http://127.0.0.1:9"), &routes)
            .await;

        assert_eq!(report.checks.len(), 1);
        assert!(report.checks[0].status_code.is_none());
        assert!(report.checks[0].error.is_some());
    }

    #[tokio::test]
    async fn test_base_url_is_used_without_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let prewarmer = HttpPrewarmer::new(&PrewarmConfig {
            base_url: Some(server.uri()),
            ..config()
        })
        .unwrap();

        let routes = vec![Route::new(HttpMethod::Get, "posts", "PostsController", "index")];
        let report = prewarmer.prewarm(None, &routes).await;

        assert_eq!(report.warmed(), 1);
        assert_eq!(report.checks[0].url, format!("{}/posts", server.uri()));
    }

    #[tokio::test]
    async fn test_no_target_reports_every_route() {
        let routes = vec![
            Route::new(HttpMethod::Get, "", "HomeController", "index"),
            Route::new(HttpMethod::Get, "posts/:id", "PostsController", "show"),
        ];
        let report = HttpPrewarmer::new(&config()).unwrap().prewarm(None, &routes).await;

        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].path, "/");
        assert_eq!(report.checks[0].error.as_deref(), Some("no endpoint"));
        assert_eq!(report.warmed(), 0);
    }
}
