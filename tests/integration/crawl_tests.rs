//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive
//! the full crawl loop end-to-end over real HTTP.

use scoped_crawl::checkpoint::Checkpoint;
use scoped_crawl::config::{PolitenessConfig, UserAgentConfig, DEFAULT_EXCLUDED_EXTENSIONS};
use scoped_crawl::crawler::{
    AdmissionFilter, Coordinator, CrawlLimits, HttpFetcher, LoopSettings, LoopState, Scheduler,
};
use scoped_crawl::storage::{FsPageStore, Journal, PageOutcome, SqliteJournal};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type HttpCoordinator = Coordinator<HttpFetcher, FsPageStore, SqliteJournal>;

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "SantaBot".to_string(),
        crawler_version: "1.0".to_string(),
        contact_url: "https://example.com/bot".to_string(),
        contact_email: "bot@example.com".to_string(),
    }
}

fn limits(max_pages: u64) -> CrawlLimits {
    CrawlLimits {
        max_pages,
        host_page_quota: 100,
        politeness: PolitenessConfig {
            fetch_pause_trigger: 50,
            fetch_pause_secs: 60,
            timeout_pause_trigger: 2,
            initial_timeout_pause_secs: 30,
        },
    }
}

/// The mock server listens on 127.0.0.1, so the crawl is scoped to that host
fn admission() -> AdmissionFilter {
    AdmissionFilter::new("127.0.0.1", DEFAULT_EXCLUDED_EXTENSIONS)
}

fn create_coordinator(
    scheduler: Scheduler,
    dir: &Path,
    fetch_timeout: Duration,
) -> HttpCoordinator {
    let fetcher =
        HttpFetcher::new(&user_agent(), fetch_timeout).expect("Failed to build HTTP client");
    let pages = FsPageStore::new(dir.join("html"));
    let journal = SqliteJournal::new(&dir.join("crawl.db")).expect("Failed to open journal");
    let settings = LoopSettings {
        robots_agent: "SantaBot".to_string(),
        pacing_delay: Duration::ZERO,
        idle_wait: Duration::from_millis(10),
        checkpoint_every: 0,
        checkpoint_path: Some(dir.join("crawl.checkpoint.json")),
        config_hash: "integration".to_string(),
    };
    Coordinator::new(scheduler, fetcher, pages, journal, settings)
        .expect("Failed to create coordinator")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn host_dir(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

#[tokio::test]
async fn test_full_crawl_single_host() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n",
            base
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
                <a href="/page1">Page 1</a>
                <a href="page2.html">Page 2</a>
                <a href="/page1">Page 1 again</a>
                <a href="/report.pdf">Report</a>
                <a href="https://example.com/">Elsewhere</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html("<html><body><a href=\"/\">Home</a></body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2.html"))
        .respond_with(html("<html><body>Leaf</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(limits(100), admission());
    scheduler.seed([format!("{}/", base).as_str()]);

    let mut coordinator = create_coordinator(scheduler, dir.path(), Duration::from_secs(5));
    let summary = coordinator.run(CancellationToken::new()).await.unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.counters.stored, 3);
    assert_eq!(summary.queued, 0);

    let html_dir = dir.path().join("html").join(host_dir(&server));
    assert!(html_dir.join("page.html").exists());
    assert!(html_dir.join("page1/page.html").exists());
    assert!(html_dir.join("page2.html").exists());
    let robots = std::fs::read_to_string(html_dir.join("robots.txt")).unwrap();
    assert!(robots.contains("Allow: /"));

    let journal = coordinator.journal();
    assert_eq!(journal.count_pages_by_outcome(PageOutcome::Stored).unwrap(), 3);
    let hosts = journal.get_robots_hosts().unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].sitemaps, vec![format!("{}/sitemap.xml", base)]);

    let checkpoint = Checkpoint::load(&dir.path().join("crawl.checkpoint.json")).unwrap();
    assert!(checkpoint.frontier.is_empty());
    assert_eq!(checkpoint.visited.len(), 3);
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: SantaBot\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/private/secret">Secret</a><a href="/public">Public</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(html("<p>Public</p>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("<p>Secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(limits(100), admission());
    scheduler.seed([format!("{}/", base).as_str()]);

    let mut coordinator = create_coordinator(scheduler, dir.path(), Duration::from_secs(5));
    let summary = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.counters.stored, 2);
    assert_eq!(summary.counters.denied, 1);
    assert_eq!(
        coordinator
            .journal()
            .count_pages_by_outcome(PageOutcome::RobotsDenied)
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_non_html_and_errors_are_dropped() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/image">Image</a><a href="/missing">Missing</a>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(limits(100), admission());
    scheduler.seed([format!("{}/", base).as_str()]);

    let mut coordinator = create_coordinator(scheduler, dir.path(), Duration::from_secs(5));
    let summary = coordinator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.counters.stored, 1);
    assert_eq!(summary.counters.failures, 2);
    let outcomes = coordinator.journal().get_outcome_summary().unwrap();
    assert_eq!(outcomes.get(&PageOutcome::ContentMismatch), Some(&1));
    assert_eq!(outcomes.get(&PageOutcome::HttpStatus), Some(&1));

    let html_dir = dir.path().join("html").join(host_dir(&server));
    assert!(!html_dir.join("image/page.html").exists());
}

#[tokio::test]
async fn test_timeouts_pause_host_and_requeue() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/slow1"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow2"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = Scheduler::new(limits(100), admission());
    scheduler.seed([
        format!("{}/slow1", base).as_str(),
        format!("{}/slow2", base).as_str(),
    ]);

    let mut coordinator = create_coordinator(scheduler, dir.path(), Duration::from_millis(200));
    let cancel = CancellationToken::new();

    assert_eq!(coordinator.step(&cancel).await.unwrap(), LoopState::Running);
    assert_eq!(coordinator.step(&cancel).await.unwrap(), LoopState::Running);

    let scheduler = coordinator.scheduler();
    assert_eq!(scheduler.counters().timeouts, 2);
    assert_eq!(scheduler.counters().requeued, 2);
    let queued: Vec<&str> = scheduler.frontier().iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        queued,
        vec![format!("{}/slow1", base), format!("{}/slow2", base)]
    );

    // The only host is paused for 30s
    assert_eq!(coordinator.step(&cancel).await.unwrap(), LoopState::Waiting);
    assert_eq!(
        coordinator
            .journal()
            .count_pages_by_outcome(PageOutcome::Timeout)
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/a">A</a><a href="/b">B</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    for page in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("<p>leaf</p>"))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let checkpoint_path = dir.path().join("crawl.checkpoint.json");

    // First run stops at the global limit
    let mut scheduler = Scheduler::new(limits(1), admission());
    scheduler.seed([format!("{}/", base).as_str()]);
    let mut first = create_coordinator(scheduler, dir.path(), Duration::from_secs(5));
    let summary = first.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.counters.stored, 1);
    assert_eq!(summary.queued, 2);
    drop(first);

    // Second run picks up the remaining frontier under a raised limit
    let checkpoint = Checkpoint::load(&checkpoint_path).unwrap();
    assert_eq!(checkpoint.config_hash, "integration");
    let scheduler = checkpoint.restore(admission(), limits(10)).unwrap();
    assert!(scheduler.policy().is_roboted(&base));

    let mut second = create_coordinator(scheduler, dir.path(), Duration::from_secs(5));
    let summary = second.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.counters.stored, 3);
    assert_eq!(summary.queued, 0);
    assert_eq!(second.journal().count_runs().unwrap(), 2);
    assert_eq!(
        second
            .journal()
            .count_pages_by_outcome(PageOutcome::Stored)
            .unwrap(),
        3
    );
}
