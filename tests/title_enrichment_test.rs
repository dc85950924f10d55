mod common;

use common::{base_config, browser_line, cache_path, pipeline, request_bodies};
use matomo_log_agent::app::{App, LineOutcome};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ABOUT_PAGE: &str = "<html><head>\n<title>\n  About us\n</title></head><body></body></html>";

async fn mount_tracker(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/matomo.php"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn cache_lines(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(cache_path(dir))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_title_fetched_once_and_cached() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_tracker(&server).await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABOUT_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());
    let pipeline = pipeline(config, None);

    for _ in 0..3 {
        let outcome = pipeline.process_line(&browser_line("/about", 200)).await;
        assert_eq!(outcome, LineOutcome::Delivered);
    }

    let tracked = request_bodies(&server, "/matomo.php").await;
    assert_eq!(tracked.len(), 3);
    for body in &tracked {
        assert!(body.contains("action_name=About+us"), "missing title in {body}");
        // Reported URL stays on the public site
        assert!(body.contains("url=https%3A%2F%2Fwww.example.com%2Fabout"));
    }

    assert_eq!(cache_lines(&dir), vec![format!("{}/about:About us", server.uri())]);
    server.verify().await;
}

#[tokio::test]
async fn test_missing_title_still_delivers_hit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_tracker(&server).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<title>Not Found</title>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("no markup here"))
        .mount(&server)
        .await;

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());
    let pipeline = pipeline(config, None);

    for url in ["/gone", "/plain"] {
        let outcome = pipeline.process_line(&browser_line(url, 200)).await;
        assert_eq!(outcome, LineOutcome::Delivered);
    }

    let tracked = request_bodies(&server, "/matomo.php").await;
    assert_eq!(tracked.len(), 2);
    assert!(tracked.iter().all(|body| !body.contains("action_name=")));
    assert!(cache_lines(&dir).is_empty());
}

#[tokio::test]
async fn test_unparsable_timestamp_skips_title_fetch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABOUT_PAGE))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());
    let pipeline = pipeline(config, None);

    let outcome = pipeline
        .process_line(r#"192.0.2.10 - - [yesterday] "GET /about HTTP/1.1" 200 1 "-" "Mozilla/5.0""#)
        .await;

    assert_eq!(outcome, LineOutcome::DiscardedUnparsable);
    assert!(cache_lines(&dir).is_empty());
    server.verify().await;
}

#[tokio::test]
async fn test_colon_path_cached_once_across_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_tracker(&server).await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(body_string_contains("method=API.getMatomoVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":"5.1.0"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/Special:Search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Search</title>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());

    for _ in 0..2 {
        let app = App::from_config(config.clone()).await.unwrap();
        let outcome = app
            .pipeline()
            .process_line(&browser_line("/wiki/Special:Search", 200))
            .await;
        assert_eq!(outcome, LineOutcome::Delivered);
    }

    assert_eq!(
        cache_lines(&dir),
        vec![format!("{}/wiki/Special%3ASearch:Search", server.uri())]
    );
    let tracked = request_bodies(&server, "/matomo.php").await;
    assert_eq!(tracked.len(), 2);
    assert!(tracked.iter().all(|body| body.contains("action_name=Search")));
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_lookups_write_one_cache_line() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_tracker(&server).await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABOUT_PAGE))
        .mount(&server)
        .await;

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());
    let pipeline = pipeline(config, None);

    let lookups = (0..8).map(|_| {
        let pipeline = pipeline.clone();
        async move { pipeline.process_line(&browser_line("/about", 200)).await }
    });
    let outcomes = futures::future::join_all(lookups).await;

    assert!(outcomes.iter().all(|o| *o == LineOutcome::Delivered));
    assert_eq!(cache_lines(&dir).len(), 1);
}

#[tokio::test]
async fn test_startup_loads_existing_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_tracker(&server).await;
    Mock::given(method("POST"))
        .and(path("/index.php"))
        .and(body_string_contains("method=API.getMatomoVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":"5.1.0"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ABOUT_PAGE))
        .expect(0)
        .mount(&server)
        .await;

    std::fs::write(
        cache_path(&dir),
        format!("{}/about:Cached About\n", server.uri()),
    )
    .unwrap();

    let mut config = base_config(&server, &dir);
    config.title.collect_titles = true;
    config.title.title_domain = Some(server.uri());
    let app = App::from_config(config).await.unwrap();

    app.pipeline()
        .process_line(&browser_line("/about", 200))
        .await;

    let tracked = request_bodies(&server, "/matomo.php").await;
    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].contains("action_name=Cached+About"));
    server.verify().await;
}
