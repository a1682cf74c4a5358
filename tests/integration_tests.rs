//! Integration tests for the feed-pages aggregator
//!
//! These tests verify the full workflow from configuration and manifest
//! loading through fetching, parsing and writing the rendered pages.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Create a temporary directory for rendered pages
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    pub fn rss_document(title: &str, items: &[(&str, &str, &str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(title, link, description, date)| {
                format!(
                    "<item><title>{}</title><link>{}</link><description>{}</description><pubDate>{}</pubDate></item>",
                    title, link, description, date
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>{}</title><link>http://example.com</link><description>About {}</description>{}</channel></rss>"#,
            title, title, items
        )
    }

    pub async fn mount(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use feed_pages::config::{Config, FailurePolicy};

    #[test]
    fn test_load_actual_config() {
        // Test loading the sample feedpages.toml from the project
        let config = Config::load("feedpages.toml");
        assert!(config.is_ok(), "Failed to load feedpages.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(config.concurrency > 0, "concurrency should be positive");
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_config_round_trip() {
        let toml_content = r#"
            output_dir = "public"
            concurrency = 8
            failure_policy = "skip"
            escape_html = false
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.output_dir, std::path::PathBuf::from("public"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert!(!config.escape_html);
        assert!(!config.strict_status);
    }
}

#[cfg(test)]
mod manifest_integration_tests {
    use feed_pages::manifest::Manifest;

    #[test]
    fn test_load_actual_manifest() {
        let bytes = std::fs::read("feeds.xml").expect("feeds.xml should exist");
        let manifest = Manifest::parse(&bytes).unwrap();

        assert_eq!(manifest.title, "Daily Reading");
        assert!(!manifest.feeds.is_empty(), "feeds.xml should have at least one feed");
        for feed in &manifest.feeds {
            assert!(feed.url.starts_with("https://"));
            assert!(feed.output_id.ends_with(".html"));
        }
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use feed_pages::config::{Config, FailurePolicy};
    use feed_pages::pipeline::{Aggregator, FeedOutcome, ManifestSource, PipelineError, RunStatus};
    use wiremock::MockServer;

    fn aggregator(output_dir: &std::path::Path, policy: FailurePolicy, escape_html: bool) -> Aggregator {
        let config = Config {
            output_dir: output_dir.to_path_buf(),
            failure_policy: policy,
            escape_html,
            ..Config::default()
        };
        Aggregator::new(config).unwrap()
    }

    async fn serve_two_feeds(server: &MockServer) -> String {
        mount(
            server,
            "/alpha.xml",
            200,
            rss_document(
                "Alpha",
                &[
                    ("A", "http://a", "descA", "Mon"),
                    ("B", "http://b", "descB", "Tue"),
                ],
            ),
        )
        .await;
        mount(server, "/beta.xml", 200, rss_document("Beta", &[])).await;

        let manifest = format!(
            r#"<feeds title="My Feeds">
                <feed url="{0}/alpha.xml" name="Alpha News" file="alpha.html"/>
                <feed url="{0}/beta.xml" name="Beta News" file="beta.html"/>
            </feeds>"#,
            server.uri()
        );
        mount(server, "/feeds.xml", 200, manifest).await;
        format!("{}/feeds.xml", server.uri())
    }

    #[tokio::test]
    async fn test_remote_manifest_to_pages() {
        let server = MockServer::start().await;
        let manifest_url = serve_two_feeds(&server).await;
        let temp_dir = create_temp_dir();

        let report = aggregator(temp_dir.path(), FailurePolicy::Abort, false)
            .run(&ManifestSource::parse(&manifest_url), "index.html")
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.rendered(), 2);
        assert_eq!(report.index, temp_dir.path().join("index.html"));

        let index = std::fs::read_to_string(temp_dir.path().join("index.html")).unwrap();
        assert!(index.contains("<title>My Feeds</title>"));
        assert!(index.contains("<h1>My Feeds</h1>"));
        assert_eq!(index.matches("<li>").count(), 2);
        let alpha = index.find(r#"<li><a href="alpha.html">Alpha News</a></li>"#).unwrap();
        let beta = index.find(r#"<li><a href="beta.html">Beta News</a></li>"#).unwrap();
        assert!(alpha < beta);

        let page = std::fs::read_to_string(temp_dir.path().join("alpha.html")).unwrap();
        assert!(page.contains("<title>alpha.html</title>"));
        assert!(page.contains(r#"<h1><a href="http://example.com">Alpha</a></h1>"#));
        assert_eq!(page.matches("<tr>").count(), 3);
        assert!(page.contains(&format!(
            r#"<tr><td>Mon</td><td><a href="{}/alpha.xml">Alpha</a></td><td><a href="http://a">descA</a></td></tr>"#,
            server.uri()
        )));
        assert!(page.find("descA").unwrap() < page.find("descB").unwrap());

        let empty = std::fs::read_to_string(temp_dir.path().join("beta.html")).unwrap();
        assert_eq!(empty.matches("<tr>").count(), 1);
    }

    #[tokio::test]
    async fn test_local_manifest_file() {
        let server = MockServer::start().await;
        serve_two_feeds(&server).await;
        let temp_dir = create_temp_dir();

        let manifest_path = temp_dir.path().join("feeds.xml");
        std::fs::write(
            &manifest_path,
            format!(
                r#"<feeds title="Local"><feed url="{}/alpha.xml" name="Alpha" file="out/alpha.html"/></feeds>"#,
                server.uri()
            ),
        )
        .unwrap();

        let report = aggregator(&temp_dir.path().join("site"), FailurePolicy::Abort, true)
            .run(&ManifestSource::Path(manifest_path), "home.html")
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert!(temp_dir.path().join("site/home.html").exists());
        assert!(temp_dir.path().join("site/out/alpha.html").exists());
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let server = MockServer::start().await;
        let manifest_url = serve_two_feeds(&server).await;
        let source = ManifestSource::parse(&manifest_url);

        let first_dir = create_temp_dir();
        aggregator(first_dir.path(), FailurePolicy::Abort, true)
            .run(&source, "index.html")
            .await
            .unwrap();
        let second_dir = create_temp_dir();
        aggregator(second_dir.path(), FailurePolicy::Abort, true)
            .run(&source, "index.html")
            .await
            .unwrap();

        for name in ["index.html", "alpha.html", "beta.html"] {
            let first = std::fs::read(first_dir.path().join(name)).unwrap();
            let second = std::fs::read(second_dir.path().join(name)).unwrap();
            assert_eq!(first, second, "{} differs between runs", name);
        }
    }

    #[tokio::test]
    async fn test_malformed_manifest_aborts_before_index() {
        let server = MockServer::start().await;
        mount(&server, "/feeds.xml", 200, "<feeds><feed".to_string()).await;
        let temp_dir = create_temp_dir();

        let result = aggregator(temp_dir.path(), FailurePolicy::Skip, true)
            .run(
                &ManifestSource::parse(&format!("{}/feeds.xml", server.uri())),
                "index.html",
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Manifest(_))));
        assert!(!temp_dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_unreachable_feed_aborts_but_keeps_index() {
        let server = MockServer::start().await;
        mount(&server, "/alpha.xml", 200, rss_document("Alpha", &[])).await;
        let manifest = format!(
            r#"<feeds title="Partial">
                <feed url="http://127.0.0.1:1/down.xml" name="Down" file="down.html"/>
                <feed url="{}/alpha.xml" name="Alpha" file="alpha.html"/>
            </feeds>"#,
            server.uri()
        );
        mount(&server, "/feeds.xml", 200, manifest).await;
        let temp_dir = create_temp_dir();

        let report = aggregator(temp_dir.path(), FailurePolicy::Abort, true)
            .run(
                &ManifestSource::parse(&format!("{}/feeds.xml", server.uri())),
                "index.html",
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Aborted);
        assert!(matches!(report.feeds[0].outcome, FeedOutcome::Failed { .. }));
        assert_eq!(report.feeds[1].outcome, FeedOutcome::NotAttempted);
        assert!(temp_dir.path().join("index.html").exists());
        assert!(!temp_dir.path().join("alpha.html").exists());
    }

    #[tokio::test]
    async fn test_non_success_status_still_parsed() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/gone.xml",
            410,
            rss_document("Gone", &[("A", "http://a", "descA", "Mon")]),
        )
        .await;
        let manifest = format!(
            r#"<feeds title="Status"><feed url="{}/gone.xml" name="Gone" file="gone.html"/></feeds>"#,
            server.uri()
        );
        mount(&server, "/feeds.xml", 200, manifest).await;
        let source = ManifestSource::parse(&format!("{}/feeds.xml", server.uri()));

        let permissive_dir = create_temp_dir();
        let report = aggregator(permissive_dir.path(), FailurePolicy::Abort, true)
            .run(&source, "index.html")
            .await
            .unwrap();
        assert_eq!(report.feeds[0].outcome, FeedOutcome::Rendered { items: 1 });

        let strict_dir = create_temp_dir();
        let config = Config {
            output_dir: strict_dir.path().to_path_buf(),
            strict_status: true,
            failure_policy: FailurePolicy::Skip,
            ..Config::default()
        };
        let report = Aggregator::new(config)
            .unwrap()
            .run(&source, "index.html")
            .await
            .unwrap();
        match &report.feeds[0].outcome {
            FeedOutcome::Skipped { reason } => assert!(reason.contains("410")),
            other => panic!("Expected Skipped, got {:?}", other),
        }
        assert!(!strict_dir.path().join("gone.html").exists());
    }

    #[tokio::test]
    async fn test_placeholder_and_parallel_run() {
        let server = MockServer::start().await;
        mount(&server, "/alpha.xml", 200, rss_document("Alpha", &[("A", "http://a", "descA", "Mon")])).await;
        mount(&server, "/junk.xml", 200, "<html><body>Not a feed</body></html>".to_string()).await;
        let manifest = format!(
            r#"<feeds title="Mixed">
                <feed url="{0}/junk.xml" name="Junk" file="junk.html"/>
                <feed url="{0}/alpha.xml" name="Alpha" file="alpha.html"/>
            </feeds>"#,
            server.uri()
        );
        mount(&server, "/feeds.xml", 200, manifest).await;
        let temp_dir = create_temp_dir();

        let config = Config {
            output_dir: temp_dir.path().to_path_buf(),
            concurrency: 4,
            failure_policy: FailurePolicy::Placeholder,
            ..Config::default()
        };
        let report = Aggregator::new(config)
            .unwrap()
            .run(
                &ManifestSource::parse(&format!("{}/feeds.xml", server.uri())),
                "index.html",
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.feeds[0].output_id, "junk.html");
        assert!(matches!(report.feeds[0].outcome, FeedOutcome::Placeholder { .. }));
        assert_eq!(report.feeds[1].outcome, FeedOutcome::Rendered { items: 1 });

        let junk = std::fs::read_to_string(temp_dir.path().join("junk.html")).unwrap();
        assert!(junk.contains("currently unavailable"));
        assert!(junk.contains("&lt;rss&gt;"));
    }
}
