//! Simulated repository-topic search over a live-call controller.
//!
//! The search call is fake (a short sleep plus canned data) — the point is
//! the wiring: the call goes through the injected hooks, a derived bundle
//! computes a per-language breakdown, a `LogWriter` subscriber prints the
//! controller lifecycle, and one `retry()` re-runs the whole query.
//!
//! Run with: `cargo run --example live_search --features logging`

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use callstream::{map_results, CallController, Fault, LogWriter};

#[derive(Clone, Debug)]
struct Repository {
    name: String,
    author: String,
    url: String,
    description: String,
    topics: Vec<String>,
    language: Option<String>,
}

impl Repository {
    fn new(
        name: &str,
        author: &str,
        description: &str,
        topics: &[&str],
        language: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            author: author.to_string(),
            url: format!("https://example.com/{author}/{name}"),
            description: description.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            language: language.map(|l| l.to_string()),
        }
    }
}

/// Stand-in for an HTTP search client.
async fn search_repositories(topic: &'static str) -> Result<Vec<Repository>, Fault> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    if topic.is_empty() {
        return Err(Fault::msg("empty topic"));
    }
    Ok(vec![
        Repository::new("streamline", "ada", "stream toolkit", &[topic], Some("Go")),
        Repository::new("pipeflow", "ada", "pipeline runner", &[topic], Some("Go")),
        Repository::new("callstream", "grace", "live queries", &[topic], Some("Rust")),
    ])
}

fn language_breakdown(repos: &[Repository]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for repo in repos {
        let Some(language) = repo.language.as_deref() else {
            continue;
        };
        match counts.iter_mut().find(|(name, _)| name == language) {
            Some((_, count)) => *count += 1,
            None => counts.push((language.to_string(), 1)),
        }
    }
    counts
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let live = CallController::builder()
        .subscriber(Arc::new(LogWriter::new()))
        .spawn(|hooks| hooks.call(search_repositories("reactive")));

    let breakdown = map_results(&live, |results| {
        results.map(|repos| language_breakdown(&repos)).boxed()
    });

    let mut repos = live.results();
    let mut counts = breakdown.results();

    let page = repos.next().await.unwrap_or_default();
    println!("found {} repositories:", page.len());
    for repo in &page {
        println!(
            "  {} by {} [{}] — {} ({}) topics={:?}",
            repo.name,
            repo.author,
            repo.language.as_deref().unwrap_or("?"),
            repo.description,
            repo.url,
            repo.topics,
        );
    }
    println!("language breakdown: {:?}", counts.next().await.unwrap_or_default());

    println!("retrying...");
    live.retry();
    let page = repos.next().await.unwrap_or_default();
    println!("after retry: {} repositories", page.len());

    // Give the fan-out workers a moment to drain the last events.
    tokio::time::sleep(Duration::from_millis(20)).await;
}
