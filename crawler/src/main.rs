use anyhow::{anyhow, Result};
use clap::Parser;
use parking_lot::RwLock;
use regex::Regex;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use search_core::{clean_terms_with, Document, TokenizerOptions};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl pages into a JSONL document feed of {url, content} records")]
struct Cli {
    /// Page(s) where crawling starts
    #[arg(long = "start-url", default_value = "https://www.concordia.ca/about.html")]
    start_urls: Vec<String>,
    /// Optional file with additional seed URLs (one per line)
    #[arg(long)]
    seeds: Option<String>,
    /// Output JSONL file path
    #[arg(long, default_value = "./data/results.jsonl")]
    output: String,
    /// Maximum number of pages to emit
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Concurrency (number of in-flight requests)
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = "sentiment-search-bot/0.1")]
    user_agent: String,
    /// Do not fetch or honor robots.txt
    #[arg(long, default_value_t = false)]
    ignore_robots: bool,
    /// Only follow links that stay on the host of the page they were found on
    #[arg(long, default_value_t = false)]
    same_host_only: bool,
    /// Domains (and their subdomains) that are never followed
    #[arg(long = "deny-domain", default_values_t = default_deny_domains())]
    deny_domains: Vec<String>,
    /// Regexes; matching URLs are never followed
    #[arg(long = "deny")]
    deny_patterns: Vec<String>,
    /// Drop English stopwords from page content (build with `--remove-stopwords` too)
    #[arg(long, default_value_t = false)]
    remove_stopwords: bool,
    /// Stem page content (build the index with `indexer build --stem` too)
    #[arg(long, default_value_t = false)]
    stem: bool,
}

fn default_deny_domains() -> Vec<String> {
    ["facebook.com", "twitter.com", "youtube.com", "google.com", "apple.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone)]
struct Robots {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay_ms: Option<u64>,
}

/// Which discovered links may enter the frontier.
struct LinkFilter {
    deny_domains: Vec<String>,
    deny_patterns: Vec<Regex>,
    same_host_only: bool,
}

impl LinkFilter {
    fn allows(&self, link: &Url, found_on: &Url) -> bool {
        if !link.scheme().starts_with("http") { return false; }
        let Some(host) = link.host_str() else { return false };
        if self.same_host_only && Some(host) != found_on.host_str() { return false; }
        let denied_domain = self
            .deny_domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")));
        if denied_domain { return false; }
        !self.deny_patterns.iter().any(|re| re.is_match(link.as_str()))
    }
}

/// Per-run crawl bookkeeping.
#[derive(Default)]
struct Seen { urls: HashSet<String>, emitted: usize }

struct Selectors { title: Selector, text: Selector, links: Selector }

impl Selectors {
    fn new() -> Result<Self> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| anyhow!("invalid selector {s}: {e}"));
        Ok(Self {
            title: parse("title")?,
            text: parse("body header, body h1, body h2, body h3, body h4, body h5, body h6, body p, body span, body footer")?,
            links: parse("a[href]")?,
        })
    }
}

/// Title plus the text of headings, paragraphs, spans, headers and footers,
/// tokenized; and every absolute http(s) link on the page.
fn extract_page(html: &str, base: &Url, selectors: &Selectors, options: &TokenizerOptions) -> (Vec<String>, Vec<Url>) {
    let doc = Html::parse_document(html);
    let mut content = Vec::new();
    if let Some(title) = doc.select(&selectors.title).next() {
        content.extend(clean_terms_with(&title.text().collect::<String>(), options));
    }
    for node in doc.select(&selectors.text) {
        // Only direct text; nested matched elements contribute their own text.
        for child in node.children() {
            if let Some(text) = child.value().as_text() {
                content.extend(clean_terms_with(text, options));
            }
        }
    }
    let links = doc
        .select(&selectors.links)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|h| Url::parse(h).or_else(|_| base.join(h)).ok())
        .filter(|u| u.scheme().starts_with("http"))
        .collect();
    (content, links)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();
    if let Some(dir) = std::path::Path::new(&args.output).parent() {
        fs::create_dir_all(dir)?;
    }

    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let filter = LinkFilter {
        deny_domains: args.deny_domains.clone(),
        deny_patterns: args.deny_patterns.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
        same_host_only: args.same_host_only,
    };
    let options = TokenizerOptions { remove_stopwords: args.remove_stopwords, stem: args.stem };

    let mut frontier: VecDeque<Url> = VecDeque::new();
    let mut raw_seeds = args.start_urls.clone();
    if let Some(seeds) = &args.seeds {
        for line in BufReader::new(File::open(seeds)?).lines() {
            raw_seeds.push(line?);
        }
    }
    for s in raw_seeds {
        let s = s.trim();
        if s.is_empty() || s.starts_with('#') { continue; }
        let u = Url::parse(s).or_else(|_| Url::parse(&format!("https://{}", s)));
        if let Ok(u) = u { frontier.push_back(u); }
    }
    if frontier.is_empty() { return Err(anyhow!("no valid start urls")); }
    tracing::info!(
        seeds = frontier.len(),
        limit = args.limit,
        concurrency = args.concurrency,
        obey_robots = !args.ignore_robots,
        output = %args.output,
        "crawl starting"
    );

    let mut out = BufWriter::new(File::create(&args.output)?);
    let robots_cache: Arc<RwLock<HashMap<String, Robots>>> = Arc::new(RwLock::new(HashMap::new()));
    let selectors = Arc::new(Selectors::new()?);
    let mut seen = Seen::default();
    let mut inflight: Vec<tokio::task::JoinHandle<Option<(Url, Vec<String>, Vec<Url>)>>> = Vec::new();

    while seen.emitted < args.limit && (!frontier.is_empty() || !inflight.is_empty()) {
        // Fill workers
        while inflight.len() < args.concurrency.max(1) && seen.emitted + inflight.len() < args.limit {
            let Some(url) = frontier.pop_front() else { break };
            if !seen.urls.insert(norm(&url)) { continue; }

            let client_c = client.clone();
            let robots_c = robots_cache.clone();
            let selectors_c = selectors.clone();
            let ua = args.user_agent.clone();
            let obey_robots = !args.ignore_robots;

            inflight.push(tokio::spawn(async move {
                if obey_robots {
                    if !allowed(&client_c, &robots_c, &url, &ua).await { return None; }
                    if let Some(delay) = robots_delay(&robots_c, &url) { sleep(Duration::from_millis(delay)).await; }
                }
                let html = fetch_html(&client_c, &url).await?;
                let (content, links) = extract_page(&html, &url, &selectors_c, &options);
                Some((url, content, links))
            }));
        }

        if inflight.is_empty() { break; }

        let mut i = 0;
        while i < inflight.len() {
            if !inflight[i].is_finished() {
                i += 1;
                continue;
            }
            let h = inflight.swap_remove(i);
            let Ok(Some((url, content, links))) = h.await else { continue };
            for l in links {
                if filter.allows(&l, &url) && !seen.urls.contains(&norm(&l)) {
                    frontier.push_back(l);
                }
            }
            if seen.emitted >= args.limit { continue; }
            tracing::info!(url = %url, terms = content.len(), "scraped");
            let rec = Document::new(norm(&url), content);
            serde_json::to_writer(&mut out, &rec)?;
            out.write_all(b"\n")?;
            seen.emitted += 1;
        }
        sleep(Duration::from_millis(10)).await;
    }
    out.flush()?;

    tracing::info!(
        emitted = seen.emitted,
        visited = seen.urls.len(),
        frontier = frontier.len(),
        output = %args.output,
        "crawl done"
    );
    Ok(())
}

async fn fetch_html(client: &Client, url: &Url) -> Option<String> {
    let resp = match client.get(url.clone()).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(%url, error = %e, "fetch failed");
            return None;
        }
    };
    if !resp.status().is_success() { return None; }
    if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
        if let Ok(v) = ct.to_str() { if !v.starts_with("text/html") { return None; } }
    }
    let bytes = resp.bytes().await.ok()?;
    if bytes.len() > 2 * 1024 * 1024 { return None; }
    Some(String::from_utf8_lossy(&bytes).to_string())
}

fn norm(u: &Url) -> String { let mut s = u.clone(); s.set_fragment(None); s.to_string() }

fn parse_robots(txt: &str) -> Robots {
    // minimal parser for the '*' group
    let mut active = false;
    let mut allows = Vec::new();
    let mut disallows = Vec::new();
    let mut crawl_delay_ms: Option<u64> = None;
    for line in txt.lines() {
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') { continue; }
        if let Some((k, v)) = l.split_once(':') {
            let key = k.trim().to_lowercase();
            let val = v.trim();
            match key.as_str() {
                "user-agent" => { active = val == "*"; }
                "allow" if active && !val.is_empty() => allows.push(val.to_string()),
                "disallow" if active && !val.is_empty() => disallows.push(val.to_string()),
                "crawl-delay" if active => {
                    if let Ok(n) = val.parse::<f64>() { crawl_delay_ms = Some((n * 1000.0) as u64); }
                }
                _ => {}
            }
        }
    }
    Robots { allows, disallows, crawl_delay_ms }
}

async fn allowed(client: &Client, cache: &Arc<RwLock<HashMap<String, Robots>>>, url: &Url, ua: &str) -> bool {
    let Some(host) = url.host_str().map(str::to_string) else { return false };
    let rules_opt = { let c = cache.read(); c.get(&host).cloned() };
    let rules = if let Some(r) = rules_opt { r } else {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
        let txt = match client
            .get(&robots_url)
            .header(header::USER_AGENT, ua)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            _ => String::new(),
        };
        let parsed = parse_robots(&txt);
        { let mut c = cache.write(); c.insert(host.clone(), parsed.clone()); }
        parsed
    };
    path_allowed(url.path(), &rules)
}

fn robots_delay(cache: &Arc<RwLock<HashMap<String, Robots>>>, url: &Url) -> Option<u64> {
    let host = url.host_str()?;
    cache.read().get(host).and_then(|r| r.crawl_delay_ms)
}

fn path_allowed(path: &str, rules: &Robots) -> bool {
    // longest matching Allow vs Disallow wins; ties go to Allow
    let longest = |prefixes: &[String]| prefixes.iter().filter(|p| path.starts_with(p.as_str())).map(String::len).max();
    match (longest(&rules.allows), longest(&rules.disallows)) {
        (Some(a), Some(d)) => a >= d,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}
