//! The two capabilities the pipeline consumes: fetching an encyclopedia document
//! and running a news search. Stages only see the traits; [`HttpSource`] is the
//! blocking HTTP implementation used by the binary.

use crate::error::{FetchError, TaskError};
use log::debug;
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const WIKI_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/81.0.4003.0 Safari/537.36 Edg/81.0.381.0";

static GOOGLE_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.l.lLrAF").unwrap());
static GOOGLE_SITE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.xQ82C.e8fRJf").unwrap());
static GOOGLE_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("span.f.nsa.fwzPFf").unwrap());
static GOOGLE_DESC: Lazy<Selector> = Lazy::new(|| Selector::parse("div.st").unwrap());
static BING_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("a.title").unwrap());
static BING_SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.source").unwrap());
static BING_SNIPPET: Lazy<Selector> = Lazy::new(|| Selector::parse("div.snippet").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Google,
    Bing,
}

impl Engine {
    pub fn label(&self) -> &'static str {
        match self {
            Engine::Google => "Google",
            Engine::Bing => "Bing",
        }
    }
}

impl FromStr for Engine {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g" | "G" | "google" => Ok(Engine::Google),
            "b" | "B" | "bing" => Ok(Engine::Bing),
            other => Err(TaskError::invalid(format!(
                "invalid engine '{}', expected one of (\"g\", \"G\", \"google\") or (\"b\", \"B\", \"bing\")",
                other
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub publisher: String,
    pub timestamp: Option<String>,
    pub description: Option<String>,
}

pub trait DocumentSource: Send + Sync {
    fn fetch_document(&self, url: &str) -> Result<String, FetchError>;
}

pub trait NewsSearch: Send + Sync {
    fn search_news(&self, query: &str, engine: Engine, result_count: usize, prefer_english: bool) -> Result<Vec<SearchHit>, FetchError>;
}

/// Reference-document link for an encyclopedia title.
pub fn wiki_link(title: &str) -> String {
    format!("{}{}", WIKI_BASE_URL, title.replace(' ', "_"))
}

pub fn search_url(query: &str, engine: Engine, result_count: usize, prefer_english: bool) -> String {
    let quoted = query.split(' ').map(|word| urlencoding::encode(word).into_owned()).collect::<Vec<_>>().join("+");
    match engine {
        Engine::Google => {
            let lang = if prefer_english { "&hl=en&lr=lang_en" } else { "" };
            format!("https://www.google.com/search?q=\"{}\"&tbm=nws&num={}&safe=active{}", quoted, result_count, lang)
        }
        Engine::Bing => {
            let lang = if prefer_english { "&mkt=en-US" } else { "" };
            format!("https://www.bing.com/news/?q=\"{}\"&count={}&safeSearch=strict{}", quoted, result_count, lang)
        }
    }
}

pub fn parse_google_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let times: Vec<String> = document.select(&GOOGLE_TIME).map(|e| e.text().collect::<String>()).collect();
    let descriptions: Vec<String> = document.select(&GOOGLE_DESC).map(|e| e.text().collect::<String>()).collect();
    document
        .select(&GOOGLE_LINK)
        .zip(document.select(&GOOGLE_SITE))
        .enumerate()
        .map(|(i, (link, site))| SearchHit {
            url: link.value().attr("href").unwrap_or_default().to_string(),
            publisher: site.text().collect::<String>().trim().to_string(),
            timestamp: times.get(i).cloned(),
            description: descriptions.get(i).cloned(),
        })
        .collect()
}

pub fn parse_bing_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let sources: Vec<String> = document.select(&BING_SOURCE).map(|e| e.text().collect::<String>()).collect();
    let snippets: Vec<Option<String>> = document.select(&BING_SNIPPET).map(|e| e.value().attr("title").map(str::to_string)).collect();
    document
        .select(&BING_TITLE)
        .enumerate()
        .filter_map(|(i, title)| {
            let publisher = title.value().attr("data-author")?;
            Some(SearchHit {
                url: title.value().attr("href").unwrap_or_default().to_string(),
                publisher: publisher.to_string(),
                timestamp: sources.get(i).cloned(),
                description: snippets.get(i).cloned().flatten(),
            })
        })
        .collect()
}

/// Blocking HTTP client behind both capabilities. HTTP 429 maps to
/// [`FetchError::RateLimited`], any other non-200 to [`FetchError::FetchFailed`].
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(61))
            .timeout(Duration::from_secs(182))
            .build()?;
        Ok(Self { client })
    }

    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let connection_error = |e: reqwest::Error| FetchError::Connection { url: url.to_string(), message: e.to_string() };
        let response = self.client.get(url).send().map_err(connection_error)?;
        match response.status() {
            StatusCode::OK => response.text().map_err(connection_error),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited { url: url.to_string() }),
            status => Err(FetchError::FetchFailed { url: url.to_string(), status: status.as_u16() }),
        }
    }
}

impl DocumentSource for HttpSource {
    fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching document {}", url);
        self.get_text(url)
    }
}

impl NewsSearch for HttpSource {
    fn search_news(&self, query: &str, engine: Engine, result_count: usize, prefer_english: bool) -> Result<Vec<SearchHit>, FetchError> {
        let url = search_url(query, engine, result_count, prefer_english);
        debug!("{} news search: {}", engine, url);
        let html = self.get_text(&url)?;
        Ok(match engine {
            Engine::Google => parse_google_results(&html),
            Engine::Bing => parse_bing_results(&html),
        })
    }
}
