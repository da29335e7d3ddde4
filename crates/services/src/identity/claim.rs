//! Claim-post verification.
//!
//! A journalist proves control of a social account by posting:
//!
//! ```text
//! I claim this agent: <name>
//! we are the news now <tag>
//! verification_code: <code>
//! ```
//!
//! The post is retrieved through an ordered list of `PostFetcher`
//! strategies; the first one whose content carries the claim wins.

use std::sync::Arc;
use std::time::Duration;

use domains::models::PostRef;
use domains::ports::PostFetcher;
use once_cell::sync::Lazy;
use regex::Regex;

static STATUS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:twitter\.com|x\.com)/([^/?#]+)/status/(\d+)")
        .expect("status url pattern is valid")
});

/// Entity and markup variants seen in embed and mirror pages.
const DECODINGS: &[(&str, &str)] = &[
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&amp;", "&"),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&#x27;", "'"),
    ("<br>", "\n"),
    ("<br/>", "\n"),
    ("<br />", "\n"),
    ("\\n", "\n"),
];

/// Extracts the poster handle and post id from a status URL.
pub fn parse_status_url(url: &str) -> Option<PostRef> {
    STATUS_URL.captures(url).map(|c| PostRef {
        handle: c[1].to_string(),
        post_id: c[2].to_string(),
    })
}

/// Picks the handle segment following a twitter.com / x.com host, even when
/// the rest of the URL is not a status link.
pub fn handle_from_url(url: &str) -> Option<String> {
    let parts: Vec<&str> = url.split('/').collect();
    parts
        .iter()
        .position(|p| p.eq_ignore_ascii_case("twitter.com") || p.eq_ignore_ascii_case("x.com"))
        .and_then(|i| parts.get(i + 1))
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

/// The phrase a claim post has to contain.
#[derive(Debug, Clone)]
pub struct ClaimTemplate {
    tag: String,
    pattern: Regex,
}

impl ClaimTemplate {
    pub fn new(tag: &str) -> Self {
        let pattern = Regex::new(&format!(
            r"(?is)I\s+claim\s+this\s+agent[:\s]+([^\n\r]+).*?we\s+are\s+the\s+news\s+now\s*{}.*?verification_code[:\s]+([a-f0-9]+)",
            regex::escape(tag)
        ))
        .expect("escaped claim pattern is valid");
        Self {
            tag: tag.to_string(),
            pattern,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The text a journalist is asked to post.
    pub fn render(&self, name: &str, code: &str) -> String {
        format!(
            "I claim this agent: {name}\nwe are the news now {}\nverification_code: {code}",
            self.tag
        )
    }

    /// Strict multi-line match first, then a looser "every required piece is
    /// present" check for content mangled by markup.
    pub fn matches(&self, content: &str, name: &str, code: &str) -> bool {
        let decoded = decode(content);

        let strict = self.pattern.captures_iter(&decoded).any(|c| {
            c[1].trim().eq_ignore_ascii_case(name.trim()) && c[2].trim() == code
        });
        if strict {
            return true;
        }

        let lower = decoded.to_lowercase();
        let tag = self.tag.trim_start_matches('@').to_lowercase();
        lower.contains(&name.to_lowercase())
            && decoded.contains(code)
            && lower.contains("i claim this agent")
            && lower.contains("we are the news now")
            && lower.contains(&tag)
    }
}

fn decode(content: &str) -> String {
    DECODINGS
        .iter()
        .fold(content.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Result of trying every strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A strategy returned content carrying the claim.
    Confirmed { source: String },
    /// Content was retrieved but none of it carried the claim.
    Mismatch { attempts: usize },
    /// No strategy returned content.
    Unreachable { attempts: usize },
}

pub struct ClaimVerifier {
    fetchers: Vec<Arc<dyn PostFetcher>>,
    template: ClaimTemplate,
    deadline: Duration,
}

impl ClaimVerifier {
    pub fn new(fetchers: Vec<Arc<dyn PostFetcher>>, template: ClaimTemplate, deadline: Duration) -> Self {
        Self {
            fetchers,
            template,
            deadline,
        }
    }

    pub fn template(&self) -> &ClaimTemplate {
        &self.template
    }

    /// Tries each strategy in order under one overall deadline.
    pub async fn confirm(&self, post: &PostRef, name: &str, code: &str) -> ClaimOutcome {
        let mut attempts = 0usize;
        let mut fetched_any = false;

        let run = async {
            for fetcher in &self.fetchers {
                attempts += 1;
                match fetcher.fetch(post).await {
                    Ok(content) => {
                        fetched_any = true;
                        if self.template.matches(&content, name, code) {
                            return Some(fetcher.name().to_string());
                        }
                        tracing::debug!(source = fetcher.name(), handle = %post.handle, "claim not found in fetched post");
                    }
                    Err(e) => {
                        tracing::debug!(source = fetcher.name(), error = %e, "post fetch strategy failed");
                    }
                }
            }
            None
        };

        let confirmed = match tokio::time::timeout(self.deadline, run).await {
            Ok(found) => found,
            Err(_) => {
                tracing::warn!(handle = %post.handle, "claim verification deadline elapsed");
                None
            }
        };

        match confirmed {
            Some(source) => ClaimOutcome::Confirmed { source },
            None if fetched_any => ClaimOutcome::Mismatch { attempts },
            None => ClaimOutcome::Unreachable { attempts },
        }
    }
}
