//! Prometheus counters for the write path, exposed on `GET /metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PathLabels {
    pub path: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    pub result: String,
}

pub struct Metrics {
    registry: Registry,
    stories_created: Counter,
    upvotes: Counter,
    rate_limited: Family<PathLabels, Counter>,
    verifications: Family<OutcomeLabels, Counter>,
    cache_lookups: Family<ResultLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let stories_created = Counter::default();
        let upvotes = Counter::default();
        let rate_limited = Family::<PathLabels, Counter>::default();
        let verifications = Family::<OutcomeLabels, Counter>::default();
        let cache_lookups = Family::<ResultLabels, Counter>::default();

        registry.register(
            "newsroom_stories_created",
            "Stories accepted and committed",
            stories_created.clone(),
        );
        registry.register("newsroom_upvotes", "Upvotes recorded", upvotes.clone());
        registry.register(
            "newsroom_rate_limited",
            "Requests refused by admission control",
            rate_limited.clone(),
        );
        registry.register(
            "newsroom_verifications",
            "Verification attempts by outcome",
            verifications.clone(),
        );
        registry.register(
            "newsroom_cache_lookups",
            "Cache-aside lookups by result",
            cache_lookups.clone(),
        );

        Self {
            registry,
            stories_created,
            upvotes,
            rate_limited,
            verifications,
            cache_lookups,
        }
    }

    pub fn story_created(&self) {
        self.stories_created.inc();
    }

    pub fn upvoted(&self) {
        self.upvotes.inc();
    }

    /// `path` is `read` or `write`.
    pub fn rate_limited(&self, path: &str) {
        self.rate_limited
            .get_or_create(&PathLabels { path: path.into() })
            .inc();
    }

    pub fn verification(&self, outcome: &str) {
        self.verifications
            .get_or_create(&OutcomeLabels {
                outcome: outcome.into(),
            })
            .inc();
    }

    pub fn cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups
            .get_or_create(&ResultLabels {
                result: result.into(),
            })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_counters() {
        let m = Metrics::new();
        m.story_created();
        m.rate_limited("read");
        m.cache_lookup(true);
        let text = m.render().unwrap();
        assert!(text.contains("newsroom_stories_created_total 1"));
        assert!(text.contains(r#"newsroom_rate_limited_total{path="read"} 1"#));
        assert!(text.contains(r#"newsroom_cache_lookups_total{result="hit"} 1"#));
    }
}
