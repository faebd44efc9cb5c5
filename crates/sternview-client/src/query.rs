use chrono::{DateTime, Utc};

use sternview_types::{StreamConfig, TimeWindow};

/// Path of the streaming endpoint on the server
pub const STREAM_PATH: &str = "/ws/logs";

/// Server default for `maxLogRequests`
pub const DEFAULT_MAX_LOG_REQUESTS: u32 = 50;

/// Concurrency cap substituted when streaming every pod in every namespace
pub const ELEVATED_MAX_LOG_REQUESTS: u32 = 200;

/// Canonical, sparse query for one stream: only non-default fields appear,
/// in a fixed order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamQuery {
    params: Vec<(&'static str, String)>,
}

impl StreamQuery {
    pub fn from_config(config: &StreamConfig) -> Self {
        let mut query = Self::default();
        let filter = &config.filter;

        let pod_query = filter.query.trim();
        let pod_query = if pod_query.is_empty() { "." } else { pod_query };
        query.push("query", pod_query);

        query.push_non_empty("namespace", &config.namespace);
        query.push_non_empty("selector", &config.selector);

        match &filter.window {
            TimeWindow::Since { duration } => query.push_non_empty("since", duration),
            TimeWindow::Absolute { start, end } => {
                query.push("timeMode", "absolute");
                query.push("startTime", format_minute(*start));
                if let Some(end) = end {
                    query.push("endTime", format_minute(*end));
                }
            }
        }

        query.push_non_empty("container", &filter.container);
        query.push_non_empty("excludeContainer", &filter.exclude_container);
        query.push_non_empty("excludePod", &filter.exclude_pod);
        let state = config.container_state.trim();
        if !state.is_empty() && state != "all" {
            query.push("containerState", state);
        }
        query.push_non_empty("include", &filter.include);
        query.push_non_empty("exclude", &filter.exclude);
        query.push_non_empty("highlight", &config.highlight);
        if config.tail >= 0 {
            query.push("tail", config.tail.to_string());
        }
        query.push_non_empty("node", &config.node);
        if config.all_namespaces {
            query.push("allNamespaces", "true");
        }
        if !config.init_containers {
            query.push("initContainers", "false");
        }
        if !config.ephemeral_containers {
            query.push("ephemeralContainers", "false");
        }
        query.push_non_empty("timestamps", &config.timestamps);
        if config.no_follow {
            query.push("noFollow", "true");
        }
        query.push_non_empty("context", &config.context);

        let max_requests = effective_max_log_requests(config);
        if max_requests != DEFAULT_MAX_LOG_REQUESTS {
            query.push("maxLogRequests", max_requests.to_string());
        }

        query
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// URL-encoded `key=value&...` form
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full stream URL under `base` (e.g. `ws://localhost:8080`)
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}{}?{}",
            base.trim_end_matches('/'),
            STREAM_PATH,
            self.to_query_string()
        )
    }

    fn push(&mut self, key: &'static str, value: impl Into<String>) {
        self.params.push((key, value.into()));
    }

    fn push_non_empty(&mut self, key: &'static str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.push(key, value);
        }
    }
}

/// The `maxLogRequests` actually sent. Streaming all pods across all
/// namespaces raises the cap so the server does not refuse the request.
pub fn effective_max_log_requests(config: &StreamConfig) -> u32 {
    let query = config.filter.query.trim();
    let unscoped = query.is_empty() || query == ".";
    if config.all_namespaces && unscoped {
        config.max_log_requests.max(ELEVATED_MAX_LOG_REQUESTS)
    } else {
        config.max_log_requests
    }
}

/// UTC, minute precision
fn format_minute(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%MZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_config_is_sparse() {
        let query = StreamQuery::from_config(&StreamConfig::default());
        assert_eq!(query.params(), &[("query", ".".to_string())]);
        assert_eq!(query.to_query_string(), "query=.");
    }

    #[test]
    fn test_empty_query_becomes_match_all() {
        let mut config = StreamConfig::default();
        config.filter.query = "  ".into();
        assert_eq!(StreamQuery::from_config(&config).get("query"), Some("."));
    }

    #[test]
    fn test_full_config() {
        let mut config = StreamConfig::default();
        config.filter.query = "api-.*".into();
        config.filter.window = TimeWindow::since("15m");
        config.filter.include = "error".into();
        config.filter.exclude_pod = "canary".into();
        config.namespace = "prod".into();
        config.selector = "app=api".into();
        config.container_state = "running".into();
        config.tail = 100;
        config.init_containers = false;
        config.no_follow = true;
        config.context = "kind-dev".into();
        config.max_log_requests = 10;

        let query = StreamQuery::from_config(&config);
        assert_eq!(query.get("query"), Some("api-.*"));
        assert_eq!(query.get("since"), Some("15m"));
        assert_eq!(query.get("namespace"), Some("prod"));
        assert_eq!(query.get("containerState"), Some("running"));
        assert_eq!(query.get("tail"), Some("100"));
        assert_eq!(query.get("initContainers"), Some("false"));
        assert_eq!(query.get("ephemeralContainers"), None);
        assert_eq!(query.get("noFollow"), Some("true"));
        assert_eq!(query.get("maxLogRequests"), Some("10"));
        assert_eq!(query.get("timeMode"), None);
        assert_eq!(query.get("allNamespaces"), None);
    }

    #[test]
    fn test_client_only_fields_are_not_sent() {
        let mut config = StreamConfig::default();
        config.filter.search = "db".into();
        config.filter.level = Some(sternview_types::LogLevel::Error);
        assert_eq!(StreamQuery::from_config(&config).params().len(), 1);
    }

    #[test]
    fn test_absolute_window() {
        let mut config = StreamConfig::default();
        config.filter.window = TimeWindow::Absolute {
            start: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            end: Some(Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap()),
        };
        let query = StreamQuery::from_config(&config);
        assert_eq!(query.get("timeMode"), Some("absolute"));
        assert_eq!(query.get("startTime"), Some("2024-01-15T10:30Z"));
        assert_eq!(query.get("endTime"), Some("2024-01-15T11:00Z"));
        assert_eq!(query.get("since"), None);
    }

    #[test]
    fn test_elevated_cap_for_all_namespaces() {
        let mut config = StreamConfig {
            all_namespaces: true,
            ..StreamConfig::default()
        };
        let query = StreamQuery::from_config(&config);
        assert_eq!(query.get("allNamespaces"), Some("true"));
        assert_eq!(query.get("maxLogRequests"), Some("200"));

        config.max_log_requests = 500;
        assert_eq!(effective_max_log_requests(&config), 500);

        config.max_log_requests = 50;
        config.filter.query = "api".into();
        assert_eq!(effective_max_log_requests(&config), 50);
    }

    #[test]
    fn test_url_encoding() {
        let mut config = StreamConfig::default();
        config.selector = "app in (a,b)".into();
        let url = StreamQuery::from_config(&config).url("ws://localhost:8080/");
        assert_eq!(
            url,
            "ws://localhost:8080/ws/logs?query=.&selector=app%20in%20%28a%2Cb%29"
        );
    }
}
