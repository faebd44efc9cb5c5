use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use sternview_types::{FilterConfig, LogEntry, LogLevel};

use crate::duration::{since_window, window_start};
use crate::pattern::{Pattern, compile_list, last_segment, split_list};

/// One stage of the filter pipeline, with its patterns already compiled
#[derive(Clone, Debug)]
pub enum Stage {
    /// Exact level match
    Level(LogLevel),
    /// Lowercased substring over message, pod and container
    Search(String),
    /// Pod name pattern
    Query(Pattern),
    /// Drop entries stamped more than `window` before the anchor time;
    /// unstamped entries are kept
    Since {
        window: TimeDelta,
        cutoff: DateTime<Utc>,
    },
    /// Message must match at least one pattern
    Include(Vec<Pattern>),
    /// Message must match none of the patterns
    Exclude(Vec<Pattern>),
    /// Container name pattern
    Container(Pattern),
    ExcludeContainer(Vec<Pattern>),
    ExcludePod(Vec<Pattern>),
}

impl Stage {
    pub fn keeps(&self, entry: &LogEntry) -> bool {
        match self {
            Self::Level(level) => entry.level == *level,
            Self::Search(needle) => {
                entry.message.to_lowercase().contains(needle.as_str())
                    || entry.pod_name().to_lowercase().contains(needle.as_str())
                    || entry.container_name().to_lowercase().contains(needle.as_str())
            }
            Self::Query(pattern) => pattern.is_match(entry.pod_name()),
            Self::Since { cutoff, .. } => entry.time.is_none_or(|t| t >= *cutoff),
            Self::Include(patterns) => patterns.iter().any(|p| p.is_match(&entry.message)),
            Self::Exclude(patterns) => !patterns.iter().any(|p| p.is_match(&entry.message)),
            Self::Container(pattern) => pattern.is_match(entry.container_name()),
            Self::ExcludeContainer(patterns) => {
                !patterns.iter().any(|p| p.is_match(entry.container_name()))
            }
            Self::ExcludePod(patterns) => !patterns.iter().any(|p| p.is_match(entry.pod_name())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Level(_) => "level",
            Self::Search(_) => "search",
            Self::Query(_) => "query",
            Self::Since { .. } => "since",
            Self::Include(_) => "include",
            Self::Exclude(_) => "exclude",
            Self::Container(_) => "container",
            Self::ExcludeContainer(_) => "exclude_container",
            Self::ExcludePod(_) => "exclude_pod",
        }
    }
}

/// Compiled filter pipeline.
///
/// Stages run in a fixed order: level, search, query, since, include,
/// exclude, container, excluded containers, excluded pods. A stage whose
/// configuration is empty is not compiled at all.
#[derive(Clone, Debug, Default)]
pub struct CompiledFilter {
    stages: Vec<Stage>,
}

impl CompiledFilter {
    /// Compile a filter configuration. `now` anchors the since-duration window.
    pub fn new(config: &FilterConfig, now: DateTime<Utc>) -> Self {
        let mut stages = Vec::new();

        if let Some(level) = config.level {
            stages.push(Stage::Level(level));
        }

        if !config.search.is_empty() {
            stages.push(Stage::Search(config.search.to_lowercase()));
        }

        let query = config.query.trim();
        if !query.is_empty() && query != "." {
            stages.push(Stage::Query(Pattern::new(query)));
        }

        if let Some(window) = config.window.since_token().and_then(since_window) {
            stages.push(Stage::Since {
                window,
                cutoff: window_start(window, now),
            });
        }

        let include = compile_list(&config.include);
        if !include.is_empty() {
            stages.push(Stage::Include(include));
        }

        let exclude = compile_list(&config.exclude);
        if !exclude.is_empty() {
            stages.push(Stage::Exclude(exclude));
        }

        let container = config.container.trim();
        if !container.is_empty() {
            stages.push(Stage::Container(Pattern::new(last_segment(container))));
        }

        let exclude_container: Vec<Pattern> = split_list(&config.exclude_container)
            .map(|p| Pattern::new(last_segment(p)))
            .collect();
        if !exclude_container.is_empty() {
            stages.push(Stage::ExcludeContainer(exclude_container));
        }

        let exclude_pod = compile_list(&config.exclude_pod);
        if !exclude_pod.is_empty() {
            stages.push(Stage::ExcludePod(exclude_pod));
        }

        tracing::debug!(
            stages = ?stages.iter().map(Stage::name).collect::<Vec<_>>(),
            "compiled filter pipeline"
        );

        Self { stages }
    }

    /// Move the since window so it ends at `now`. Call before each query;
    /// other stages are unaffected.
    pub fn reanchor(&mut self, now: DateTime<Utc>) {
        for stage in &mut self.stages {
            if let Stage::Since { window, cutoff } = stage {
                *cutoff = window_start(*window, now);
            }
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check if a log entry passes every stage
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.stages.iter().all(|stage| stage.keeps(entry))
    }

    /// The subsequence of `entries` that passes the pipeline, in input order
    pub fn apply<'a, I>(&self, entries: I) -> Vec<Arc<LogEntry>>
    where
        I: IntoIterator<Item = &'a Arc<LogEntry>>,
    {
        entries
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect()
    }
}

/// Compile `config` against the current time and apply it to `entries`
pub fn apply_filters<'a, I>(entries: I, config: &FilterConfig) -> Vec<Arc<LogEntry>>
where
    I: IntoIterator<Item = &'a Arc<LogEntry>>,
{
    CompiledFilter::new(config, Utc::now()).apply(entries)
}
