//! Colorful console output for search events.
//!
//! Provides a custom `tracing` layer that formats search lifecycle events
//! with colors.
//!
//! ## Log Levels
//!
//! - **INFO**: Search start and end
//! - **WARN**: Aborted searches
//! - **DEBUG**: Incumbent improvements

use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

const DEFAULT_FILTER: &str = "bnbforge_search=info";

/// Initializes the search console output.
///
/// Safe to call multiple times - only the first call has effect.
/// `RUST_LOG` overrides the default `bnbforge_search=info` filter.
pub fn init() {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);
        print_banner();

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(SearchConsoleLayer)
            .try_init();
    });
}

fn print_banner() {
    let banner = r#"
 ____        ____  _____
| __ ) _ __ | __ )|  ___|__  _ __ __ _  ___
|  _ \| '_ \|  _ \| |_ / _ \| '__/ _` |/ _ \
| |_) | | | | |_) |  _| (_) | | | (_| |  __/
|____/|_| |_|____/|_|  \___/|_|  \__, |\___|
                                 |___/
"#;

    let version_line = format!(
        "            v{} - Distributed Branch and Bound\n",
        env!("CARGO_PKG_VERSION")
    );

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats search events with colors.
pub struct SearchConsoleLayer;

impl<S: Subscriber> Layer<S> for SearchConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with("bnbforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    objective: Option<String>,
    bound: Option<String>,
    path: Option<String>,
    error: Option<String>,
    localities: Option<u64>,
    threads_per_locality: Option<u64>,
    locality: Option<u64>,
    nodes: Option<u64>,
    pruned: Option<u64>,
    steals: Option<u64>,
    duration_ms: Option<u64>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value).trim_matches('"').to_string();
        match field.name() {
            "event" => self.event = Some(s),
            "objective" => self.objective = Some(s),
            "bound" => self.bound = Some(s),
            "path" => self.path = Some(s),
            "error" => self.error = Some(s),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "localities" => self.localities = Some(value),
            "threads_per_locality" => self.threads_per_locality = Some(value),
            "locality" => self.locality = Some(value),
            "nodes" => self.nodes = Some(value),
            "pruned" => self.pruned = Some(value),
            "steals" => self.steals = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value as u64);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_debug(field, &value);
    }
}

fn format_event(v: &EventVisitor) -> String {
    match v.event.as_deref().unwrap_or("") {
        "search_start" => format_search_start(v),
        "search_end" => format_search_end(v),
        "search_aborted" => format_search_aborted(v),
        "incumbent_improved" => format_improvement(v),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    let secs = EPOCH
        .get()
        .map(|epoch| epoch.elapsed().as_secs_f64())
        .unwrap_or(0.0);
    format!("{:>7.3}s", secs).bright_black().to_string()
}

fn format_count(n: Option<u64>) -> String {
    n.unwrap_or(0).to_formatted_string(&Locale::en)
}

fn format_search_start(v: &EventVisitor) -> String {
    format!(
        "{} {} Searching │ {} localities │ {} threads each │ {}",
        format_elapsed(),
        "▶".bright_green().bold(),
        format_count(v.localities).bright_yellow(),
        format_count(v.threads_per_locality).bright_yellow(),
        v.objective.as_deref().unwrap_or("maximize").bright_magenta(),
    )
}

fn format_search_end(v: &EventVisitor) -> String {
    format!(
        "{} {} Search complete │ best {} │ {} nodes │ {} pruned │ {} steals │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        v.bound.as_deref().unwrap_or("N/A").bright_green().bold(),
        format_count(v.nodes).white(),
        format_count(v.pruned).white(),
        format_count(v.steals).white(),
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow(),
    )
}

fn format_search_aborted(v: &EventVisitor) -> String {
    format!(
        "{} {} Search aborted on locality {} at {} │ {}",
        format_elapsed(),
        "✗".bright_red().bold(),
        v.locality.unwrap_or(0),
        v.path.as_deref().unwrap_or("?"),
        v.error.as_deref().unwrap_or("unknown error").bright_red(),
    )
}

fn format_improvement(v: &EventVisitor) -> String {
    format!(
        "{} {} New incumbent {}",
        format_elapsed(),
        "↑".bright_green(),
        v.bound.as_deref().unwrap_or("N/A").bright_green(),
    )
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(1500), "1.50s");
        assert_eq!(format_duration_ms(125_000), "2m 5s");
    }

    #[test]
    fn test_unknown_events_are_silent() {
        let visitor = EventVisitor {
            event: Some("steal_granted".to_string()),
            ..Default::default()
        };
        assert!(format_event(&visitor).is_empty());
    }

    #[test]
    fn test_search_end_mentions_counts() {
        let visitor = EventVisitor {
            event: Some("search_end".to_string()),
            bound: Some("42".to_string()),
            nodes: Some(12_345),
            ..Default::default()
        };
        let line = format_event(&visitor);
        assert!(line.contains("42"));
        assert!(line.contains("12,345"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
