//! Tracing configuration for debugging proxy builds and call-site linking.
//!
//! Supports three output formats controlled by `INDY_LOG_FORMAT`:
//!
//! - `text` (default): Standard `tracing-subscriber` flat output
//! - `tree`: Hierarchical indented output via `tracing-tree`
//! - `json`: One JSON object per span/event
//!
//! ## Quick start
//!
//! ```bash
//! # Build phases only
//! INDY_LOG=indy_proxy=debug cargo test --test proxy_scenarios
//!
//! # Every strategy consultation and call-site link
//! INDY_LOG=indy_proxy=trace INDY_LOG_FORMAT=tree cargo test
//!
//! # Loader and universe as well, as JSON
//! INDY_LOG="indy_proxy=trace,indy_classfile=debug" INDY_LOG_FORMAT=json cargo test
//! ```
//!
//! The subscriber is only initialised when `INDY_LOG` (or `RUST_LOG`) is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Parse from the `INDY_LOG_FORMAT` environment variable.
    fn from_env() -> Self {
        Self::parse(&std::env::var("INDY_LOG_FORMAT").unwrap_or_default())
    }
}

/// `INDY_LOG` takes precedence over `RUST_LOG`.
fn build_filter() -> EnvFilter {
    if let Ok(val) = std::env::var("INDY_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else {
        EnvFilter::from_default_env()
    }
}

/// Initialise the global tracing subscriber.
///
/// Does nothing when neither `INDY_LOG` nor `RUST_LOG` is set. A subscriber
/// installed earlier (by the host application) is left in place.
pub fn init_tracing() {
    let has_indy_log = std::env::var("INDY_LOG").is_ok();
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if !has_indy_log && !has_rust_log {
        return;
    }

    let filter = build_filter();
    // Err means a global subscriber already exists.
    let _ = match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_targets(true);
            Registry::default().with(filter).with(tree_layer).try_init()
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            Registry::default().with(filter).with(json_layer).try_init()
        }
        LogFormat::Text => {
            let text_layer = fmt::layer().with_writer(std::io::stderr);
            Registry::default().with(filter).with(text_layer).try_init()
        }
    };
}

#[cfg(test)]
#[path = "tests/tracing_config_tests.rs"]
mod tests;
