// src/log_level/mod.rs
//
// Reports the active log filter as a target -> level map.

use std::collections::BTreeMap;
use tracing::debug;
use tracing_subscriber::{reload, EnvFilter};

/// Key used for directives that carry no target.
pub const DEFAULT_TARGET: &str = "default";

pub type LogLevels = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum LogLevelError {
    #[error("Failed to read log filter: {0}")]
    Unavailable(#[from] reload::Error),
}

type CurrentFilter = Box<dyn Fn() -> Result<String, reload::Error> + Send + Sync>;

pub struct LogLevelService {
    current: CurrentFilter,
}

impl LogLevelService {
    /// Reads levels through the handle of a reloadable `EnvFilter` layer.
    pub fn from_reload_handle<S: 'static>(handle: reload::Handle<EnvFilter, S>) -> Self {
        Self {
            current: Box::new(move || handle.with_current(|filter| filter.to_string())),
        }
    }

    pub fn get_log_levels(&self) -> Result<LogLevels, LogLevelError> {
        debug!("Get log levels for all loggers");
        let filter = (self.current)()?;
        Ok(parse_directives(&filter))
    }
}

// Directives are comma separated; field filters (`target[{a,b}]=level`) may
// contain commas of their own inside brackets.
fn parse_directives(filter: &str) -> LogLevels {
    let mut levels = LogLevels::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, ch) in filter.char_indices() {
        match ch {
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                insert_directive(&mut levels, &filter[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    insert_directive(&mut levels, &filter[start..]);

    levels
}

fn insert_directive(levels: &mut LogLevels, directive: &str) {
    let directive = directive.trim();
    if directive.is_empty() {
        return;
    }

    let (target, level) = match directive.rsplit_once('=') {
        Some((target, level)) => (target, level),
        None => (DEFAULT_TARGET, directive),
    };
    levels.insert(target.to_string(), level.to_ascii_uppercase());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_levels_from_reloadable_filter() {
        let filter = EnvFilter::new("info,health_aggregator=debug,hyper=warn");
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(filter);
        let service = LogLevelService::from_reload_handle(handle.clone());

        let levels = service.get_log_levels().unwrap();
        assert_eq!(levels[DEFAULT_TARGET], "INFO");
        assert_eq!(levels["health_aggregator"], "DEBUG");
        assert_eq!(levels["hyper"], "WARN");

        handle.reload(EnvFilter::new("error")).unwrap();
        let levels = service.get_log_levels().unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[DEFAULT_TARGET], "ERROR");

        drop(layer);
        assert!(matches!(
            service.get_log_levels(),
            Err(LogLevelError::Unavailable(_))
        ));
    }

    #[test]
    fn test_field_filters_keep_their_commas() {
        let levels = parse_directives("warn,healthd[request{method,path}]=trace");
        assert_eq!(levels.len(), 2);
        assert_eq!(levels["healthd[request{method,path}]"], "TRACE");
    }
}
