//! Output formatting for CLI

use console::style;
use kino_runtime::{Event, PlayerEvent, PluginDescriptor, StateSnapshot};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

pub fn to_json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

#[derive(Tabled)]
struct PluginRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Depends on")]
    dependencies: String,
    #[tabled(rename = "State")]
    state: String,
}

/// Render plugin descriptors in the requested format
pub fn format_plugins(descriptors: &[PluginDescriptor], format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return to_json(&descriptors);
    }

    let rows: Vec<PluginRow> = descriptors
        .iter()
        .map(|d| PluginRow {
            id: d.info.id.clone(),
            name: d.info.name.clone(),
            version: d.info.version.to_string(),
            category: d.info.category.to_string(),
            dependencies: d
                .info
                .dependencies
                .iter()
                .map(|dep| match &dep.version_req {
                    Some(req) => format!("{} {}", dep.id, req),
                    None => dep.id.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            state: d.state.to_string(),
        })
        .collect();

    match format {
        OutputFormat::Table => Ok(Table::new(rows).with(Style::rounded()).to_string()),
        _ => Ok(rows
            .iter()
            .map(|r| {
                let deps = if r.dependencies.is_empty() {
                    String::new()
                } else {
                    format!(" (needs {})", r.dependencies)
                };
                format!("  {:<14} {:<8} {:<10} {}{}", r.id, r.version, r.category, r.state, deps)
            })
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render a state snapshot in the requested format
pub fn format_state(snapshot: &StateSnapshot, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return to_json(snapshot);
    }

    let serde_json::Value::Object(fields) = serde_json::to_value(snapshot)? else {
        anyhow::bail!("state snapshot did not serialize to an object");
    };
    let rows: Vec<FieldRow> = fields
        .into_iter()
        .map(|(field, value)| FieldRow {
            field,
            value: match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Array(items) => format!("{} entries", items.len()),
                other => other.to_string(),
            },
        })
        .collect();

    match format {
        OutputFormat::Table => Ok(Table::new(rows).with(Style::rounded()).to_string()),
        _ => Ok(rows
            .iter()
            .map(|r| format!("  {:<20} {}", r.field, r.value))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// One styled line for the session event log
pub fn event_line(event: &PlayerEvent) -> String {
    let name = event.name().to_string();
    let detail = match event {
        PlayerEvent::LoadStart { source } => source.clone(),
        PlayerEvent::Loaded { source, provider } => format!("{source} via {provider}"),
        PlayerEvent::Seeking { from, to } => format!("{from:.1}s -> {to:.1}s"),
        PlayerEvent::Seeked { position } => format!("{position:.1}s"),
        PlayerEvent::VolumeChange { volume, muted } => format!("volume {volume:.2} muted {muted}"),
        PlayerEvent::RateChange { rate } => format!("{rate}x"),
        PlayerEvent::LevelsLoaded { levels } => levels
            .iter()
            .map(|l| l.label.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        PlayerEvent::QualityChange { level, auto } => match (level, auto) {
            (_, true) => "auto".to_string(),
            (Some(level), false) => format!("level {level}"),
            (None, false) => "none".to_string(),
        },
        PlayerEvent::LiveUpdate { info } => format!("latency {:.1}s edge {}", info.latency, info.at_live_edge),
        PlayerEvent::Error(err) => format!("{} {}{}", err.code, err.message, if err.fatal { " (fatal)" } else { "" }),
        PlayerEvent::PluginRegistered { id }
        | PlayerEvent::PluginReady { id }
        | PlayerEvent::PluginDestroyed { id }
        | PlayerEvent::PluginUnregistered { id } => id.clone(),
        PlayerEvent::PluginError { id, message } => format!("{id}: {message}"),
        PlayerEvent::Custom { data, .. } => data.to_string(),
        _ => String::new(),
    };

    let label = match event {
        PlayerEvent::Error(_) | PlayerEvent::PluginError { .. } => style(format!("{name:<18}")).red().bold(),
        PlayerEvent::PluginRegistered { .. }
        | PlayerEvent::PluginReady { .. }
        | PlayerEvent::PluginDestroyed { .. }
        | PlayerEvent::PluginUnregistered { .. } => style(format!("{name:<18}")).dim(),
        _ => style(format!("{name:<18}")).cyan(),
    };
    format!("  {label} {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_runtime::{ErrorCode, PlayerErrorInfo, StateStore};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_format_state_text() {
        let snapshot = StateStore::new().snapshot().unwrap();
        let text = format_state(&snapshot, OutputFormat::Text).unwrap();
        assert!(text.contains("volume"));
        assert!(text.contains("quality_levels       0 entries"));

        let json = format_state(&snapshot, OutputFormat::Json).unwrap();
        assert!(json.contains("\"playback_rate\": 1.0"));
    }

    #[test]
    fn test_event_line_mentions_details() {
        console::set_colors_enabled(false);
        let line = event_line(&PlayerEvent::Error(PlayerErrorInfo::fatal(ErrorCode::NoProvider, "nothing plays x")));
        assert!(line.contains("error"));
        assert!(line.contains("NO_PROVIDER nothing plays x (fatal)"));
    }
}
