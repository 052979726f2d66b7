//! Plain-text rendering of records and statistics.

use localsets_core::models::STATS_FIELD;
use localsets_core::{Format, Record, UsageStats};
use serde_json::Value;

/// Longest value printed on one line before truncating
const MAX_VALUE_WIDTH: usize = 100;

/// Probabilities shown per statistics field
const TOP_ENTRIES: usize = 5;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Render a JSON value on a single line: arrays as comma lists, strings unquoted
pub fn inline_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(inline_value).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, inline_value(v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

pub fn percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

pub fn print_record(name: &str, format: Option<Format>, record: &Record) {
    match format {
        Some(format) => println!("{} ({})", name, format),
        None => println!("{}", name),
    }

    for (field, value) in record.fields() {
        if field == STATS_FIELD {
            continue;
        }
        match value {
            // Smogon records map set names to sets; random battle roles nest too
            Value::Object(inner) => {
                println!("  {}:", field);
                for (key, value) in inner {
                    println!(
                        "    {:<14} {}",
                        key,
                        truncate_string(&inline_value(value), MAX_VALUE_WIDTH)
                    );
                }
            }
            _ => println!(
                "  {:<16} {}",
                field,
                truncate_string(&inline_value(value), MAX_VALUE_WIDTH)
            ),
        }
    }

    if record.has_stats() {
        println!("  (usage statistics available)");
    }
}

/// One-line description of a record for search results
pub fn summarize_record(record: &Record) -> String {
    if let Some(level) = record.get("level") {
        return format!("level {}", inline_value(level));
    }
    let names: Vec<&str> = record
        .fields()
        .filter(|(field, _)| field.as_str() != STATS_FIELD)
        .map(|(field, _)| field.as_str())
        .collect();
    truncate_string(&format!("sets: {}", names.join(", ")), MAX_VALUE_WIDTH)
}

pub fn print_stats(name: &str, format: Format, stats: &UsageStats) {
    println!("{} ({}) usage statistics", name, format);

    for field in stats.fields() {
        let entries = stats.probabilities(field);
        if entries.is_empty() {
            continue;
        }
        println!("  {}:", field);
        print_probabilities(&entries, "    ");
    }

    for role in stats.roles() {
        println!("  role {} (weight {}):", role.name, percent(role.weight));
        for field in ["moves", "items", "abilities", "teraTypes"] {
            let entries = role.probabilities(field);
            if entries.is_empty() {
                continue;
            }
            println!("    {}:", field);
            print_probabilities(&entries, "      ");
        }
    }
}

fn print_probabilities(entries: &[(String, f64)], indent: &str) {
    for (value, probability) in entries.iter().take(TOP_ENTRIES) {
        println!("{}{:<24} {:>6}", indent, value, percent(*probability));
    }
    if entries.len() > TOP_ENTRIES {
        println!("{}... {} more", indent, entries.len() - TOP_ENTRIES);
    }
}
