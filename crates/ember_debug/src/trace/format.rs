//! Trace output formatters.
//!
//! Provides human-readable and JSON formatters for trace records.

use std::fmt::Write;

use ember_foundation::Value;

use super::record::{TraceEvent, TraceRecord};

// =============================================================================
// Trace Formatter Trait
// =============================================================================

/// Trait for formatting trace records.
pub trait TraceFormatter {
    /// Formats a single trace record to a string.
    fn format(&self, record: &TraceRecord) -> String;

    /// Formats multiple records.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        records
            .iter()
            .map(|r| self.format(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Human-Readable Formatter
// =============================================================================

/// Formats trace records in human-readable form.
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Whether to include timestamps.
    pub show_timestamps: bool,
    /// Whether to include record IDs.
    pub show_ids: bool,
}

impl HumanFormatter {
    /// Creates a new human formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show timestamps.
    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.show_timestamps = true;
        self
    }

    /// Builder method to show record IDs.
    #[must_use]
    pub fn with_ids(mut self) -> Self {
        self.show_ids = true;
        self
    }

    /// Formats timestamp in microseconds.
    #[allow(clippy::cast_precision_loss)]
    fn format_timestamp(ns: u64) -> String {
        let us = ns / 1000;
        if us >= 1_000_000 {
            format!("{:.3}s", us as f64 / 1_000_000.0)
        } else if us >= 1000 {
            format!("{:.3}ms", us as f64 / 1000.0)
        } else {
            format!("{us}us")
        }
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut prefix = String::new();

        if self.show_ids {
            let _ = write!(prefix, "[{:06}] ", record.id);
        }

        let _ = write!(prefix, "F{:03}.P{:04} ", record.fire, record.pass);

        if self.show_timestamps {
            let _ = write!(
                prefix,
                "{:>10} ",
                Self::format_timestamp(record.timestamp_ns)
            );
        }

        let event_str = match &record.event {
            TraceEvent::Phase { phase } => format!("  >> {phase}"),
            TraceEvent::Agenda { entries } => {
                if entries.is_empty() {
                    "  AGENDA (empty)".to_string()
                } else {
                    let rules: Vec<_> = entries
                        .iter()
                        .map(|(rule, bindings)| format!("{rule}x{bindings}"))
                        .collect();
                    format!("  AGENDA {}", rules.join(", "))
                }
            }
            TraceEvent::RuleActivated {
                rule,
                salience,
                actions,
            } => format!("  ACTIVATED {rule} (salience {salience}) queued {actions}"),
            TraceEvent::FactInserted {
                handle,
                fact_type,
                value,
            } => format!("    INSERT {fact_type} {handle:?} = {value}"),
            TraceEvent::FactRetracted { handle, fact_type } => {
                format!("    RETRACT {fact_type} {handle:?}")
            }
            TraceEvent::FireEnd {
                passes,
                activations,
                stop,
            } => format!("=== FIRE END ({stop:?}) passes={passes} activations={activations} ==="),
        };

        format!("{prefix}{event_str}")
    }
}

// =============================================================================
// JSON Formatter
// =============================================================================

/// Formats trace records as JSON.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    /// Whether to put each record of a list on its own line.
    pub pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method for pretty printing.
    #[must_use]
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Escapes a string for JSON.
    fn escape_string(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c < ' ' => {
                    let _ = write!(out, "\\u{:04x}", u32::from(c));
                }
                c => out.push(c),
            }
        }
        out
    }

    /// Formats a value as JSON.
    fn format_value(value: &Value) -> String {
        match value {
            Value::Nil => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.is_nan() {
                    "\"NaN\"".to_string()
                } else if f.is_infinite() {
                    if *f > 0.0 {
                        "\"Infinity\"".to_string()
                    } else {
                        "\"-Infinity\"".to_string()
                    }
                } else {
                    f.to_string()
                }
            }
            Value::String(s) => format!("\"{}\"", Self::escape_string(s)),
            Value::Vec(items) => {
                let items: Vec<_> = items.iter().map(Self::format_value).collect();
                format!("[{}]", items.join(","))
            }
            Value::Map(_) => format!("\"{}\"", Self::escape_string(&value.to_string())),
        }
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let event_data = match &record.event {
            TraceEvent::Phase { phase } => format!("\"phase\":\"{phase}\""),
            TraceEvent::Agenda { entries } => {
                let entries: Vec<_> = entries
                    .iter()
                    .map(|(rule, bindings)| {
                        format!(
                            "{{\"rule\":\"{}\",\"bindings\":{bindings}}}",
                            Self::escape_string(rule)
                        )
                    })
                    .collect();
                format!("\"entries\":[{}]", entries.join(","))
            }
            TraceEvent::RuleActivated {
                rule,
                salience,
                actions,
            } => format!(
                "\"rule\":\"{}\",\"salience\":{salience},\"actions\":{actions}",
                Self::escape_string(rule)
            ),
            TraceEvent::FactInserted {
                handle,
                fact_type,
                value,
            } => format!(
                "\"fact\":{},\"version\":{},\"fact_type\":\"{}\",\"value\":{}",
                handle.id,
                handle.version,
                Self::escape_string(fact_type),
                Self::format_value(value)
            ),
            TraceEvent::FactRetracted { handle, fact_type } => format!(
                "\"fact\":{},\"version\":{},\"fact_type\":\"{}\"",
                handle.id,
                handle.version,
                Self::escape_string(fact_type)
            ),
            TraceEvent::FireEnd {
                passes,
                activations,
                stop,
            } => format!("\"passes\":{passes},\"activations\":{activations},\"stop\":\"{stop:?}\""),
        };

        format!(
            "{{\"id\":{},\"fire\":{},\"pass\":{},\"timestamp_ns\":{},\"type\":\"{}\",{}}}",
            record.id,
            record.fire,
            record.pass,
            record.timestamp_ns,
            record.event_type(),
            event_data
        )
    }

    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let items: Vec<_> = records.iter().map(|r| self.format(r)).collect();
        if self.pretty {
            format!("[\n  {}\n]", items.join(",\n  "))
        } else {
            format!("[{}]", items.join(","))
        }
    }
}
