//! The structural half of the parser: a full YAML parse (tolerant of
//! duplicate keys, since `serde_yaml::Value` keeps last-wins semantics)
//! that provides the authoritative trigger list and per-job step counts
//! used to cross-check the line-oriented pass.

use std::collections::HashMap;

use serde_yaml::Value;

#[derive(Debug, Default)]
pub struct YamlFacts {
    pub triggers: Vec<String>,
    pub step_counts: HashMap<String, usize>,
    pub parsed_as_mapping: bool,
}

/// Parses `text` structurally. Never fails: unparseable or non-mapping YAML
/// yields an empty, `parsed_as_mapping: false` result so the caller can fall
/// back to the line-oriented pass alone.
pub fn extract(text: &str) -> YamlFacts {
    let Ok(value) = serde_yaml::from_str::<Value>(text) else {
        return YamlFacts::default();
    };

    if !value.is_mapping() {
        return YamlFacts::default();
    }

    let mut facts = YamlFacts {
        parsed_as_mapping: true,
        ..Default::default()
    };

    if let Some(on_value) = value.get("on") {
        facts.triggers = extract_triggers(on_value);
    }

    if let Some(jobs) = value.get("jobs").and_then(Value::as_mapping) {
        for (job_id, job_value) in jobs.iter() {
            let Some(job_id) = job_id.as_str() else {
                continue;
            };
            let count = job_value
                .get("steps")
                .and_then(Value::as_sequence)
                .map(Vec::len)
                .unwrap_or(0);
            facts.step_counts.insert(job_id.to_string(), count);
        }
    }

    facts
}

fn extract_triggers(on_value: &Value) -> Vec<String> {
    match on_value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::Mapping(map) => map
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
