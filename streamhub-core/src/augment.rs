use serde_json::Value;
use streamhub_common::{AugmentConfig, Record};
use tracing::trace;

/// Lifts nested metadata attributes of a raw observation to top-level fields
/// so the filter can reference them by name.
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentConfig,
}

impl Augmenter {
    pub fn new(config: &AugmentConfig) -> Self {
        Self { config: config.clone() }
    }

    /// identity augmenter
    pub fn disabled() -> Self {
        Self { config: AugmentConfig { enabled: false, ..AugmentConfig::default() } }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn augment(&self, mut record: Record) -> Record {
        if !self.config.enabled {
            return record;
        }
        let cfg = &self.config;
        let mut lifted: Vec<(String, Value)> = Vec::new();
        if let Some(Value::Object(ds)) = record.get(&cfg.datastream_key) {
            for att in &cfg.datastream_attributes {
                if let Some(text) = ds.get(att).and_then(as_text) {
                    lifted.push((att.clone(), Value::String(text)));
                }
            }
        }
        if let Some(Value::Object(meta)) = record.get(&cfg.meta_key) {
            for att in &cfg.meta_attributes {
                if let Some(n) = meta.get(att).and_then(as_number) {
                    lifted.push((att.clone(), n));
                }
            }
        }
        if let Some(t) = record.get(&cfg.time_source).and_then(as_text) {
            lifted.push((cfg.time_target.clone(), Value::String(t)));
        }
        trace!(fields = lifted.len(), "record augmented");
        for (k, v) in lifted {
            record.insert(k, v);
        }
        record
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<Value> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(n).map(Value::Number)
}

#[cfg(test)]
mod tests_augment {
    use super::*;
    use serde_json::json;

    fn raw() -> Record {
        Record::from_json_str(
            &json!({
                "phenomenonTime": "2020-02-24T11:26:02",
                "resultTime": "2020-02-24T11:26:02",
                "result": 0.9,
                "datastream": {"thing": "Car1", "client_app": "demo", "quantity": "acceleration"},
                "attributes": {"longitude": "13.04", "latitude": 47.82}
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn lifts_datastream_meta_and_time() {
        let r = Augmenter::new(&AugmentConfig::default()).augment(raw());
        assert_eq!(r.get_str("thing").unwrap(), "Car1");
        assert_eq!(r.get_str("quantity").unwrap(), "acceleration");
        assert_eq!(r.get_str("client_app").unwrap(), "demo");
        assert_eq!(r.get_str("time").unwrap(), "2020-02-24T11:26:02");
        assert!((r.get_f64("longitude").unwrap() - 13.04).abs() < 1e-12);
        assert!(r.get("latitude").unwrap().is_number());
    }

    #[test]
    fn absent_sections_are_skipped() {
        let mut r = Record::new();
        r.insert("result", 1.0);
        r.insert("datastream", json!({"thing": "Car1"}));
        let out = Augmenter::new(&AugmentConfig::default()).augment(r);
        assert_eq!(out.get_str("thing").unwrap(), "Car1");
        assert!(!out.contains("quantity"));
        assert!(!out.contains("time"));
    }

    #[test]
    fn disabled_is_identity() {
        let aug = Augmenter::disabled();
        assert!(!aug.is_enabled());
        assert_eq!(aug.augment(raw()), raw());
    }
}
