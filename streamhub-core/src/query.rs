use crate::logical::LogicalNode;
use regex::Regex;
use std::sync::OnceLock;
use streamhub_common::{FieldSchema, Record, Result, StreamHubError};
use tracing::info;

const QUERY_PATTERN: &str =
    r"(?is)^\s*SELECT\s+(?P<proj>\S+)\s+FROM\s+(?P<src>[^\s;]+)(?:\s+WHERE\s+(?P<cond>.*?))?\s*;?\s*$";

fn query_regex() -> Result<&'static Regex> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(QUERY_PATTERN).map_err(|e| StreamHubError::Other(e.to_string()))?;
    Ok(RE.get_or_init(|| re))
}

/// A parsed `SELECT * FROM <source> WHERE <condition>` filter. Built once and
/// shared read-only across workers.
#[derive(Debug, Clone)]
pub struct StreamQuery {
    filter_logic: String,
    source: String,
    condition: String,
    root: LogicalNode,
}

impl StreamQuery {
    pub fn new(filter_logic: &str, schema: &FieldSchema) -> Result<Self> {
        let caps = query_regex()?.captures(filter_logic).ok_or_else(|| {
            StreamHubError::syntax(
                "expected 'SELECT * FROM <source> [WHERE <condition>]'",
                filter_logic.trim(),
            )
        })?;
        let projection = &caps["proj"];
        if projection != "*" {
            return Err(StreamHubError::syntax("only '*' projections are supported", projection));
        }
        let source = caps["src"].to_string();
        let condition = match caps.name("cond") {
            Some(m) => m.as_str().trim().trim_end_matches(';').trim(),
            None => "TRUE",
        };
        if condition.is_empty() {
            return Err(StreamHubError::syntax("empty WHERE clause", filter_logic.trim()));
        }
        let root = LogicalNode::parse(condition, schema)?;
        info!(condition, complexity = root.complexity(), "filter parsed");
        Ok(Self {
            filter_logic: filter_logic.trim().to_string(),
            source,
            condition: condition.to_string(),
            root,
        })
    }

    /// Filter from a bare condition, as if written `SELECT * FROM * WHERE <condition>`.
    pub fn from_condition(condition: &str, schema: &FieldSchema) -> Result<Self> {
        Self::new(&format!("SELECT * FROM * WHERE {condition}"), schema)
    }

    pub fn evaluate(&self, record: &Record) -> Result<bool> {
        self.root.evaluate(record)
    }

    pub fn filter_logic(&self) -> &str {
        &self.filter_logic
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    pub fn root(&self) -> &LogicalNode {
        &self.root
    }

    pub fn complexity(&self) -> usize {
        self.root.complexity()
    }
}
