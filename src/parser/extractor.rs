use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    core::types::Record,
    parser::path::{JsonPath, PathError},
};

/// Compiled expressions keyed by their source text.
///
/// Entries are immutable once inserted, so a racing double compile of the
/// same expression is harmless: the first insert wins and both callers get an
/// equivalent path.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: RwLock<HashMap<String, Arc<JsonPath>>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, expression: &str) -> Result<Arc<JsonPath>, PathError> {
        {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(compiled) = entries.get(expression) {
                return Ok(Arc::clone(compiled));
            }
        }

        let compiled = Arc::new(JsonPath::compile(expression)?);
        debug!(expression, "compiled path expression");

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries
            .entry(expression.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One failing extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("variable {variable}: {error}")]
pub struct RuleFailure {
    pub variable: String,
    pub error: PathError,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    cache: Arc<PathCache>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Arc::new(PathCache::new()))
    }
}

impl Extractor {
    pub fn new(cache: Arc<PathCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<PathCache> {
        &self.cache
    }

    pub fn compile(&self, expression: &str) -> Result<Arc<JsonPath>, PathError> {
        self.cache.get_or_compile(expression)
    }

    /// First match, copied out of the document; `Value::Null` when nothing matched.
    pub fn extract_value(&self, document: &Value, expression: &str) -> Result<Value, PathError> {
        let path = self.compile(expression)?;
        Ok(path.find_first(document).cloned().unwrap_or(Value::Null))
    }

    pub fn extract_values(
        &self,
        document: &Value,
        expression: &str,
    ) -> Result<Vec<Value>, PathError> {
        let path = self.compile(expression)?;
        Ok(path.find(document).into_iter().cloned().collect())
    }

    /// Applies every rule; failures are collected rather than stopping at the first.
    pub fn extract_with_rules(
        &self,
        document: &Value,
        rules: &IndexMap<String, String>,
    ) -> Result<Record, Vec<RuleFailure>> {
        let mut extracted = Record::new();
        let mut failures = Vec::new();

        for (variable, expression) in rules {
            match self.extract_value(document, expression) {
                Ok(value) => {
                    if value.is_null() {
                        warn!(variable = %variable, expression = %expression, "path matched no data");
                    }
                    extracted.insert(variable.clone(), value);
                }
                Err(error) => failures.push(RuleFailure {
                    variable: variable.clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(extracted)
        } else {
            Err(failures)
        }
    }
}
