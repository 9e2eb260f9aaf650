//! Rewrites catalog definitions into re-runnable deployment scripts.
//!
//! A definition stored in `sys.sql_modules` starts with a plain
//! `CREATE PROCEDURE` / `CREATE FUNCTION` / `CREATE VIEW` clause, which fails
//! when the object already exists. The transformer turns that clause into
//! `CREATE OR ALTER <KEYWORD>` so the exported script can be deployed any
//! number of times.

use crate::core::ObjectCategory;
use crate::error::{ExportError, Result};
use regex::{NoExpand, Regex};
use std::collections::HashMap;

/// Compiled creation-clause patterns, one per category.
#[derive(Debug, Clone)]
pub struct ScriptTransformer {
    patterns: HashMap<ObjectCategory, Regex>,
}

impl ScriptTransformer {
    /// Compile the patterns for every category.
    pub fn new() -> Result<Self> {
        let mut patterns = HashMap::with_capacity(ObjectCategory::ALL.len());
        for category in ObjectCategory::ALL {
            patterns.insert(category, creation_clause(category)?);
        }
        Ok(Self { patterns })
    }

    /// Rewrite every `CREATE <KEYWORD>` clause to `CREATE OR ALTER <KEYWORD>`.
    ///
    /// Matching is case-insensitive and tolerates any run of whitespace
    /// between the two words; the replacement uses canonical upper case.
    /// Text without a matching clause is returned unchanged.
    pub fn transform(&self, definition: &str, category: ObjectCategory) -> String {
        match self.patterns.get(&category) {
            Some(re) => re
                .replace_all(definition, NoExpand(&replacement(category)))
                .into_owned(),
            None => definition.to_string(),
        }
    }

    /// Whether the text still contains a bare `CREATE <KEYWORD>` clause.
    pub fn needs_rewrite(&self, text: &str, category: ObjectCategory) -> bool {
        self.patterns
            .get(&category)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

fn creation_clause(category: ObjectCategory) -> Result<Regex> {
    let pattern = format!(r"(?i)CREATE\s+{}", regex::escape(category.keyword()));
    Regex::new(&pattern).map_err(|e| {
        ExportError::Config(format!("invalid creation clause pattern for {}: {}", category, e))
    })
}

fn replacement(category: ObjectCategory) -> String {
    format!("CREATE OR ALTER {}", category.keyword())
}
