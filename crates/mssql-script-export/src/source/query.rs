//! Catalog queries for programmable object definitions.

use crate::core::ObjectCategory;

/// Schema include/exclude lists applied in the catalog query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SchemaFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Build the definition query for a category.
///
/// Returns the SQL text and its positional parameters (`@P1`, `@P2`, ...),
/// which carry the schema names. Type codes are fixed per category and
/// inlined.
pub fn definition_query(category: ObjectCategory, filter: &SchemaFilter) -> (String, Vec<String>) {
    let type_codes = category
        .type_codes()
        .iter()
        .map(|code| format!("'{}'", code))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        r#"SELECT
    SCHEMA_NAME(o.schema_id) AS [schema],
    o.name,
    sm.definition
FROM sys.objects o
INNER JOIN sys.sql_modules sm ON o.object_id = sm.object_id
WHERE o.type IN ({})"#,
        type_codes
    );

    let mut params = Vec::with_capacity(filter.include.len() + filter.exclude.len());
    if !filter.include.is_empty() {
        sql.push_str(&format!(
            "\n  AND SCHEMA_NAME(o.schema_id) IN ({})",
            placeholders(&mut params, &filter.include)
        ));
    }
    if !filter.exclude.is_empty() {
        sql.push_str(&format!(
            "\n  AND SCHEMA_NAME(o.schema_id) NOT IN ({})",
            placeholders(&mut params, &filter.exclude)
        ));
    }
    sql.push_str("\nORDER BY [schema], o.name");

    (sql, params)
}

fn placeholders(params: &mut Vec<String>, values: &[String]) -> String {
    values
        .iter()
        .map(|value| {
            params.push(value.clone());
            format!("@P{}", params.len())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
