//! Script file naming.
//!
//! Objects in the default schema are written as `<name>.sql`; every other
//! schema is kept in the file name as `<schema>.<name>.sql` so that objects
//! sharing a name across schemas do not overwrite each other.

use crate::core::DefinitionRecord;

/// Characters that cannot appear in a single path component on the
/// platforms we write to.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Derives deterministic file names from schema and object names.
#[derive(Debug, Clone)]
pub struct FileNamingPolicy {
    default_schema: String,
    sanitize: bool,
    case_insensitive: bool,
}

impl Default for FileNamingPolicy {
    fn default() -> Self {
        Self::new("dbo", true)
    }
}

impl FileNamingPolicy {
    pub fn new(default_schema: impl Into<String>, sanitize: bool) -> Self {
        Self {
            default_schema: default_schema.into(),
            sanitize,
            case_insensitive: false,
        }
    }

    /// Fold case when comparing file names for collisions.
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    /// File name for a record.
    pub fn file_name(&self, record: &DefinitionRecord) -> String {
        self.file_name_for(&record.schema, &record.name)
    }

    /// File name for a `(schema, name)` pair.
    pub fn file_name_for(&self, schema: &str, name: &str) -> String {
        let name = self.component(name);
        if schema == self.default_schema {
            format!("{}.sql", name)
        } else {
            format!("{}.{}.sql", self.component(schema), name)
        }
    }

    /// Key used to detect two records mapping to the same file.
    ///
    /// Exact by default; lowercased when the target filesystem ignores case.
    pub fn collision_key(&self, file_name: &str) -> String {
        if self.case_insensitive {
            file_name.to_lowercase()
        } else {
            file_name.to_string()
        }
    }

    fn component(&self, raw: &str) -> String {
        if !self.sanitize {
            return raw.to_string();
        }
        sanitize_component(raw)
    }
}

/// Replace path-unsafe characters with `_`.
///
/// An empty component or one made only of dots would escape or alias the
/// category directory, so it is replaced with underscores as well.
pub fn sanitize_component(raw: &str) -> String {
    if raw.is_empty() {
        return "_".to_string();
    }
    if raw.chars().all(|c| c == '.') {
        return "_".repeat(raw.len());
    }
    raw.chars()
        .map(|c| {
            if c.is_control() || UNSAFE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(schema: &str, name: &str) -> DefinitionRecord {
        DefinitionRecord::new(schema, name, "")
    }

    #[test]
    fn test_default_schema_is_dropped() {
        let policy = FileNamingPolicy::default();
        assert_eq!(policy.file_name(&record("dbo", "Foo")), "Foo.sql");
    }

    #[test]
    fn test_other_schema_is_kept() {
        let policy = FileNamingPolicy::default();
        assert_eq!(policy.file_name(&record("bi", "Foo")), "bi.Foo.sql");
    }

    #[test]
    fn test_schema_comparison_is_exact() {
        let policy = FileNamingPolicy::default();
        assert_eq!(policy.file_name(&record("DBO", "Foo")), "DBO.Foo.sql");
    }

    #[test]
    fn test_custom_default_schema() {
        let policy = FileNamingPolicy::new("app", true);
        assert_eq!(policy.file_name(&record("app", "Foo")), "Foo.sql");
        assert_eq!(policy.file_name(&record("dbo", "Foo")), "dbo.Foo.sql");
    }

    #[test]
    fn test_sanitizes_unsafe_characters() {
        let policy = FileNamingPolicy::default();
        assert_eq!(
            policy.file_name(&record("dbo", "usp/Get:Items*")),
            "usp_Get_Items_.sql"
        );
        assert_eq!(policy.file_name(&record("a\\b", "x")), "a_b.x.sql");
        assert_eq!(policy.file_name(&record("dbo", "..")), "__.sql");
        assert_eq!(policy.file_name(&record("dbo", "tab\tname")), "tab_name.sql");
    }

    #[test]
    fn test_sanitizing_disabled_keeps_names_verbatim() {
        let policy = FileNamingPolicy::new("dbo", false);
        assert_eq!(policy.file_name(&record("dbo", "a/b")), "a/b.sql");
    }

    #[test]
    fn test_collision_key_is_exact_by_default() {
        let policy = FileNamingPolicy::default();
        assert_ne!(
            policy.collision_key("Bi.Foo.sql"),
            policy.collision_key("bi.FOO.sql")
        );
        assert_eq!(policy.collision_key("Foo.sql"), policy.collision_key("Foo.sql"));
    }

    #[test]
    fn test_collision_key_folds_case_when_enabled() {
        let policy = FileNamingPolicy::default().with_case_insensitive(true);
        assert_eq!(
            policy.collision_key("Bi.Foo.sql"),
            policy.collision_key("bi.FOO.sql")
        );
    }
}
