//! Programmable object categories.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of catalog object being exported.
///
/// The category selects the catalog filter, the keyword rewritten by the
/// script transformer, and the default output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    /// Stored procedures (`sys.objects.type = 'P'`).
    #[serde(alias = "procedures", alias = "proc", alias = "sp")]
    Procedure,

    /// Scalar, inline and table-valued functions.
    #[serde(alias = "functions", alias = "fn")]
    Function,

    /// Views (`sys.objects.type = 'V'`).
    #[serde(alias = "views")]
    View,
}

impl ObjectCategory {
    /// All categories in export order.
    pub const ALL: [ObjectCategory; 3] = [
        ObjectCategory::Procedure,
        ObjectCategory::Function,
        ObjectCategory::View,
    ];

    /// DDL keyword following `CREATE` in a definition of this category.
    pub fn keyword(&self) -> &'static str {
        match self {
            ObjectCategory::Procedure => "PROCEDURE",
            ObjectCategory::Function => "FUNCTION",
            ObjectCategory::View => "VIEW",
        }
    }

    /// `sys.objects.type` codes belonging to this category.
    pub fn type_codes(&self) -> &'static [&'static str] {
        match self {
            ObjectCategory::Procedure => &["P"],
            ObjectCategory::Function => &["FN", "FS", "FT", "IF", "TF"],
            ObjectCategory::View => &["V"],
        }
    }

    /// Default output directory name.
    pub fn default_dir(&self) -> &'static str {
        match self {
            ObjectCategory::Procedure => "sp_scripts",
            ObjectCategory::Function => "function_scripts",
            ObjectCategory::View => "view_scripts",
        }
    }

    /// Plural label used in user-facing reports.
    pub fn plural_label(&self) -> &'static str {
        match self {
            ObjectCategory::Procedure => "stored procedures",
            ObjectCategory::Function => "functions",
            ObjectCategory::View => "views",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectCategory::Procedure => "procedure",
            ObjectCategory::Function => "function",
            ObjectCategory::View => "view",
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectCategory {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "procedure" | "procedures" | "proc" | "sp" => Ok(ObjectCategory::Procedure),
            "function" | "functions" | "fn" => Ok(ObjectCategory::Function),
            "view" | "views" => Ok(ObjectCategory::View),
            other => Err(ExportError::Config(format!(
                "unknown object category '{}' (expected procedure, function or view)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("SP".parse::<ObjectCategory>().unwrap(), ObjectCategory::Procedure);
        assert_eq!("Functions".parse::<ObjectCategory>().unwrap(), ObjectCategory::Function);
        assert_eq!(" view ".parse::<ObjectCategory>().unwrap(), ObjectCategory::View);
        assert!("trigger".parse::<ObjectCategory>().is_err());
    }

    #[test]
    fn test_keywords_and_dirs() {
        assert_eq!(ObjectCategory::Procedure.keyword(), "PROCEDURE");
        assert_eq!(ObjectCategory::Function.default_dir(), "function_scripts");
        assert_eq!(ObjectCategory::View.type_codes(), &["V"]);
    }

    #[test]
    fn test_serde_accepts_aliases() {
        let cats: Vec<ObjectCategory> = serde_yaml::from_str("[procedures, fn, view]").unwrap();
        assert_eq!(cats, ObjectCategory::ALL.to_vec());
        assert_eq!(serde_json::to_string(&ObjectCategory::View).unwrap(), "\"view\"");
    }
}
