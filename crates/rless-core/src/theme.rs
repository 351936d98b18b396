use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{CompileError, CompileResult};

/// Variable bindings supplied by the surrounding theme, forming the
/// outermost scope during resolution. Stylesheets may reference them as if
/// they were defined in the file; definitions in the file shadow them.
///
/// Loaded from a flat JSON object:
///
/// ```json
/// { "brand-primary": "#0047ab", "navbar-height": "60px" }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Theme {
    pub variables: HashMap<String, String>,
}

impl Theme {
    pub fn load(path: &Path) -> CompileResult<Self> {
        let data = fs::read_to_string(path).map_err(|e| CompileError::Theme {
            message: format!("could not read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&data).map_err(|e| CompileError::Theme {
            message: format!("invalid JSON in {}: {}", path.display(), e),
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_a_flat_object() {
        let theme: Theme =
            serde_json::from_str(r##"{"brand-primary": "#0047ab", "gutter": "12px"}"##)
                .expect("theme");
        assert_eq!(theme.get("brand-primary"), Some("#0047ab"));
        assert_eq!(theme.get("gutter"), Some("12px"));
        assert_eq!(theme.get("missing"), None);
    }

    #[test]
    fn missing_file_is_a_theme_error() {
        let err = Theme::load(Path::new("no/such/theme.json")).unwrap_err();
        assert!(matches!(err, CompileError::Theme { .. }), "{:?}", err);
    }
}
