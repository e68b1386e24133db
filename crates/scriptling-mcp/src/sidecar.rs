//! Tool sidecar descriptors: the `<name>.toml` file next to each
//! `<name>.py` tool script.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("cannot read sidecar {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid sidecar {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Parsed `<name>.toml` descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSidecar {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Hidden from `tools/list` when false; still callable by name.
    #[serde(default = "default_discoverable")]
    pub discoverable: bool,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
}

fn default_discoverable() -> bool {
    true
}

/// One `[[parameters]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

fn default_type() -> String {
    "string".to_string()
}

impl ToolParam {
    /// Maps the sidecar type aliases onto JSON-schema type names.
    #[must_use]
    pub fn json_type(&self) -> &'static str {
        match self.param_type.as_str() {
            "int" | "integer" => "integer",
            "float" | "number" => "number",
            "bool" | "boolean" => "boolean",
            _ => "string",
        }
    }
}

/// Loads and parses one sidecar file.
pub fn load_sidecar(path: &Path) -> Result<ToolSidecar, SidecarError> {
    let text = std::fs::read_to_string(path).map_err(|source| SidecarError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| SidecarError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sidecar_parses() {
        let sidecar: ToolSidecar = toml::from_str(
            r#"
description = "Greets a person"
keywords = ["greeting", "demo"]
discoverable = false

[[parameters]]
name = "name"
type = "string"
description = "Who to greet"
required = true

[[parameters]]
name = "times"
type = "int"
"#,
        )
        .unwrap();
        assert_eq!(sidecar.description, "Greets a person");
        assert!(!sidecar.discoverable);
        assert_eq!(sidecar.parameters.len(), 2);
        assert!(sidecar.parameters[0].required);
        assert_eq!(sidecar.parameters[1].json_type(), "integer");
        assert!(!sidecar.parameters[1].required);
    }

    #[test]
    fn minimal_sidecar_defaults() {
        let sidecar: ToolSidecar = toml::from_str("description = \"x\"").unwrap();
        assert!(sidecar.discoverable);
        assert!(sidecar.parameters.is_empty());
        assert!(sidecar.keywords.is_empty());
    }

    #[test]
    fn type_aliases() {
        for (alias, json) in [
            ("int", "integer"),
            ("integer", "integer"),
            ("float", "number"),
            ("number", "number"),
            ("bool", "boolean"),
            ("boolean", "boolean"),
            ("string", "string"),
        ] {
            let param = ToolParam {
                name: "p".to_string(),
                param_type: alias.to_string(),
                description: String::new(),
                required: false,
            };
            assert_eq!(param.json_type(), json);
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<ToolSidecar>("descriptoin = \"typo\"").is_err());
    }
}
