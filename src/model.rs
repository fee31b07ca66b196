use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Closed set of field kinds the renderer dispatches on.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Multiselect,
    Checkbox,
    Number,
    Date,
    Datetime,
    Email,
    Url,
    Password,
    Tags,
    Markdown,
    MediaReference,
    Array,
    Custom,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    #[default]
    Full,
    Half,
    Third,
}

// min/max double as numeric range (number fields) and length bounds
// (string/array fields); `custom` names a rule registered at runtime.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldRules {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub custom: Option<String>,
}

/// Render/validate the field only when `get(doc, field) == value`.
#[derive(Debug, Deserialize, Clone)]
pub struct DependsOn {
    pub field: String,
    pub value: JsonValue,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum SelectOption {
    Plain(String),
    Pair { label: String, value: String },
}

impl SelectOption {
    pub fn label(&self) -> &str {
        match self {
            SelectOption::Plain(s) => s,
            SelectOption::Pair { label, .. } => label,
        }
    }
    pub fn value(&self) -> &str {
        match self {
            SelectOption::Plain(s) => s,
            SelectOption::Pair { value, .. } => value,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldSchema {
    /// Dot-path into the document; unique within one form level.
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: FieldRules,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub depends_on: Option<DependsOn>,
    #[serde(default)]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub width: FieldWidth,
    #[serde(default)]
    pub placeholder: Option<String>,
    // Static options for select/multiselect
    #[serde(default)]
    pub options: Vec<SelectOption>,
    // Dynamic options loaded from a CLI command, with optional unwrap path
    #[serde(default)]
    pub options_cmd: Option<String>,
    #[serde(default)]
    pub unwrap: Option<String>,
    // Media reference: allow picking several references
    #[serde(default)]
    pub multiple: bool,
    /// Sub-schema for each element; required and non-empty iff kind=array.
    #[serde(default)]
    pub item_schema: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldGroup {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default = "default_true")]
    pub default_expanded: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    #[default]
    Create,
    Edit,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormOptions {
    #[serde(default)]
    pub mode: FormMode,
    #[serde(default = "default_true")]
    pub enable_auto_save: bool,
    #[serde(default = "default_autosave_ms")]
    pub auto_save_interval_ms: u64,
    #[serde(default = "default_true")]
    pub enable_smart_validation: bool,
    #[serde(default)]
    pub show_validation_panel: bool,
    // Accepted for config compatibility; this UI ships no backup manager.
    #[serde(default)]
    #[allow(dead_code)]
    pub show_backup_manager: bool,
    #[serde(default = "default_true")]
    pub show_preview_button: bool,
    #[serde(default = "default_true")]
    pub enable_keyboard_shortcuts: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            mode: FormMode::Create,
            enable_auto_save: true,
            auto_save_interval_ms: default_autosave_ms(),
            enable_smart_validation: true,
            show_validation_panel: false,
            show_backup_manager: false,
            show_preview_button: true,
            enable_keyboard_shortcuts: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormConfig {
    pub title: String,
    #[serde(default)]
    pub groups: Vec<FieldGroup>,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub options: FormOptions,
    // Backend commands (external collaborators); all optional.
    #[serde(default)]
    pub load_cmd: Option<String>,
    #[serde(default)]
    pub save_cmd: Option<String>,
    #[serde(default)]
    pub submit_cmd: Option<String>,
    #[serde(default)]
    pub media_cmd: Option<String>,
    #[serde(default)]
    pub preview_template: Option<String>,
    // Inline seed values (create mode, or edit mode without load_cmd)
    #[serde(default)]
    pub initial: Option<JsonValue>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            title: "FORMA".to_string(),
            groups: vec![],
            fields: vec![],
            options: FormOptions::default(),
            load_cmd: None,
            save_cmd: None,
            submit_cmd: None,
            media_cmd: None,
            preview_template: None,
            initial: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_autosave_ms() -> u64 {
    3000
}

pub(crate) fn validate_form_config(cfg: &FormConfig) -> Result<(), String> {
    use std::collections::HashSet;
    let mut group_names = HashSet::new();
    for (i, g) in cfg.groups.iter().enumerate() {
        if !group_names.insert(&g.name) {
            return Err(format!("duplicate group name: '{}' at index {}", g.name, i));
        }
    }
    validate_fields(&cfg.fields, "")
}

fn validate_fields(fields: &[FieldSchema], ctx: &str) -> Result<(), String> {
    use std::collections::HashSet;
    let mut keys = HashSet::new();
    for (i, f) in fields.iter().enumerate() {
        if f.key.is_empty() {
            return Err(format!("field at index {i}{ctx} has an empty key"));
        }
        if !keys.insert(&f.key) {
            return Err(format!("duplicate field key: '{}'{ctx}", f.key));
        }
        match f.kind {
            FieldKind::Array => {
                if f.item_schema.is_empty() {
                    return Err(format!(
                        "array field '{}'{ctx} requires a non-empty item_schema",
                        f.key
                    ));
                }
                validate_fields(&f.item_schema, &format!(" (inside '{}')", f.key))?;
            }
            _ => {
                if !f.item_schema.is_empty() {
                    return Err(format!(
                        "field '{}'{ctx} declares item_schema but is not an array",
                        f.key
                    ));
                }
            }
        }
        if matches!(f.kind, FieldKind::Select | FieldKind::Multiselect)
            && f.options.is_empty()
            && f.options_cmd.is_none()
        {
            return Err(format!(
                "select field '{}'{ctx} needs options or options_cmd",
                f.key
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(key: &str) -> FieldSchema {
        FieldSchema {
            key: key.into(),
            label: key.into(),
            kind: FieldKind::Text,
            required: false,
            validation: FieldRules::default(),
            group: None,
            depends_on: None,
            default: None,
            width: FieldWidth::Full,
            placeholder: None,
            options: vec![],
            options_cmd: None,
            unwrap: None,
            multiple: false,
            item_schema: vec![],
        }
    }

    #[test]
    fn validate_detects_duplicate_keys() {
        let cfg = FormConfig {
            fields: vec![text_field("title"), text_field("title")],
            ..Default::default()
        };
        let err = validate_form_config(&cfg).unwrap_err();
        assert!(err.contains("duplicate field key"));
    }

    #[test]
    fn validate_array_requires_item_schema() {
        let mut arr = text_field("team");
        arr.kind = FieldKind::Array;
        let cfg = FormConfig {
            fields: vec![arr],
            ..Default::default()
        };
        let err = validate_form_config(&cfg).unwrap_err();
        assert!(err.contains("item_schema"));
    }

    #[test]
    fn validate_rejects_item_schema_on_scalar() {
        let mut fld = text_field("hero");
        fld.item_schema = vec![text_field("caption")];
        let cfg = FormConfig {
            fields: vec![fld],
            ..Default::default()
        };
        let err = validate_form_config(&cfg).unwrap_err();
        assert!(err.contains("not an array"));
    }

    #[test]
    fn parses_yaml_schema() {
        let yaml = r#"
title: Hero editor
groups:
  - name: contenido
    label: Contenido
fields:
  - key: title
    label: Título
    kind: text
    required: true
    group: contenido
  - key: media.cover
    label: Portada
    kind: media-reference
  - key: team
    label: Equipo
    kind: array
    item_schema:
      - key: name
        label: Nombre
        kind: text
        required: true
options:
  mode: edit
  auto_save_interval_ms: 1500
  show_backup_manager: true
"#;
        let cfg: FormConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.fields.len(), 3);
        assert_eq!(cfg.fields[1].kind, FieldKind::MediaReference);
        assert_eq!(cfg.fields[2].item_schema.len(), 1);
        assert_eq!(cfg.options.mode, FormMode::Edit);
        assert_eq!(cfg.options.auto_save_interval_ms, 1500);
        assert!(cfg.options.show_backup_manager);
        assert!(validate_form_config(&cfg).is_ok());
    }
}
