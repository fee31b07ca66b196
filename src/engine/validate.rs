use crate::engine::{path, visibility};
use crate::model::{FieldKind, FieldSchema};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Caller-supplied validation predicate, registered under a name the
/// schema refers to via `validation.custom`.
pub type CustomRule = Box<dyn Fn(&JsonValue) -> Option<String> + Send + Sync>;

#[derive(Default)]
pub struct RuleSet {
    rules: HashMap<String, CustomRule>,
}

impl RuleSet {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        rule: impl Fn(&JsonValue) -> Option<String> + Send + Sync + 'static,
    ) {
        self.rules.insert(name.into(), Box::new(rule));
    }

    fn get(&self, name: &str) -> Option<&CustomRule> {
        self.rules.get(name)
    }
}

/// Per-field touched/error entry; derived state, never persisted.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    pub touched: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ValidationState {
    states: HashMap<String, FieldState>,
}

impl ValidationState {
    pub fn touch(&mut self, key: &str) {
        self.states.entry(key.to_string()).or_default().touched = true;
    }

    pub fn is_touched(&self, key: &str) -> bool {
        self.states.get(key).map(|s| s.touched).unwrap_or(false)
    }

    pub fn set_error(&mut self, key: &str, error: Option<String>) {
        self.states.entry(key.to_string()).or_default().error = error;
    }

    /// Optimistic clear: editing a field removes its error immediately;
    /// the next blur re-validates.
    pub fn clear_error(&mut self, key: &str) {
        if let Some(st) = self.states.get_mut(key) {
            st.error = None;
        }
    }

    /// Fields that dropped out of the visible set keep their touched
    /// marker but lose any stale error.
    pub fn drop_errors_outside(&mut self, visible: &[String]) {
        for (k, st) in self.states.iter_mut() {
            if st.error.is_some() && !visible.iter().any(|p| p == k) {
                st.error = None;
            }
        }
    }

    pub fn error_for(&self, key: &str) -> Option<&str> {
        self.states.get(key).and_then(|s| s.error.as_deref())
    }

    pub fn error_count(&self) -> usize {
        self.states.values().filter(|s| s.error.is_some()).count()
    }

    pub fn errors(&self) -> BTreeMap<String, String> {
        self.states
            .iter()
            .filter_map(|(k, s)| s.error.clone().map(|e| (k.clone(), e)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

fn value_is_empty(v: Option<&JsonValue>) -> bool {
    match v {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        Some(JsonValue::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

fn as_number(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn fmt_bound(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

// RFC-lite: one @, something on each side, a dot in the domain.
fn email_ok(s: &str) -> bool {
    let re = regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$");
    re.map(|re| re.is_match(s)).unwrap_or(false)
}

// Absolute URLs (any scheme) and root-relative paths are both accepted.
fn url_ok(s: &str) -> bool {
    if s.starts_with('/') {
        return true;
    }
    let re = regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://\S+$");
    re.map(|re| re.is_match(s)).unwrap_or(false)
}

/// Validate one field. Rules run in a fixed order and the first failure
/// wins: required, kind-specific format, length bounds, pattern, custom.
pub fn validate_field(
    field: &FieldSchema,
    value: Option<&JsonValue>,
    touched: bool,
    rules: &RuleSet,
) -> Option<String> {
    if value_is_empty(value) {
        if field.required {
            // Select fields are lenient until first touched: an unresolved
            // option is not reported as missing before any blur.
            let lenient = field.kind == FieldKind::Select && !touched;
            if !lenient {
                return Some(format!("{} es requerido", field.label));
            }
        }
        return None;
    }
    let v = value?;

    match field.kind {
        FieldKind::Email => {
            if !v.as_str().map(email_ok).unwrap_or(false) {
                return Some("Email inválido".into());
            }
        }
        FieldKind::Url => {
            if !v.as_str().map(url_ok).unwrap_or(false) {
                return Some("URL inválida".into());
            }
        }
        FieldKind::Number => {
            let Some(n) = as_number(v) else {
                return Some("Debe ser un número".into());
            };
            if let Some(min) = field.validation.min {
                if n < min {
                    return Some(format!("El valor mínimo es {}", fmt_bound(min)));
                }
            }
            if let Some(max) = field.validation.max {
                if n > max {
                    return Some(format!("El valor máximo es {}", fmt_bound(max)));
                }
            }
        }
        _ => {}
    }

    // min/max double as length bounds for strings and arrays
    if field.kind != FieldKind::Number {
        let len = match v {
            JsonValue::String(s) => Some(s.chars().count()),
            JsonValue::Array(a) => Some(a.len()),
            _ => None,
        };
        if let Some(len) = len {
            let unit = if v.is_array() { "elementos" } else { "caracteres" };
            if let Some(min) = field.validation.min {
                if (len as f64) < min {
                    return Some(format!("Mínimo {} {unit}", fmt_bound(min)));
                }
            }
            if let Some(max) = field.validation.max {
                if (len as f64) > max {
                    return Some(format!("Máximo {} {unit}", fmt_bound(max)));
                }
            }
        }
    }

    if let Some(pat) = &field.validation.pattern {
        if let (Ok(re), Some(s)) = (regex::Regex::new(pat), v.as_str()) {
            if !re.is_match(s) {
                return Some("Formato inválido".into());
            }
        }
    }

    if let Some(name) = &field.validation.custom {
        if let Some(rule) = rules.get(name) {
            if let Some(err) = rule(v) {
                return Some(err);
            }
        }
    }
    None
}

/// Full-document validation for submit: every visible field re-checked as
/// touched, aggregated into a dot-path keyed error map. Invisible fields
/// contribute nothing regardless of their own constraints. Array fields
/// recurse, validating each element as an independent document rooted at
/// `key.<index>`.
pub fn validate_document(
    fields: &[FieldSchema],
    doc: &JsonValue,
    rules: &RuleSet,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    collect_errors(fields, doc, "", rules, &mut out);
    out
}

fn collect_errors(
    fields: &[FieldSchema],
    scope: &JsonValue,
    base: &str,
    rules: &RuleSet,
    out: &mut BTreeMap<String, String>,
) {
    for f in fields {
        if !visibility::is_visible(f, scope) {
            continue;
        }
        let abs_key = if base.is_empty() {
            f.key.clone()
        } else {
            format!("{base}.{}", f.key)
        };
        let value = path::get(scope, &f.key);
        if let Some(err) = validate_field(f, value, true, rules) {
            out.insert(abs_key.clone(), err);
            continue;
        }
        if f.kind == FieldKind::Array {
            if let Some(JsonValue::Array(items)) = value {
                for (i, item) in items.iter().enumerate() {
                    collect_errors(&f.item_schema, item, &format!("{abs_key}.{i}"), rules, out);
                }
            }
        }
    }
}

/// Absolute dot-paths of every currently visible field, including fields
/// nested inside array elements. Used to mark the whole document touched
/// on submit.
pub fn visible_paths(fields: &[FieldSchema], doc: &JsonValue) -> Vec<String> {
    let mut out = Vec::new();
    collect_paths(fields, doc, "", &mut out);
    out
}

fn collect_paths(fields: &[FieldSchema], scope: &JsonValue, base: &str, out: &mut Vec<String>) {
    for f in fields {
        if !visibility::is_visible(f, scope) {
            continue;
        }
        let abs = if base.is_empty() {
            f.key.clone()
        } else {
            format!("{base}.{}", f.key)
        };
        out.push(abs.clone());
        if f.kind == FieldKind::Array {
            if let Some(JsonValue::Array(items)) = path::get(scope, &f.key) {
                for (i, item) in items.iter().enumerate() {
                    collect_paths(&f.item_schema, item, &format!("{abs}.{i}"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependsOn, FieldRules, FieldWidth};
    use serde_json::json;

    fn field(key: &str, kind: FieldKind, required: bool) -> FieldSchema {
        FieldSchema {
            key: key.into(),
            label: key.into(),
            kind,
            required,
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
    fn required_reports_label_in_spanish() {
        let mut f = field("title", FieldKind::Text, true);
        f.label = "Título".into();
        let err = validate_field(&f, None, true, &RuleSet::default());
        assert_eq!(err.as_deref(), Some("Título es requerido"));
    }

    #[test]
    fn select_is_lenient_until_touched() {
        let f = field("variant", FieldKind::Select, true);
        let rules = RuleSet::default();
        assert_eq!(validate_field(&f, None, false, &rules), None);
        assert!(validate_field(&f, None, true, &rules).is_some());
        // other kinds are strict from the start
        let t = field("title", FieldKind::Text, true);
        assert!(validate_field(&t, None, false, &rules).is_some());
    }

    #[test]
    fn email_format() {
        let f = field("email", FieldKind::Email, false);
        let rules = RuleSet::default();
        let bad = json!("not-an-email");
        assert_eq!(
            validate_field(&f, Some(&bad), true, &rules).as_deref(),
            Some("Email inválido")
        );
        let good = json!("a@b.com");
        assert_eq!(validate_field(&f, Some(&good), true, &rules), None);
    }

    #[test]
    fn url_accepts_absolute_and_root_relative() {
        let f = field("link", FieldKind::Url, false);
        let rules = RuleSet::default();
        for ok in ["https://example.com/x", "ftp://host/file", "/contacto"] {
            assert_eq!(validate_field(&f, Some(&json!(ok)), true, &rules), None, "{ok}");
        }
        for bad in ["example.com", "relative/path", "no spaces://x"] {
            assert!(validate_field(&f, Some(&json!(bad)), true, &rules).is_some(), "{bad}");
        }
    }

    #[test]
    fn number_bounds_and_coercion() {
        let mut f = field("year", FieldKind::Number, false);
        f.validation.min = Some(1900.0);
        f.validation.max = Some(2100.0);
        let rules = RuleSet::default();
        assert_eq!(validate_field(&f, Some(&json!(1994)), true, &rules), None);
        assert_eq!(validate_field(&f, Some(&json!("2001")), true, &rules), None);
        assert_eq!(
            validate_field(&f, Some(&json!(1800)), true, &rules).as_deref(),
            Some("El valor mínimo es 1900")
        );
        assert_eq!(
            validate_field(&f, Some(&json!("abc")), true, &rules).as_deref(),
            Some("Debe ser un número")
        );
    }

    #[test]
    fn length_bounds_cover_strings_and_arrays() {
        let mut f = field("slug", FieldKind::Text, false);
        f.validation.min = Some(3.0);
        let rules = RuleSet::default();
        assert_eq!(
            validate_field(&f, Some(&json!("ab")), true, &rules).as_deref(),
            Some("Mínimo 3 caracteres")
        );
        let mut tags = field("tags", FieldKind::Tags, false);
        tags.validation.max = Some(2.0);
        assert_eq!(
            validate_field(&tags, Some(&json!(["a", "b", "c"])), true, &rules).as_deref(),
            Some("Máximo 2 elementos")
        );
    }

    #[test]
    fn pattern_runs_after_bounds() {
        let mut f = field("slug", FieldKind::Text, false);
        f.validation.pattern = Some("^[a-z-]+$".into());
        let rules = RuleSet::default();
        assert_eq!(
            validate_field(&f, Some(&json!("Bad Slug")), true, &rules).as_deref(),
            Some("Formato inválido")
        );
        assert_eq!(validate_field(&f, Some(&json!("good-slug")), true, &rules), None);
    }

    #[test]
    fn custom_rule_is_last() {
        let mut f = field("slug", FieldKind::Text, false);
        f.validation.custom = Some("no-admin".into());
        let mut rules = RuleSet::default();
        rules.register("no-admin", |v| {
            if v.as_str() == Some("admin") {
                Some("Reservado".to_string())
            } else {
                None
            }
        });
        assert_eq!(
            validate_field(&f, Some(&json!("admin")), true, &rules).as_deref(),
            Some("Reservado")
        );
        assert_eq!(validate_field(&f, Some(&json!("other")), true, &rules), None);
    }

    #[test]
    fn optional_empty_field_skips_format_checks() {
        let f = field("email", FieldKind::Email, false);
        assert_eq!(validate_field(&f, Some(&json!("")), true, &RuleSet::default()), None);
    }

    #[test]
    fn document_validation_matches_submit_scenario() {
        let mut title = field("title", FieldKind::Text, true);
        title.label = "Título".into();
        let email = field("contact.email", FieldKind::Email, false);
        let fields = vec![title, email];
        let rules = RuleSet::default();

        let errors = validate_document(&fields, &json!({}), &rules);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title").map(String::as_str), Some("Título es requerido"));

        let doc = json!({"title": "Hello", "contact": {"email": "not-an-email"}});
        let errors = validate_document(&fields, &doc, &rules);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("contact.email").map(String::as_str), Some("Email inválido"));

        let doc = json!({"title": "Hello", "contact": {"email": "a@b.com"}});
        assert!(validate_document(&fields, &doc, &rules).is_empty());
    }

    #[test]
    fn invisible_fields_never_reach_the_error_map() {
        let mut hidden = field("gradient.from", FieldKind::Text, true);
        hidden.depends_on = Some(DependsOn {
            field: "variant".into(),
            value: json!("gradient"),
        });
        let fields = vec![hidden];
        let rules = RuleSet::default();
        assert!(validate_document(&fields, &json!({"variant": "plain"}), &rules).is_empty());
        let errors = validate_document(&fields, &json!({"variant": "gradient"}), &rules);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn array_elements_validate_as_nested_documents() {
        let mut team = field("team", FieldKind::Array, false);
        let mut name = field("name", FieldKind::Text, true);
        name.label = "Nombre".into();
        team.item_schema = vec![name];
        let fields = vec![team];
        let rules = RuleSet::default();
        let doc = json!({"team": [{"name": "Ada"}, {}]});
        let errors = validate_document(&fields, &doc, &rules);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("team.1.name").map(String::as_str), Some("Nombre es requerido"));
    }

    #[test]
    fn validation_state_optimistic_clear() {
        let mut st = ValidationState::default();
        st.set_error("title", Some("x".into()));
        assert_eq!(st.error_for("title"), Some("x"));
        st.clear_error("title");
        assert_eq!(st.error_for("title"), None);
        st.touch("title");
        assert!(st.is_touched("title"));
        assert!(!st.is_touched("other"));
    }
}
