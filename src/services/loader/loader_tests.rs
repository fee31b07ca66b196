use super::*;
use serde_json::json;

#[test]
fn options_default_unwrap_reads_data_items() {
    let v = json!({"ok": true, "data": {"items": [
        {"id": "tech", "title": "Tecnología"},
        {"id": "life", "title": "Estilo de vida"}
    ]}});
    let pairs = parse_options_from_json(&v, None);
    assert_eq!(
        pairs,
        vec![
            ("tech".to_string(), "Tecnología".to_string()),
            ("life".to_string(), "Estilo de vida".to_string())
        ]
    );
}

#[test]
fn options_accept_plain_string_arrays() {
    let v = json!({"data": {"items": ["borrador", "publicado"]}});
    let pairs = parse_options_from_json(&v, None);
    assert_eq!(
        pairs,
        vec![
            ("borrador".to_string(), "borrador".to_string()),
            ("publicado".to_string(), "publicado".to_string())
        ]
    );
}

#[test]
fn options_unwrap_with_projection_paths() {
    let v = json!({"data": {"categories": [
        {"slug": "news", "label": {"es": "Noticias"}},
        {"slug": "ops", "label": {"es": "Operaciones"}}
    ]}});
    let pairs = parse_options_from_json(&v, Some("data.categories[].slug/label.es"));
    assert_eq!(
        pairs,
        vec![
            ("news".to_string(), "Noticias".to_string()),
            ("ops".to_string(), "Operaciones".to_string())
        ]
    );
}

#[test]
fn options_unwrap_numeric_ids_become_strings() {
    let v = json!({"data": {"items": [
        {"id": 7, "title": "Siete"}
    ]}});
    let pairs = parse_options_from_json(&v, Some("data.items[]"));
    assert_eq!(pairs, vec![("7".to_string(), "Siete".to_string())]);
}

#[test]
fn record_unwraps_envelope_layers() {
    let v = json!({"ok": true, "data": {"record": {"title": "Hola"}}});
    assert_eq!(record_from_envelope(v), json!({"title": "Hola"}));
    let v = json!({"ok": true, "data": {"title": "Hola"}});
    assert_eq!(record_from_envelope(v), json!({"title": "Hola"}));
    let v = json!({"title": "Hola"});
    assert_eq!(record_from_envelope(v), json!({"title": "Hola"}));
}

#[test]
fn envelope_ok_defaults_to_true() {
    assert!(envelope_ok(&json!({"data": {}})));
    assert!(envelope_ok(&json!({"ok": true})));
    assert!(!envelope_ok(&json!({"ok": false})));
}

#[test]
fn envelope_error_prefers_backend_message() {
    let v = json!({"ok": false, "error": {"message": "validación falló"}});
    assert_eq!(envelope_error(&v), "validación falló");
}

#[test]
fn media_items_from_objects_and_strings() {
    let v = json!({"data": {"items": [
        {"url": "https://cdn/img1.png", "title": "Portada"},
        "https://cdn/img2.png"
    ]}});
    let items = parse_media_from_json(&v);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].url, "https://cdn/img1.png");
    assert_eq!(items[0].title.as_deref(), Some("Portada"));
    assert_eq!(items[1].url, "https://cdn/img2.png");
    assert!(items[1].title.is_none());
}
