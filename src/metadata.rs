//! Rewriting of compiler-emitted `.metadata.json` companions.
//!
//! A metadata document is either one module object or an array of them. A
//! module's `metadata` map holds one entry per exported symbol; flattened
//! documents additionally carry an `origins` map from symbol to the module it
//! was declared in, relative to the metadata file.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Template,
    Style,
}

/// A resource referenced from metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Directory of the declaring module, relative to the metadata file.
    pub base: PathBuf,
    pub kind: ResourceKind,
    pub url: String,
}

/// Every resource the document references, in document order.
pub fn collect_resources(doc: &Value) -> Vec<ResourceRef> {
    let mut found = Vec::new();
    for module in modules(doc) {
        let origins = module.get("origins").and_then(Value::as_object);
        let Some(symbols) = module.get("metadata").and_then(Value::as_object) else {
            continue;
        };
        for (symbol, entry) in symbols {
            let base = symbol_base(origins, symbol);
            collect_in(entry, &base, &mut found);
        }
    }
    found
}

fn collect_in(value: &Value, base: &Path, found: &mut Vec<ResourceRef>) {
    match value {
        Value::Object(map) => {
            if let Some(url) = map.get("templateUrl").and_then(Value::as_str) {
                found.push(ResourceRef {
                    base: base.to_path_buf(),
                    kind: ResourceKind::Template,
                    url: url.to_string(),
                });
            }
            if let Some(urls) = map.get("styleUrls").and_then(Value::as_array) {
                found.extend(urls.iter().filter_map(Value::as_str).map(|url| ResourceRef {
                    base: base.to_path_buf(),
                    kind: ResourceKind::Style,
                    url: url.to_string(),
                }));
            }
            for child in map.values() {
                collect_in(child, base, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_in(item, base, found);
            }
        }
        _ => {}
    }
}

/// Replace `templateUrl`/`styleUrls` with `template`/`styles` and drop `moduleId`.
///
/// Returns whether anything changed.
pub fn inline_metadata<F>(doc: &mut Value, mut lookup: F) -> Result<bool>
where
    F: FnMut(&ResourceRef) -> Result<String>,
{
    let mut changed = false;
    for module in modules_mut(doc) {
        let origins = module.get("origins").and_then(Value::as_object).cloned();
        let Some(Value::Object(symbols)) = module.get_mut("metadata") else {
            continue;
        };
        for (symbol, entry) in symbols.iter_mut() {
            let base = symbol_base(origins.as_ref(), symbol);
            changed |= inline_in(entry, &base, &mut lookup)?;
        }
    }
    Ok(changed)
}

fn inline_in<F>(value: &mut Value, base: &Path, lookup: &mut F) -> Result<bool>
where
    F: FnMut(&ResourceRef) -> Result<String>,
{
    let mut changed = false;
    match value {
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.remove("templateUrl") {
                let template = lookup(&ResourceRef {
                    base: base.to_path_buf(),
                    kind: ResourceKind::Template,
                    url,
                })?;
                map.insert("template".to_string(), Value::String(template));
                changed = true;
            }
            if let Some(Value::Array(urls)) = map.remove("styleUrls") {
                let mut styles = existing_styles(map);
                for url in urls.into_iter().filter_map(|u| u.as_str().map(str::to_string)) {
                    styles.push(Value::String(lookup(&ResourceRef {
                        base: base.to_path_buf(),
                        kind: ResourceKind::Style,
                        url,
                    })?));
                }
                map.insert("styles".to_string(), Value::Array(styles));
                changed = true;
            }
            if map.remove("moduleId").is_some() {
                changed = true;
            }
            for child in map.values_mut() {
                changed |= inline_in(child, base, lookup)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                changed |= inline_in(item, base, lookup)?;
            }
        }
        _ => {}
    }
    Ok(changed)
}

fn existing_styles(map: &mut Map<String, Value>) -> Vec<Value> {
    match map.remove("styles") {
        Some(Value::Array(styles)) => styles,
        _ => Vec::new(),
    }
}

fn symbol_base(origins: Option<&Map<String, Value>>, symbol: &str) -> PathBuf {
    origins
        .and_then(|o| o.get(symbol))
        .and_then(Value::as_str)
        .and_then(|origin| Path::new(origin).parent().map(crate::paths::normalize))
        .unwrap_or_default()
}

fn modules(doc: &Value) -> Vec<&Map<String, Value>> {
    match doc {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

fn modules_mut(doc: &mut Value) -> Vec<&mut Map<String, Value>> {
    match doc {
        Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(template_url: &str, style_urls: &[&str]) -> Value {
        json!({
            "__symbolic": "class",
            "decorators": [{
                "__symbolic": "call",
                "arguments": [{
                    "selector": "acme-card",
                    "moduleId": { "__symbolic": "reference", "name": "module" },
                    "templateUrl": template_url,
                    "styleUrls": style_urls,
                }]
            }]
        })
    }

    #[test]
    fn test_per_module_rewrite() {
        let mut doc = json!([{
            "__symbolic": "module",
            "version": 4,
            "metadata": { "CardComponent": component("./card.html", &["./card.css"]) }
        }]);

        let refs = collect_resources(&doc);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].base, PathBuf::new());

        let changed = inline_metadata(&mut doc, |r| {
            Ok(match r.kind {
                ResourceKind::Template => "<p>card</p>".to_string(),
                ResourceKind::Style => "p{color:red}".to_string(),
            })
        })
        .unwrap();

        assert!(changed);
        let args = &doc[0]["metadata"]["CardComponent"]["decorators"][0]["arguments"][0];
        assert_eq!(args["template"], "<p>card</p>");
        assert_eq!(args["styles"], json!(["p{color:red}"]));
        assert!(args.get("templateUrl").is_none());
        assert!(args.get("moduleId").is_none());
    }

    #[test]
    fn test_flat_metadata_uses_origins() {
        let mut doc = json!({
            "__symbolic": "module",
            "metadata": {
                "CardComponent": component("./card.html", &[]),
                "VERSION": "1.0.0"
            },
            "origins": { "CardComponent": "./lib/card/card.component", "VERSION": "./version" }
        });

        let refs = collect_resources(&doc);
        assert_eq!(refs[0].base, PathBuf::from("lib/card"));

        let mut seen = Vec::new();
        inline_metadata(&mut doc, |r| {
            seen.push(r.base.join(&r.url));
            Ok(String::new())
        })
        .unwrap();
        assert_eq!(seen, vec![PathBuf::from("lib/card/./card.html")]);
    }

    #[test]
    fn test_untouched_document() {
        let mut doc = json!({ "__symbolic": "module", "metadata": { "VERSION": "1.0.0" } });
        assert!(!inline_metadata(&mut doc, |_| Ok(String::new())).unwrap());
    }
}
