//! Layered variable scopes.
//!
//! A run's variables come from an ordered list of layers (process
//! environment, collection, folder chain, request, selected environment,
//! runtime). Lookup resolves to the last layer that defines a name, so
//! later layers shadow earlier ones. All layers are immutable snapshots
//! taken at execution start except the runtime layer, which scripts
//! mutate during the run; those mutations are visible to later stages of
//! the same run only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The source a scope layer was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Host process environment variables.
    ProcessEnv,
    /// Collection-level variables.
    Collection,
    /// One folder on the chain (outer folders come earlier).
    Folder,
    /// Request-level variables.
    Request,
    /// Selected environment variables.
    Environment,
    /// Runtime/session variables, mutable by scripts.
    Runtime,
}

impl LayerKind {
    /// Stable lowercase label, used in messages and accessor syntax.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessEnv => "process",
            Self::Collection => "collection",
            Self::Folder => "folder",
            Self::Request => "request",
            Self::Environment => "environment",
            Self::Runtime => "runtime",
        }
    }
}

/// One named source of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeLayer {
    /// Which source this layer came from.
    pub kind: LayerKind,
    /// Display name (folder or environment name), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Variable values.
    pub values: HashMap<String, Value>,
}

impl ScopeLayer {
    /// Creates an unnamed layer.
    #[must_use]
    pub const fn new(kind: LayerKind, values: HashMap<String, Value>) -> Self {
        Self {
            kind,
            name: None,
            values,
        }
    }

    /// Creates a named layer (folders, environments).
    #[must_use]
    pub fn named(kind: LayerKind, name: impl Into<String>, values: HashMap<String, Value>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            values,
        }
    }
}

/// The flattened, ordered layer stack for one run.
///
/// Owned exclusively by the in-flight run; the runtime layer is appended
/// last so script writes shadow every snapshot layer without rebuilding
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResolvedScope {
    layers: Vec<ScopeLayer>,
}

impl ResolvedScope {
    /// Creates an empty scope with a runtime layer only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layers: vec![ScopeLayer::new(LayerKind::Runtime, HashMap::new())],
        }
    }

    /// Builds a scope from pre-ordered layers. A runtime layer is
    /// appended if the caller did not provide one.
    #[must_use]
    pub fn from_layers(mut layers: Vec<ScopeLayer>) -> Self {
        if !layers.iter().any(|l| l.kind == LayerKind::Runtime) {
            layers.push(ScopeLayer::new(LayerKind::Runtime, HashMap::new()));
        }
        Self { layers }
    }

    /// Returns the ordered layers, outermost first.
    #[must_use]
    pub fn layers(&self) -> &[ScopeLayer] {
        &self.layers
    }

    /// Looks up a name, innermost layer first.
    ///
    /// Dotted names (`user.id`) resolve the first segment as a variable
    /// and walk the remaining segments into its structured value.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let (root, path) = match name.split_once('.') {
            Some((root, path)) => (root, Some(path)),
            None => (name, None),
        };

        let value = self
            .layers
            .iter()
            .rev()
            .find_map(|layer| layer.values.get(root))?;

        match path {
            None => Some(value.clone()),
            Some(path) => walk_path(value, path).cloned(),
        }
    }

    /// Looks up a name and stringifies the value for substitution.
    ///
    /// String values are used verbatim; structured values are rendered
    /// as compact JSON.
    #[must_use]
    pub fn lookup_str(&self, name: &str) -> Option<String> {
        self.lookup(name).map(|v| stringify(&v))
    }

    /// Returns whether any layer defines the name.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Sets a runtime variable, shadowing all snapshot layers.
    pub fn set_runtime(&mut self, name: impl Into<String>, value: Value) {
        if let Some(layer) = self.runtime_layer_mut() {
            layer.values.insert(name.into(), value);
        }
    }

    /// Deletes a runtime variable. Snapshot layers are unaffected, so a
    /// shadowed value becomes visible again.
    pub fn delete_runtime(&mut self, name: &str) {
        if let Some(layer) = self.runtime_layer_mut() {
            layer.values.remove(name);
        }
    }

    /// Returns the selected environment's name, if an environment layer
    /// is present.
    #[must_use]
    pub fn environment_name(&self) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::Environment)
            .and_then(|l| l.name.as_deref())
    }

    /// Looks up a name in the environment layer only.
    #[must_use]
    pub fn environment_var(&self, name: &str) -> Option<Value> {
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::Environment)?
            .values
            .get(name)
            .cloned()
    }

    /// Writes into the environment layer snapshot. Visible to later
    /// stages of this run only; the persisted environment is untouched.
    pub fn set_environment_var(&mut self, name: impl Into<String>, value: Value) {
        if let Some(layer) = self
            .layers
            .iter_mut()
            .find(|l| l.kind == LayerKind::Environment)
        {
            layer.values.insert(name.into(), value);
        } else {
            // No environment selected: fall back to the runtime layer so
            // the write is still observable within the run.
            self.set_runtime(name, value);
        }
    }

    /// Looks up a name in the innermost layer of the given kind, so for
    /// folder chains the deepest folder defining the name wins.
    #[must_use]
    pub fn layer_var(&self, kind: LayerKind, name: &str) -> Option<Value> {
        self.layers
            .iter()
            .rev()
            .filter(|l| l.kind == kind)
            .find_map(|l| l.values.get(name))
            .cloned()
    }

    fn runtime_layer_mut(&mut self) -> Option<&mut ScopeLayer> {
        self.layers
            .iter_mut()
            .rev()
            .find(|l| l.kind == LayerKind::Runtime)
    }
}

/// Walks a dotted path into a structured value.
fn walk_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders a value for textual substitution.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn layered_scope() -> ResolvedScope {
        ResolvedScope::from_layers(vec![
            ScopeLayer::new(LayerKind::Collection, vars(&[("base", json!("c"))])),
            ScopeLayer::new(LayerKind::Request, vars(&[("base", json!("r"))])),
            ScopeLayer::named(
                LayerKind::Environment,
                "staging",
                vars(&[("host", json!("staging.test"))]),
            ),
        ])
    }

    #[test]
    fn innermost_layer_wins() {
        let scope = layered_scope();
        assert_eq!(scope.lookup_str("base"), Some("r".to_string()));
    }

    #[test]
    fn runtime_layer_shadows_snapshots() {
        let mut scope = layered_scope();
        scope.set_runtime("base", json!("runtime"));
        assert_eq!(scope.lookup_str("base"), Some("runtime".to_string()));

        scope.delete_runtime("base");
        assert_eq!(scope.lookup_str("base"), Some("r".to_string()));
    }

    #[test]
    fn dotted_path_walks_structured_values() {
        let mut scope = ResolvedScope::new();
        scope.set_runtime("user", json!({"id": 7, "tags": ["a", "b"]}));
        assert_eq!(scope.lookup_str("user.id"), Some("7".to_string()));
        assert_eq!(scope.lookup_str("user.tags.1"), Some("b".to_string()));
        assert_eq!(scope.lookup("user.missing"), None);
    }

    #[test]
    fn environment_accessors_target_only_the_environment_layer() {
        let mut scope = layered_scope();
        assert_eq!(scope.environment_name(), Some("staging"));
        assert_eq!(scope.environment_var("host"), Some(json!("staging.test")));
        assert_eq!(scope.environment_var("base"), None);

        scope.set_environment_var("host", json!("other.test"));
        assert_eq!(scope.environment_var("host"), Some(json!("other.test")));
    }

    #[test]
    fn layer_var_targets_the_innermost_layer_of_a_kind() {
        let scope = ResolvedScope::from_layers(vec![
            ScopeLayer::named(LayerKind::Folder, "outer", vars(&[("who", json!("outer"))])),
            ScopeLayer::named(LayerKind::Folder, "inner", vars(&[("who", json!("inner"))])),
        ]);
        assert_eq!(scope.layer_var(LayerKind::Folder, "who"), Some(json!("inner")));
        assert_eq!(scope.layer_var(LayerKind::Collection, "who"), None);
    }

    #[test]
    fn missing_name_resolves_to_none() {
        let scope = layered_scope();
        assert!(!scope.has("nope"));
        assert_eq!(scope.lookup("nope"), None);
    }

    #[test]
    fn structured_values_stringify_as_compact_json() {
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(stringify(&json!("plain")), "plain");
        assert_eq!(stringify(&json!(42)), "42");
    }
}
