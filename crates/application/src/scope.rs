//! Builds the ordered layer stack for one run.
//!
//! Layer order, outermost first: process environment, collection,
//! folder chain (outer folders first), request, selected environment,
//! runtime. Lookup resolves innermost first, so the runtime layer
//! shadows everything and the environment shadows request-level
//! defaults.

use std::collections::HashMap;

use serde_json::Value;

use quiver_domain::{LayerKind, RequestContext, ResolvedScope, ScopeLayer};

/// Resolves a request context into a flattened scope.
///
/// The process environment is injected rather than read from
/// `std::env`, so runs are reproducible and tests control it.
#[derive(Debug, Clone, Default)]
pub struct ScopeResolver {
    process_env: HashMap<String, Value>,
}

impl ScopeResolver {
    /// Creates a resolver with no process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with the given process environment variables.
    #[must_use]
    pub fn with_process_env(process_env: HashMap<String, Value>) -> Self {
        Self { process_env }
    }

    /// Captures the host process environment as the outermost layer.
    #[must_use]
    pub fn from_host_env() -> Self {
        Self {
            process_env: std::env::vars()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        }
    }

    /// Builds the run's scope from the context snapshots.
    ///
    /// The runtime layer is seeded with the context's session variables
    /// so values written by earlier runs of the same request remain
    /// visible.
    #[must_use]
    pub fn resolve(&self, context: &RequestContext) -> ResolvedScope {
        let mut layers = Vec::with_capacity(context.folders.len() + 5);

        if !self.process_env.is_empty() {
            layers.push(ScopeLayer::new(
                LayerKind::ProcessEnv,
                self.process_env.clone(),
            ));
        }
        layers.push(ScopeLayer::named(
            LayerKind::Collection,
            context.collection.name.clone(),
            context.collection.variables.clone(),
        ));
        for folder in &context.folders {
            layers.push(ScopeLayer::named(
                LayerKind::Folder,
                folder.name.clone(),
                folder.variables.clone(),
            ));
        }
        layers.push(ScopeLayer::new(
            LayerKind::Request,
            context.request.variables.clone(),
        ));
        if let Some(environment) = &context.environment {
            layers.push(ScopeLayer::named(
                LayerKind::Environment,
                environment.name.clone(),
                environment.variables.clone(),
            ));
        }
        layers.push(ScopeLayer::new(
            LayerKind::Runtime,
            context.session.clone(),
        ));

        ResolvedScope::from_layers(layers)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quiver_domain::{
        EnvironmentSnapshot, FolderSnapshot, HttpMethod, RequestDefinition,
    };
    use serde_json::json;

    fn context() -> RequestContext {
        let mut ctx = RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://{{host}}/users",
        ));
        ctx.collection.name = "api".to_string();
        ctx.collection
            .variables
            .insert("host".to_string(), json!("collection.test"));
        ctx.folders.push(FolderSnapshot {
            name: "users".to_string(),
            variables: [("host".to_string(), json!("folder.test"))].into(),
            ..FolderSnapshot::default()
        });
        ctx
    }

    #[test]
    fn environment_shadows_folder_and_collection() {
        let mut ctx = context();
        ctx.environment = Some(EnvironmentSnapshot {
            name: "staging".to_string(),
            variables: [("host".to_string(), json!("staging.test"))].into(),
        });

        let scope = ScopeResolver::new().resolve(&ctx);
        assert_eq!(scope.lookup_str("host"), Some("staging.test".to_string()));
    }

    #[test]
    fn inner_folder_shadows_outer() {
        let mut ctx = context();
        ctx.folders.push(FolderSnapshot {
            name: "inner".to_string(),
            variables: [("host".to_string(), json!("inner.test"))].into(),
            ..FolderSnapshot::default()
        });

        let scope = ScopeResolver::new().resolve(&ctx);
        assert_eq!(scope.lookup_str("host"), Some("inner.test".to_string()));
    }

    #[test]
    fn process_env_is_outermost() {
        let resolver = ScopeResolver::with_process_env(
            [("host".to_string(), json!("proc.test"))].into(),
        );
        let scope = resolver.resolve(&context());
        // Everything else shadows the process environment.
        assert_eq!(scope.lookup_str("host"), Some("folder.test".to_string()));

        let bare = resolver.resolve(&RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://api.test",
        )));
        assert_eq!(bare.lookup_str("host"), Some("proc.test".to_string()));
    }

    #[test]
    fn session_seeds_the_runtime_layer() {
        let mut ctx = context();
        ctx.session.insert("token".to_string(), json!("abc"));
        let scope = ScopeResolver::new().resolve(&ctx);
        assert_eq!(scope.lookup_str("token"), Some("abc".to_string()));
        assert_eq!(
            scope.layers().last().map(|l| l.kind),
            Some(LayerKind::Runtime)
        );
    }
}
