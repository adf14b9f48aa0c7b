// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed renderer registry, one per platform.

use std::collections::HashMap;

use serde_json::Value;

use crate::semantic::SemanticType;

/// Renders one semantic type's payload.
pub type RenderFn<M> = fn(&Value) -> M;

/// Renders any payload from its wire type name; the default branch.
pub type FallbackFn<M> = fn(&str, &Value) -> M;

/// Maps each semantic type to the renderer of one platform.
///
/// Types without a registered renderer, and wire names that are not a known
/// [`SemanticType`], go to the fallback.
pub struct RendererRegistry<M> {
    renderers: HashMap<SemanticType, RenderFn<M>>,
    fallback: FallbackFn<M>,
}

impl<M> RendererRegistry<M> {
    pub fn new(fallback: FallbackFn<M>) -> Self {
        Self {
            renderers: HashMap::new(),
            fallback,
        }
    }

    /// Adds or replaces the renderer of one type.
    pub fn register(mut self, semantic_type: SemanticType, render: RenderFn<M>) -> Self {
        self.renderers.insert(semantic_type, render);
        self
    }

    pub fn has_renderer(&self, semantic_type: SemanticType) -> bool {
        self.renderers.contains_key(&semantic_type)
    }

    pub fn render(&self, semantic_type: &str, payload: &Value) -> M {
        match SemanticType::parse(semantic_type).and_then(|ty| self.renderers.get(&ty)) {
            Some(render) => render(payload),
            None => (self.fallback)(semantic_type, payload),
        }
    }
}

impl<M> std::fmt::Debug for RendererRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut registered: Vec<String> = self.renderers.keys().map(|t| t.to_string()).collect();
        registered.sort();
        f.debug_struct("RendererRegistry")
            .field("registered", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fallback(ty: &str, _: &Value) -> String {
        format!("fallback:{ty}")
    }

    fn alert(_: &Value) -> String {
        "alert".to_string()
    }

    #[test]
    fn registered_types_use_their_renderer() {
        let registry = RendererRegistry::new(fallback).register(SemanticType::AlertNotification, alert);
        assert!(registry.has_renderer(SemanticType::AlertNotification));
        assert_eq!(registry.render("alert_notification", &json!({})), "alert");
    }

    #[test]
    fn unregistered_and_unknown_types_fall_back() {
        let registry = RendererRegistry::new(fallback).register(SemanticType::AlertNotification, alert);
        assert_eq!(registry.render("text", &json!({})), "fallback:text");
        assert_eq!(registry.render("nonsense", &json!({})), "fallback:nonsense");
    }
}
