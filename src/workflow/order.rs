//! Execution order of the models inside one layer.
//!
//! Only same-stage dependencies constrain the order; earlier stages have run
//! by the time a layer starts. Validation:
//! - same-stage dependencies reference models of the layer
//! - the dependency graph is acyclic (DFS coloring)

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::spec::LayerSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOrder {
    /// Model indices into `LayerSpec::models`, dependencies first.
    order: Vec<usize>,
    /// name -> same-stage dependency names
    parents: BTreeMap<String, Vec<String>>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Temp,
    Perm,
}

impl ModelOrder {
    pub fn for_layer(layer: &LayerSpec) -> Result<Self> {
        let index: BTreeMap<&str, usize> = layer
            .models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();

        // 1) Same-stage edges.
        let mut parents = BTreeMap::<String, Vec<String>>::new();
        for model in &layer.models {
            let deps = parents.entry(model.name.clone()).or_default();
            for dep in &model.dependencies {
                if dep.stage_or(layer.stage) != layer.stage {
                    continue;
                }
                if !index.contains_key(dep.model.as_str()) {
                    return Err(PipelineError::config(format!(
                        "layer '{}': model '{}' depends on unknown model '{}'",
                        layer.name, model.name, dep
                    )));
                }
                if !deps.contains(&dep.model) {
                    deps.push(dep.model.clone());
                }
            }
        }

        // 2) DFS in declaration order; post-order gives dependencies first.
        fn dfs(
            v: &str,
            parents: &BTreeMap<String, Vec<String>>,
            marks: &mut BTreeMap<String, Mark>,
            stack: &mut Vec<String>,
            out: &mut Vec<String>,
        ) -> std::result::Result<(), String> {
            if let Some(Mark::Perm) = marks.get(v) {
                return Ok(());
            }
            if let Some(Mark::Temp) = marks.get(v) {
                // v is on the current path
                stack.push(v.to_string());
                return Err(stack.join(" -> "));
            }

            marks.insert(v.to_string(), Mark::Temp);
            stack.push(v.to_string());
            if let Some(deps) = parents.get(v) {
                for d in deps {
                    dfs(d, parents, marks, stack, out)?;
                }
            }
            stack.pop();
            marks.insert(v.to_string(), Mark::Perm);
            out.push(v.to_string());
            Ok(())
        }

        let mut marks = BTreeMap::<String, Mark>::new();
        let mut stack = Vec::<String>::new();
        let mut names = Vec::with_capacity(layer.models.len());
        for model in &layer.models {
            stack.clear();
            dfs(&model.name, &parents, &mut marks, &mut stack, &mut names).map_err(|path| {
                PipelineError::config(format!(
                    "layer '{}': dependency cycle {}",
                    layer.name, path
                ))
            })?;
        }

        let order = names
            .iter()
            .filter_map(|n| index.get(n.as_str()).copied())
            .collect();
        Ok(Self { order, parents })
    }

    pub fn indices(&self) -> &[usize] {
        &self.order
    }

    /// Same-stage dependencies of `model`.
    pub fn parents(&self, model: &str) -> &[String] {
        self.parents.get(model).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::RawLayerSpec;
    use serde_json::{Value, json};
    use std::path::Path;

    fn layer(models: &[(&str, Value)]) -> LayerSpec {
        let models: Vec<Value> = models
            .iter()
            .map(|(name, deps)| {
                json!({
                    "name": name,
                    "trigger": "automatic",
                    "dependencies": deps,
                    "output": {"name": name, "path": format!("{}.csv", name), "layer": "staging"},
                    "processing": {"processor": "select_source", "source": "s"}
                })
            })
            .collect();
        let raw: RawLayerSpec =
            serde_json::from_value(json!({"name": "staging", "stage": "staging", "models": models}))
                .unwrap();
        raw.validate_and_build(Path::new("/r")).unwrap()
    }

    fn names(layer: &LayerSpec, order: &ModelOrder) -> Vec<String> {
        order
            .indices()
            .iter()
            .map(|&i| layer.models[i].name.clone())
            .collect()
    }

    #[test]
    fn dependencies_run_first() {
        let l = layer(&[
            ("standings", json!(["matches", "teams"])),
            ("matches", json!(["teams", "intermediate.raw"])),
            ("teams", json!([])),
        ]);
        let order = ModelOrder::for_layer(&l).unwrap();
        assert_eq!(names(&l, &order), vec!["teams", "matches", "standings"]);
        assert_eq!(order.parents("matches"), &["teams".to_string()]);
    }

    #[test]
    fn independent_models_keep_declaration_order() {
        let l = layer(&[("b", json!([])), ("a", json!([])), ("c", json!(["staging.a"]))]);
        let order = ModelOrder::for_layer(&l).unwrap();
        assert_eq!(names(&l, &order), vec!["b", "a", "c"]);
    }

    #[test]
    fn cycles_are_reported_with_their_path() {
        let l = layer(&[("a", json!(["b"])), ("b", json!(["a"]))]);
        let err = ModelOrder::for_layer(&l).unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"), "{}", err);

        let selfish = layer(&[("a", json!(["a"]))]);
        assert!(ModelOrder::for_layer(&selfish).is_err());
    }

    #[test]
    fn unknown_same_stage_dependency_fails() {
        let l = layer(&[("a", json!(["ghost"]))]);
        assert!(ModelOrder::for_layer(&l).is_err());
    }
}
