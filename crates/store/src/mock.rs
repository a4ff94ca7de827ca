//! Scripted in-memory store for tests and offline demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use serde_json::Value;
use stackup_core::{Error, Result};

use crate::ObjectStore;

enum ScriptStep {
    Object(Value),
    Fail(Error),
}

/// In-memory [`ObjectStore`] with two layers:
///
/// - a plain object map seeded with [`insert`](Self::insert), served in
///   insertion order by `list` and mutated by real JSON merge patches;
/// - optional per-object scripts of `get` responses for driving the polling
///   watcher through a sequence of observations. The final scripted object
///   repeats forever; a trailing scripted error fires once and then the
///   script falls away.
///
/// Every `get` is counted, and every patch and create is recorded, so tests
/// can assert on traffic as well as results.
#[derive(Default)]
pub struct MockStore {
    objects: Mutex<Vec<(String, Value)>>,
    scripts: Mutex<HashMap<String, VecDeque<ScriptStep>>>,
    get_calls: AtomicUsize,
    patches: Mutex<Vec<(String, Value)>>,
    creates: Mutex<Vec<(String, Value)>>,
}

fn key(resource: &ApiResource, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", resource.plural, namespace, name)
}

fn decode(value: &Value) -> Result<DynamicObject> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Transport(format!("mock object decode: {e}")))
}

/// RFC 7386 merge patch: objects merge member-wise, `null` removes, anything
/// else replaces.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Default::default());
    }
    if let Value::Object(target_map) = target {
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
                continue;
            }
            merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
        }
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace an object. The value must carry `metadata.name`.
    pub fn insert(&self, resource: &ApiResource, namespace: &str, object: Value) {
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let k = key(resource, namespace, &name);
        let mut objects = self.objects.lock().unwrap();
        match objects.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, slot)) => *slot = object,
            None => objects.push((k, object)),
        }
    }

    /// Queue the next `get` response for one object.
    pub fn enqueue_get(&self, resource: &ApiResource, namespace: &str, name: &str, object: Value) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key(resource, namespace, name))
            .or_default()
            .push_back(ScriptStep::Object(object));
    }

    /// Queue a `get` failure for one object. Fires once.
    pub fn enqueue_get_error(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        error: Error,
    ) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key(resource, namespace, name))
            .or_default()
            .push_back(ScriptStep::Fail(error));
    }

    /// Number of `get` calls served so far, scripted or not.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Recorded merge patches as `(key, patch)` pairs, oldest first.
    pub fn patches(&self) -> Vec<(String, Value)> {
        self.patches.lock().unwrap().clone()
    }

    /// Recorded creates as `(key, object)` pairs, oldest first.
    pub fn creates(&self) -> Vec<(String, Value)> {
        self.creates.lock().unwrap().clone()
    }

    /// Current stored value of one object, if any.
    pub fn object(&self, resource: &ApiResource, namespace: &str, name: &str) -> Option<Value> {
        let k = key(resource, namespace, name);
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(existing, _)| *existing == k)
            .map(|(_, v)| v.clone())
    }

    fn next_scripted(&self, k: &str) -> Option<ScriptStep> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(k)?;
        match queue.len() {
            0 => None,
            1 => match queue.front() {
                Some(ScriptStep::Object(v)) => Some(ScriptStep::Object(v.clone())),
                _ => queue.pop_front(),
            },
            _ => queue.pop_front(),
        }
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let k = key(resource, namespace, name);
        if let Some(step) = self.next_scripted(&k) {
            return match step {
                ScriptStep::Object(v) => decode(&v),
                ScriptStep::Fail(e) => Err(e),
            };
        }
        match self.object(resource, namespace, name) {
            Some(v) => decode(&v),
            None => Err(Error::NotFound(format!(
                "{} '{}/{}' not found",
                resource.kind, namespace, name
            ))),
        }
    }

    async fn list(&self, resource: &ApiResource, namespace: &str) -> Result<Vec<DynamicObject>> {
        let prefix = format!("{}/{}/", resource.plural, namespace);
        let objects = self.objects.lock().unwrap();
        objects
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| decode(v))
            .collect()
    }

    async fn patch_merge(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<DynamicObject> {
        let k = key(resource, namespace, name);
        let mut objects = self.objects.lock().unwrap();
        let Some((_, stored)) = objects.iter_mut().find(|(existing, _)| *existing == k) else {
            return Err(Error::NotFound(format!(
                "{} '{}/{}' not found",
                resource.kind, namespace, name
            )));
        };
        merge_patch(stored, patch);
        let updated = stored.clone();
        drop(objects);
        self.patches.lock().unwrap().push((k, patch.clone()));
        decode(&updated)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject> {
        let name = obj.metadata.name.clone().unwrap_or_default();
        let k = key(resource, namespace, &name);
        let value = serde_json::to_value(obj)
            .map_err(|e| Error::Transport(format!("mock object encode: {e}")))?;
        let mut objects = self.objects.lock().unwrap();
        if objects.iter().any(|(existing, _)| *existing == k) {
            return Err(Error::Transport(format!(
                "{} '{}/{}' already exists",
                resource.kind, namespace, name
            )));
        }
        objects.push((k.clone(), value.clone()));
        drop(objects);
        self.creates.lock().unwrap().push((k, value));
        Ok(obj.clone())
    }
}
