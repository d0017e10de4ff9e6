//! In-memory state store with failure injection and an operation log.

use crate::controller::reconciler::store::{
    Lookup, ManagedObject, Propagation, StateStore, StoreError,
};
use crate::crd::Export;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

type ObjectId = (String, String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create { kind: String, name: String },
    Delete { kind: String, name: String },
    PersistStatus { completed: bool },
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<ObjectId, Value>>,
    ops: Mutex<Vec<Op>>,
    failing_gets: Mutex<HashSet<String>>,
    failing_creates: Mutex<HashMap<String, String>>,
    failing_deletes: Mutex<HashSet<String>>,
    /// Number of upcoming status writes to reject; `u32::MAX` rejects all of them
    failing_status: Mutex<u32>,
}

fn kind_of<K: ManagedObject>() -> String {
    K::kind(&()).into_owned()
}

fn object_id<K: ManagedObject>(namespace: &str, name: &str) -> ObjectId {
    let namespace = if K::CLUSTER_SCOPED { "" } else { namespace };
    (kind_of::<K>(), namespace.to_string(), name.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without logging an operation
    pub fn insert<K: ManagedObject>(&self, object: &K) {
        let id = object_id::<K>(&object.namespace().unwrap_or_default(), &object.name_any());
        let value = serde_json::to_value(object).unwrap();
        self.objects.lock().unwrap().insert(id, value);
    }

    pub fn object<K: ManagedObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&object_id::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn contains<K: ManagedObject>(&self, namespace: &str, name: &str) -> bool {
        self.object::<K>(namespace, name).is_some()
    }

    /// Mutate the stored JSON of an object, as the platform would
    pub fn patch<K: ManagedObject>(&self, namespace: &str, name: &str, f: impl FnOnce(&mut Value)) {
        let mut objects = self.objects.lock().unwrap();
        let value = objects
            .get_mut(&object_id::<K>(namespace, name))
            .unwrap_or_else(|| panic!("{} {namespace}/{name} not seeded", kind_of::<K>()));
        f(value);
    }

    pub fn export(&self, namespace: &str, name: &str) -> Export {
        self.object::<Export>(namespace, name).unwrap()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn take_ops(&self) -> Vec<Op> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    pub fn fail_gets_of(&self, kind: &str) {
        self.failing_gets.lock().unwrap().insert(kind.to_string());
    }

    pub fn fail_creates_of(&self, kind: &str, message: &str) {
        self.failing_creates
            .lock()
            .unwrap()
            .insert(kind.to_string(), message.to_string());
    }

    pub fn fail_deletes_of(&self, kind: &str) {
        self.failing_deletes.lock().unwrap().insert(kind.to_string());
    }

    pub fn fail_status_writes(&self, fail: bool) {
        *self.failing_status.lock().unwrap() = if fail { u32::MAX } else { 0 };
    }

    pub fn fail_next_status_write(&self) {
        *self.failing_status.lock().unwrap() = 1;
    }

    pub fn heal(&self) {
        self.failing_gets.lock().unwrap().clear();
        self.failing_creates.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
        self.fail_status_writes(false);
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Lookup<K>, StoreError> {
        let kind = kind_of::<K>();
        if self.failing_gets.lock().unwrap().contains(&kind) {
            return Err(StoreError::Unavailable(format!("cannot read {kind}")));
        }
        let value = self
            .objects
            .lock()
            .unwrap()
            .get(&object_id::<K>(namespace, name))
            .cloned();
        match value {
            Some(value) => Ok(Lookup::Found(serde_json::from_value(value)?)),
            None => Ok(Lookup::Absent),
        }
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<(), StoreError> {
        let kind = kind_of::<K>();
        if let Some(message) = self.failing_creates.lock().unwrap().get(&kind) {
            return Err(StoreError::Unavailable(message.clone()));
        }
        let name = object
            .meta()
            .name
            .clone()
            .ok_or_else(|| StoreError::MissingName { kind: kind.clone() })?;
        let id = object_id::<K>(namespace, &name);
        let value = serde_json::to_value(object)?;

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists { kind, name });
        }
        objects.insert(id, value);
        self.ops.lock().unwrap().push(Op::Create { kind, name });
        Ok(())
    }

    async fn delete<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        _propagation: Propagation,
    ) -> Result<(), StoreError> {
        let kind = kind_of::<K>();
        if self.failing_deletes.lock().unwrap().contains(&kind) {
            return Err(StoreError::Unavailable(format!("cannot delete {kind}")));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&object_id::<K>(namespace, name));
        self.ops.lock().unwrap().push(Op::Delete {
            kind,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn persist_status(&self, export: &Export) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_status.lock().unwrap();
            if *failing > 0 {
                if *failing != u32::MAX {
                    *failing -= 1;
                }
                return Err(StoreError::Unavailable("status write rejected".to_string()));
            }
        }
        let id = object_id::<Export>(&export.namespace().unwrap_or_default(), &export.name_any());
        let status = serde_json::to_value(&export.status)?;
        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get_mut(&id)
            .ok_or_else(|| StoreError::Unavailable("export not found".to_string()))?;
        stored["status"] = status;
        self.ops.lock().unwrap().push(Op::PersistStatus {
            completed: export.status.as_ref().is_some_and(|s| s.completed),
        });
        Ok(())
    }
}
