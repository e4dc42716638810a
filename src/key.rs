//! Namespace-qualified reconcile keys

use kube::ResourceExt;

use crate::error::{Error, Result};

/// Build the `namespace/name` key for an object (`name` for cluster-scoped objects)
pub fn key_for<K: ResourceExt>(obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) if !namespace.is_empty() => format!("{}/{}", namespace, obj.name_any()),
        _ => obj.name_any(),
    }
}

/// Split a key into its namespace and name
pub fn split_key(key: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = key.split('/').collect();
    let (namespace, name) = match parts.as_slice() {
        [name] => ("", *name),
        [namespace, name] => (*namespace, *name),
        _ => return Err(Error::InvalidKey(key.to_string())),
    };
    if name.is_empty() {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok((namespace.to_string(), name.to_string()))
}
