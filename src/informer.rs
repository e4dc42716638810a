//! Watch/cache adapter
//!
//! Runs a kube watcher for one resource kind through a reflector [`Store`] and turns
//! the raw watch events into the objects that should trigger a reconcile. An object
//! is only released once the store already reflects it: during a relist the
//! reflector buffers everything until `InitDone`, so the listed objects are held back
//! until the new listing has been swapped in. Objects that disappeared while the
//! watch was down are released as deletions at that point.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use kube::runtime::reflector::{store::Writer, ObjectRef, Store};
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// How an object was touched by the watch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Touch {
    Applied,
    Deleted,
}

/// Which touches a trigger stream passes on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Touches {
    All,
    Applied,
    Deleted,
}

impl Touches {
    fn allows(self, touch: Touch) -> bool {
        match self {
            Touches::All => true,
            Touches::Applied => touch == Touch::Applied,
            Touches::Deleted => touch == Touch::Deleted,
        }
    }
}

struct Relist<K: Resource> {
    previous: HashMap<ObjectRef<K>, Arc<K>>,
    listed: Vec<K>,
}

/// Decides which objects a watch event releases, given the store it has already
/// been applied to.
pub struct TriggerGate<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    reader: Store<K>,
    relist: Option<Relist<K>>,
}

impl<K> TriggerGate<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    pub fn new(reader: Store<K>) -> Self {
        Self {
            reader,
            relist: None,
        }
    }

    /// Objects released by `event`. Must be called after the reflector applied it.
    pub fn on_event(&mut self, event: &watcher::Event<K>) -> Vec<(Touch, K)> {
        match event {
            watcher::Event::Apply(obj) => vec![(Touch::Applied, obj.clone())],
            watcher::Event::Delete(obj) => vec![(Touch::Deleted, obj.clone())],
            watcher::Event::Init => {
                // The store still holds the listing from before the restart
                let previous = self
                    .reader
                    .state()
                    .into_iter()
                    .map(|obj| (ObjectRef::from_obj(obj.as_ref()), obj))
                    .collect();
                self.relist = Some(Relist {
                    previous,
                    listed: Vec::new(),
                });
                Vec::new()
            }
            watcher::Event::InitApply(obj) => match &mut self.relist {
                Some(relist) => {
                    relist.listed.push(obj.clone());
                    Vec::new()
                }
                None => vec![(Touch::Applied, obj.clone())],
            },
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn finish_relist(&mut self) -> Vec<(Touch, K)> {
        let Some(Relist {
            mut previous,
            listed,
        }) = self.relist.take()
        else {
            return Vec::new();
        };

        let mut released = Vec::new();
        for obj in listed {
            match previous.remove(&ObjectRef::from_obj(&obj)) {
                Some(old) if same_resource_version(old.as_ref(), &obj) => {}
                _ => released.push((Touch::Applied, obj)),
            }
        }
        for (_, gone) in previous {
            debug!(object = %gone.name_any(), "Object vanished while the watch was down");
            released.push((Touch::Deleted, K::clone(&gone)));
        }
        released
    }
}

/// Feed `events` through `writer` and yield the objects that should trigger a
/// reconcile, each released only after the store reflects it.
pub fn trigger_stream<K, S>(
    writer: Writer<K>,
    events: S,
    touches: Touches,
) -> impl Stream<Item = std::result::Result<K, watcher::Error>> + Send + 'static
where
    K: Resource + Clone + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
    S: Stream<Item = std::result::Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let mut gate = TriggerGate::new(writer.as_reader());
    reflector(writer, events).flat_map(move |event| {
        let released: Vec<_> = match event {
            Ok(event) => gate
                .on_event(&event)
                .into_iter()
                .filter(|(touch, _)| touches.allows(*touch))
                .map(|(_, obj)| Ok(obj))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(released)
    })
}

/// Watch every object of kind `K`, returning the cache and its trigger stream
pub fn watch<K>(
    api: Api<K>,
    config: watcher::Config,
    touches: Touches,
) -> (
    Store<K>,
    impl Stream<Item = std::result::Result<K, watcher::Error>> + Send + 'static,
)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let (reader, writer) = reflector::store();
    let events = watcher(api, config).default_backoff();
    (reader, trigger_stream(writer, events, touches))
}

/// Look up a namespaced object in a cache
pub fn get_cached<K>(cache: &Store<K>, namespace: &str, name: &str) -> Option<Arc<K>>
where
    K: Resource + Clone,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    cache.get(&ObjectRef::new(name).within(namespace))
}

/// Block until the cache has received its first full listing
pub async fn wait_for_sync<K>(cache: &Store<K>) -> Result<()>
where
    K: Resource + Clone,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    cache.wait_until_ready().await.map_err(|_| {
        let kind = K::kind(&K::DynamicType::default()).into_owned();
        Error::CacheSync(kind)
    })
}

/// Whether two copies of an object carry the same resource version
pub fn same_resource_version<K: ResourceExt>(old: &K, new: &K) -> bool {
    old.resource_version().is_some() && old.resource_version() == new.resource_version()
}
