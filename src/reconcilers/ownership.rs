//! Ownership checks between parents and children
//!
//! A child points back at its parent through its controller owner reference. The
//! link is compared by value (kind, namespace, name and uid when both sides know it);
//! it is never used to reach the parent object itself.

use kube::{Resource, ResourceExt};

/// Identity of a controlling owner as seen from a child
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerLink {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    pub uid: Option<String>,
}

impl OwnerLink {
    /// Link a child of `parent` would carry
    pub fn to<K: Resource<DynamicType = ()>>(parent: &K) -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            namespace: parent.namespace(),
            name: parent.name_any(),
            uid: parent.uid(),
        }
    }

    /// Controller owner of `child`, if any. Owner references are namespace-local,
    /// so the owner's namespace is the child's.
    pub fn controller_of<K: ResourceExt>(child: &K) -> Option<Self> {
        child
            .owner_references()
            .iter()
            .find(|owner| owner.controller == Some(true))
            .map(|owner| Self {
                kind: owner.kind.clone(),
                namespace: child.namespace(),
                name: owner.name.clone(),
                uid: Some(owner.uid.clone()).filter(|uid| !uid.is_empty()),
            })
    }

    fn matches(&self, expected: &OwnerLink) -> bool {
        let uid_matches = match (&self.uid, &expected.uid) {
            (Some(actual), Some(expected)) => actual == expected,
            _ => true,
        };
        self.kind == expected.kind
            && self.namespace == expected.namespace
            && self.name == expected.name
            && uid_matches
    }
}

/// Whether `child` is controlled by `parent`
pub fn is_controlled_by<C, P>(child: &C, parent: &P) -> bool
where
    C: ResourceExt,
    P: Resource<DynamicType = ()>,
{
    OwnerLink::controller_of(child)
        .map(|owner| owner.matches(&OwnerLink::to(parent)))
        .unwrap_or(false)
}
