// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::Result;
use crate::mutation::{apply_mutations, apply_reconciler_mutation, MutateFunc};
use crate::types::ArgoCD;
use kube::Resource;

/// A desired object together with the mutations to run before it is submitted
pub struct Request<'a, K> {
    pub object: K,
    pub instance: Option<&'a ArgoCD>,
    pub mutations: Vec<MutateFunc<K>>,
}

impl<'a, K: Resource> Request<'a, K> {
    /// Request for an object owned by an instance, with the default reconciler mutation
    pub fn new(object: K, instance: &'a ArgoCD) -> Self {
        Self {
            object,
            instance: Some(instance),
            mutations: vec![apply_reconciler_mutation::<K>],
        }
    }

    /// Append another mutation to the chain
    pub fn with_mutation(mut self, mutation: MutateFunc<K>) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Produce the desired object with all mutations applied
    pub fn request(self) -> Result<K> {
        let Request {
            mut object,
            instance,
            mutations,
        } = self;
        apply_mutations(instance, &mut object, &mutations)?;
        Ok(object)
    }
}
