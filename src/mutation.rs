// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordered mutation functions applied to desired objects before submission.

use crate::constants::{annotations, labels};
use crate::error::{ArgoCDOperatorError, Result};
use crate::types::ArgoCD;
use kube::{Resource, ResourceExt};
use tracing::warn;

/// A transform applied to a desired object before it is sent to the cluster
pub type MutateFunc<K> = fn(Option<&ArgoCD>, &mut K) -> Result<()>;

/// Apply every mutation in order.
///
/// All mutations run even when one fails; the last failure is returned.
pub fn apply_mutations<K>(instance: Option<&ArgoCD>, obj: &mut K, mutations: &[MutateFunc<K>]) -> Result<()>
where
    K: Resource,
{
    let mut last_error = None;
    for mutate in mutations {
        if let Err(e) = mutate(instance, obj) {
            warn!("Mutation failed for {}: {}", obj.name_any(), e);
            last_error = Some(e);
        }
    }

    match last_error {
        Some(e) => Err(ArgoCDOperatorError::MutationFailed(e.to_string())),
        None => Ok(()),
    }
}

/// Default mutation for every reconciled object: stamp the part-of and
/// managed-by labels and the instance tracking annotations.
pub fn apply_reconciler_mutation<K>(instance: Option<&ArgoCD>, obj: &mut K) -> Result<()>
where
    K: Resource,
{
    let Some(instance) = instance else {
        return Ok(());
    };

    let obj_labels = obj.labels_mut();
    obj_labels
        .entry(labels::PART_OF.to_string())
        .or_insert_with(|| labels::PART_OF_VALUE.to_string());
    obj_labels.insert(labels::MANAGED_BY.to_string(), instance.name_any());

    let obj_annotations = obj.annotations_mut();
    obj_annotations.insert(annotations::INSTANCE_NAME.to_string(), instance.name_any());
    obj_annotations.insert(
        annotations::INSTANCE_NAMESPACE.to_string(),
        instance.instance_namespace(),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    fn make_argocd() -> ArgoCD {
        ArgoCD {
            metadata: ObjectMeta {
                name: Some("argocd".to_string()),
                namespace: Some("argocd-ns".to_string()),
                ..Default::default()
            },
            spec: Default::default(),
            status: None,
        }
    }

    fn make_secret() -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("secret".to_string()),
                namespace: Some("argocd-ns".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn failing(_: Option<&ArgoCD>, _: &mut Secret) -> Result<()> {
        Err(ArgoCDOperatorError::MissingObjectKey("data"))
    }

    fn set_type(_: Option<&ArgoCD>, secret: &mut Secret) -> Result<()> {
        secret.type_ = Some("Opaque".to_string());
        Ok(())
    }

    #[test]
    fn test_apply_reconciler_mutation_sets_labels_and_annotations() {
        let argocd = make_argocd();
        let mut secret = make_secret();

        apply_reconciler_mutation(Some(&argocd), &mut secret).unwrap();

        assert_eq!(secret.labels().get(labels::MANAGED_BY).unwrap(), "argocd");
        assert_eq!(secret.labels().get(labels::PART_OF).unwrap(), "argocd");
        assert_eq!(
            secret.annotations().get(annotations::INSTANCE_NAMESPACE).unwrap(),
            "argocd-ns"
        );
    }

    #[test]
    fn test_apply_reconciler_mutation_without_instance_is_noop() {
        let mut secret = make_secret();
        apply_reconciler_mutation(None, &mut secret).unwrap();
        assert!(secret.metadata.labels.is_none());
    }

    #[test]
    fn test_apply_mutations_runs_all_and_reports_failure() {
        let mut secret = make_secret();
        let mutations: Vec<MutateFunc<Secret>> = vec![failing, set_type];

        let err = apply_mutations(None, &mut secret, &mutations).unwrap_err();

        assert!(matches!(err, ArgoCDOperatorError::MutationFailed(_)));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
    }

    #[test]
    fn test_apply_mutations_in_order() {
        fn set_other(_: Option<&ArgoCD>, secret: &mut Secret) -> Result<()> {
            secret.type_ = Some("kubernetes.io/tls".to_string());
            Ok(())
        }

        let mut secret = make_secret();
        let mutations: Vec<MutateFunc<Secret>> = vec![set_type, set_other];
        apply_mutations(None, &mut secret, &mutations).unwrap();

        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/tls"));
    }
}
