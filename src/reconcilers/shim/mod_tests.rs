// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the shim reconciler helpers.

#[cfg(test)]
mod tests {
    use crate::reconcilers::shim::{
        is_not_found, join_errors, nodes_needing_install, nodes_needing_uninstall,
    };
    use k8s_openapi::api::core::v1::Node;
    use kube::api::ObjectMeta;
    use kube::ResourceExt;
    use std::collections::BTreeMap;

    const SHIM_NAME: &str = "spin-v2";

    fn labeled_node(name: &str, labels: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn node_names(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|node| node.name_any()).collect()
    }

    #[test]
    fn test_nodes_needing_install_skips_provisioned_and_pending() {
        let nodes = vec![
            labeled_node("node-a", &[(SHIM_NAME, "provisioned")]),
            labeled_node("node-b", &[(SHIM_NAME, "pending")]),
            labeled_node("node-c", &[]),
        ];

        let needing = nodes_needing_install(&nodes, SHIM_NAME);
        assert_eq!(node_names(&needing), vec!["node-c".to_string()]);
    }

    #[test]
    fn test_nodes_needing_install_includes_failed_and_uninstall() {
        let nodes = vec![
            labeled_node("node-a", &[(SHIM_NAME, "failed")]),
            labeled_node("node-b", &[(SHIM_NAME, "uninstall")]),
        ];

        let needing = nodes_needing_install(&nodes, SHIM_NAME);
        assert_eq!(
            node_names(&needing),
            vec!["node-a".to_string(), "node-b".to_string()]
        );
    }

    #[test]
    fn test_nodes_needing_install_ignores_other_shims_labels() {
        let nodes = vec![labeled_node("node-a", &[("other-shim", "provisioned")])];

        let needing = nodes_needing_install(&nodes, SHIM_NAME);
        assert_eq!(node_names(&needing), vec!["node-a".to_string()]);
    }

    #[test]
    fn test_nodes_needing_uninstall_only_labeled_nodes() {
        // Two candidates carry the lifecycle label (one provisioned, one
        // still pending), a third never got one. Deletion must dispatch
        // exactly two uninstall jobs.
        let nodes = vec![
            labeled_node("node-a", &[(SHIM_NAME, "provisioned")]),
            labeled_node("node-b", &[(SHIM_NAME, "pending")]),
            labeled_node("node-c", &[]),
        ];

        let needing = nodes_needing_uninstall(&nodes, SHIM_NAME);
        assert_eq!(
            node_names(&needing),
            vec!["node-a".to_string(), "node-b".to_string()]
        );
    }

    #[test]
    fn test_nodes_needing_uninstall_any_label_value_counts() {
        let nodes = vec![
            labeled_node("node-a", &[(SHIM_NAME, "failed")]),
            labeled_node("node-b", &[("other-shim", "provisioned")]),
        ];

        let needing = nodes_needing_uninstall(&nodes, SHIM_NAME);
        assert_eq!(node_names(&needing), vec!["node-a".to_string()]);
    }

    #[test]
    fn test_join_errors_empty_is_ok() {
        assert!(join_errors(Vec::new()).is_ok());
    }

    #[test]
    fn test_join_errors_combines_messages() {
        let errors = vec![
            anyhow::anyhow!("node-a failed"),
            anyhow::anyhow!("node-b failed"),
        ];

        let err = join_errors(errors).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("node-a failed"));
        assert!(message.contains("node-b failed"));
    }

    #[test]
    fn test_is_not_found_detects_api_404() {
        let api_error = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "nodes \"node-a\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        let err = anyhow::Error::from(api_error).context("failed to fetch node");

        assert!(is_not_found(&err));
    }

    #[test]
    fn test_is_not_found_ignores_other_errors() {
        let api_error = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "conflict".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        });
        let err = anyhow::Error::from(api_error);

        assert!(!is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("plain error")));
    }
}
