// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `jobs.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{FetchStrategy, RuntimeClassSpec, Shim, ShimSpec};
    use crate::labels;
    use crate::reconcilers::shim::artifacts::ResolvedArtifact;
    use crate::reconcilers::shim::jobs::{build_job, job_name, truncate_name, Operation};
    use k8s_openapi::api::core::v1::Node;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn test_shim(name: &str) -> Shim {
        Shim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: Some("0000-1111".to_string()),
                ..Default::default()
            },
            spec: ShimSpec {
                node_selector: None,
                fetch_strategy: FetchStrategy::default(),
                runtime_class: RuntimeClassSpec {
                    name: "spin".to_string(),
                    handler: "spin".to_string(),
                },
                rollout_strategy: Default::default(),
                containerd_runtime_options: None,
            },
            status: None,
        }
    }

    fn test_node(name: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn test_artifact() -> ResolvedArtifact {
        ResolvedArtifact {
            location: "https://example.com/shim.tar.gz".to_string(),
            sha256: Some("deadbeef".to_string()),
        }
    }

    #[test]
    fn test_job_name_is_deterministic() {
        assert_eq!(
            job_name("node-a", "spin-v2", Operation::Install),
            "node-a-spin-v2-install"
        );
        assert_eq!(
            job_name("node-a", "spin-v2", Operation::Uninstall),
            "node-a-spin-v2-uninstall"
        );
    }

    #[test]
    fn test_job_name_truncates_to_63_chars() {
        let long_node = "n".repeat(80);
        let name = job_name(&long_node, "spin-v2", Operation::Install);
        assert_eq!(name.len(), 63);
    }

    #[test]
    fn test_truncate_name_keeps_short_names() {
        assert_eq!(truncate_name("short"), "short");
    }

    #[test]
    fn test_install_job_manifest() {
        let shim = test_shim("spin-v2");
        let node = test_node("node-a");
        let artifact = test_artifact();

        let job = build_job(&shim, &node, Operation::Install, Some(&artifact)).unwrap();

        assert_eq!(job.metadata.name.as_deref(), Some("node-a-spin-v2-install"));

        let annotations = job.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            annotations.get(labels::ANNOTATION_NODE_NAME),
            Some(&"node-a".to_string())
        );
        assert_eq!(
            annotations.get(labels::ANNOTATION_SHIM_NAME),
            Some(&"spin-v2".to_string())
        );
        assert_eq!(
            annotations.get(labels::ANNOTATION_OPERATION),
            Some(&"install".to_string())
        );

        let job_labels = job.metadata.labels.as_ref().unwrap();
        assert_eq!(
            job_labels.get(labels::LABEL_JOB),
            Some(&"true".to_string())
        );
        assert_eq!(
            job_labels.get("node-a-spin-v2-install"),
            Some(&"true".to_string())
        );

        // Install jobs are owned by the shim.
        let owners = job.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Shim");
        assert_eq!(owners[0].name, "spin-v2");
        assert_eq!(owners[0].controller, Some(true));

        let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod.node_name.as_deref(), Some("node-a"));
        assert_eq!(pod.host_pid, Some(true));
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));

        // Downloader init container with artifact env.
        let init = &pod.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.name, "downloader");
        let env = init.env.as_ref().unwrap();
        assert!(env
            .iter()
            .any(|e| e.name == "SHIM_NAME" && e.value.as_deref() == Some("spin-v2")));
        assert!(env.iter().any(|e| e.name == "SHIM_LOCATION"
            && e.value.as_deref() == Some("https://example.com/shim.tar.gz")));
        assert!(env
            .iter()
            .any(|e| e.name == "SHIM_SHA256" && e.value.as_deref() == Some("deadbeef")));

        // Provisioner args and host root env.
        let provisioner = &pod.containers[0];
        assert_eq!(provisioner.name, "provisioner");
        assert_eq!(
            provisioner.args.as_ref().unwrap(),
            &vec![
                "install".to_string(),
                "-H".to_string(),
                "/mnt/node-root".to_string(),
                "-r".to_string(),
                "spin-v2".to_string(),
            ]
        );
        assert!(provisioner
            .env
            .as_ref()
            .unwrap()
            .iter()
            .any(|e| e.name == "HOST_ROOT" && e.value.as_deref() == Some("/mnt/node-root")));
    }

    #[test]
    fn test_install_job_without_artifact_fails() {
        let shim = test_shim("spin-v2");
        let node = test_node("node-a");

        assert!(build_job(&shim, &node, Operation::Install, None).is_err());
    }

    #[test]
    fn test_install_job_without_sha256_omits_env() {
        let shim = test_shim("spin-v2");
        let node = test_node("node-a");
        let artifact = ResolvedArtifact {
            location: "https://example.com/shim.tar.gz".to_string(),
            sha256: None,
        };

        let job = build_job(&shim, &node, Operation::Install, Some(&artifact)).unwrap();
        let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        let init = &pod.init_containers.as_ref().unwrap()[0];
        assert!(!init
            .env
            .as_ref()
            .unwrap()
            .iter()
            .any(|e| e.name == "SHIM_SHA256"));
    }

    #[test]
    fn test_uninstall_job_is_unowned_and_has_no_init() {
        let shim = test_shim("spin-v2");
        let node = test_node("node-a");

        let job = build_job(&shim, &node, Operation::Uninstall, None).unwrap();

        // Uninstall jobs must survive shim deletion.
        assert!(job.metadata.owner_references.is_none());

        let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert!(pod.init_containers.is_none());
        assert_eq!(
            pod.containers[0].args.as_ref().unwrap()[0],
            "uninstall".to_string()
        );
    }

    #[test]
    fn test_runtime_options_env_json() {
        let mut shim = test_shim("spin-v2");
        shim.spec.containerd_runtime_options = Some(BTreeMap::from([(
            "SystemdCgroup".to_string(),
            "true".to_string(),
        )]));
        let node = test_node("node-a");

        let job = build_job(&shim, &node, Operation::Install, Some(&test_artifact())).unwrap();
        let pod = job.spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        let env = pod.containers[0].env.as_ref().unwrap();

        let options = env
            .iter()
            .find(|e| e.name == "RUNTIME_OPTIONS")
            .and_then(|e| e.value.clone())
            .unwrap();
        assert_eq!(options, r#"{"SystemdCgroup":"true"}"#);
    }
}
