// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `artifacts.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        AnonHttpSpec, FetchStrategy, PlatformArtifact, RuntimeClassSpec, Shim, ShimSpec,
    };
    use crate::reconcilers::shim::artifacts::resolve_artifact;
    use k8s_openapi::api::core::v1::{Node, NodeStatus, NodeSystemInfo};
    use kube::api::ObjectMeta;

    fn test_node(os: &str, arch: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("node-a".to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                node_info: Some(NodeSystemInfo {
                    operating_system: os.to_string(),
                    architecture: arch.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn test_shim(fetch_strategy: FetchStrategy) -> Shim {
        Shim {
            metadata: ObjectMeta {
                name: Some("spin-v2".to_string()),
                ..Default::default()
            },
            spec: ShimSpec {
                node_selector: None,
                fetch_strategy,
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

    fn platforms_shim() -> Shim {
        test_shim(FetchStrategy {
            anon_http: None,
            platforms: Some(vec![
                PlatformArtifact {
                    os: "linux".to_string(),
                    arch: "amd64".to_string(),
                    location: "https://example.com/x86_64.tar.gz".to_string(),
                    sha256: None,
                },
                PlatformArtifact {
                    os: "linux".to_string(),
                    arch: "arm64".to_string(),
                    location: "https://example.com/aarch64.tar.gz".to_string(),
                    sha256: Some("deadbeef".to_string()),
                },
            ]),
        })
    }

    #[test]
    fn test_resolve_matching_platform_with_digest() {
        let artifact = resolve_artifact(&platforms_shim(), &test_node("linux", "arm64")).unwrap();
        assert_eq!(artifact.location, "https://example.com/aarch64.tar.gz");
        assert_eq!(artifact.sha256.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_resolve_canonical_arch() {
        let artifact = resolve_artifact(&platforms_shim(), &test_node("linux", "amd64")).unwrap();
        assert_eq!(artifact.location, "https://example.com/x86_64.tar.gz");
        assert_eq!(artifact.sha256, None);
    }

    #[test]
    fn test_resolve_uname_arch_spelling_in_artifact() {
        // Artifact declares x86_64; the node reports amd64. Normalization
        // bridges the spellings.
        let shim = test_shim(FetchStrategy {
            anon_http: None,
            platforms: Some(vec![PlatformArtifact {
                os: "linux".to_string(),
                arch: "x86_64".to_string(),
                location: "https://example.com/x86_64.tar.gz".to_string(),
                sha256: None,
            }]),
        });

        let artifact = resolve_artifact(&shim, &test_node("linux", "amd64")).unwrap();
        assert_eq!(artifact.location, "https://example.com/x86_64.tar.gz");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let shim = test_shim(FetchStrategy {
            anon_http: None,
            platforms: Some(vec![PlatformArtifact {
                os: "Linux".to_string(),
                arch: "AMD64".to_string(),
                location: "https://example.com/x86_64.tar.gz".to_string(),
                sha256: None,
            }]),
        });

        assert!(resolve_artifact(&shim, &test_node("linux", "amd64")).is_ok());
    }

    #[test]
    fn test_resolve_unmatched_platform_fails_without_fallback() {
        // A legacy URL is present, but a non-empty platform list must not
        // fall back to it.
        let mut shim = platforms_shim();
        shim.spec.fetch_strategy.anon_http = Some(AnonHttpSpec {
            location: "https://example.com/legacy.tar.gz".to_string(),
        });

        let result = resolve_artifact(&shim, &test_node("linux", "ppc64le"));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_legacy_url() {
        let shim = test_shim(FetchStrategy {
            anon_http: Some(AnonHttpSpec {
                location: "https://example.com/legacy.tar.gz".to_string(),
            }),
            platforms: None,
        });

        let artifact = resolve_artifact(&shim, &test_node("linux", "amd64")).unwrap();
        assert_eq!(artifact.location, "https://example.com/legacy.tar.gz");
        assert_eq!(artifact.sha256, None);
    }

    #[test]
    fn test_resolve_no_source_fails() {
        let shim = test_shim(FetchStrategy::default());
        assert!(resolve_artifact(&shim, &test_node("linux", "amd64")).is_err());
    }

    #[test]
    fn test_resolve_empty_platform_list_uses_legacy() {
        let shim = test_shim(FetchStrategy {
            anon_http: Some(AnonHttpSpec {
                location: "https://example.com/legacy.tar.gz".to_string(),
            }),
            platforms: Some(Vec::new()),
        });

        let artifact = resolve_artifact(&shim, &test_node("linux", "amd64")).unwrap();
        assert_eq!(artifact.location, "https://example.com/legacy.tar.gz");
    }
}
