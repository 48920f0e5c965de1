// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `restart.rs`

#[cfg(test)]
mod tests {
    use crate::containerd::restart::find_service;

    const RKE2_UNITS: &str = "\
  rke2-server.service          loaded active running Rancher Kubernetes Engine v2 (server)
  systemd-journald.service     loaded active running Journal Service
";

    const K0S_UNITS: &str = "\
  k0sworker.service            loaded active running k0s - Zero Friction Kubernetes
  containerd.service           loaded active running containerd container runtime
";

    #[test]
    fn test_find_service_rke2_server() {
        let service = find_service(RKE2_UNITS.as_bytes(), "rke2-agent|rke2-server").unwrap();
        assert_eq!(service, "rke2-server");
    }

    #[test]
    fn test_find_service_k0s_worker() {
        let service = find_service(K0S_UNITS.as_bytes(), "k0sworker|k0scontroller").unwrap();
        assert_eq!(service, "k0sworker");
    }

    #[test]
    fn test_find_service_no_match() {
        let result = find_service(K0S_UNITS.as_bytes(), "rke2-agent|rke2-server");
        assert!(result.is_err());
    }
}
