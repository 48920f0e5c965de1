// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the containerd config editor.

#[cfg(test)]
mod tests {
    use crate::containerd::restart::Restarter;
    use crate::containerd::Config;
    use crate::hostfs::HostFs;
    use anyhow::Result;
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG_PATH: &str = "/etc/containerd/config.toml";

    struct NopRestarter;

    impl Restarter for NopRestarter {
        fn restart(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fixture(initial: &str) -> (TempDir, HostFs) {
        let tmp = TempDir::new().unwrap();
        let host = HostFs::new(tmp.path());
        std::fs::create_dir_all(tmp.path().join("etc/containerd")).unwrap();
        std::fs::write(host.resolve(CONFIG_PATH), initial).unwrap();
        (tmp, host)
    }

    fn editor(host: HostFs, options: BTreeMap<String, String>) -> Config {
        Config::new(host, CONFIG_PATH, Box::new(NopRestarter), options)
    }

    fn read_config(host: &HostFs) -> String {
        std::fs::read_to_string(host.resolve(CONFIG_PATH)).unwrap()
    }

    #[test]
    fn test_add_runtime_appends_fragment() {
        let (_tmp, host) = fixture("Hello World\n");
        let config = editor(host.clone(), BTreeMap::new());

        config
            .add_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"))
            .unwrap();

        let expected = "Hello World\n\n# RCM runtime config for foo-v1\n[plugins.\"io.containerd.grpc.v1.cri\".containerd.runtimes.foo-v1]\nruntime_type = \"/opt/rcm/bin/containerd-shim-foo-v1\"\n";
        assert_eq!(read_config(&host), expected);
    }

    #[test]
    fn test_add_runtime_is_idempotent() {
        let (_tmp, host) = fixture("Hello World\n");
        let config = editor(host.clone(), BTreeMap::new());
        let shim = Path::new("/opt/rcm/bin/containerd-shim-foo-v1");

        config.add_runtime(shim).unwrap();
        let once = read_config(&host);

        config.add_runtime(shim).unwrap();
        assert_eq!(read_config(&host), once);
    }

    #[test]
    fn test_add_runtime_missing_config_fails() {
        let tmp = TempDir::new().unwrap();
        let host = HostFs::new(tmp.path());
        let config = editor(host, BTreeMap::new());

        let result = config.add_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"));
        assert!(result.is_err());
    }

    #[test]
    fn test_add_runtime_version_3_domain() {
        let (_tmp, host) = fixture("version = 3\n");
        let config = editor(host.clone(), BTreeMap::new());

        config
            .add_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"))
            .unwrap();

        let data = read_config(&host);
        assert!(data.contains("io.containerd.cri.v1.runtime"));
        assert!(!data.contains("io.containerd.grpc.v1.cri"));
    }

    #[test]
    fn test_add_runtime_with_options() {
        let (_tmp, host) = fixture("Hello World\n");
        let mut options = BTreeMap::new();
        options.insert("SystemdCgroup".to_string(), "true".to_string());
        options.insert("BinaryName".to_string(), "\"shim\"".to_string());
        let config = editor(host.clone(), options);

        config
            .add_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"))
            .unwrap();

        let data = read_config(&host);
        assert!(data.contains(
            "[plugins.\"io.containerd.grpc.v1.cri\".containerd.runtimes.foo-v1.options]"
        ));
        // BTreeMap order, values verbatim.
        assert!(data.contains("\nBinaryName = \"shim\"\nSystemdCgroup = true"));
    }

    #[test]
    fn test_remove_runtime_restores_original_bytes() {
        let (_tmp, host) = fixture("Hello World\n");
        let config = editor(host.clone(), BTreeMap::new());
        let shim = Path::new("/opt/rcm/bin/containerd-shim-foo-v1");

        config.add_runtime(shim).unwrap();
        let changed = config.remove_runtime(shim).unwrap();

        assert!(changed);
        assert_eq!(read_config(&host), "Hello World\n");
    }

    #[test]
    fn test_remove_runtime_keeps_surrounding_content() {
        let (_tmp, host) = fixture("Hello World\n");
        let config = editor(host.clone(), BTreeMap::new());
        let shim = Path::new("/opt/rcm/bin/containerd-shim-foo-v1");

        config.add_runtime(shim).unwrap();

        // Content appended after the registration survives its removal.
        let real = host.resolve(CONFIG_PATH);
        let mut data = std::fs::read_to_string(&real).unwrap();
        data.push_str("Foobar\n");
        std::fs::write(&real, data).unwrap();

        let changed = config.remove_runtime(shim).unwrap();
        assert!(changed);
        assert_eq!(read_config(&host), "Hello World\nFoobar\n");
    }

    #[test]
    fn test_remove_runtime_absent_is_no_change() {
        let (_tmp, host) = fixture("Hello World\n");
        let config = editor(host.clone(), BTreeMap::new());

        let changed = config
            .remove_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"))
            .unwrap();

        assert!(!changed);
        assert_eq!(read_config(&host), "Hello World\n");
    }

    #[test]
    fn test_remove_runtime_with_options_round_trip() {
        let (_tmp, host) = fixture("Hello World\n");
        let mut options = BTreeMap::new();
        options.insert("SystemdCgroup".to_string(), "true".to_string());
        let config = editor(host.clone(), options);
        let shim = Path::new("/opt/rcm/bin/containerd-shim-foo-v1");

        config.add_runtime(shim).unwrap();
        let changed = config.remove_runtime(shim).unwrap();

        assert!(changed);
        assert_eq!(read_config(&host), "Hello World\n");
    }

    #[test]
    fn test_remove_runtime_missing_config_fails() {
        let tmp = TempDir::new().unwrap();
        let host = HostFs::new(tmp.path());
        let config = editor(host, BTreeMap::new());

        let result = config.remove_runtime(Path::new("/opt/rcm/bin/containerd-shim-foo-v1"));
        assert!(result.is_err());
    }
}
