// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `install.rs`

#[cfg(test)]
mod tests {
    use crate::containerd::restart::Restarter;
    use crate::hostfs::HostFs;
    use crate::installer::cli::Config;
    use crate::installer::install::run_install;
    use crate::preset::{Distro, Settings};
    use anyhow::Result;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Records restart calls instead of touching the host.
    struct RecordingRestarter(Arc<AtomicUsize>);

    impl Restarter for RecordingRestarter {
        fn restart(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        _assets: TempDir,
        _host_root: TempDir,
        host: HostFs,
        config: Config,
        settings: Settings,
        restarts: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn restarter(&self) -> Box<dyn Restarter> {
            Box::new(RecordingRestarter(self.restarts.clone()))
        }

        fn config_bytes(&self) -> String {
            std::fs::read_to_string(self.host.resolve(&self.settings.config_path)).unwrap()
        }
    }

    fn fixture(shims: &[(&str, &[u8])]) -> Fixture {
        let assets = TempDir::new().unwrap();
        for (name, bytes) in shims {
            std::fs::write(assets.path().join(name), bytes).unwrap();
        }

        let host_root = TempDir::new().unwrap();
        let host = HostFs::new(host_root.path());
        std::fs::create_dir_all(host_root.path().join("etc/containerd")).unwrap();
        std::fs::write(
            host.resolve("/etc/containerd/config.toml"),
            "Hello World\n",
        )
        .unwrap();

        let config = Config {
            runtime: "containerd".to_string(),
            runtime_config: None,
            rcm_path: PathBuf::from("/opt/rcm"),
            host_root: host_root.path().to_path_buf(),
            asset_path: assets.path().to_path_buf(),
        };

        Fixture {
            _assets: assets,
            _host_root: host_root,
            host,
            config,
            settings: Settings::for_distro(Distro::Default),
            restarts: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn test_fresh_install_registers_and_restarts() {
        let f = fixture(&[("containerd-shim-foo-v1", b"foo shim bytes")]);

        run_install(
            &f.config,
            &f.host,
            &f.settings,
            f.restarter(),
            BTreeMap::new(),
        )
        .unwrap();

        assert!(f.host.exists("/opt/rcm/bin/containerd-shim-foo-v1"));
        assert!(f
            .config_bytes()
            .contains("[plugins.\"io.containerd.grpc.v1.cri\".containerd.runtimes.foo-v1]"));
        assert!(f.host.exists("/opt/rcm/state.json"));
        assert_eq!(f.restarts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reinstall_same_bytes_skips_restart() {
        let f = fixture(&[("containerd-shim-foo-v1", b"foo shim bytes")]);

        run_install(
            &f.config,
            &f.host,
            &f.settings,
            f.restarter(),
            BTreeMap::new(),
        )
        .unwrap();
        let config_after_first = f.config_bytes();

        run_install(
            &f.config,
            &f.host,
            &f.settings,
            f.restarter(),
            BTreeMap::new(),
        )
        .unwrap();

        // No config growth, no second restart.
        assert_eq!(f.config_bytes(), config_after_first);
        assert_eq!(f.restarts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_install_multiple_shims() {
        let f = fixture(&[
            ("containerd-shim-foo-v1", b"foo bytes".as_slice()),
            ("containerd-shim-bar-v2", b"bar bytes".as_slice()),
        ]);

        run_install(
            &f.config,
            &f.host,
            &f.settings,
            f.restarter(),
            BTreeMap::new(),
        )
        .unwrap();

        let config = f.config_bytes();
        assert!(config.contains("runtimes.foo-v1]"));
        assert!(config.contains("runtimes.bar-v2]"));
        assert_eq!(f.restarts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_file_asset_path() {
        let f = fixture(&[("containerd-shim-foo-v1", b"foo bytes")]);
        let mut config = f.config.clone();
        config.asset_path = config.asset_path.join("containerd-shim-foo-v1");

        run_install(&config, &f.host, &f.settings, f.restarter(), BTreeMap::new()).unwrap();

        assert!(f.host.exists("/opt/rcm/bin/containerd-shim-foo-v1"));
    }

    #[test]
    fn test_missing_runtime_config_fails() {
        let f = fixture(&[("containerd-shim-foo-v1", b"foo bytes")]);
        std::fs::remove_file(f.host.resolve("/etc/containerd/config.toml")).unwrap();

        let result = run_install(
            &f.config,
            &f.host,
            &f.settings,
            f.restarter(),
            BTreeMap::new(),
        );
        assert!(result.is_err());
        assert_eq!(f.restarts.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_asset_path_fails() {
        let f = fixture(&[]);
        let mut config = f.config.clone();
        config.asset_path = PathBuf::from("/does/not/exist");

        let result = run_install(&config, &f.host, &f.settings, f.restarter(), BTreeMap::new());
        assert!(result.is_err());
    }
}
