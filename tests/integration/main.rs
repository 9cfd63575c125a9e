//! Integration tests for assetcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn assetcache() -> Command {
        let mut cmd = cargo_bin_cmd!("assetcache");
        cmd.env_remove("ASSETCACHE_CONFIG");
        cmd
    }

    /// A project with compiled sources and a config keeping caches inside it
    fn project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("web/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("scripts.js"), "console.log('app');\n").unwrap();
        fs::write(src.join("styles.css"), "body { margin: 0; }\n").unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/offline.html"), "<h1>Offline</h1>\n").unwrap();

        let config = dir.path().join("assetcache.toml");
        fs::write(
            &config,
            "[build]\nnaming = \"hashed\"\n\n[cache]\nname = \"app-cache\"\n\n[worker]\nstorage_dir = \"caches\"\n\n[[static_copy]]\nfrom = \"public/offline.html\"\nto = \"/\"\n",
        )
        .unwrap();
        (dir, config)
    }

    fn build(config: &Path) {
        assetcache()
            .arg("-c")
            .arg(config)
            .arg("build")
            .assert()
            .success();
    }

    #[test]
    fn help_displays() {
        assetcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("offline cache worker"));
    }

    #[test]
    fn version_displays() {
        assetcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("assetcache"));
    }

    #[test]
    fn config_path() {
        assetcache()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("assetcache.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        assetcache()
            .arg("-c")
            .arg(dir.path().join("assetcache.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("app-cache"));
    }

    #[test]
    fn config_init_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assetcache.toml");
        assetcache()
            .arg("-c")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(fs::read_to_string(&path).unwrap().contains("[worker]"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assetcache.toml");
        fs::write(&path, "[build\n").unwrap();
        assetcache()
            .arg("-c")
            .arg(&path)
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn build_writes_manifests() {
        let (dir, config) = project();
        build(&config);

        let out = dir.path().join("web/dist");
        assert!(out.join("precache-manifest.json").exists());
        assert!(out.join("asset-manifest.json").exists());
        assert!(out.join("manifest.webmanifest").exists());

        let precache = fs::read_to_string(out.join("precache-manifest.json")).unwrap();
        assert!(precache.contains("\"cache_name\": \"app-cache\""));
        assert!(precache.contains(".js"));
    }

    #[test]
    fn build_missing_sources_fails() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("assetcache.toml");
        fs::write(&config, "").unwrap();
        assetcache()
            .arg("-c")
            .arg(&config)
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Source directory not found"));
    }

    #[test]
    fn build_into_source_tree_is_refused() {
        let (dir, config) = project();
        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["build", "--out", "web"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("would overwrite"));

        assert!(dir.path().join("web/src/scripts.js").exists());
    }

    #[test]
    fn install_without_build_fails() {
        let (_dir, config) = project();
        assetcache()
            .arg("-c")
            .arg(&config)
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Precache manifest not found"));
    }

    #[test]
    fn install_then_fetch_from_cache() {
        let (dir, config) = project();
        build(&config);
        let out = dir.path().join("web/dist");

        assetcache()
            .arg("-c")
            .arg(&config)
            .arg("install")
            .arg("--from-dir")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("Worker activated"));

        assert!(dir.path().join("caches").is_dir());

        // Cached entries no longer need the source directory
        let offline = dir.path().join("gone");
        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/offline.html"])
            .arg("--from-dir")
            .arg(&offline)
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));

        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("app-cache-"));
    }

    #[test]
    fn fetch_without_worker_goes_to_network() {
        let (dir, config) = project();
        build(&config);
        let out = dir.path().join("web/dist");

        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "--no-worker", "/offline.html", "--body"])
            .arg("--from-dir")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("<h1>Offline</h1>"));
    }

    #[test]
    fn fetch_missing_file_passes_status_through() {
        let (dir, config) = project();
        build(&config);
        let out = dir.path().join("web/dist");

        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "--no-worker", "/missing.js"])
            .arg("--from-dir")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("404"));
    }

    #[test]
    fn cache_clear_with_yes() {
        let (dir, config) = project();
        build(&config);
        let out = dir.path().join("web/dist");

        assetcache()
            .arg("-c")
            .arg(&config)
            .arg("install")
            .arg("--from-dir")
            .arg(&out)
            .assert()
            .success();

        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();

        assetcache()
            .arg("-c")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache stores found"));
    }

    #[test]
    fn routes_resolve_backend_path() {
        let dir = TempDir::new().unwrap();
        assetcache()
            .arg("-c")
            .arg(dir.path().join("assetcache.toml"))
            .args(["routes", "/r/login"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://localhost:8080/r/login"));
    }

    #[test]
    fn tags_dev_points_at_dev_server() {
        let dir = TempDir::new().unwrap();
        assetcache()
            .arg("-c")
            .arg(dir.path().join("assetcache.toml"))
            .args(["tags", "--mode", "dev"])
            .assert()
            .success()
            .stdout(predicate::str::contains("@vite/client"));
    }

    #[test]
    fn tags_prod_uses_fingerprinted_names() {
        let (dir, config) = project();
        build(&config);

        let output = assetcache()
            .arg("-c")
            .arg(&config)
            .args(["tags", "--register"])
            .assert()
            .success()
            .stdout(predicate::str::contains("src=\"/scripts-"))
            .stdout(predicate::str::contains("/sw.js"))
            .get_output()
            .stdout
            .clone();

        // Every asset the layout loads is one the worker precaches
        let precache =
            fs::read_to_string(dir.path().join("web/dist/precache-manifest.json")).unwrap();
        let stdout = String::from_utf8(output).unwrap();
        for line in stdout.lines().filter(|l| l.contains("src=\"/") || l.contains("href=")) {
            let url = line.split('"').find(|part| part.starts_with('/')).unwrap();
            assert!(precache.contains(&format!("\"{}\"", url)), "{} not precached", url);
        }
    }
}
