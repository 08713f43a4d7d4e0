//! Integration tests for sharedclasses

mod library_tests {
    use sharedclasses::filter::PrefixFilter;
    use sharedclasses::freshness::{FreshnessMode, FsProbe};
    use sharedclasses::store::{DirStore, MemoryStore};
    use sharedclasses::{
        HelperFactory, HelperKind, HelperMode, Lookup, SharedClassError, SourceUrl,
    };
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn factory(mode: HelperMode) -> HelperFactory {
        HelperFactory::new(
            mode,
            Arc::new(MemoryStore::new()),
            Arc::new(FsProbe::new(FreshnessMode::Digest)),
        )
    }

    fn jar(dir: &Path, name: &str, contents: &[u8]) -> SourceUrl {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        SourceUrl::from_path(&path).unwrap()
    }

    #[test]
    fn classpath_entries_are_shared_between_loaders() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let b = jar(dir.path(), "b.jar", b"jar b");
        let factory = factory(HelperMode::Single);

        let first = factory.new_loader("first");
        let helper = factory
            .get_url_classpath_helper(&first, &[a.clone(), b.clone()])
            .unwrap();
        helper.store("com.x.Foo", b"FOO", &b).unwrap();

        let second = factory.new_loader("second");
        let other = factory
            .get_url_classpath_helper(&second, &[a, b])
            .unwrap();
        let hit = other.find_with_index("com.x.Foo").unwrap().unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.bytes, b"FOO");
    }

    #[test]
    fn url_and_classpath_helpers_see_each_other() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let b = jar(dir.path(), "b.jar", b"jar b");
        let factory = factory(HelperMode::Single);

        let url_loader = factory.new_loader("url");
        let url_helper = factory.get_url_helper(&url_loader).unwrap();
        url_helper.store(&b, "com.x.Bar", b"BAR").unwrap();

        let cp_loader = factory.new_loader("classpath");
        let cp_helper = factory
            .get_url_classpath_helper(&cp_loader, &[a.clone(), b.clone()])
            .unwrap();
        assert_eq!(cp_helper.find("com.x.Bar").unwrap(), Some(b"BAR".to_vec()));

        cp_helper.store("com.x.Baz", b"BAZ", &a).unwrap();
        assert_eq!(
            url_helper.find(&a, "com.x.Baz").unwrap(),
            Lookup::Hit(b"BAZ".to_vec())
        );
    }

    #[test]
    fn changed_source_is_never_served() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"version 1");
        let factory = factory(HelperMode::Single);
        let loader = factory.new_loader("app");
        let helper = factory.get_url_helper(&loader).unwrap();

        helper.store(&a, "com.x.Foo", b"OLD").unwrap();
        jar(dir.path(), "a.jar", b"version 2");

        assert_eq!(helper.find(&a, "com.x.Foo").unwrap(), Lookup::Stale);

        helper.store(&a, "com.x.Foo", b"NEW").unwrap();
        assert_eq!(
            helper.find(&a, "com.x.Foo").unwrap(),
            Lookup::Hit(b"NEW".to_vec())
        );
    }

    #[test]
    fn stale_entry_falls_through_to_later_classpath_entry() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let b = jar(dir.path(), "b.jar", b"jar b");
        let factory = factory(HelperMode::Single);
        let loader = factory.new_loader("app");
        let helper = factory
            .get_url_classpath_helper(&loader, &[a.clone(), b.clone()])
            .unwrap();

        helper.store("com.x.Foo", b"FROM A", &a).unwrap();
        helper.store("com.x.Foo", b"FROM B", &b).unwrap();
        assert_eq!(helper.find_with_index("com.x.Foo").unwrap().unwrap().index, 0);

        jar(dir.path(), "a.jar", b"jar a, rebuilt");
        let hit = helper.find_with_index("com.x.Foo").unwrap().unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.bytes, b"FROM B");
    }

    #[test]
    fn appended_classpath_keeps_earlier_entries() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let b = jar(dir.path(), "b.jar", b"jar b");
        let factory = factory(HelperMode::Single);
        let loader = factory.new_loader("app");
        let helper = factory.get_url_classpath_helper(&loader, &[a.clone()]).unwrap();

        helper.store("com.x.Foo", b"FOO", &a).unwrap();
        helper.update_classpath(vec![a.clone(), b.clone()]).unwrap();
        helper.store("com.x.Bar", b"BAR", &b).unwrap();

        assert_eq!(helper.find("com.x.Foo").unwrap(), Some(b"FOO".to_vec()));
        assert_eq!(helper.find("com.x.Bar").unwrap(), Some(b"BAR".to_vec()));
        assert_eq!(helper.classpath(), vec![a, b]);
    }

    #[test]
    fn filter_blocks_both_directions() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let factory = factory(HelperMode::Single);

        let open = factory.new_loader("open");
        factory
            .get_url_helper(&open)
            .unwrap()
            .store(&a, "com.blocked.Foo", b"FOO")
            .unwrap();

        let filtered = factory.new_loader("filtered");
        let helper = factory
            .get_url_helper_with_filter(&filtered, Arc::new(PrefixFilter::new().deny("com.blocked.")))
            .unwrap();

        let err = helper.find(&a, "com.blocked.Foo").unwrap_err();
        assert!(err.is_cache_bypass());
        assert!(matches!(err, SharedClassError::DeniedByFilter { .. }));
        assert!(helper.store(&a, "com.blocked.Bar", b"BAR").is_err());
        assert!(helper.store(&a, "com.open.Bar", b"BAR").is_ok());
    }

    #[test]
    fn token_helper_then_url_helper_conflicts() {
        let factory = factory(HelperMode::Single);
        let loader = factory.new_loader("app");

        let token = factory.get_token_helper(&loader).unwrap();
        let err = factory.get_url_helper(&loader).unwrap_err();
        assert!(matches!(
            err,
            SharedClassError::ConflictingHelperKind {
                existing: HelperKind::Token,
                requested: HelperKind::Url,
                ..
            }
        ));

        let found = factory.find_helper_for_loader(&loader).unwrap().unwrap();
        assert!(Arc::ptr_eq(found.as_token().unwrap(), &token));
    }

    #[test]
    fn finalized_loader_loses_its_helpers() {
        let factory = factory(HelperMode::PerKind);
        let loader = factory.new_loader("app");
        let token = factory.get_token_helper(&loader).unwrap();
        factory.get_url_helper(&loader).unwrap();
        assert_eq!(factory.registry().loader_count(), 1);

        token.store("com.x.Foo", "t1", b"FOO").unwrap();
        loader.finalize();

        assert_eq!(factory.registry().loader_count(), 0);
        // the helper a caller still holds keeps working
        assert_eq!(token.find("com.x.Foo", "t1").unwrap(), Some(b"FOO".to_vec()));
    }

    #[test]
    fn directory_store_persists_across_factories() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", b"jar a");
        let cache = dir.path().join("cache");

        let open = |cache: &Path| {
            HelperFactory::new(
                HelperMode::Single,
                Arc::new(DirStore::open(cache).unwrap()),
                Arc::new(FsProbe::default()),
            )
        };

        let first = open(&cache);
        let loader = first.new_loader("writer");
        first
            .get_url_helper(&loader)
            .unwrap()
            .store(&a, "com.x.Foo", b"FOO")
            .unwrap();

        let second = open(&cache);
        let loader = second.new_loader("reader");
        let helper = second.get_url_classpath_helper(&loader, &[a]).unwrap();
        assert_eq!(helper.find("com.x.Foo").unwrap(), Some(b"FOO".to_vec()));
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn sharedclasses(home: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("sharedclasses");
        cmd.env("SHAREDCLASSES_CONFIG", home.join("config.toml"))
            .env("SHAREDCLASSES_CACHE_DIR", home.join("cache"));
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        sharedclasses(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("class cache"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        sharedclasses(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("sharedclasses"));
    }

    #[test]
    fn config_path_uses_env() {
        let home = TempDir::new().unwrap();
        sharedclasses(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_then_show() {
        let home = TempDir::new().unwrap();
        sharedclasses(home.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(home.path().join("config.toml").exists());

        sharedclasses(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn store_and_find_by_url() {
        let home = TempDir::new().unwrap();
        let jar = home.path().join("lib.jar");
        let class = home.path().join("Foo.class");
        let out = home.path().join("out.class");
        fs::write(&jar, b"archive").unwrap();
        fs::write(&class, b"\xca\xfe\xba\xbe").unwrap();

        sharedclasses(home.path())
            .args(["store", "com.x.Foo", "--from"])
            .arg(&jar)
            .arg("--input")
            .arg(&class)
            .assert()
            .success()
            .stdout(predicate::str::contains("stored"));

        sharedclasses(home.path())
            .args(["find", "com.x.Foo", "--url"])
            .arg(&jar)
            .arg("--out")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("hit"));
        assert_eq!(fs::read(&out).unwrap(), b"\xca\xfe\xba\xbe");
    }

    #[test]
    fn find_through_classpath_after_url_store() {
        let home = TempDir::new().unwrap();
        let first = home.path().join("a.jar");
        let second = home.path().join("b.jar");
        let class = home.path().join("Foo.class");
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();
        fs::write(&class, b"FOO").unwrap();

        sharedclasses(home.path())
            .args(["store", "com.x.Foo", "--from"])
            .arg(&second)
            .arg("--input")
            .arg(&class)
            .assert()
            .success();

        let classpath = std::env::join_paths([&first, &second]).unwrap();
        sharedclasses(home.path())
            .args(["find", "com.x.Foo", "--classpath"])
            .arg(&classpath)
            .assert()
            .success()
            .stdout(predicate::str::contains("index 1"));
    }

    #[test]
    fn modified_jar_reports_stale() {
        let home = TempDir::new().unwrap();
        let jar = home.path().join("lib.jar");
        let class = home.path().join("Foo.class");
        fs::write(&jar, b"archive").unwrap();
        fs::write(&class, b"FOO").unwrap();

        sharedclasses(home.path())
            .args(["store", "com.x.Foo", "--from"])
            .arg(&jar)
            .arg("--input")
            .arg(&class)
            .assert()
            .success();

        fs::write(&jar, b"rebuilt archive").unwrap();
        sharedclasses(home.path())
            .args(["find", "com.x.Foo", "--url"])
            .arg(&jar)
            .assert()
            .success()
            .stdout(predicate::str::contains("stale"));
    }

    #[test]
    fn store_reads_class_file_from_directory_source() {
        let home = TempDir::new().unwrap();
        let classes = home.path().join("classes");
        fs::create_dir_all(classes.join("com/x")).unwrap();
        fs::write(classes.join("com/x/Foo.class"), b"FOO").unwrap();

        sharedclasses(home.path())
            .args(["store", "com.x.Foo", "--from"])
            .arg(&classes)
            .assert()
            .success()
            .stdout(predicate::str::contains("3 bytes"));

        sharedclasses(home.path())
            .args(["find", "com.x.Foo", "--url"])
            .arg(&classes)
            .assert()
            .success()
            .stdout(predicate::str::contains("hit"));
    }

    #[test]
    fn token_store_and_find() {
        let home = TempDir::new().unwrap();
        let class = home.path().join("Gen.class");
        fs::write(&class, b"GEN").unwrap();

        sharedclasses(home.path())
            .args(["token-store", "com.x.Gen", "--token", "build-42", "--input"])
            .arg(&class)
            .assert()
            .success();

        sharedclasses(home.path())
            .args(["token-find", "com.x.Gen", "--token", "build-42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hit"));

        sharedclasses(home.path())
            .args(["token-find", "com.x.Other", "--token", "build-42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("miss"));
    }

    #[test]
    fn store_outside_classpath_fails_with_hint() {
        let home = TempDir::new().unwrap();
        let first = home.path().join("a.jar");
        let other = home.path().join("other.jar");
        let class = home.path().join("Foo.class");
        fs::write(&first, b"a").unwrap();
        fs::write(&other, b"o").unwrap();
        fs::write(&class, b"FOO").unwrap();

        sharedclasses(home.path())
            .args(["store", "com.x.Foo", "--from"])
            .arg(&other)
            .arg("--classpath")
            .arg(&first)
            .arg("--input")
            .arg(&class)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn configured_filter_denies_store() {
        let home = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[filter]\ndeny_store = [\"com.secret.\"]\n",
        )
        .unwrap();
        let class = home.path().join("Key.class");
        fs::write(&class, b"KEY").unwrap();

        sharedclasses(home.path())
            .args(["token-store", "com.secret.Key", "--token", "t", "--input"])
            .arg(&class)
            .assert()
            .failure()
            .stderr(predicate::str::contains("com.secret.Key"));
    }
}
