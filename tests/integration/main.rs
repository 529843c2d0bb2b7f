//! Integration tests for Groundwork

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn groundwork() -> Command {
        let mut cmd = cargo_bin_cmd!("groundwork");
        // Keep the source cache inside the test sandbox.
        cmd.env("GROUNDWORK_CACHE_DIR", std::env::temp_dir().join("groundwork-it-cache"));
        cmd
    }

    /// Project dir with one local terraform component.
    fn project_with_component(component: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let component_dir = dir.path().join("components/terraform").join(component);
        fs::create_dir_all(&component_dir).unwrap();
        fs::write(component_dir.join("main.tf"), "resource {}\n").unwrap();
        dir
    }

    #[test]
    fn help_displays() {
        groundwork()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Provisions isolated working directories"));
    }

    #[test]
    fn version_displays() {
        groundwork()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("groundwork"));
    }

    #[test]
    fn provision_local_component() {
        let project = project_with_component("vpc");

        groundwork()
            .args(["provision", "-s", "dev", "-n", "vpc"])
            .args(["--base-path", project.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("dev-vpc"));

        let workdir = project.path().join(".workdir/terraform/dev-vpc");
        assert!(workdir.join("main.tf").exists());
        assert!(workdir.join(".groundwork/metadata.json").exists());
    }

    #[test]
    fn provision_is_idempotent() {
        let project = project_with_component("vpc");
        let base = project.path().to_str().unwrap().to_string();

        for _ in 0..2 {
            groundwork()
                .args(["provision", "-s", "dev", "-n", "vpc", "--base-path", &base])
                .assert()
                .success();
        }
        assert!(project.path().join(".workdir/terraform/dev-vpc/main.tf").exists());
    }

    #[test]
    fn provision_missing_component_fails() {
        let project = TempDir::new().unwrap();

        groundwork()
            .args(["provision", "-s", "dev", "-n", "missing"])
            .args(["--base-path", project.path().to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("missing"));
    }

    #[test]
    fn provision_from_spec_file() {
        let project = project_with_component("vpc");
        let spec = project.path().join("component.json");
        fs::write(
            &spec,
            r#"{
                "component": "vpc",
                "stack": "dev",
                "provision": {"workdir": {"enabled": true}}
            }"#,
        )
        .unwrap();

        groundwork()
            .args(["provision", "-f", spec.to_str().unwrap()])
            .args(["--base-path", project.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("dev-vpc"));
    }

    #[test]
    fn provision_disabled_spec_is_noop() {
        let project = project_with_component("vpc");
        let spec = project.path().join("component.json");
        fs::write(&spec, r#"{"component": "vpc", "stack": "dev"}"#).unwrap();

        groundwork()
            .args(["provision", "-f", spec.to_str().unwrap()])
            .args(["--base-path", project.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("not enabled"));
        assert!(!project.path().join(".workdir").exists());
    }

    #[test]
    fn clean_component() {
        let project = project_with_component("vpc");
        let base = project.path().to_str().unwrap().to_string();

        groundwork()
            .args(["provision", "-s", "dev", "-n", "vpc", "--base-path", &base])
            .assert()
            .success();
        groundwork()
            .args(["clean", "-n", "vpc", "-s", "dev", "--base-path", &base])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleanup complete"));

        assert!(!project.path().join(".workdir/terraform/dev-vpc").exists());
    }

    #[test]
    fn clean_all() {
        let project = project_with_component("vpc");
        let base = project.path().to_str().unwrap().to_string();

        groundwork()
            .args(["provision", "-s", "dev", "-n", "vpc", "--base-path", &base])
            .assert()
            .success();
        groundwork()
            .args(["clean", "--all", "--base-path", &base])
            .assert()
            .success();

        assert!(!project.path().join(".workdir").exists());
    }

    #[test]
    fn clean_expired_dry_run_reports_and_preserves() {
        let project = project_with_component("vpc");
        let base = project.path().to_str().unwrap().to_string();

        groundwork()
            .args(["provision", "-s", "dev", "-n", "vpc", "--base-path", &base])
            .assert()
            .success();

        // Freshly provisioned, so nothing is idle past 7 days.
        groundwork()
            .args(["clean", "--expired", "--ttl", "7d", "--dry-run", "--base-path", &base])
            .assert()
            .success()
            .stdout(predicate::str::contains("No expired workdirs"));
        assert!(project.path().join(".workdir/terraform/dev-vpc").exists());
    }

    #[test]
    fn clean_expired_rejects_bad_ttl() {
        let project = TempDir::new().unwrap();

        groundwork()
            .args(["clean", "--expired", "--ttl", "fortnight"])
            .args(["--base-path", project.path().to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid TTL"));
    }

    #[test]
    fn cache_info_runs() {
        groundwork()
            .args(["cache", "info"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Location:"));
    }
}
