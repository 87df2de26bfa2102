use predicates::prelude::*;
use std::io::Write;

fn base_yaml() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/base.yaml")
}

fn yaml_file(body: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut f = tempfile::NamedTempFile::new()?;
    f.write_all(body.as_bytes())?;
    Ok(f)
}

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    assert_cmd::Command::cargo_bin("bol")?
        .arg("config-hash")
        .arg(base_yaml())
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("\"url_env\":\"BOL_DATABASE_URL\""));
    Ok(())
}

#[test]
fn literal_database_url_is_refused() -> anyhow::Result<()> {
    let leaked = yaml_file("database:\n  url_env: \"postgres://u:p@db/ledger\"\n")?;
    assert_cmd::Command::cargo_bin("bol")?
        .arg("config-hash")
        .arg(base_yaml())
        .arg(leaked.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("postgres://u:p").not());
    Ok(())
}

#[test]
fn unused_keys_warn_unless_strict() -> anyhow::Result<()> {
    let extra = yaml_file("ledger:\n  max_conflict_retires: 9\n")?;

    assert_cmd::Command::cargo_bin("bol")?
        .arg("config-hash")
        .arg(base_yaml())
        .arg(extra.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("unused=/ledger/max_conflict_retires"));

    assert_cmd::Command::cargo_bin("bol")?
        .args(["--strict-config", "config-hash"])
        .arg(base_yaml())
        .arg(extra.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
    Ok(())
}

#[test]
fn db_status_requires_url_env_var() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert_cmd::Command::cargo_bin("bol")?
        .current_dir(dir.path())
        .env_remove("BOL_DATABASE_URL")
        .args(["db", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRET_MISSING"));
    Ok(())
}
