use bol_config::load_layered_yaml_from_strings;

#[test]
fn hash_ignores_key_order_and_formatting() {
    let a = r#"
database:
  url_env: BOL_DATABASE_URL
  max_connections: 10
ledger:
  max_conflict_retries: 3
"#;
    let b = r#"
ledger: { max_conflict_retries: 3 }
database:
    max_connections: 10
    url_env: "BOL_DATABASE_URL"
"#;
    let ha = load_layered_yaml_from_strings(&[a]).unwrap().config_hash;
    let hb = load_layered_yaml_from_strings(&[b]).unwrap().config_hash;
    assert_eq!(ha, hb);
    assert_eq!(ha.len(), 64);
}

#[test]
fn override_changes_hash() {
    let base = "ledger:\n  max_conflict_retries: 3\n";
    let over = "ledger:\n  max_conflict_retries: 5\n";
    let h1 = load_layered_yaml_from_strings(&[base]).unwrap();
    let h2 = load_layered_yaml_from_strings(&[base, over]).unwrap();
    assert_ne!(h1.config_hash, h2.config_hash);
    assert_eq!(
        h2.canonical_json,
        r#"{"ledger":{"max_conflict_retries":5}}"#
    );
}
