use bol_config::load_layered_yaml_from_strings;

#[test]
fn inline_database_url_is_rejected() {
    let yaml = "database:\n  url_env: \"postgres://ledger:hunter2@db:5432/ledger\"\n";
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"));
    assert!(err.contains("/database/url_env"));
    assert!(!err.contains("hunter2"), "secret leaked into error: {err}");
}

#[test]
fn env_var_name_is_accepted() {
    let yaml = "database:\n  url_env: BOL_DATABASE_URL\n";
    assert!(load_layered_yaml_from_strings(&[yaml]).is_ok());
}

#[test]
fn secret_in_override_layer_is_caught() {
    let base = "audit:\n  hash_chain: true\n";
    let over = "extra:\n  token: \"ghp_abcdefghijklmnop\"\n";
    assert!(load_layered_yaml_from_strings(&[base, over]).is_err());
}
