// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::path::Path;

use mep_keyring::models::{KdfParams, SecretKind};
use mep_keyring::{BootstrapContext, BootstrapState, ConfigProperties, CredentialBootstrapper};

fn bootstrapper(dir: &Path) -> CredentialBootstrapper {
    CredentialBootstrapper::new(dir).with_kdf_params(KdfParams::new(1024, 1, 1))
}

fn properties(key_component: &str) -> ConfigProperties {
    let text = format!(
        "KEY_COMPONENT = {key_component}\n\
         APP_INST_ID = 5abe4782-2c70-4e47-9a4e-0ee3a1a0fd1f\n\
         JWT_PRIVATE_KEY = pw123\n\
         ACCESS_KEY = QVUJMSUMgS0VZLS0tLS0\n\
         SECRET_KEY = DXPb4sqElKhcHe07Kw5uorayETwId1JOjjOIRomRs5wyszoCR5R7AtVa28KT3lSc\n\
         TRUSTED_LIST = 10.0.0.0/8\n"
    );
    ConfigProperties::from_reader(text.as_bytes()).unwrap()
}

#[test]
fn test_first_run_creates_store_and_exposes_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let bootstrapper = bootstrapper(dir.path());
    let mut ctx = BootstrapContext::new();
    let mut props = properties("Str0ng!Pass");

    let credentials = bootstrapper.run(&mut ctx, &mut props).unwrap();

    assert_eq!(ctx.state(), BootstrapState::Bootstrapped);
    assert!(bootstrapper.root_keys().path().exists());
    for kind in SecretKind::ALL {
        assert!(bootstrapper.envelopes().path(kind).exists(), "{kind} envelope");
    }
    assert_eq!(credentials.jwt_password().as_bytes(), b"pw123");
    assert_eq!(credentials.access_key().as_bytes(), b"QVUJMSUMgS0VZLS0tLS0");

    // every property, including ones the bootstrap does not consume
    assert!(props.is_cleared());
    assert_eq!(ctx.residual_secret_bytes(), 0);
}

#[test]
fn test_second_run_reproduces_secrets_without_touching_root_record() {
    let dir = tempfile::tempdir().unwrap();
    let first = bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap();
    let root_record = std::fs::read(dir.path().join("root_key.json")).unwrap();
    let envelope = std::fs::read(dir.path().join("jwt_password.json")).unwrap();

    let mut ctx = BootstrapContext::new();
    let second = bootstrapper(dir.path())
        .run(&mut ctx, &mut properties("Str0ng!Pass"))
        .unwrap();

    assert_eq!(ctx.state(), BootstrapState::Bootstrapped);
    assert_eq!(second.jwt_password().as_bytes(), first.jwt_password().as_bytes());
    assert_eq!(second.access_key().as_bytes(), first.access_key().as_bytes());
    assert_eq!(second.secret_key().as_bytes(), first.secret_key().as_bytes());
    assert_eq!(
        std::fs::read(dir.path().join("root_key.json")).unwrap(),
        root_record
    );
    assert_eq!(
        std::fs::read(dir.path().join("jwt_password.json")).unwrap(),
        envelope
    );
}

#[test]
fn test_wrong_component_fails_and_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap();

    let mut ctx = BootstrapContext::new();
    let mut props = properties("Wr0ng!Pass");
    let err = bootstrapper(dir.path())
        .run(&mut ctx, &mut props)
        .unwrap_err();

    assert_eq!(err.category(), "authentication");
    assert_eq!(ctx.state(), BootstrapState::Failed);
    assert_eq!(ctx.residual_secret_bytes(), 0);
    assert!(props.is_cleared());
    assert!(!err.to_string().contains("Wr0ng"));
}

#[test]
fn test_rejected_component_fails_before_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = BootstrapContext::new();
    let mut props = properties("password");

    let err = bootstrapper(dir.path())
        .run(&mut ctx, &mut props)
        .unwrap_err();

    assert_eq!(err.category(), "validation");
    assert_eq!(ctx.state(), BootstrapState::Failed);
    assert!(props.is_cleared());
    assert!(!dir.path().join("root_key.json").exists());
}

#[test]
fn test_deleted_root_record_does_not_open_old_envelopes() {
    let dir = tempfile::tempdir().unwrap();
    bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap();
    std::fs::remove_file(dir.path().join("root_key.json")).unwrap();

    let mut ctx = BootstrapContext::new();
    let err = bootstrapper(dir.path())
        .run(&mut ctx, &mut properties("Str0ng!Pass"))
        .unwrap_err();

    assert_eq!(err.category(), "authentication");
    assert_eq!(ctx.residual_secret_bytes(), 0);
}

#[test]
fn test_future_record_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap();

    let path = dir.path().join("secret_key.json");
    let mut json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    json["version"] = serde_json::json!(2);
    std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    let err = bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap_err();
    assert_eq!(err.category(), "unsupported_version");
}

#[test]
fn test_unparseable_root_record_fails_like_wrong_component() {
    let dir = tempfile::tempdir().unwrap();
    bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap();

    let path = dir.path().join("root_key.json");
    let text = std::fs::read_to_string(&path).unwrap();
    let start = text.find("\"ciphertext\": \"").unwrap() + "\"ciphertext\": \"".len();
    let mut damaged = text.into_bytes();
    damaged[start] = b'!';
    std::fs::write(&path, damaged).unwrap();

    let mut ctx = BootstrapContext::new();
    let mut props = properties("Str0ng!Pass");
    let err = bootstrapper(dir.path())
        .run(&mut ctx, &mut props)
        .unwrap_err();

    assert_eq!(err.category(), "authentication");
    assert_eq!(ctx.state(), BootstrapState::Failed);
    assert_eq!(ctx.residual_secret_bytes(), 0);
    assert!(props.is_cleared());

    std::fs::write(&path, b"{ not json").unwrap();
    let err = bootstrapper(dir.path())
        .run(&mut BootstrapContext::new(), &mut properties("Str0ng!Pass"))
        .unwrap_err();
    assert_eq!(err.category(), "authentication");
}
