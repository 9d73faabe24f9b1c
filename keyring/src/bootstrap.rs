// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Startup state machine that turns configuration properties into decrypted
//! credentials.
//!
//! ```text
//! Start -> ComponentValidated -> RootKeyReady -> WorkKeyDerived -> SecretsReady -> Bootstrapped
//!   \______________\___________________\______________\________________\-----> Failed
//! ```
//!
//! All intermediate key material lives in a [`BootstrapContext`] owned by the
//! caller. The context is cleared on entry to `Failed`, and the root key,
//! work keys and key component are cleared as soon as they are no longer
//! needed on the success path. Every property value is cleared before
//! [`CredentialBootstrapper::run`] returns, whatever the outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::codec::SecretCodec;
use crate::constants::{
    MAX_ACCESS_KEY_LENGTH, MAX_APP_INST_ID_LENGTH, MAX_SECRET_LENGTH, PROP_ACCESS_KEY,
    PROP_APP_INST_ID, PROP_JWT_PRIVATE_KEY, PROP_KEY_COMPONENT, PROP_SECRET_KEY,
};
use crate::error::{BootstrapError, StoreError};
use crate::models::{KdfParams, SecretKind};
use crate::policy::{ComponentPolicy, KeyComponent};
use crate::properties::ConfigProperties;
use crate::root_key::RootKeyStore;
use crate::secret::SecretBuffer;
use crate::store::EnvelopeStore;
use crate::work_key::{self, WorkKey};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    #[default]
    Start,
    ComponentValidated,
    RootKeyReady,
    WorkKeyDerived,
    SecretsReady,
    Bootstrapped,
    Failed,
}

impl BootstrapState {
    fn enter(&mut self, next: Self) {
        tracing::info!(from = ?self, to = ?next, "[keyring] bootstrap transition");
        *self = next;
    }
}

/// Bootstrap-scoped key material, passed explicitly through each step.
#[derive(Debug, Default)]
pub struct BootstrapContext {
    state: BootstrapState,
    key_component: Option<KeyComponent>,
    root_key: Option<SecretBuffer>,
    work_keys: BTreeMap<SecretKind, WorkKey>,
    secrets: BTreeMap<SecretKind, SecretBuffer>,
}

impl BootstrapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Number of non-zero bytes still held by the context. Zero once the
    /// context has been cleared or bootstrap completed.
    pub fn residual_secret_bytes(&self) -> usize {
        let nonzero = |bytes: &[u8]| bytes.iter().filter(|byte| **byte != 0).count();

        self.key_component
            .iter()
            .map(|component| nonzero(component.as_bytes()))
            .chain(self.root_key.iter().map(|key| nonzero(key.as_bytes())))
            .chain(self.work_keys.values().map(|key| nonzero(key.as_bytes())))
            .chain(self.secrets.values().map(|secret| nonzero(secret.as_bytes())))
            .sum()
    }

    /// Zeroes everything the context still holds, in place.
    pub fn clear(&mut self) {
        if let Some(component) = self.key_component.as_mut() {
            component.clear();
        }
        if let Some(root_key) = self.root_key.as_mut() {
            root_key.clear();
        }
        self.work_keys.values_mut().for_each(WorkKey::clear);
        self.secrets.values_mut().for_each(SecretBuffer::clear);
    }

    fn fail(&mut self, err: &BootstrapError) {
        self.clear();
        tracing::error!(
            category = err.category(),
            "[keyring] bootstrap failed in state {:?}: {}",
            self.state,
            err
        );
        self.state.enter(BootstrapState::Failed);
    }
}

/// Decrypted secrets handed to the serving layer. Read-only; the buffers are
/// zeroed when the last `Arc` drops.
pub struct Credentials {
    app_inst_id: String,
    jwt_password: SecretBuffer,
    access_key: SecretBuffer,
    secret_key: SecretBuffer,
}

impl Credentials {
    pub fn app_inst_id(&self) -> &str {
        &self.app_inst_id
    }

    pub fn jwt_password(&self) -> &SecretBuffer {
        &self.jwt_password
    }

    pub fn access_key(&self) -> &SecretBuffer {
        &self.access_key
    }

    pub fn secret_key(&self) -> &SecretBuffer {
        &self.secret_key
    }

    /// Constant-time comparison of a presented access key.
    pub fn verify_access_key(&self, presented: &[u8]) -> bool {
        self.access_key.as_bytes().ct_eq(presented).into()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_inst_id", &self.app_inst_id)
            .field("jwt_password", &"[REDACTED]")
            .field("access_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Property that supplies a category's plaintext on first run.
pub fn property_for(kind: SecretKind) -> &'static str {
    match kind {
        SecretKind::JwtPassword => PROP_JWT_PRIVATE_KEY,
        SecretKind::AccessKey => PROP_ACCESS_KEY,
        SecretKind::SecretKey => PROP_SECRET_KEY,
    }
}

#[derive(Debug, Clone)]
pub struct CredentialBootstrapper {
    policy: ComponentPolicy,
    root_keys: RootKeyStore,
    envelopes: EnvelopeStore,
}

impl CredentialBootstrapper {
    pub fn new(key_dir: impl AsRef<Path>) -> Self {
        let key_dir = key_dir.as_ref();
        Self {
            policy: ComponentPolicy::default(),
            root_keys: RootKeyStore::new(key_dir),
            envelopes: EnvelopeStore::new(key_dir),
        }
    }

    pub fn with_policy(mut self, policy: ComponentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.root_keys = self.root_keys.with_kdf_params(params);
        self
    }

    pub fn root_keys(&self) -> &RootKeyStore {
        &self.root_keys
    }

    pub fn envelopes(&self) -> &EnvelopeStore {
        &self.envelopes
    }

    /// Runs the bootstrap to completion or failure. Not retried on failure:
    /// the operator fixes the input and restarts the process.
    pub fn run(
        &self,
        ctx: &mut BootstrapContext,
        props: &mut ConfigProperties,
    ) -> Result<Arc<Credentials>, BootstrapError> {
        if ctx.state != BootstrapState::Start {
            props.clear_all();
            return Err(BootstrapError::AlreadyRan);
        }

        let outcome = self.advance(ctx, props);
        props.clear_all();

        match outcome {
            Ok(credentials) => {
                ctx.state.enter(BootstrapState::Bootstrapped);
                Ok(credentials)
            }
            Err(err) => {
                ctx.fail(&err);
                Err(err)
            }
        }
    }

    fn advance(
        &self,
        ctx: &mut BootstrapContext,
        props: &mut ConfigProperties,
    ) -> Result<Arc<Credentials>, BootstrapError> {
        let raw = props
            .take(PROP_KEY_COMPONENT)
            .ok_or(BootstrapError::MissingProperty(PROP_KEY_COMPONENT))?;
        let component = ctx.key_component.insert(self.policy.accept(raw)?);
        ctx.state.enter(BootstrapState::ComponentValidated);

        // the remaining inputs are checked before the root key is touched
        let app_inst_id = validate_inputs(props)?;

        let root_key = ctx.root_key.insert(self.load_or_initialize(component)?);
        ctx.state.enter(BootstrapState::RootKeyReady);

        for kind in SecretKind::ALL {
            ctx.work_keys
                .insert(kind, work_key::derive_for(root_key.as_bytes(), kind));
        }
        component.clear();
        root_key.clear();
        ctx.state.enter(BootstrapState::WorkKeyDerived);

        for (kind, work_key) in &ctx.work_keys {
            let secret = self.resolve_secret(*kind, work_key, props)?;
            ctx.secrets.insert(*kind, secret);
        }
        ctx.work_keys.values_mut().for_each(WorkKey::clear);
        ctx.state.enter(BootstrapState::SecretsReady);

        let mut take = |kind: SecretKind| {
            ctx.secrets
                .remove(&kind)
                .ok_or(BootstrapError::MissingSecret(kind))
        };
        Ok(Arc::new(Credentials {
            app_inst_id,
            jwt_password: take(SecretKind::JwtPassword)?,
            access_key: take(SecretKind::AccessKey)?,
            secret_key: take(SecretKind::SecretKey)?,
        }))
    }

    fn load_or_initialize(&self, component: &KeyComponent) -> Result<SecretBuffer, BootstrapError> {
        match self.root_keys.load() {
            Ok(Some(record)) => Ok(self.root_keys.unseal(&record, component)?),
            Ok(None) => {
                tracing::info!("[keyring] no root key record found, initializing");
                let (_, root_key) = self.root_keys.initialize(component)?;
                Ok(root_key)
            }
            // unreadable records fail exactly like a wrong component
            Err(StoreError::Corrupt { .. }) => {
                Err(self.root_keys.reject_damaged(component).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Opens the stored envelope for `kind`, or seals and stores the supplied
    /// value when none exists yet.
    fn resolve_secret(
        &self,
        kind: SecretKind,
        work_key: &WorkKey,
        props: &mut ConfigProperties,
    ) -> Result<SecretBuffer, BootstrapError> {
        let supplied = props.take(property_for(kind)).filter(|value| !value.is_empty());
        let mut codec = SecretCodec::new(kind);

        match self.envelopes.load(kind)? {
            Some(envelope) => {
                let secret = codec
                    .open(work_key, &envelope)
                    .map_err(|source| BootstrapError::Decrypt { kind, source })?;
                if let Some(supplied) = supplied {
                    let same: bool = supplied.as_bytes().ct_eq(secret.as_bytes()).into();
                    if !same {
                        tracing::warn!(
                            "[keyring] supplied {} differs from the stored envelope, ignoring it",
                            property_for(kind)
                        );
                    }
                }
                Ok(secret)
            }
            None => {
                let supplied = supplied.ok_or(BootstrapError::MissingSecret(kind))?;
                let envelope = codec
                    .seal(work_key, supplied.as_bytes())
                    .map_err(|source| BootstrapError::Seal { kind, source })?;
                self.envelopes.store(&envelope)?;
                tracing::info!("[keyring] sealed {} envelope", kind);
                Ok(supplied)
            }
        }
    }
}

/// Checks the non-key inputs and returns the application instance id.
fn validate_inputs(props: &ConfigProperties) -> Result<String, BootstrapError> {
    let app_inst_id = props
        .get(PROP_APP_INST_ID)
        .ok_or(BootstrapError::MissingProperty(PROP_APP_INST_ID))?
        .as_str()
        .filter(|id| {
            (1..=MAX_APP_INST_ID_LENGTH).contains(&id.len())
                && id.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
        })
        .ok_or(BootstrapError::InvalidProperty(PROP_APP_INST_ID))?
        .to_string();

    if let Some(access_key) = props.get(PROP_ACCESS_KEY).filter(|value| !value.is_empty()) {
        let bytes = access_key.as_bytes();
        if bytes.len() > MAX_ACCESS_KEY_LENGTH || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(BootstrapError::InvalidProperty(PROP_ACCESS_KEY));
        }
    }

    for name in [PROP_SECRET_KEY, PROP_JWT_PRIVATE_KEY] {
        if props.get(name).is_some_and(|value| value.len() > MAX_SECRET_LENGTH) {
            return Err(BootstrapError::InvalidProperty(name));
        }
    }

    Ok(app_inst_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::{DecryptError, UnsealError, ValidationError};

    const APP_ID: &str = "5abe4782-2c70-4e47-9a4e-0ee3a1a0fd1f";

    fn bootstrapper(dir: &Path) -> CredentialBootstrapper {
        CredentialBootstrapper::new(dir).with_kdf_params(KdfParams::new(1024, 1, 1))
    }

    fn props(entries: &[(&str, &str)]) -> ConfigProperties {
        let mut props = ConfigProperties::new();
        for (name, value) in entries {
            props.insert(*name, SecretBuffer::from_slice(value.as_bytes()));
        }
        props
    }

    fn first_run_props() -> ConfigProperties {
        props(&[
            (PROP_KEY_COMPONENT, "Str0ng!Pass"),
            (PROP_APP_INST_ID, APP_ID),
            (PROP_JWT_PRIVATE_KEY, "pw123"),
            (PROP_ACCESS_KEY, "QVUJMSUMgS0VZLS0tLS0"),
            (PROP_SECRET_KEY, "DXPb4sqElKhcHe07Kw5uorayETwId1JOjjOIRomRs5wyszoCR5R7AtVa28KT3lSc"),
        ])
    }

    #[test]
    fn test_first_run_reaches_bootstrapped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();

        let credentials = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap();

        assert_eq!(ctx.state(), BootstrapState::Bootstrapped);
        assert_eq!(ctx.residual_secret_bytes(), 0);
        assert!(props.is_cleared());
        assert_eq!(credentials.app_inst_id(), APP_ID);
        assert_eq!(credentials.jwt_password().as_bytes(), b"pw123");
        assert!(credentials.verify_access_key(b"QVUJMSUMgS0VZLS0tLS0"));
        assert!(!credentials.verify_access_key(b"QVUJMSUMgS0VZLS0tLS1"));
    }

    #[test]
    fn test_run_twice_on_one_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = bootstrapper(dir.path());
        let mut ctx = BootstrapContext::new();
        bootstrapper.run(&mut ctx, &mut first_run_props()).unwrap();

        let mut props = first_run_props();
        let err = bootstrapper.run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(err, BootstrapError::AlreadyRan));
        assert!(props.is_cleared());
    }

    #[test]
    fn test_missing_key_component() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.take(PROP_KEY_COMPONENT);

        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::MissingProperty(PROP_KEY_COMPONENT)
        ));
        assert_eq!(ctx.state(), BootstrapState::Failed);
        assert!(props.is_cleared());
    }

    #[test]
    fn test_empty_key_component_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(PROP_KEY_COMPONENT, SecretBuffer::new(Vec::new()));

        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Validation(ValidationError::TooShort { .. })
        ));
        assert!(!dir.path().join("root_key.json").exists());
    }

    #[test]
    fn test_weak_component_fails_before_touching_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(PROP_KEY_COMPONENT, SecretBuffer::from_slice(b"aaaaaaaa"));

        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert_eq!(err.category(), "validation");
        assert_eq!(ctx.state(), BootstrapState::Failed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_app_inst_id() {
        let dir = tempfile::tempdir().unwrap();
        let too_long = "a".repeat(MAX_APP_INST_ID_LENGTH + 1);
        for bad in ["", "has space", too_long.as_str()] {
            let mut ctx = BootstrapContext::new();
            let mut props = first_run_props();
            props.insert(PROP_APP_INST_ID, SecretBuffer::from_slice(bad.as_bytes()));
            let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
            assert!(matches!(
                err,
                BootstrapError::InvalidProperty(PROP_APP_INST_ID)
            ));
            assert_eq!(ctx.residual_secret_bytes(), 0);
        }
        assert!(!dir.path().join("root_key.json").exists());
    }

    #[test]
    fn test_component_is_checked_before_other_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(PROP_KEY_COMPONENT, SecretBuffer::from_slice(b"password"));
        props.insert(PROP_APP_INST_ID, SecretBuffer::from_slice(b"has space"));

        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert_eq!(err.category(), "validation");
        assert!(matches!(err, BootstrapError::Validation(_)));
    }

    #[test]
    fn test_invalid_access_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(PROP_ACCESS_KEY, SecretBuffer::from_slice(b"not/alphanumeric"));
        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidProperty(PROP_ACCESS_KEY)));
    }

    #[test]
    fn test_oversized_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(
            PROP_SECRET_KEY,
            SecretBuffer::from_slice(&[b'x'; MAX_SECRET_LENGTH + 1]),
        );
        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidProperty(PROP_SECRET_KEY)));
    }

    #[test]
    fn test_first_run_without_secret_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.take(PROP_SECRET_KEY);

        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::MissingSecret(SecretKind::SecretKey)
        ));
        assert_eq!(ctx.residual_secret_bytes(), 0);
    }

    #[test]
    fn test_second_run_ignores_differing_supplied_value() {
        let dir = tempfile::tempdir().unwrap();
        bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut first_run_props())
            .unwrap();

        let mut props = first_run_props();
        props.insert(PROP_JWT_PRIVATE_KEY, SecretBuffer::from_slice(b"changed"));
        let credentials = bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut props)
            .unwrap();
        assert_eq!(credentials.jwt_password().as_bytes(), b"pw123");
    }

    #[test]
    fn test_second_run_needs_only_component_and_id() {
        let dir = tempfile::tempdir().unwrap();
        bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut first_run_props())
            .unwrap();

        let mut props = props(&[
            (PROP_KEY_COMPONENT, "Str0ng!Pass"),
            (PROP_APP_INST_ID, APP_ID),
            (PROP_JWT_PRIVATE_KEY, ""),
        ]);
        let credentials = bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut props)
            .unwrap();
        assert_eq!(credentials.jwt_password().as_bytes(), b"pw123");
    }

    #[test]
    fn test_wrong_component_fails_authentication() {
        let dir = tempfile::tempdir().unwrap();
        bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut first_run_props())
            .unwrap();

        let mut ctx = BootstrapContext::new();
        let mut props = first_run_props();
        props.insert(PROP_KEY_COMPONENT, SecretBuffer::from_slice(b"Wr0ng!Pass"));
        let err = bootstrapper(dir.path()).run(&mut ctx, &mut props).unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Unseal(UnsealError::AuthenticationFailed)
        ));
        assert_eq!(ctx.state(), BootstrapState::Failed);
        assert_eq!(ctx.residual_secret_bytes(), 0);
        assert!(props.is_cleared());
    }

    #[test]
    fn test_tampered_envelope_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = bootstrapper(dir.path());
        bootstrapper
            .run(&mut BootstrapContext::new(), &mut first_run_props())
            .unwrap();

        let mut envelope = bootstrapper
            .envelopes()
            .load(SecretKind::AccessKey)
            .unwrap()
            .expect("envelope stored on first run");
        envelope.ciphertext[0] ^= 0x01;
        std::fs::write(
            bootstrapper.envelopes().path(SecretKind::AccessKey),
            serde_json::to_vec(&envelope).unwrap(),
        )
        .unwrap();

        let mut ctx = BootstrapContext::new();
        let err = bootstrapper
            .run(&mut ctx, &mut first_run_props())
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Decrypt {
                kind: SecretKind::AccessKey,
                source: DecryptError::AuthenticationFailed,
            }
        ));
        assert_eq!(ctx.residual_secret_bytes(), 0);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = bootstrapper(dir.path())
            .run(&mut BootstrapContext::new(), &mut first_run_props())
            .unwrap();
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("pw123"));
    }
}
