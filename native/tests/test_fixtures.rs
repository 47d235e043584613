#![allow(dead_code)]

use mr_keychain::{AttrKey, Attributes, ItemClass, Keychain, KeychainConfig, Protocol};
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_test_environment() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Test fixtures for keychain contents and configurations
pub struct TestFixtures;

impl TestFixtures {
    /// Internet passwords seeded into every fixture keychain
    pub fn internet_passwords() -> Vec<ItemFixture> {
        vec![
            ItemFixture {
                server: "github.com",
                account: "alice",
                protocol: Protocol::Https,
                password: "hunter2",
            },
            ItemFixture {
                server: "gitlab.com",
                account: "alice",
                protocol: Protocol::Https,
                password: "correct horse",
            },
            ItemFixture {
                server: "irc.libera.chat",
                account: "bob",
                protocol: Protocol::Ircs,
                password: "",
            },
        ]
    }

    /// An in-memory keychain holding `internet_passwords`
    pub fn seeded_keychain() -> Keychain {
        Self::seeded_keychain_with(KeychainConfig::default())
    }

    pub fn seeded_keychain_with(config: KeychainConfig) -> Keychain {
        setup_test_environment();
        let keychain = Keychain::with_config(mr_keychain::MemoryKeychain::new(), config);
        for fixture in Self::internet_passwords() {
            let status = keychain.service().insert(&fixture.attributes().with(
                AttrKey::ValueData,
                fixture.password.as_bytes().to_vec(),
            ));
            assert_eq!(status, 0, "seeding {} failed", fixture.server);
        }
        keychain
    }
}

#[derive(Debug, Clone)]
pub struct ItemFixture {
    pub server: &'static str,
    pub account: &'static str,
    pub protocol: Protocol,
    pub password: &'static str,
}

impl ItemFixture {
    pub fn attributes(&self) -> Attributes {
        Attributes::new()
            .with(AttrKey::Class, ItemClass::InternetPassword)
            .with(AttrKey::Server, self.server)
            .with(AttrKey::Account, self.account)
            .with(AttrKey::Protocol, self.protocol)
    }

    pub fn filter(&self) -> Attributes {
        Attributes::new().with(AttrKey::Server, self.server)
    }
}
