// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Target registry: platform factories in, resolved backends out
//!
//! The registry is built once (register platforms, then `init` from
//! configuration) and is read-only afterwards. It is passed down explicitly;
//! there is no process-wide instance.

use crate::config::TargetConfig;
use crate::entry::{DepartmentEntry, UserEntry};
use crate::error::{DirectoryError, Result};
use crate::identity::{EntryType, ExternalIdentity, TargetKey};
use crate::local::LocalPlatform;
use crate::target::{probe_capabilities, Capabilities, Target};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment handed to platform factories
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    /// Base directory for backends that keep files
    pub data_dir: PathBuf,
}

/// Builds live targets of one platform kind from configuration
pub trait PlatformFactory {
    /// Instantiate a target; its key must match `config.platform`/`config.slug`
    fn build(&self, config: &TargetConfig, context: &PlatformContext) -> Result<Box<dyn Target>>;
}

impl<F> PlatformFactory for F
where
    F: Fn(&TargetConfig, &PlatformContext) -> Result<Box<dyn Target>>,
{
    fn build(&self, config: &TargetConfig, context: &PlatformContext) -> Result<Box<dyn Target>> {
        self(config, context)
    }
}

/// Collects platform factories and injected targets before `init`
pub struct RegistryBuilder {
    context: PlatformContext,
    factories: BTreeMap<String, Box<dyn PlatformFactory>>,
    injected: Vec<(String, Box<dyn Target>)>,
}

impl RegistryBuilder {
    /// Builder with no platforms registered
    #[must_use]
    pub fn new(context: PlatformContext) -> Self {
        Self {
            context,
            factories: BTreeMap::new(),
            injected: Vec::new(),
        }
    }

    /// Builder with the platforms shipped in this crate
    #[must_use]
    pub fn with_builtin_platforms(context: PlatformContext) -> Self {
        let mut builder = Self::new(context);
        builder
            .factories
            .insert(LocalPlatform::NAME.to_string(), Box::new(LocalPlatform));
        builder
    }

    /// Register a platform factory under `platform`
    pub fn register(
        &mut self,
        platform: impl Into<String>,
        factory: impl PlatformFactory + 'static,
    ) -> Result<&mut Self> {
        let platform = platform.into();
        if self.factories.contains_key(&platform) {
            return Err(DirectoryError::Config(format!(
                "platform {platform} registered twice"
            )));
        }
        self.factories.insert(platform, Box::new(factory));
        Ok(self)
    }

    /// Add an already constructed target under a config-style name
    pub fn with_target(&mut self, name: impl Into<String>, target: Box<dyn Target>) -> &mut Self {
        self.injected.push((name.into(), target));
        self
    }

    /// Instantiate every configured target and seal the registry
    pub fn init(self, configs: &[TargetConfig]) -> Result<Registry> {
        let mut registry = Registry {
            targets: Vec::with_capacity(configs.len() + self.injected.len()),
        };

        for config in configs {
            if config.platform.is_empty() || config.slug.is_empty() {
                return Err(DirectoryError::Config(format!(
                    "platform or slug of target '{}' is not set",
                    config.name
                )));
            }
            let factory = self.factories.get(&config.platform).ok_or_else(|| {
                DirectoryError::Config(format!("platform {} does not exist", config.platform))
            })?;
            let target = factory.build(config, &self.context)?;
            let expected = TargetKey::new(config.platform.as_str(), config.slug.as_str());
            if target.key() != &expected {
                return Err(DirectoryError::Config(format!(
                    "target '{}' reports {} but is configured as {}",
                    config.name,
                    target.key(),
                    expected
                )));
            }
            registry.insert(config.name.clone(), target)?;
        }

        for (name, target) in self.injected {
            registry.insert(name, target)?;
        }

        Ok(registry)
    }
}

struct Registered {
    name: String,
    target: Box<dyn Target>,
}

/// Sealed set of configured targets
pub struct Registry {
    targets: Vec<Registered>,
}

impl Registry {
    fn insert(&mut self, name: String, target: Box<dyn Target>) -> Result<()> {
        verify_capabilities(target.as_ref())?;
        if self.targets.iter().any(|r| r.name == name) {
            return Err(DirectoryError::Config(format!("target name '{name}' used twice")));
        }
        if self.targets.iter().any(|r| r.target.key() == target.key()) {
            return Err(DirectoryError::Config(format!(
                "target {} configured twice",
                target.key()
            )));
        }
        info!(
            "Registered target {} as '{}' ({} capabilities)",
            target.key(),
            name,
            target.capabilities().len()
        );
        self.targets.push(Registered { name, target });
        Ok(())
    }

    /// Find the target for (platform, slug); linear scan over a handful of tenants
    pub fn resolve(&self, platform: &str, slug: &str) -> Result<&dyn Target> {
        self.targets
            .iter()
            .map(|r| r.target.as_ref())
            .find(|t| t.key().platform() == platform && t.key().tenant_slug() == slug)
            .ok_or_else(|| DirectoryError::not_found("target", format!("{slug}.{platform}")))
    }

    /// Target owning the entry an identity points at
    pub fn resolve_identity(&self, id: &ExternalIdentity) -> Result<&dyn Target> {
        self.resolve(id.platform(), id.tenant_slug())
    }

    /// Parse a wire token and resolve its owner
    pub fn resolve_token(&self, raw: &str) -> Result<&dyn Target> {
        let id = ExternalIdentity::parse(raw)?;
        self.resolve_identity(&id)
    }

    /// Target by configured name
    pub fn get(&self, name: &str) -> Result<&dyn Target> {
        self.targets
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.target.as_ref())
            .ok_or_else(|| DirectoryError::not_found("target", name))
    }

    /// Target by configured name or `<platform>/<slug>`
    pub fn select(&self, selector: &str) -> Result<&dyn Target> {
        match selector.split_once('/') {
            Some((platform, slug)) => self.resolve(platform, slug),
            None => self.get(selector),
        }
    }

    /// Configured names and targets, in registration order
    pub fn targets(&self) -> impl Iterator<Item = (&str, &dyn Target)> {
        self.targets
            .iter()
            .map(|r| (r.name.as_str(), r.target.as_ref()))
    }

    /// Number of targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when nothing is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Fetch the user an identity points at from its owning target
    pub fn lookup_user(&self, id: &ExternalIdentity) -> Result<Box<dyn UserEntry>> {
        expect_type(id, EntryType::User)?;
        self.resolve_identity(id)?.lookup_user(id.internal_id())
    }

    /// Fetch the department an identity points at from its owning target
    pub fn lookup_department(&self, id: &ExternalIdentity) -> Result<Box<dyn DepartmentEntry>> {
        expect_type(id, EntryType::Department)?;
        self.resolve_identity(id)?.lookup_department(id.internal_id())
    }

    /// Close every target; all are attempted, the first failure is returned
    pub fn teardown(self) -> Result<()> {
        let mut first = None;
        for registered in self.targets {
            debug!("Closing target {}", registered.target.key());
            if let Err(err) = registered.target.close() {
                warn!("Closing {} failed: {}", registered.target.key(), err);
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// Fail with [`DirectoryError::WrongEntryType`] unless `id` is of `expected` type
pub fn expect_type(id: &ExternalIdentity, expected: EntryType) -> Result<()> {
    if id.entry_type() == expected {
        Ok(())
    } else {
        Err(DirectoryError::WrongEntryType {
            expected,
            found: id.to_string(),
        })
    }
}

fn verify_capabilities(target: &dyn Target) -> Result<()> {
    let declared = target.capabilities();
    let available = probe_capabilities(target);
    if declared == available {
        return Ok(());
    }
    let list = |caps: &Capabilities| {
        caps.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    Err(DirectoryError::Config(format!(
        "{} declares [{}] but implements [{}]",
        target.key(),
        list(&declared),
        list(&available)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::UserRecord;
    use crate::target::{Capability, UserLister};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Stub {
        key: TargetKey,
        claims_listing: bool,
        fail_close: bool,
        closed: Rc<RefCell<Vec<String>>>,
    }

    impl Target for Stub {
        fn key(&self) -> &TargetKey {
            &self.key
        }

        fn root_department(&self) -> Result<Box<dyn DepartmentEntry>> {
            Err(DirectoryError::not_found("department", "root"))
        }

        fn lookup_user(&self, id: &str) -> Result<Box<dyn UserEntry>> {
            Ok(Box::new(UserRecord::new(self.key.clone(), id, "stub")))
        }

        fn lookup_department(&self, id: &str) -> Result<Box<dyn DepartmentEntry>> {
            Err(DirectoryError::not_found("department", id))
        }

        fn capabilities(&self) -> Capabilities {
            if self.claims_listing {
                [Capability::ListUsers].into_iter().collect()
            } else {
                Capabilities::new()
            }
        }

        fn as_user_lister(&self) -> Option<&dyn UserLister> {
            None
        }

        fn close(&self) -> Result<()> {
            self.closed.borrow_mut().push(self.key.to_string());
            if self.fail_close {
                Err(DirectoryError::Config(format!("cannot close {}", self.key)))
            } else {
                Ok(())
            }
        }
    }

    impl Stub {
        fn new(platform: &str, slug: &str) -> Self {
            Self {
                key: TargetKey::new(platform, slug),
                claims_listing: false,
                fail_close: false,
                closed: Rc::default(),
            }
        }
    }

    fn stub(platform: &str, slug: &str) -> Box<dyn Target> {
        Box::new(Stub::new(platform, slug))
    }

    fn config(name: &str, platform: &str, slug: &str) -> TargetConfig {
        TargetConfig {
            name: name.into(),
            platform: platform.into(),
            slug: slug.into(),
            options: toml::Table::new(),
        }
    }

    #[test]
    fn test_resolve_by_key_and_token() {
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target("a", stub("p", "s")).with_target("b", stub("p", "t"));
        let registry = builder.init(&[]).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("p", "t").unwrap().key().tenant_slug(), "t");
        assert_eq!(registry.resolve_token("ei.user.1@s.p").unwrap().key().tenant_slug(), "s");
        assert_eq!(registry.select("p/s").unwrap().key().tenant_slug(), "s");
        assert_eq!(registry.select("b").unwrap().key().tenant_slug(), "t");
        assert!(matches!(
            registry.resolve("p", "zz"),
            Err(DirectoryError::NotFound { what: "target", .. })
        ));
        assert!(matches!(
            registry.resolve_token("bogus"),
            Err(DirectoryError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_lookup_user_checks_entry_type() {
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target("a", stub("p", "s"));
        let registry = builder.init(&[]).unwrap();

        let user = ExternalIdentity::parse("ei.user.7@s.p").unwrap();
        assert_eq!(registry.lookup_user(&user).unwrap().id(), "7");

        let dept = ExternalIdentity::parse("ei.dept.7@s.p").unwrap();
        assert!(matches!(
            registry.lookup_user(&dept),
            Err(DirectoryError::WrongEntryType { expected: EntryType::User, .. })
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target("a", stub("p", "s")).with_target("b", stub("p", "s"));
        assert!(matches!(builder.init(&[]), Err(DirectoryError::Config(_))));
    }

    #[test]
    fn test_capability_mismatch_rejected() {
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder.with_target(
            "liar",
            Box::new(Stub {
                claims_listing: true,
                ..Stub::new("p", "s")
            }),
        );
        let err = builder.init(&[]).err().unwrap();
        assert!(err.to_string().contains("list-users"));
    }

    #[test]
    fn test_init_from_config_uses_factory() {
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder
            .register("p", |config: &TargetConfig, _: &PlatformContext| {
                Ok(stub("p", &config.slug))
            })
            .unwrap();
        let again = builder.register("p", |_: &TargetConfig, _: &PlatformContext| {
            Ok(stub("p", "x"))
        });
        assert!(again.is_err());

        let registry = builder
            .init(&[config("one", "p", "s1"), config("two", "p", "s2")])
            .unwrap();
        assert_eq!(registry.get("two").unwrap().key().tenant_slug(), "s2");
        registry.teardown().unwrap();
    }

    #[test]
    fn test_teardown_closes_every_target_and_reports_first_error() {
        let closed = Rc::new(RefCell::new(Vec::new()));
        let failing = |slug: &str| -> Box<dyn Target> {
            Box::new(Stub {
                fail_close: true,
                closed: Rc::clone(&closed),
                ..Stub::new("p", slug)
            })
        };
        let mut builder = RegistryBuilder::new(PlatformContext::default());
        builder
            .with_target("first", failing("one"))
            .with_target("second", failing("two"));
        let registry = builder.init(&[]).unwrap();

        let err = registry.teardown().err().unwrap();
        assert!(matches!(err, DirectoryError::Config(ref msg) if msg == "cannot close one.p"));
        assert_eq!(*closed.borrow(), vec!["one.p".to_string(), "two.p".to_string()]);
    }

    #[test]
    fn test_init_rejects_unknown_platform_and_missing_slug() {
        let builder = RegistryBuilder::new(PlatformContext::default());
        assert!(builder.init(&[config("x", "nowhere", "s")]).is_err());

        let builder = RegistryBuilder::new(PlatformContext::default());
        assert!(builder.init(&[config("x", "p", "")]).is_err());
    }
}
