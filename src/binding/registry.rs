//! Registration of host objects and the script-side binding surface.
//!
//! The first use of an [`ObjectRegistry`] (registering an object or creating a
//! script context) fires [`FreezePoint::FirstObjectBinding`] and latches the
//! binding property names and the legacy-binding flag. Every
//! [`ScriptContext`] created afterwards exposes the binding helpers under both
//! property names, e.g. `CefSharp.BindObjectAsync` and
//! `cefSharp.bindObjectAsync`.
//!
//! # Example
//!
//! ```rust
//! use browser_host_config::binding::{Member, ObjectRegistry};
//! use browser_host_config::config::ProcessConfiguration;
//! use std::sync::Arc;
//!
//! let config = Arc::new(ProcessConfiguration::new());
//! config.set_binding_property_name("MyHost").unwrap();
//!
//! let registry = ObjectRegistry::new(config);
//! registry.register("bound", ["add"], true).unwrap();
//!
//! let mut context = registry.create_script_context().unwrap();
//! assert!(context.resolve("MyHost.BindObjectAsync").is_some());
//! assert!(context.resolve("CefSharp.BindObjectAsync").is_none());
//!
//! context.bind_object_async(&["bound"]);
//! assert!(matches!(context.resolve("bound.add"), Some(Member::Method { .. })));
//! ```

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{
    validate_property_name, FreezePoint, ProcessConfiguration, Setting, SettingsSnapshot,
};

/// Binding settings as latched at first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOptions {
    pub property_name: String,
    pub property_name_camel_case: String,
    pub legacy_binding_enabled: bool,
}

impl BindingOptions {
    /// Reads and validates the binding settings of `snapshot`.
    fn from_snapshot(snapshot: &SettingsSnapshot) -> Result<Self> {
        validate_property_name(
            Setting::JavascriptBindingPropertyName,
            &snapshot.javascript_binding_property_name,
        )?;
        validate_property_name(
            Setting::JavascriptBindingPropertyNameCamelCase,
            &snapshot.javascript_binding_property_name_camel_case,
        )?;

        Ok(Self {
            property_name: snapshot.javascript_binding_property_name.clone(),
            property_name_camel_case: snapshot.javascript_binding_property_name_camel_case.clone(),
            legacy_binding_enabled: snapshot.legacy_javascript_binding_enabled,
        })
    }
}

/// Metadata of a registered host object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundObjectInfo {
    pub id: Uuid,
    pub name: String,
    pub methods: Vec<String>,
    /// Async objects return promises; sync objects go through the synchronous channel.
    pub is_async: bool,
}

/// Helper functions exposed under the binding property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingHelper {
    BindObjectAsync,
    DeleteBoundObject,
    RemoveObjectFromCache,
    IsObjectCached,
}

impl BindingHelper {
    pub const ALL: [BindingHelper; 4] = [
        BindingHelper::BindObjectAsync,
        BindingHelper::DeleteBoundObject,
        BindingHelper::RemoveObjectFromCache,
        BindingHelper::IsObjectCached,
    ];

    pub fn pascal_name(self) -> &'static str {
        match self {
            BindingHelper::BindObjectAsync => "BindObjectAsync",
            BindingHelper::DeleteBoundObject => "DeleteBoundObject",
            BindingHelper::RemoveObjectFromCache => "RemoveObjectFromCache",
            BindingHelper::IsObjectCached => "IsObjectCached",
        }
    }

    pub fn camel_name(self) -> &'static str {
        match self {
            BindingHelper::BindObjectAsync => "bindObjectAsync",
            BindingHelper::DeleteBoundObject => "deleteBoundObject",
            BindingHelper::RemoveObjectFromCache => "removeObjectFromCache",
            BindingHelper::IsObjectCached => "isObjectCached",
        }
    }
}

/// A name resolved inside a [`ScriptContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Helper(BindingHelper),
    Object(String),
    Method { object: String, method: String },
}

/// Outcome of [`ScriptContext::bind_object_async`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindResult {
    pub bound: Vec<String>,
    pub already_bound: Vec<String>,
    pub missing: Vec<String>,
}

type ObjectTable = Arc<RwLock<BTreeMap<String, BoundObjectInfo>>>;

/// Host-side registry of objects exposed to page scripts.
pub struct ObjectRegistry {
    config: Arc<ProcessConfiguration>,
    options: OnceCell<BindingOptions>,
    objects: ObjectTable,
}

impl ObjectRegistry {
    pub fn new(config: Arc<ProcessConfiguration>) -> Self {
        Self {
            config,
            options: OnceCell::new(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Binding options, latching them on first call.
    ///
    /// Invalid property names fail the call without firing the freeze point,
    /// so they can still be corrected.
    fn latch_options(&self) -> Result<&BindingOptions> {
        self.options.get_or_try_init(|| -> Result<BindingOptions> {
            let point = FreezePoint::FirstObjectBinding;
            let options = match self.config.freeze_with(point, BindingOptions::from_snapshot)? {
                Some(options) => options,
                // Fired by another registry on the same configuration.
                None => match self.config.latched(point) {
                    Some(snapshot) => BindingOptions::from_snapshot(snapshot)?,
                    None => BindingOptions::from_snapshot(&self.config.snapshot())?,
                },
            };

            info!(
                property_name = %options.property_name,
                property_name_camel_case = %options.property_name_camel_case,
                legacy_binding_enabled = options.legacy_binding_enabled,
                "binding options latched"
            );
            Ok(options)
        })
    }

    /// The latched options, if the registry has been used.
    pub fn options(&self) -> Option<&BindingOptions> {
        self.options.get()
    }

    /// Registers a host object under `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty, is already registered, or collides with a
    /// binding property name.
    pub fn register<I, S>(&self, name: &str, methods: I, is_async: bool) -> Result<BoundObjectInfo>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = self.latch_options()?;

        if name.is_empty() {
            return Err(anyhow!("Bound object name cannot be empty"));
        }
        if name == options.property_name || name == options.property_name_camel_case {
            return Err(anyhow!(
                "Bound object name '{}' collides with a binding property name",
                name
            ));
        }

        let mut objects = self.objects.write();
        if objects.contains_key(name) {
            return Err(anyhow!("Object '{}' is already registered", name));
        }

        let info = BoundObjectInfo {
            id: Uuid::new_v4(),
            name: name.to_string(),
            methods: methods.into_iter().map(Into::into).collect(),
            is_async,
        };
        objects.insert(name.to_string(), info.clone());
        debug!(object = %name, methods = info.methods.len(), is_async, "object registered");
        Ok(info)
    }

    /// Removes a registered object. Returns `false` if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.objects.write().remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.objects.read().contains_key(name)
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Creates the binding surface for a newly created script context.
    ///
    /// With legacy binding every registered object is bound immediately.
    pub fn create_script_context(&self) -> Result<ScriptContext> {
        let options = self.latch_options()?.clone();
        let mut context = ScriptContext {
            id: Uuid::new_v4(),
            options,
            objects: Arc::clone(&self.objects),
            bound: BTreeSet::new(),
            cached: BTreeSet::new(),
        };

        if context.options.legacy_binding_enabled {
            let result = context.bind_object_async(&[]);
            debug!(bound = result.bound.len(), "legacy binding applied");
        }

        Ok(context)
    }
}

/// Script-side view of the bound objects in one page context.
#[derive(Debug)]
pub struct ScriptContext {
    pub id: Uuid,
    options: BindingOptions,
    objects: ObjectTable,
    bound: BTreeSet<String>,
    cached: BTreeSet<String>,
}

impl ScriptContext {
    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// Global names currently visible to scripts.
    pub fn globals(&self) -> Vec<String> {
        let mut globals = vec![
            self.options.property_name.clone(),
            self.options.property_name_camel_case.clone(),
        ];
        globals.extend(self.bound.iter().cloned());
        globals
    }

    pub fn has_global(&self, name: &str) -> bool {
        name == self.options.property_name
            || name == self.options.property_name_camel_case
            || self.bound.contains(name)
    }

    /// Resolves `global.member`. Bound objects also resolve by their bare name;
    /// the binding property objects themselves are checked with [`Self::has_global`].
    pub fn resolve(&self, path: &str) -> Option<Member> {
        let (global, member) = match path.split_once('.') {
            Some((global, member)) => (global, Some(member)),
            None => (path, None),
        };

        if global == self.options.property_name {
            return member.and_then(|m| {
                BindingHelper::ALL
                    .into_iter()
                    .find(|h| h.pascal_name() == m)
                    .map(Member::Helper)
            });
        }
        if global == self.options.property_name_camel_case {
            return member.and_then(|m| {
                BindingHelper::ALL
                    .into_iter()
                    .find(|h| h.camel_name() == m)
                    .map(Member::Helper)
            });
        }

        if !self.bound.contains(global) {
            return None;
        }
        match member {
            None => Some(Member::Object(global.to_string())),
            Some(method) => {
                let objects = self.objects.read();
                let info = objects.get(global)?;
                info.methods
                    .iter()
                    .any(|m| m == method)
                    .then(|| Member::Method {
                        object: global.to_string(),
                        method: method.to_string(),
                    })
            }
        }
    }

    /// Binds the named objects into this context; an empty list binds every
    /// registered object.
    pub fn bind_object_async(&mut self, names: &[&str]) -> BindResult {
        let objects = self.objects.read();
        let requested: Vec<String> = if names.is_empty() {
            objects.keys().cloned().collect()
        } else {
            names.iter().map(|n| n.to_string()).collect()
        };

        let mut result = BindResult::default();
        for name in requested {
            if !objects.contains_key(&name) {
                result.missing.push(name);
            } else if self.bound.contains(&name) {
                result.already_bound.push(name);
            } else {
                self.bound.insert(name.clone());
                self.cached.insert(name.clone());
                result.bound.push(name);
            }
        }

        debug!(
            context = %self.id,
            bound = result.bound.len(),
            missing = result.missing.len(),
            "objects bound"
        );
        result
    }

    /// Removes an object from the page globals; its metadata stays cached.
    pub fn delete_bound_object(&mut self, name: &str) -> bool {
        self.bound.remove(name)
    }

    /// Drops cached metadata so the next bind fetches it again.
    pub fn remove_object_from_cache(&mut self, name: &str) -> bool {
        self.cached.remove(name)
    }

    pub fn is_object_cached(&self, name: &str) -> bool {
        self.cached.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, WriteMode};

    fn registry_with(config: ProcessConfiguration) -> (Arc<ProcessConfiguration>, ObjectRegistry) {
        let config = Arc::new(config);
        let registry = ObjectRegistry::new(Arc::clone(&config));
        (config, registry)
    }

    #[test]
    fn test_default_property_names() {
        let (_, registry) = registry_with(ProcessConfiguration::new());
        let context = registry.create_script_context().unwrap();

        assert_eq!(
            context.resolve("CefSharp.BindObjectAsync"),
            Some(Member::Helper(BindingHelper::BindObjectAsync))
        );
        assert_eq!(
            context.resolve("cefSharp.isObjectCached"),
            Some(Member::Helper(BindingHelper::IsObjectCached))
        );
        assert_eq!(context.resolve("cefSharp.BindObjectAsync"), None);
        assert_eq!(context.globals(), vec!["CefSharp", "cefSharp"]);
    }

    #[test]
    fn test_first_registration_latches_options() {
        let (config, registry) = registry_with(ProcessConfiguration::new());
        assert!(registry.options().is_none());

        registry.register("bound", ["echo"], false).unwrap();
        assert!(config.is_frozen(FreezePoint::FirstObjectBinding));

        let result = config.set_legacy_javascript_binding_enabled(true);
        assert!(matches!(result, Err(ConfigError::SettingFrozen { .. })));
        assert!(!registry.options().unwrap().legacy_binding_enabled);
    }

    #[test]
    fn test_lenient_late_rename_is_not_observed() {
        let (config, registry) = registry_with(ProcessConfiguration::with_mode(WriteMode::Lenient));
        registry.register("bound", ["echo"], true).unwrap();

        config.set_binding_property_name("Renamed").unwrap();
        let context = registry.create_script_context().unwrap();

        assert!(context.has_global("CefSharp"));
        assert!(!context.has_global("Renamed"));
    }

    #[test]
    fn test_explicit_binding() {
        let (_, registry) = registry_with(ProcessConfiguration::new());
        registry.register("math", ["add", "sub"], true).unwrap();
        registry.register("log", ["write"], false).unwrap();

        let mut context = registry.create_script_context().unwrap();
        assert!(!context.has_global("math"));
        assert_eq!(context.resolve("math.add"), None);

        let result = context.bind_object_async(&["math", "nope"]);
        assert_eq!(result.bound, vec!["math"]);
        assert_eq!(result.missing, vec!["nope"]);

        assert_eq!(
            context.resolve("math.add"),
            Some(Member::Method {
                object: "math".to_string(),
                method: "add".to_string(),
            })
        );
        assert_eq!(context.resolve("math.mul"), None);
        assert!(!context.has_global("log"));

        let again = context.bind_object_async(&[]);
        assert_eq!(again.bound, vec!["log"]);
        assert_eq!(again.already_bound, vec!["math"]);
    }

    #[test]
    fn test_legacy_binding_binds_on_context_creation() {
        let config = ProcessConfiguration::new();
        config.set_legacy_javascript_binding_enabled(true).unwrap();
        let (_, registry) = registry_with(config);
        registry.register("math", ["add"], true).unwrap();

        let context = registry.create_script_context().unwrap();
        assert!(context.has_global("math"));
        assert!(context.is_object_cached("math"));
    }

    #[test]
    fn test_cache_helpers() {
        let (_, registry) = registry_with(ProcessConfiguration::new());
        registry.register("math", ["add"], true).unwrap();
        let mut context = registry.create_script_context().unwrap();

        context.bind_object_async(&["math"]);
        assert!(context.delete_bound_object("math"));
        assert!(!context.has_global("math"));
        assert!(context.is_object_cached("math"));

        assert!(context.remove_object_from_cache("math"));
        assert!(!context.is_object_cached("math"));
        assert!(!context.remove_object_from_cache("math"));
    }

    #[test]
    fn test_register_rejects_duplicates_and_collisions() {
        let (_, registry) = registry_with(ProcessConfiguration::new());
        registry.register("math", ["add"], true).unwrap();

        assert!(registry.register("math", ["sub"], true).is_err());
        assert!(registry.register("CefSharp", Vec::<String>::new(), true).is_err());
        assert!(registry.register("", Vec::<String>::new(), true).is_err());

        assert!(registry.unregister("math"));
        assert!(!registry.is_registered("math"));
        registry.register("math", ["sub"], true).unwrap();
    }

    #[test]
    fn test_invalid_property_name_can_be_corrected() {
        let (config, registry) = registry_with(ProcessConfiguration::new());
        config.set_binding_property_name("not valid").unwrap();

        assert!(registry.register("math", ["add"], true).is_err());
        assert!(registry.options().is_none());
        assert!(!config.is_frozen(FreezePoint::FirstObjectBinding));

        config.set_binding_property_name("Valid").unwrap();
        registry.register("math", ["add"], true).unwrap();
        assert_eq!(registry.options().unwrap().property_name, "Valid");
        assert!(config.is_frozen(FreezePoint::FirstObjectBinding));
    }

    #[test]
    fn test_registries_sharing_config_see_same_names() {
        let (config, first) = registry_with(ProcessConfiguration::with_mode(WriteMode::Lenient));
        let second = ObjectRegistry::new(Arc::clone(&config));
        first.register("bound", ["echo"], true).unwrap();

        config.set_binding_property_name("Renamed").unwrap();
        let context = second.create_script_context().unwrap();
        assert!(context.has_global("CefSharp"));
        assert!(!context.has_global("Renamed"));
    }
}
