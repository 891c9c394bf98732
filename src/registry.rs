//! Record type registry.
//!
//! Loaders bind their record type by name. The registry maps fully-qualified
//! protobuf message names to descriptor factories and is populated once at
//! startup, typically from a serialized `FileDescriptorSet` produced by
//! `protoc --descriptor_set_out`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use prost::Message;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::FileDescriptorSet;
use tracing::debug;

use crate::config::ConfigurationError;

/// The structural schema of one message family.
///
/// Immutable once resolved. Cloning is cheap: the descriptor is reference
/// counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    descriptor: MessageDescriptor,
}

impl RecordType {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self { descriptor }
    }

    /// Fully-qualified message name, e.g. `example.Person`.
    pub fn name(&self) -> &str {
        self.descriptor.full_name()
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }
}

type DescriptorFactory = Arc<dyn Fn() -> MessageDescriptor + Send + Sync>;

/// Mapping from message name to descriptor factory.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    factories: HashMap<String, DescriptorFactory>,
    /// Unqualified name -> fully-qualified names, for fallback lookup.
    short_names: HashMap<String, Vec<String>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a serialized `FileDescriptorSet`.
    pub fn from_descriptor_set(data: &[u8]) -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        registry.register_descriptor_set(data)?;
        Ok(registry)
    }

    /// Register a descriptor factory under a fully-qualified name.
    pub fn register<F>(&mut self, full_name: &str, factory: F)
    where
        F: Fn() -> MessageDescriptor + Send + Sync + 'static,
    {
        let full_name = full_name.trim_start_matches('.').to_string();
        let short_name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();

        let candidates = self.short_names.entry(short_name).or_default();
        if !candidates.contains(&full_name) {
            candidates.push(full_name.clone());
            candidates.sort();
        }
        self.factories.insert(full_name, Arc::new(factory));
    }

    /// Register every message in a descriptor pool. Synthetic map entry
    /// messages are skipped.
    pub fn register_pool(&mut self, pool: &DescriptorPool) {
        let mut count = 0usize;
        for message in pool.all_messages() {
            if message.is_map_entry() {
                continue;
            }
            let name = message.full_name().to_string();
            self.register(&name, move || message.clone());
            count += 1;
        }
        debug!(count, "registered record types from descriptor pool");
    }

    /// Register every message in a serialized `FileDescriptorSet`.
    pub fn register_descriptor_set(&mut self, data: &[u8]) -> Result<(), ConfigurationError> {
        let fds = FileDescriptorSet::decode(data)?;
        let pool = DescriptorPool::from_file_descriptor_set(fds)
            .map_err(|e| ConfigurationError::DescriptorPool(e.to_string()))?;
        self.register_pool(&pool);
        Ok(())
    }

    /// Names of all registered types, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolve a type name to a record type.
    ///
    /// Tries the exact fully-qualified name first, then falls back to an
    /// unqualified name if it identifies exactly one registered type.
    pub fn resolve(&self, name: &str) -> Result<RecordType, ConfigurationError> {
        let name = name.trim().trim_start_matches('.');
        if let Some(factory) = self.factories.get(name) {
            return Ok(RecordType::new(factory()));
        }

        match self.short_names.get(name).map(Vec::as_slice) {
            Some([full_name]) => self
                .factories
                .get(full_name)
                .map(|factory| RecordType::new(factory()))
                .ok_or_else(|| ConfigurationError::UnknownType(name.to_string())),
            Some(candidates) if candidates.len() > 1 => Err(ConfigurationError::AmbiguousType {
                name: name.to_string(),
                candidates: candidates.to_vec(),
            }),
            _ => Err(ConfigurationError::UnknownType(name.to_string())),
        }
    }
}
