//! Provider registry with capability, cost, and concurrency profiles
//!
//! Read-only during normal operation; health events swap whole
//! descriptors atomically rather than mutating fields in place.

use std::sync::Arc;

use axon_config::{ModelType, ProviderConfig, ProviderStatus};
use dashmap::DashMap;

/// Static description of a provider's capabilities and cost curve
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Provider name, unique within the registry
    pub name: String,
    /// Availability status
    pub status: ProviderStatus,
    /// Model types this provider can serve
    pub supported_types: Vec<ModelType>,
    /// Capability tags advertised to callers
    pub capabilities: Vec<String>,
    /// Concurrency cap
    pub max_concurrent: u32,
    /// Base cost per request (USD)
    pub base_cost: f64,
    /// Ceiling on any single estimated cost (USD)
    pub max_cost: f64,
    /// Static cost-efficiency rating in [0, 1]
    pub cost_efficiency: f64,
}

impl ProviderDescriptor {
    pub fn supports(&self, model_type: ModelType) -> bool {
        self.supported_types.contains(&model_type)
    }
}

/// Registry of all configured providers, keyed by name
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<ProviderDescriptor>>,
    /// Declaration order, for deterministic listings
    order: Vec<String>,
}

impl ProviderRegistry {
    /// Build a registry from a list of descriptors, preserving order
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Self {
        let providers = DashMap::new();
        let mut order = Vec::new();

        for descriptor in descriptors {
            order.push(descriptor.name.clone());
            providers.insert(descriptor.name.clone(), Arc::new(descriptor));
        }

        Self { providers, order }
    }

    /// Build a registry from configuration
    pub fn from_config<'a, I>(configs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a ProviderConfig)>,
    {
        let descriptors = configs
            .into_iter()
            .map(|(name, config)| ProviderDescriptor {
                name: name.clone(),
                status: config.status,
                supported_types: config.types.clone(),
                capabilities: config.capabilities.clone(),
                max_concurrent: config.max_concurrent,
                base_cost: config.base_cost,
                max_cost: config.max_cost,
                cost_efficiency: config.cost_efficiency,
            })
            .collect();

        Self::new(descriptors)
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<ProviderDescriptor>> {
        self.providers.get(name).map(|entry| Arc::clone(&entry))
    }

    /// All providers in declaration order
    pub fn list(&self) -> Vec<Arc<ProviderDescriptor>> {
        self.order.iter().filter_map(|name| self.get(name)).collect()
    }

    /// Providers supporting the given model type, in declaration order
    pub fn list_by_type(&self, model_type: ModelType) -> Vec<Arc<ProviderDescriptor>> {
        self.list()
            .into_iter()
            .filter(|descriptor| descriptor.supports(model_type))
            .collect()
    }

    /// Atomically replace a provider's descriptor
    ///
    /// Applied when a health event changes a provider's status. Replacing
    /// a name that was never configured is ignored.
    pub fn replace(&self, descriptor: ProviderDescriptor) {
        if !self.order.contains(&descriptor.name) {
            tracing::warn!(provider = %descriptor.name, "ignoring replacement for unknown provider");
            return;
        }
        self.providers
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }
}
