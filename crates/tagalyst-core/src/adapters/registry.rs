use std::rc::Rc;

use url::Url;

use super::{HostProfile, MarkedThreadAdapter, ThreadAdapter};

/// A host the engine knows how to read.
#[derive(Clone, Copy)]
pub struct AdapterDescriptor {
    pub name: &'static str,
    pub supports: fn(&Url) -> bool,
    pub create: fn() -> Rc<dyn ThreadAdapter>,
}

impl std::fmt::Debug for AdapterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn is_chatgpt_host(url: &Url) -> bool {
    matches!(url.host_str(), Some("chatgpt.com" | "chat.openai.com"))
}

fn is_web(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn create_chatgpt() -> Rc<dyn ThreadAdapter> {
    Rc::new(MarkedThreadAdapter::new(HostProfile::chatgpt()))
}

fn create_generic() -> Rc<dyn ThreadAdapter> {
    Rc::new(MarkedThreadAdapter::new(HostProfile::generic()))
}

/// Ordered list of adapter descriptors; the first match wins.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    descriptors: Vec<AdapterDescriptor>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in hosts followed by the generic fallback
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(AdapterDescriptor {
            name: "chatgpt",
            supports: is_chatgpt_host,
            create: create_chatgpt,
        });
        registry.register(AdapterDescriptor {
            name: "generic",
            supports: is_web,
            create: create_generic,
        });
        registry
    }

    pub fn register(&mut self, descriptor: AdapterDescriptor) {
        self.descriptors.push(descriptor);
    }

    pub fn descriptors(&self) -> &[AdapterDescriptor] {
        &self.descriptors
    }

    /// Adapter for `location`, or `None` when no host matches (do not activate).
    pub fn select(&self, location: &str) -> Option<Rc<dyn ThreadAdapter>> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Unparseable location {:?}: {}", location, e);
                return None;
            }
        };
        let descriptor = self.descriptors.iter().find(|d| (d.supports)(&url))?;
        tracing::debug!("Selected {} adapter for {}", descriptor.name, url);
        Some((descriptor.create)())
    }
}
