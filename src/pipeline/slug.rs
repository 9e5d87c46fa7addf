//! Run-unique output names for resolved pages.
//!
//! Naming is order-dependent: the first page to claim a slug keeps it, later
//! pages fall back to `parent-slug`, then to numeric suffixes. The registry is
//! an explicit value owned by the run, never global state, so two runs in the
//! same process cannot see each other's names.

use crate::pipeline::source::PageDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use tracing::debug;

/// A page descriptor plus its run-unique file stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPage {
    #[serde(flatten)]
    pub descriptor: PageDescriptor,
    pub final_name: String,
}

impl Deref for NamedPage {
    type Target = PageDescriptor;

    fn deref(&self) -> &PageDescriptor {
        &self.descriptor
    }
}

/// Names handed out during one run.
///
/// Maps every registered name to the number of times it was requested as a
/// candidate (1 = claimed without contention).
#[derive(Debug, Default, Clone)]
pub struct NamingRegistry {
    names: HashMap<String, usize>,
}

impl NamingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// How often `name` was requested; 0 if never registered.
    pub fn requests(&self, name: &str) -> usize {
        self.names.get(name).copied().unwrap_or(0)
    }

    /// Pick and register a unique name for `(raw_slug, parent_slug)`.
    pub fn assign(&mut self, raw_slug: &str, parent_slug: Option<&str>) -> String {
        let mut candidate = raw_slug.to_string();
        let mut taken = self.contest(&candidate);

        if taken {
            if let Some(parent) = parent_slug {
                candidate = format!("{parent}-{raw_slug}");
                taken = self.contest(&candidate);
            }
        }

        if taken {
            let base = candidate;
            let mut n = 2usize;
            candidate = format!("{base}-{n}");
            while self.contains(&candidate) {
                n += 1;
                candidate = format!("{base}-{n}");
            }
        }

        self.names.insert(candidate.clone(), 1);
        candidate
    }

    /// True if `name` is taken; bumps its request count when it is.
    fn contest(&mut self, name: &str) -> bool {
        match self.names.get_mut(name) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }
}

/// Name a single descriptor against `registry`.
pub fn name_page(registry: &mut NamingRegistry, descriptor: PageDescriptor) -> NamedPage {
    let final_name = registry.assign(&descriptor.raw_slug, descriptor.parent_slug.as_deref());
    if final_name != descriptor.raw_slug {
        debug!(
            "Slug '{}' taken; {} → {}",
            descriptor.raw_slug, descriptor.source_url, final_name
        );
    }
    NamedPage {
        descriptor,
        final_name,
    }
}

/// Name every descriptor in encounter order.
pub fn deduplicate(
    registry: &mut NamingRegistry,
    descriptors: Vec<PageDescriptor>,
) -> Vec<NamedPage> {
    descriptors
        .into_iter()
        .map(|d| name_page(registry, d))
        .collect()
}
