//! Radar-site metadata: geodetic origin and reliability per data source.
//!
//! Polar measurements (range/azimuth) only become positions once the
//! reporting radar's origin is known. Reliability scales track quality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::DataSource;

/// One surveillance source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarSite {
    pub sac: u8,
    pub sic: u8,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Source reliability in (0, 1].
    #[serde(default = "default_reliability")]
    pub reliability: f64,
}

fn default_reliability() -> f64 {
    1.0
}

impl RadarSite {
    pub fn source(&self) -> DataSource {
        DataSource::new(self.sac, self.sic)
    }
}

/// Supplies site metadata by data source.
pub trait SiteProvider: Send + Sync {
    fn site(&self, source: DataSource) -> Option<&RadarSite>;

    /// Reliability of a source; unknown sources count as fully reliable.
    fn reliability(&self, source: DataSource) -> f64 {
        self.site(source).map(|s| s.reliability).unwrap_or(1.0)
    }
}

/// In-memory site table, usually built from the `sites` config section.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<DataSource, RadarSite>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sites(sites: &[RadarSite]) -> Self {
        let mut reg = SiteRegistry::new();
        for s in sites {
            reg.insert(s.clone());
        }
        reg
    }

    /// Insert or replace a site.
    pub fn insert(&mut self, site: RadarSite) {
        self.sites.insert(site.source(), site);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RadarSite> {
        self.sites.values()
    }
}

impl SiteProvider for SiteRegistry {
    fn site(&self, source: DataSource) -> Option<&RadarSite> {
        self.sites.get(&source)
    }
}
