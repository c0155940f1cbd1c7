//! Tiered discovery of the backend base URL.
//!
//! Tiers run strictly one after another: cached URL, direct candidates (stored
//! URL, configured fallback, `.local` hostnames), own-subnet priority hosts,
//! own-subnet sweep, common-subnet priority hosts, common-subnet sweeps. The
//! first healthy candidate is accepted and persisted. Hosts already probed by a
//! tier are not probed again by later tiers of the same attempt. The cache check
//! is not a tier, so a cached URL that missed it is still tried directly.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::candidates::{dedup, CandidateGenerator, SubnetPrefix};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::network::{is_lan_ipv4, InterfaceAddress, LocalAddress};
use crate::probe::{HealthProbe, HttpProbe};
use crate::scanner::{first_healthy, scan};
use crate::storage::{KeyringStorage, UrlStorage};
use crate::store::BaseUrlStore;
use crate::url::BaseUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Cached,
    DirectProbe,
    OwnSubnetPriority,
    OwnSubnetFull,
    CommonSubnetPriority,
    CommonSubnetFull,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Cached => "cached",
            Tier::DirectProbe => "direct",
            Tier::OwnSubnetPriority => "own-subnet priority",
            Tier::OwnSubnetFull => "own-subnet sweep",
            Tier::CommonSubnetPriority => "common-subnet priority",
            Tier::CommonSubnetFull => "common-subnet sweep",
        };
        f.write_str(name)
    }
}

/// The discovery service. Owns the session base URL through its store; share it
/// behind an `Arc`.
pub struct Discovery {
    config: DiscoveryConfig,
    generator: CandidateGenerator,
    fallback: Option<BaseUrl>,
    common_prefixes: Vec<SubnetPrefix>,
    store: BaseUrlStore,
    probe: Arc<dyn HealthProbe>,
    local: Arc<dyn LocalAddress>,
    sweep: tokio::sync::Mutex<()>,
}

/// Candidates probed so far in one attempt.
type Tried = HashSet<BaseUrl>;

impl Discovery {
    /// Validates `config` up front; a bad configuration never reaches a sweep.
    pub fn new(
        config: DiscoveryConfig,
        probe: Arc<dyn HealthProbe>,
        local: Arc<dyn LocalAddress>,
        storage: Arc<dyn UrlStorage>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Discovery {
            generator: CandidateGenerator::new(config.port, config.priority_octets.clone()),
            fallback: config.fallback()?,
            common_prefixes: config.subnet_prefixes(),
            store: BaseUrlStore::new(storage),
            probe,
            local,
            sweep: tokio::sync::Mutex::new(()),
            config,
        })
    }

    /// HTTP probes, interface address lookup and keyring persistence.
    pub fn with_defaults(config: DiscoveryConfig) -> Result<Self> {
        Discovery::new(
            config,
            Arc::new(HttpProbe::new()?),
            Arc::new(InterfaceAddress),
            Arc::new(KeyringStorage::new()),
        )
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn store(&self) -> &BaseUrlStore {
        &self.store
    }

    /// Current base URL, empty before the first successful discovery. No I/O.
    pub fn base_url(&self) -> String {
        self.store.base_url()
    }

    pub fn build_url(&self, path: &str) -> String {
        self.store.build_url(path)
    }

    /// Overrides the base URL. With `persist`, waits until the durable copy is
    /// written (write failures are logged, not returned).
    pub async fn set_base_url(&self, url: &str, persist: bool) -> Result<BaseUrl> {
        let url = self.store.set(url, persist)?;
        if persist {
            self.store.flush().await;
        }
        Ok(url)
    }

    pub async fn ensure_base_url(&self, force: bool) -> Result<BaseUrl> {
        self.ensure_base_url_with_tier(force).await.map(|(url, _)| url)
    }

    /// Like [`Discovery::ensure_base_url`], also reporting which tier found the URL.
    pub async fn ensure_base_url_with_tier(&self, force: bool) -> Result<(BaseUrl, Tier)> {
        // Read before the cache check, so a URL accepted by another caller while
        // that check is in flight is noticed below.
        let generation = self.store.generation();
        if !force {
            if let Some(current) = self.store.get() {
                if self.probe.probe(&current, self.config.cache_timeout()).await {
                    return Ok((current, Tier::Cached));
                }
                // Not marked as tried: one slow answer must not rule the host out
                // of the direct tier.
                log::info!("Base URL {} stopped answering, rediscovering", current);
            }
        }

        let mut tried = Tried::new();
        let _sweep = self.sweep.lock().await;
        if !force && self.store.generation() != generation {
            // Another caller finished a sweep while we waited for ours.
            if let Some(current) = self.store.get() {
                return Ok((current, Tier::Cached));
            }
        }

        match self.run_tiers(&mut tried).await {
            Some((url, tier)) => {
                log::info!("Found backend at {} ({})", url, tier);
                Ok((self.store.accept(url, true), tier))
            }
            None => {
                log::warn!("No backend answered after probing {} candidates", tried.len());
                Err(DiscoveryError::NotFound)
            }
        }
    }

    async fn run_tiers(&self, tried: &mut Tried) -> Option<(BaseUrl, Tier)> {
        let persisted = self.store.load_persisted().await;
        let direct = self.generator.direct_candidates(
            persisted.as_ref(),
            self.fallback.as_ref(),
            &self.config.hostnames,
        );
        if let Some(url) = self
            .sequential(Tier::DirectProbe, direct, self.config.direct_timeout(), tried)
            .await
        {
            return Some((url, Tier::DirectProbe));
        }

        if let Some((prefix, own_last)) = self.own_subnet() {
            let own = BaseUrl::from_host(&prefix.host(own_last).to_string(), self.config.port);
            tried.insert(own);

            let priority = self.generator.priority_hosts(prefix);
            if let Some(url) = self
                .sequential(Tier::OwnSubnetPriority, priority, self.config.priority_timeout(), tried)
                .await
            {
                return Some((url, Tier::OwnSubnetPriority));
            }

            let sweep = self.generator.subnet_candidates(prefix, Some(own_last));
            if let Some(url) = self.concurrent(Tier::OwnSubnetFull, sweep, tried).await {
                return Some((url, Tier::OwnSubnetFull));
            }
        }

        let priority = dedup(
            self.common_prefixes
                .iter()
                .flat_map(|p| self.generator.priority_hosts(*p)),
        );
        if let Some(url) = self
            .sequential(Tier::CommonSubnetPriority, priority, self.config.priority_timeout(), tried)
            .await
        {
            return Some((url, Tier::CommonSubnetPriority));
        }

        for prefix in &self.common_prefixes {
            let sweep = self.generator.full_prefix_candidates(*prefix);
            if let Some(url) = self.concurrent(Tier::CommonSubnetFull, sweep, tried).await {
                return Some((url, Tier::CommonSubnetFull));
            }
        }
        None
    }

    /// Own /24 and last octet. Lookup failures and unusable addresses skip the
    /// own-subnet tiers.
    fn own_subnet(&self) -> Option<(SubnetPrefix, u8)> {
        match self.local.local_ip() {
            Ok(IpAddr::V4(ip)) if is_lan_ipv4(ip) => Some((SubnetPrefix::of(ip), ip.octets()[3])),
            Ok(ip) => {
                log::info!("Local address {} is not a LAN IPv4 address, skipping own subnet", ip);
                None
            }
            Err(e) => {
                log::warn!("Local address lookup failed ({}), skipping own subnet", e);
                None
            }
        }
    }

    async fn sequential(
        &self,
        tier: Tier,
        candidates: Vec<BaseUrl>,
        timeout: Duration,
        tried: &mut Tried,
    ) -> Option<BaseUrl> {
        let fresh = untried(candidates, tried);
        if fresh.is_empty() {
            return None;
        }
        log::info!("Trying {} {} candidates", fresh.len(), tier);
        let found = first_healthy(self.probe.as_ref(), &fresh, timeout).await;
        match &found {
            Some(url) => {
                let position = fresh.iter().position(|c| c == url).unwrap_or(fresh.len());
                tried.extend(fresh.into_iter().take(position + 1));
            }
            None => tried.extend(fresh),
        }
        found
    }

    async fn concurrent(&self, tier: Tier, candidates: Vec<BaseUrl>, tried: &mut Tried) -> Option<BaseUrl> {
        let fresh = untried(candidates, tried);
        if fresh.is_empty() {
            return None;
        }
        log::info!(
            "Sweeping {} {} candidates, {} at a time",
            fresh.len(),
            tier,
            self.config.concurrency
        );
        let found = scan(
            self.probe.as_ref(),
            &fresh,
            self.config.concurrency,
            self.config.scan_timeout(),
        )
        .await;
        tried.extend(fresh);
        found
    }
}

fn untried(candidates: Vec<BaseUrl>, tried: &Tried) -> Vec<BaseUrl> {
    candidates.into_iter().filter(|c| !tried.contains(c)).collect()
}
