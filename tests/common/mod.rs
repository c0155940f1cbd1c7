//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use drinkmaster_lib::{
    BaseUrl, Discovery, DiscoveryConfig, HealthProbe, MemoryStorage, StaticAddress,
};

/// Answers healthy for a fixed set of URLs and records every probe.
#[derive(Default)]
pub struct ScriptedProbe {
    healthy: Mutex<HashSet<String>>,
    slow: Mutex<HashMap<String, Duration>>,
    probed: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn healthy(urls: &[&str]) -> Arc<Self> {
        let probe = ScriptedProbe::default();
        probe.set_healthy(urls);
        Arc::new(probe)
    }

    pub fn set_healthy(&self, urls: &[&str]) {
        *self.healthy.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
    }

    /// Makes every probe of `url` take `delay` before answering.
    pub fn set_slow(&self, url: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, candidate: &BaseUrl, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.probed.lock().unwrap().push(candidate.to_string());
        let delay = self.slow.lock().unwrap().get(candidate.as_str()).copied();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            // Suspend like a real request would, so concurrent callers interleave.
            None => tokio::task::yield_now().await,
        }
        self.healthy.lock().unwrap().contains(candidate.as_str())
    }
}

pub fn discovery_with(
    config: DiscoveryConfig,
    probe: Arc<ScriptedProbe>,
    ip: Option<&str>,
    storage: Arc<MemoryStorage>,
) -> Discovery {
    Discovery::new(
        config,
        probe,
        Arc::new(StaticAddress(ip.map(|s| s.parse().unwrap()))),
        storage,
    )
    .unwrap()
}
