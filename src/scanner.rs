//! Sequential and bounded-concurrency sweeps over candidate lists.
//!
//! Workers are futures polled on the caller's task, not spawned threads. They
//! share a cursor: claiming an index is a single `fetch_add`, so no two workers
//! probe the same candidate. Once a worker finds a healthy candidate the others
//! stop claiming; probes already in flight finish and their results are dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;

use crate::probe::HealthProbe;
use crate::url::BaseUrl;

/// Probes one candidate at a time, first healthy wins.
pub async fn first_healthy<P>(probe: &P, candidates: &[BaseUrl], timeout: Duration) -> Option<BaseUrl>
where
    P: HealthProbe + ?Sized,
{
    for candidate in candidates {
        if probe.probe(candidate, timeout).await {
            return Some(candidate.clone());
        }
    }
    None
}

/// Runs up to `concurrency` probes at once and returns whichever healthy
/// candidate answers first, or `None` when the list is exhausted.
pub async fn scan<P>(
    probe: &P,
    candidates: &[BaseUrl],
    concurrency: usize,
    timeout: Duration,
) -> Option<BaseUrl>
where
    P: HealthProbe + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }
    let shared = Sweep {
        candidates,
        timeout,
        cursor: AtomicUsize::new(0),
        found: AtomicBool::new(false),
        winner: Mutex::new(None),
    };
    let workers = concurrency.clamp(1, candidates.len());
    join_all((0..workers).map(|_| shared.worker(probe))).await;
    shared.winner.into_inner().unwrap_or_else(PoisonError::into_inner)
}

struct Sweep<'a> {
    candidates: &'a [BaseUrl],
    timeout: Duration,
    cursor: AtomicUsize,
    found: AtomicBool,
    winner: Mutex<Option<BaseUrl>>,
}

impl Sweep<'_> {
    async fn worker<P>(&self, probe: &P)
    where
        P: HealthProbe + ?Sized,
    {
        while !self.found.load(Ordering::Acquire) {
            let index = self.cursor.fetch_add(1, Ordering::AcqRel);
            let Some(candidate) = self.candidates.get(index) else {
                return;
            };
            if probe.probe(candidate, self.timeout).await {
                if !self.found.swap(true, Ordering::AcqRel) {
                    *self.winner.lock().unwrap_or_else(PoisonError::into_inner) = Some(candidate.clone());
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct ScriptedProbe {
        healthy: HashSet<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(healthy: &[&BaseUrl], delay: Duration) -> Self {
            ScriptedProbe {
                healthy: healthy.iter().map(|u| u.to_string()).collect(),
                delay,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, candidate: &BaseUrl, _timeout: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.healthy.contains(candidate.as_str())
        }
    }

    fn url(last: u8) -> BaseUrl {
        BaseUrl::from_host(&format!("192.168.1.{last}"), 8000)
    }

    const TIMEOUT: Duration = Duration::from_millis(700);

    #[tokio::test]
    async fn scan_finds_the_only_healthy_candidate_in_any_order() {
        let (a, b, c) = (url(1), url(2), url(3));
        let probe = ScriptedProbe::new(&[&b], Duration::from_millis(2));
        for order in [
            vec![a.clone(), b.clone(), c.clone()],
            vec![b.clone(), c.clone(), a.clone()],
            vec![c.clone(), a.clone(), b.clone()],
        ] {
            assert_eq!(scan(&probe, &order, 2, TIMEOUT).await, Some(b.clone()));
        }
    }

    #[tokio::test]
    async fn scan_returns_none_when_nothing_is_healthy() {
        let probe = ScriptedProbe::new(&[], Duration::ZERO);
        let list = vec![url(1), url(2), url(3)];
        assert_eq!(scan(&probe, &list, 2, TIMEOUT).await, None);
        assert_eq!(probe.calls(), 3);
    }

    #[tokio::test]
    async fn scan_of_empty_list_probes_nothing() {
        let probe = ScriptedProbe::new(&[], Duration::ZERO);
        assert_eq!(scan(&probe, &[], 24, TIMEOUT).await, None);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn scan_stops_claiming_after_a_hit() {
        let list: Vec<BaseUrl> = (1..=254).map(url).collect();
        let probe = ScriptedProbe::new(&[&list[0]], Duration::from_millis(5));
        let found = scan(&probe, &list, 4, TIMEOUT).await;
        assert_eq!(found, Some(list[0].clone()));
        // The first round claims one candidate per worker; nobody claims after that.
        assert!(probe.calls() <= 4, "probed {} candidates", probe.calls());
    }

    #[tokio::test]
    async fn scan_probes_each_candidate_at_most_once() {
        let list: Vec<BaseUrl> = (1..=50).map(url).collect();
        let probe = ScriptedProbe::new(&[], Duration::from_millis(1));
        assert_eq!(scan(&probe, &list, 24, TIMEOUT).await, None);
        assert_eq!(probe.calls(), list.len());
    }

    #[tokio::test]
    async fn first_healthy_respects_order() {
        let list = vec![url(1), url(2), url(3)];
        let probe = ScriptedProbe::new(&[&list[1], &list[2]], Duration::ZERO);
        assert_eq!(first_healthy(&probe, &list, TIMEOUT).await, Some(list[1].clone()));
        assert_eq!(probe.calls(), 2);
    }
}
