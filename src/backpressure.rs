//! Backpressure manager (C3): time-decayed pressure scoring shared across
//! workers, with an in-process fallback when no external shared store is
//! wired in.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const RECOVERY_WINDOW_SECONDS: f64 = 60.0;
pub const COUNT_429_CRITICAL: f64 = 25.0;
pub const PAUSE_THRESHOLD: f64 = 0.8;
pub const RESUME_THRESHOLD: f64 = 0.5;
pub const MIN_DELAY_SECONDS: f64 = 0.1;
pub const MAX_DELAY_SECONDS: f64 = 5.0;
pub const PROXY_DEGRADED_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    GeminiPrimary,
    GeminiFallback,
    GeminiFallback2,
    GeminiFallback3,
    SemanticScholar,
    Crossref,
}

impl ApiKind {
    const ALL: [ApiKind; 6] = [
        ApiKind::GeminiPrimary,
        ApiKind::GeminiFallback,
        ApiKind::GeminiFallback2,
        ApiKind::GeminiFallback3,
        ApiKind::SemanticScholar,
        ApiKind::Crossref,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyHealth {
    Healthy,
    Degraded,
}

#[derive(Debug, Default)]
struct ApiCounter {
    count_429: u32,
    last_429_ts: Option<f64>,
}

#[derive(Debug)]
struct ProxyState {
    count_429: u32,
    health: ProxyHealth,
}

/// Abstract shared key-value behavior a `PressureStore` needs. A real
/// deployment can back this with an external store (e.g. a distributed
/// cache); the in-process `LocalPressureStore` below is the always-available
/// fallback.
pub trait PressureStore: Send + Sync {
    fn api_counter(&self, api: ApiKind) -> (u32, Option<f64>);
    fn record_429(&self, api: ApiKind, now: f64);
    fn proxy_state(&self, proxy: &str) -> (u32, ProxyHealth);
    fn record_proxy_429(&self, proxy: &str, now: f64) -> ProxyHealth;
    fn reset_proxy(&self, proxy: &str);
    fn reset_all(&self);
}

#[derive(Default)]
pub struct LocalPressureStore {
    apis: Mutex<HashMap<ApiKind, ApiCounter>>,
    proxies: Mutex<HashMap<String, ProxyState>>,
}

impl LocalPressureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PressureStore for LocalPressureStore {
    fn api_counter(&self, api: ApiKind) -> (u32, Option<f64>) {
        let apis = self.apis.lock().unwrap();
        match apis.get(&api) {
            Some(c) => (c.count_429, c.last_429_ts),
            None => (0, None),
        }
    }

    fn record_429(&self, api: ApiKind, now: f64) {
        let mut apis = self.apis.lock().unwrap();
        let entry = apis.entry(api).or_default();
        entry.count_429 += 1;
        entry.last_429_ts = Some(now);
    }

    fn proxy_state(&self, proxy: &str) -> (u32, ProxyHealth) {
        let proxies = self.proxies.lock().unwrap();
        match proxies.get(proxy) {
            Some(p) => (p.count_429, p.health),
            None => (0, ProxyHealth::Healthy),
        }
    }

    fn record_proxy_429(&self, proxy: &str, _now: f64) -> ProxyHealth {
        let mut proxies = self.proxies.lock().unwrap();
        let entry = proxies.entry(proxy.to_string()).or_insert(ProxyState {
            count_429: 0,
            health: ProxyHealth::Healthy,
        });
        entry.count_429 += 1;
        if entry.count_429 >= PROXY_DEGRADED_THRESHOLD {
            entry.health = ProxyHealth::Degraded;
        }
        entry.health
    }

    fn reset_proxy(&self, proxy: &str) {
        let mut proxies = self.proxies.lock().unwrap();
        proxies.insert(
            proxy.to_string(),
            ProxyState {
                count_429: 0,
                health: ProxyHealth::Healthy,
            },
        );
    }

    fn reset_all(&self) {
        self.apis.lock().unwrap().clear();
        self.proxies.lock().unwrap().clear();
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub struct BackpressureManager {
    store: Box<dyn PressureStore>,
}

#[derive(Debug, Clone, Copy)]
pub struct BackpressureStats {
    pub global_pressure: f64,
    pub recommended_delay: f64,
    pub batch_size: u32,
    pub should_pause: bool,
}

impl Default for BackpressureManager {
    fn default() -> Self {
        Self::new(Box::new(LocalPressureStore::new()))
    }
}

impl BackpressureManager {
    pub fn new(store: Box<dyn PressureStore>) -> Self {
        BackpressureManager { store }
    }

    pub fn signal_429(&self, api: ApiKind, proxy: Option<&str>) {
        let now = now_secs();
        self.store.record_429(api, now);
        if let Some(proxy) = proxy {
            self.store.record_proxy_429(proxy, now);
        }
    }

    /// Time-decayed pressure in [0,1], mean across all adapters.
    pub fn global_pressure(&self) -> f64 {
        let now = now_secs();
        let pressures: Vec<f64> = ApiKind::ALL
            .iter()
            .map(|api| {
                let (count, last) = self.store.api_counter(*api);
                let time_since = last.map(|l| now - l).unwrap_or(RECOVERY_WINDOW_SECONDS);
                let decay_factor = (1.0 - time_since / RECOVERY_WINDOW_SECONDS).max(0.0);
                let effective_count = count as f64 * decay_factor;
                (effective_count / COUNT_429_CRITICAL).min(1.0)
            })
            .collect();
        if pressures.is_empty() {
            0.0
        } else {
            pressures.iter().sum::<f64>() / pressures.len() as f64
        }
    }

    pub fn recommended_delay(&self) -> f64 {
        let pressure = self.global_pressure();
        MIN_DELAY_SECONDS + pressure * (MAX_DELAY_SECONDS - MIN_DELAY_SECONDS)
    }

    pub fn should_pause_spawning(&self) -> bool {
        self.global_pressure() > PAUSE_THRESHOLD
    }

    pub fn can_resume_spawning(&self) -> bool {
        self.global_pressure() < RESUME_THRESHOLD
    }

    pub fn adaptive_batch_size(&self) -> u32 {
        let pressure = self.global_pressure();
        if pressure > 0.8 {
            5
        } else if pressure > 0.6 {
            10
        } else if pressure > 0.3 {
            15
        } else {
            25
        }
    }

    /// Returns the key with the lowest recent-429 count among the given
    /// `(key, api_kind)` candidates.
    pub fn best_key<'a>(&self, candidates: &[(&'a str, ApiKind)]) -> Option<(&'a str, ApiKind)> {
        candidates
            .iter()
            .map(|&(key, api)| {
                let (count, _) = self.store.api_counter(api);
                (key, api, count)
            })
            .min_by_key(|&(_, _, count)| count)
            .map(|(key, api, _)| (key, api))
    }

    /// Returns a healthy proxy, resetting the whole pool atomically if every
    /// proxy in it is currently degraded.
    pub fn healthy_proxy<'a>(&self, pool: &[&'a str]) -> Option<&'a str> {
        if pool.is_empty() {
            return None;
        }
        let healthy: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|p| self.store.proxy_state(p).1 == ProxyHealth::Healthy)
            .collect();
        if !healthy.is_empty() {
            return Some(healthy[rand::random::<usize>() % healthy.len()]);
        }
        for proxy in pool {
            self.store.reset_proxy(proxy);
        }
        Some(pool[rand::random::<usize>() % pool.len()])
    }

    pub fn stats(&self) -> BackpressureStats {
        BackpressureStats {
            global_pressure: self.global_pressure(),
            recommended_delay: self.recommended_delay(),
            batch_size: self.adaptive_batch_size(),
            should_pause: self.should_pause_spawning(),
        }
    }

    pub fn reset(&self) {
        self.store.reset_all();
    }
}
