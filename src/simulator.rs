//! Target classification and the randomized open/closed/filtered outcome model.
//!
//! No sockets are opened. Every outcome is a fresh draw from the injected
//! [`rand::Rng`], so repeated scans of one target can differ.

use rand::Rng;
use serde::Serialize;

use crate::ports;
use crate::types::{PortStatus, ScanResult, ScanType};

const LOCALHOST_LIKELY: &[u16] = &[22, 80, 443, 3000, 3306, 5432, 8080, 27017];
const PRIVATE_LIKELY: &[u16] = &[22, 80, 443, 445, 8080];
const WEB_PORTS: &[u16] = &[80, 443];
const SERVER_PORTS: &[u16] = &[22, 25, 53, 110, 143, 465, 587, 993, 995];

/// Closed ports are reported as filtered when a fresh draw exceeds this.
const FILTERED_THRESHOLD: f64 = 0.8;

/// Coarse category of a scan target, used to bias simulated outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    Localhost,
    PrivateNetwork,
    PublicDomain,
    Default,
}

impl TargetClass {
    pub fn classify(target: &str) -> Self {
        if target == "localhost" || target == "127.0.0.1" {
            TargetClass::Localhost
        } else if is_private_prefix(target) {
            TargetClass::PrivateNetwork
        } else if target.chars().any(|c| c.is_ascii_alphabetic()) {
            TargetClass::PublicDomain
        } else {
            TargetClass::Default
        }
    }

    /// Draw threshold for `port`: the port is open when the draw exceeds it.
    pub fn open_threshold(self, port: u16) -> f64 {
        match self {
            TargetClass::Localhost if LOCALHOST_LIKELY.contains(&port) => 0.30,
            TargetClass::Localhost => 0.85,
            TargetClass::PrivateNetwork if PRIVATE_LIKELY.contains(&port) => 0.40,
            TargetClass::PrivateNetwork => 0.90,
            TargetClass::PublicDomain if WEB_PORTS.contains(&port) => 0.10,
            TargetClass::PublicDomain if SERVER_PORTS.contains(&port) => 0.60,
            TargetClass::PublicDomain => 0.95,
            TargetClass::Default => 0.90,
        }
    }
}

/// Prefix match on 192.168., 10. and 172.16. through 172.31.
fn is_private_prefix(target: &str) -> bool {
    if target.starts_with("192.168.") || target.starts_with("10.") {
        return true;
    }
    let Some(rest) = target.strip_prefix("172.") else {
        return false;
    };
    let Some((second, _)) = rest.split_once('.') else {
        return false;
    };
    second.len() == 2
        && second
            .parse::<u8>()
            .map(|n| (16..=31).contains(&n))
            .unwrap_or(false)
}

/// Port list and outcome model for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub ports: Vec<u16>,
    pub class: TargetClass,
}

impl ScanPlan {
    /// Fresh independent draw on every call; nothing is memoized.
    pub fn is_open<R: Rng + ?Sized>(&self, port: u16, rng: &mut R) -> bool {
        let draw: f64 = rng.gen();
        draw > self.class.open_threshold(port)
    }
}

/// Classify `target` and resolve the preset port list for `scan_type`.
pub fn plan(target: &str, scan_type: ScanType) -> ScanPlan {
    ScanPlan {
        ports: ports::scan_ports(scan_type),
        class: TargetClass::classify(target),
    }
}

/// Build the result record for one port.
///
/// Closed ports are reported as filtered with probability 0.2. `_target` is
/// accepted for symmetry with the planner but does not affect the outcome.
pub fn build_result<R: Rng + ?Sized>(
    port: u16,
    is_open: bool,
    _target: &str,
    rng: &mut R,
) -> ScanResult {
    let status = if is_open {
        PortStatus::Open
    } else if rng.gen::<f64>() > FILTERED_THRESHOLD {
        PortStatus::Filtered
    } else {
        PortStatus::Closed
    };
    let info = ports::lookup(port);
    ScanResult {
        port,
        status,
        service: info.service,
        description: info.description,
        risk: info.risk,
        recommendation: info.recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    /// Yields exactly 0.5 from `gen::<f64>()` on every call.
    fn half() -> StepRng {
        StepRng::new(1 << 63, 0)
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(TargetClass::classify("localhost"), TargetClass::Localhost);
        assert_eq!(TargetClass::classify("127.0.0.1"), TargetClass::Localhost);
        assert_eq!(TargetClass::classify("192.168.1.10"), TargetClass::PrivateNetwork);
        assert_eq!(TargetClass::classify("10.0.0.1"), TargetClass::PrivateNetwork);
        assert_eq!(TargetClass::classify("172.16.0.1"), TargetClass::PrivateNetwork);
        assert_eq!(TargetClass::classify("172.31.255.1"), TargetClass::PrivateNetwork);
        assert_eq!(TargetClass::classify("172.32.0.1"), TargetClass::Default);
        assert_eq!(TargetClass::classify("172.15.0.1"), TargetClass::Default);
        assert_eq!(TargetClass::classify("example.com"), TargetClass::PublicDomain);
        assert_eq!(TargetClass::classify("8.8.8.8"), TargetClass::Default);
    }

    #[test]
    fn private_prefix_wins_over_letters() {
        assert_eq!(TargetClass::classify("10.internal"), TargetClass::PrivateNetwork);
    }

    #[test]
    fn midpoint_draw_opens_only_favoured_ports() {
        let mut rng = half();
        let local = plan("localhost", ScanType::Quick);
        assert!(local.is_open(22, &mut rng));
        assert!(!local.is_open(21, &mut rng));

        let private = plan("192.168.0.5", ScanType::Quick);
        assert!(private.is_open(445, &mut rng));
        assert!(!private.is_open(3306, &mut rng));

        let public = plan("example.com", ScanType::Quick);
        assert!(public.is_open(443, &mut rng));
        assert!(!public.is_open(25, &mut rng));
        assert!(!public.is_open(3389, &mut rng));

        let other = plan("8.8.8.8", ScanType::Quick);
        assert!(!other.is_open(80, &mut rng));
    }

    #[test]
    fn extreme_draws() {
        let mut zero = StepRng::new(0, 0);
        let mut top = StepRng::new(u64::MAX, 0);
        let p = plan("8.8.8.8", ScanType::Full);
        assert!(p.ports.iter().all(|&port| !p.is_open(port, &mut zero)));
        assert!(p.ports.iter().all(|&port| p.is_open(port, &mut top)));
    }

    #[test]
    fn build_result_status_and_metadata() {
        let open = build_result(3306, true, "localhost", &mut StepRng::new(0, 0));
        assert_eq!(open.status, PortStatus::Open);
        assert_eq!(open.service, "MySQL");

        let closed = build_result(80, false, "localhost", &mut half());
        assert_eq!(closed.status, PortStatus::Closed);

        let filtered = build_result(80, false, "localhost", &mut StepRng::new(u64::MAX, 0));
        assert_eq!(filtered.status, PortStatus::Filtered);
        assert_eq!(filtered.risk, ports::lookup(80).risk);
    }
}
