//! Port knowledge base and scan presets.

use std::time::Duration;

use crate::types::{PortInfo, Risk, ScanType};

struct KnownPort {
    port: u16,
    service: &'static str,
    description: &'static str,
    risk: Risk,
    recommendation: &'static str,
}

const fn known(
    port: u16,
    service: &'static str,
    description: &'static str,
    risk: Risk,
    recommendation: &'static str,
) -> KnownPort {
    KnownPort {
        port,
        service,
        description,
        risk,
        recommendation,
    }
}

/// Curated knowledge base, sorted by port number.
#[rustfmt::skip]
const KNOWN_PORTS: &[KnownPort] = &[
    known(20, "FTP Data", "File Transfer Protocol - Data Transfer", Risk::High,
        "Use SFTP (port 22) instead. FTP transmits data unencrypted."),
    known(21, "FTP", "File Transfer Protocol - Control", Risk::High,
        "Replace with SFTP. FTP sends credentials in plain text."),
    known(22, "SSH", "Secure Shell - Remote server access", Risk::Medium,
        "Use key-based authentication, disable password login, and change default port."),
    known(23, "Telnet", "Unencrypted remote access", Risk::High,
        "Disable immediately. Use SSH instead. Telnet is extremely insecure."),
    known(25, "SMTP", "Simple Mail Transfer Protocol - Email sending", Risk::Medium,
        "Use authentication and encryption. Vulnerable to spam relay if misconfigured."),
    known(53, "DNS", "Domain Name System", Risk::Low,
        "Ensure DNS amplification attacks are mitigated."),
    known(80, "HTTP", "HyperText Transfer Protocol - Web traffic", Risk::Low,
        "Redirect all traffic to HTTPS (port 443) for encryption."),
    known(110, "POP3", "Post Office Protocol - Email retrieval", Risk::Medium,
        "Use POP3S (port 995) or IMAP with SSL/TLS instead."),
    known(143, "IMAP", "Internet Message Access Protocol - Email access", Risk::Medium,
        "Use IMAPS (port 993) for encrypted email access."),
    known(443, "HTTPS", "HTTP Secure - Encrypted web traffic", Risk::Low,
        "Ensure valid SSL/TLS certificates and strong cipher suites."),
    known(445, "SMB", "Server Message Block - Windows file sharing", Risk::High,
        "Block from internet. Frequent target for ransomware attacks."),
    known(465, "SMTPS", "SMTP Secure - Encrypted email sending", Risk::Low,
        "Use with proper authentication to prevent spam relay."),
    known(587, "SMTP", "Mail submission - Modern email sending", Risk::Low,
        "Preferred port for email submission with STARTTLS."),
    known(993, "IMAPS", "IMAP Secure - Encrypted email access", Risk::Low,
        "Secure alternative to port 143."),
    known(995, "POP3S", "POP3 Secure - Encrypted email retrieval", Risk::Low,
        "Secure alternative to port 110."),
    known(1433, "MSSQL", "Microsoft SQL Server database", Risk::High,
        "Never expose to internet. Use VPN or firewall rules."),
    known(1521, "Oracle DB", "Oracle Database listener", Risk::High,
        "Restrict access to trusted IPs only."),
    known(3306, "MySQL", "MySQL/MariaDB database server", Risk::High,
        "Never expose to internet. Bind to localhost only."),
    known(3389, "RDP", "Remote Desktop Protocol - Windows remote access", Risk::High,
        "Disable if not needed. Use VPN, change default port, enable NLA."),
    known(5432, "PostgreSQL", "PostgreSQL database server", Risk::High,
        "Never expose directly. Use SSH tunneling or private network."),
    known(5900, "VNC", "Virtual Network Computing - Remote desktop", Risk::High,
        "Use SSH tunneling. VNC authentication is weak."),
    known(6379, "Redis", "Redis in-memory database", Risk::High,
        "Never expose to internet. No authentication by default."),
    known(8080, "HTTP Alt", "Alternative HTTP port - Web applications", Risk::Low,
        "Often used for development. Secure like port 80/443."),
    known(8443, "HTTPS Alt", "Alternative HTTPS port", Risk::Low,
        "Ensure proper SSL/TLS configuration."),
    known(27017, "MongoDB", "MongoDB database server", Risk::High,
        "Never expose publicly. Enable authentication, use firewall rules."),
];

const QUICK_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 3306, 3389, 5432, 8080, 27017,
];

const STANDARD_PORTS: &[u16] = &[
    20, 21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 465, 587, 993, 995, 1433,
    1521, 3306, 3389, 5432, 5900, 6379, 8080, 8443, 27017,
];

const FULL_RANGE_END: u16 = 100;

/// Look up the knowledge base record for `port`.
///
/// Total: ports outside the curated set resolve to an `Unknown` record with low risk.
pub fn lookup(port: u16) -> PortInfo {
    match KNOWN_PORTS.binary_search_by_key(&port, |k| k.port) {
        Ok(idx) => {
            let k = &KNOWN_PORTS[idx];
            PortInfo {
                port,
                service: k.service.to_string(),
                description: k.description.to_string(),
                risk: k.risk,
                recommendation: k.recommendation.to_string(),
            }
        }
        Err(_) => PortInfo {
            port,
            service: "Unknown".to_string(),
            description: "No information available for this port".to_string(),
            risk: Risk::Low,
            recommendation: "Research this port number for potential security implications."
                .to_string(),
        },
    }
}

/// Whether `port` has a curated knowledge base entry.
pub fn is_known(port: u16) -> bool {
    KNOWN_PORTS.binary_search_by_key(&port, |k| k.port).is_ok()
}

/// All curated records in ascending port order.
pub fn known_ports() -> Vec<PortInfo> {
    KNOWN_PORTS.iter().map(|k| lookup(k.port)).collect()
}

/// The fixed, ordered port list for a scan preset.
pub fn scan_ports(scan_type: ScanType) -> Vec<u16> {
    match scan_type {
        ScanType::Quick => QUICK_PORTS.to_vec(),
        ScanType::Standard => STANDARD_PORTS.to_vec(),
        ScanType::Full => (1..=FULL_RANGE_END).collect(),
    }
}

/// Target wall-clock length of a paced scan.
pub fn estimated_duration(scan_type: ScanType) -> Duration {
    let secs = match scan_type {
        ScanType::Quick => 8,
        ScanType::Standard => 15,
        ScanType::Full => 45,
    };
    Duration::from_secs(secs)
}
