// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for abuse simulation.

use community_guard::error::EndpointRejection;
use std::net::Ipv4Addr;

/// Generate a pool of distinct network addresses.
pub fn generate_addresses(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            Ipv4Addr::new(10, a, b, c).to_string()
        })
        .collect()
}

/// Generate a pool of account ids.
pub fn generate_account_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("account-{i:04}")).collect()
}

/// Case and whitespace variants of an identifier.
pub fn identifier_variants(id: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    for candidate in [
        id.to_string(),
        id.to_uppercase(),
        id.to_lowercase(),
        format!("{id} "),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Stored role strings that must not grant elevation.
pub fn spoofed_admin_roles() -> Vec<&'static str> {
    vec![
        "Admin",
        "ADMIN",
        " admin",
        "admin ",
        "admins",
        "administrator",
        "superuser",
        "root",
        "admin\0",
        "аdmin", // Cyrillic 'а'
    ]
}

/// Endpoints aimed at internal or unintended services, with the rule
/// each one must trip.
pub fn forged_endpoints() -> Vec<(&'static str, EndpointRejection)> {
    use EndpointRejection::*;
    vec![
        // Literal addresses, including alternate encodings
        ("https://127.0.0.1/", LiteralIpHost),
        ("https://169.254.169.254/latest/meta-data/", LiteralIpHost),
        ("https://10.0.0.1/admin", LiteralIpHost),
        ("https://2130706433/", LiteralIpHost),
        ("https://0x7f.0.0.1/", LiteralIpHost),
        ("https://0177.0.0.1/", LiteralIpHost),
        ("https://[::1]/", LiteralIpHost),
        ("https://[::ffff:127.0.0.1]/", LiteralIpHost),
        ("https://[fd00::1]:443/", LiteralIpHost),
        // Ports
        ("https://registry.example.com:8443/", NonDefaultPort),
        ("https://registry.example.com:80/", NonDefaultPort),
        ("https://registry.example.com:22", NonDefaultPort),
        // Schemes
        ("http://registry.example.com/", InsecureScheme),
        ("HTTP://registry.example.com/", InsecureScheme),
        ("ftp://registry.example.com/", InsecureScheme),
        ("file:///etc/passwd", InsecureScheme),
        ("gopher://registry.example.com:70/", InsecureScheme),
        ("javascript:alert(1)", InsecureScheme),
        // Registry bypass attempts
        ("https://registry.example.com.attacker.net/", Unregistered),
        ("https://registry.example.com@attacker.net/", Unregistered),
        ("https://attacker.net/#https://registry.example.com", Unregistered),
        ("https://localhost/", Unregistered),
        ("https://metadata.google.internal/", Unregistered),
        // Garbage
        ("", Malformed),
        ("   ", Malformed),
        ("registry.example.com", Malformed),
        ("https://", Malformed),
    ]
}

/// Bearer values that must not authenticate against `secret`.
pub fn token_guesses(secret: &str) -> Vec<String> {
    let mut flipped_last = secret.to_string();
    let last = flipped_last.pop().map_or('x', |c| if c == 'x' { 'y' } else { 'x' });
    flipped_last.push(last);

    let mut flipped_first = String::from(if secret.starts_with('x') { "y" } else { "x" });
    flipped_first.push_str(secret.get(1..).unwrap_or(""));

    vec![
        String::new(),
        " ".to_string(),
        secret[..secret.len() / 2].to_string(),
        secret[..secret.len() - 1].to_string(),
        format!("{secret}x"),
        format!("{secret} "),
        format!(" {secret}"),
        secret.to_uppercase(),
        flipped_first,
        flipped_last,
        "null".to_string(),
        "undefined".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_addresses() {
        let addresses = generate_addresses(300);
        assert_eq!(addresses.len(), 300);
        let unique: std::collections::HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), 300);
    }

    #[test]
    fn test_token_guesses_exclude_secret() {
        let secret = "abcdef0123456789";
        let guesses = token_guesses(secret);
        assert!(guesses.iter().all(|g| g != secret));
        assert!(guesses.iter().any(|g| g.len() == secret.len()));
    }
}
