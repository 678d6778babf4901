//! Geo/Network-category rules (spec §4.4): VPN/proxy IP, impossible
//! travel (scenario S6), and declared-vs-observed country mismatch.

use crate::models::Severity;
use crate::rules::{RuleDescriptor, RuleHit};

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "vpn_or_proxy_ip",
            severity: Severity::Medium,
            base_score: 12.0,
            confidence: 0.6,
            message: "transaction originated from a known VPN or proxy exit node",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx.features.network.as_ref().and_then(|n| n.is_vpn_or_proxy) == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        // S6: same user, two ip-geolocated requests 30 minutes apart,
        // implied speed > IMPOSSIBLE_TRAVEL_SPEED_KMH.
        RuleDescriptor {
            name: "impossible_travel",
            severity: Severity::Critical,
            base_score: 40.0,
            confidence: 0.82,
            message: "implied travel speed between consecutive transactions exceeds any real mode of transport",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx.is_impossible_travel == Some(true) {
                    Some(RuleHit::with(serde_json::json!({
                        "implied_speed_kmh": ctx.implied_travel_speed_kmh,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "country_mismatch",
            severity: Severity::Medium,
            base_score: 18.0,
            confidence: 0.65,
            message: "declared country does not match the transaction's observed IP country",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let declared = ctx.declared_country.as_deref()?;
                let ip_country = ctx.features.network.as_ref().and_then(|n| n.ip_country.as_deref())?;
                if !declared.eq_ignore_ascii_case(ip_country) {
                    Some(RuleHit::with(serde_json::json!({
                        "declared_country": declared,
                        "ip_country": ip_country,
                    })))
                } else {
                    None
                }
            }),
        },
    ]
}
