//! # Prometheus Metrics
//!
//! Outcome counters for the issuer and the gateway. Every instance owns its
//! own [`prometheus::Registry`] (prefix `sdv`), so two issuers in one process
//! never double-count and nothing leaks into the default global registry.
//!
//! Exposing the text output over HTTP is the transport's job; this module
//! only renders it.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Counter handles for one issuer/gateway deployment.
///
/// Share it behind an `Arc`. The counter handles are themselves cheap to
/// clone.
#[derive(Clone)]
pub struct ProtocolMetrics {
    registry: Registry,
    /// Hellos whose proof verified and that produced a ticket.
    pub hello_accepted_total: IntCounter,
    /// Hellos rejected for any reason (bad proof, malformed fields).
    pub hello_rejected_total: IntCounter,
    pub tickets_redeemed_total: IntCounter,
    pub redeem_failed_total: IntCounter,
    pub frames_accepted_total: IntCounter,
    /// Frames rejected for a bad tag, a replayed counter or an unknown session.
    pub frames_rejected_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl ProtocolMetrics {
    /// Create and register all counters.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("sdv".into()), None)?;

        let hello_accepted_total = counter(
            &registry,
            "hello_accepted_total",
            "Hello requests whose proof verified and that were issued a ticket",
        )?;
        let hello_rejected_total = counter(
            &registry,
            "hello_rejected_total",
            "Hello requests rejected (invalid proof or malformed message)",
        )?;
        let tickets_redeemed_total = counter(
            &registry,
            "tickets_redeemed_total",
            "Tickets successfully redeemed for a session key",
        )?;
        let redeem_failed_total = counter(
            &registry,
            "redeem_failed_total",
            "Ticket redemptions that failed authentication or payload checks",
        )?;
        let frames_accepted_total = counter(
            &registry,
            "frames_accepted_total",
            "Frames whose tag verified",
        )?;
        let frames_rejected_total = counter(
            &registry,
            "frames_rejected_total",
            "Frames rejected by the gateway",
        )?;

        Ok(Self {
            registry,
            hello_accepted_total,
            hello_rejected_total,
            tickets_redeemed_total,
            redeem_failed_total,
            frames_accepted_total,
            frames_rejected_total,
        })
    }

    /// Encode all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_prefixed_counters() {
        let metrics = ProtocolMetrics::new().unwrap();
        metrics.hello_accepted_total.inc();
        metrics.frames_rejected_total.inc_by(3);

        let text = metrics.render().unwrap();
        assert!(text.contains("sdv_hello_accepted_total 1"));
        assert!(text.contains("sdv_frames_rejected_total 3"));
        assert!(text.contains("sdv_redeem_failed_total 0"));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = ProtocolMetrics::new().unwrap();
        let b = ProtocolMetrics::new().unwrap();
        a.tickets_redeemed_total.inc();
        assert_eq!(a.tickets_redeemed_total.get(), 1);
        assert_eq!(b.tickets_redeemed_total.get(), 0);
    }
}
