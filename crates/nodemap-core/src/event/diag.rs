fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Saturating counters describing the adapter's deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AdapterDiagnostics {
    /// Deliveries that reached at least one port.
    pub delivered: u64,
    /// Deliveries whose id matched no port.
    pub dropped: u64,
    /// Payload bytes copied into ports.
    pub injected_bytes: u64,
    /// Nodes invalidated by deliveries.
    pub invalidated_nodes: u64,
    /// Id of the most recent delivery that reached a port.
    pub last_id: Option<String>,
}

impl AdapterDiagnostics {
    /// Creates zeroed diagnostics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_delivery(
        &mut self,
        id: &str,
        ports: usize,
        bytes: usize,
        invalidated: usize,
    ) {
        self.last_id = Some(id.to_string());
        self.delivered = self.delivered.saturating_add(1);
        self.injected_bytes = self
            .injected_bytes
            .saturating_add(count(bytes).saturating_mul(count(ports)));
        self.invalidated_nodes = self.invalidated_nodes.saturating_add(count(invalidated));
    }

    pub(crate) fn record_drop(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::AdapterDiagnostics;

    #[test]
    fn counters_saturate() {
        let mut diagnostics = AdapterDiagnostics {
            delivered: u64::MAX,
            ..AdapterDiagnostics::new()
        };
        diagnostics.record_delivery("A5C0", 1, 4, 2);
        assert_eq!(diagnostics.delivered, u64::MAX);
        assert_eq!(diagnostics.injected_bytes, 4);
        assert_eq!(diagnostics.last_id.as_deref(), Some("A5C0"));
        diagnostics.record_drop();
        assert_eq!(diagnostics.dropped, 1);
        assert_eq!(diagnostics.last_id.as_deref(), Some("A5C0"));
    }
}
