use std::time::Duration;

#[derive(knuffel::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transactions {
    /// How long to wait for clients to acknowledge configures before committing anyway.
    #[knuffel(child, unwrap(argument), default = 200)]
    pub configure_timeout_ms: u32,
    /// How long a layout engine may take to answer a layout demand.
    #[knuffel(child, unwrap(argument), default = 100)]
    pub layout_demand_timeout_ms: u32,
}

impl Default for Transactions {
    fn default() -> Self {
        Self {
            configure_timeout_ms: 200,
            layout_demand_timeout_ms: 100,
        }
    }
}

impl Transactions {
    pub fn configure_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.configure_timeout_ms))
    }

    pub fn layout_demand_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.layout_demand_timeout_ms))
    }
}
