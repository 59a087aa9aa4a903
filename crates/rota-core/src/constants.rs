/// Hard ceiling on how many split generations the materializer will
/// follow for one logical series. A legitimate chain grows by one link
/// per "this and following" edit; hitting the ceiling means the stored
/// chain is corrupt (a cycle or runaway splits).
pub const MAX_SPLIT_CHAIN_DEPTH: usize = 64;

/// Timezone assigned to calendars when the deployment configures none.
pub const DEFAULT_TIMEZONE: &str = "UTC";
