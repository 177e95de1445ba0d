pub const METRIC_CACHE_HIT: &str = "raid_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "raid_cache_miss_total";
pub const METRIC_CACHE_COALESCED: &str = "raid_cache_coalesced_total";
pub const METRIC_CACHE_PASSTHROUGH: &str = "raid_cache_passthrough_total";
pub const METRIC_CACHE_READ_ERROR: &str = "raid_cache_read_error_total";
pub const METRIC_CACHE_WRITE_ERROR: &str = "raid_cache_write_error_total";
pub const METRIC_CACHE_INVALIDATED: &str = "raid_cache_invalidated_keys_total";
pub const METRIC_MEMORY_EVICT: &str = "raid_cache_memory_evict_total";
pub const METRIC_MEMORY_ENTRIES: &str = "raid_cache_memory_entries";
