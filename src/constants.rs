/// Constants describing the upstream occurrence search API.
pub mod api {
    /// Default occurrence search endpoint.
    pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.gbif.org/v1/occurrence/search";
    /// Largest page size the search endpoint accepts.
    pub const MAX_PAGE_SIZE: u32 = 300;
    /// Default page size used when paging search results.
    pub const DEFAULT_PAGE_SIZE: u32 = 300;
    /// Query parameter carrying the media type filter.
    pub const PARAM_MEDIA_TYPE: &str = "mediaType";
    /// Query parameter carrying the paging offset.
    pub const PARAM_OFFSET: &str = "offset";
    /// Query parameter carrying the page size.
    pub const PARAM_LIMIT: &str = "limit";
    /// Default end-to-end timeout for a single request, in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
}

/// Constants used when building descriptors.
pub mod descriptor {
    /// Default occurrence field used as the descriptor label.
    pub const DEFAULT_LABEL_FIELD: &str = "speciesKey";
    /// Label emitted when an occurrence does not carry the label field.
    pub const MISSING_LABEL: &str = "unknown";
}

/// Constants used by stream configuration and balancing.
pub mod streams {
    /// `nb_samples` sentinel requesting the minimum balanced budget.
    pub const BALANCED_BUDGET_SENTINEL: i64 = -1;
    /// Default RNG seed for media selection and stream interleaving.
    pub const DEFAULT_SEED: u64 = 42;
    /// Stream id used when no splitting is requested.
    pub const SINGLE_STREAM_ID: &str = "all";
    /// Separator between `field=value` pairs in a stream id.
    pub const STREAM_ID_SEPARATOR: &str = ",";
    /// Offset mixed into the balancer RNG seed so it differs from emitter RNGs.
    pub const MUX_SEED_OFFSET: u64 = 0xB4C3_5EED;
}
