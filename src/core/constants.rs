//! Backend constants derived from the Maps API contract and the historical
//! defaults of the dashboard SDK. Keeping them in a single place makes it easier
//! to tweak engine-wide magic numbers.

/// Path segment of the anonymous/named map endpoints under the user host.
pub const MAPS_API_BASE_URL: &str = "api/v1/map";

/// Payloads at or above this size are POSTed (or LZMA-compressed for GET).
/// Historical URL length safety margin.
pub const MAX_GET_SIZE: usize = 2033;

/// Max number of subsequent equal instantiation requests.
pub const MAP_INSTANTIATION_LIMIT: usize = 3;

/// Debounce window for viewport bound changes, in milliseconds.
pub const BOUNDING_BOX_FILTER_WAIT_MS: u64 = 500;

/// Transparent 1x1 pixel returned as the tile URL when no layer of the
/// requested type exists. Callers must treat it as "no data".
pub const EMPTY_GIF: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Subdomains used to shard tile requests over plain HTTP.
pub const HTTP_SUBDOMAINS: [&str; 4] = ["0", "1", "2", "3"];

/// Prefix of deterministic JSONP callback names.
pub const JSONP_CALLBACK_PREFIX: &str = "_cdbc_";

/// Column used as feature id for infowindow attributes.
pub const ATTRIBUTES_ID_COLUMN: &str = "cartodb_id";

/// Entries kept by the compressed payload cache.
pub const COMPRESSION_CACHE_SIZE: usize = 16;

/// Upper bound on the `bins_count` a histogram response may declare.
pub const MAX_HISTOGRAM_BINS: u64 = 10_000;
