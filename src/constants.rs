pub mod api_keys {

    /// Prefix that makes issued secrets recognizable.
    pub const KEY_PREFIX: &str = "eb_";

    /// Random bytes behind each secret, hex encoded after the prefix.
    pub const KEY_RANDOM_BYTES: usize = 32;

    pub const DEFAULT_KEY_NAME: &str = "Default API Key";

    /// Secrets shorter than this are masked entirely.
    pub const MIN_MASKABLE_LEN: usize = 12;

    pub const FULL_MASK: &str = "****";

    /// Longest expiry a key can be given, in days.
    pub const MAX_EXPIRY_DAYS: i64 = 36_500;
}

pub mod headers {

    pub const API_KEY: &str = "x-api-key";
}

pub mod users {

    /// Stored role of every local user; admin authority comes from the
    /// configured allow-list instead.
    pub const DEFAULT_ROLE: &str = "USER";
}

pub mod limits {

    pub const DEFAULT_PAGE_SIZE: u64 = 20;

    pub const MAX_PAGE_SIZE: u64 = 100;

    /// Pages past this are rejected before an offset is computed.
    pub const MAX_PAGE: u64 = 100_000;
}
