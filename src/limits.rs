//! Hard caps on input sizes and collection growth.

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_ADDRESS_LEN: usize = 500;
pub const MAX_CITY_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_COMMENT_LEN: usize = 5_000;
pub const MAX_IMAGE_URL_LEN: usize = 2_048;

pub const MAX_USERS: usize = 1_000_000;
pub const MAX_PROPERTIES: usize = 1_000_000;
pub const MAX_RESERVATIONS_PER_PROPERTY: usize = 50_000;

/// Longest single stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Upper bound on `price_per_day`; rejects absurd values before they reach storage.
pub const MAX_PRICE_PER_DAY: f64 = 1e9;

/// Frames larger than this are treated as corruption during WAL replay.
pub const MAX_WAL_FRAME_BYTES: usize = 1 << 20;
