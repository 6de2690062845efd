use std::sync::LazyLock;

pub mod version;

pub static POISE_VERSION: &str = "0.6.1";
pub static STARTUP_TIME: LazyLock<std::time::SystemTime> =
    LazyLock::new(std::time::SystemTime::now);

pub const QUOTES_KEY: &str = "quotes";
pub const LAST_FILTER_KEY: &str = "selectedCategory";
pub const LAST_VIEWED_KEY: &str = "lastViewedQuote";

pub const EXPORT_FILENAME: &str = "quotes.json";
pub const ALL_CATEGORIES: &str = "all";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

pub const DEFAULT_REMOTE_URL: &str = "https://jsonplaceholder.typicode.com/posts";
pub const REMOTE_CATEGORY: &str = "Remote";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;

/// how long a transient notification stays in the channel before it's removed.
pub const NOTIFICATION_LINGER_SECS: u64 = 5;

pub const QUOTES_PER_PAGE: usize = 10;

/// (id, text, category) of the collection used when nothing has been persisted yet.
pub const DEFAULT_QUOTES: [(&str, &str, &str); 4] = [
    (
        "default-1",
        "The best way to get started is to quit talking and begin doing.",
        "Motivation",
    ),
    (
        "default-2",
        "Life is what happens when you're busy making other plans.",
        "Life",
    ),
    (
        "default-3",
        "Do not watch the clock. Do what it does. Keep going.",
        "Productivity",
    ),
    ("default-4", "Happiness depends upon ourselves.", "Philosophy"),
];
