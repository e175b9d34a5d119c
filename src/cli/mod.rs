use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Persistence Args ---
    /// Where saved items and chat history live (local, remote)
    #[arg(long, env = "STORAGE_BACKEND", default_value = "local")]
    pub storage_backend: String,

    /// Device key-value store type (file, redis, memory)
    #[arg(long, env = "KV_TYPE", default_value = "file")]
    pub kv_type: String,

    /// Path of the JSON document used by the file key-value store.
    #[arg(long, env = "KV_PATH", default_value = "data/device_storage.json")]
    pub kv_path: String,

    /// Redis endpoint for the redis key-value store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "KV_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub kv_redis_url: String,

    /// Prefix for keys written to Redis.
    #[arg(long, env = "KV_REDIS_PREFIX", default_value = "discover_diani:")]
    pub kv_redis_prefix: String,

    /// Key holding the JSON array of saved items on the device.
    #[arg(long, env = "SAVED_ITEMS_KEY", default_value = "@discover_diani_saved_items")]
    pub saved_items_key: String,

    /// Key holding the selected theme on the device.
    #[arg(long, env = "THEME_KEY", default_value = "@discover_diani_theme")]
    pub theme_key: String,

    /// Key prefix for device-local chat history documents.
    #[arg(long, env = "CHAT_HISTORY_KEY_PREFIX", default_value = "@discover_diani_chat_history:")]
    pub chat_history_key_prefix: String,

    /// Maximum number of chat messages loaded into the history cache.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "100")]
    pub history_limit: usize,

    /// Maximum number of chat messages kept in a device-local history document.
    #[arg(long, env = "LOCAL_HISTORY_CAP", default_value = "500")]
    pub local_history_cap: usize,

    // --- Remote Backend Args ---
    /// Base URL of the hosted backend (e.g., https://xyz.supabase.co)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Public anon key of the hosted backend.
    #[arg(long, env = "SUPABASE_ANON_KEY")]
    pub supabase_anon_key: Option<String>,

    /// Request timeout in seconds for calls to the hosted backend.
    #[arg(long, env = "SUPABASE_TIMEOUT_SECS", default_value = "30")]
    pub supabase_timeout_secs: u64,

    // --- Session Args ---
    /// Id of the signed-in user. Leave unset to run anonymously.
    #[arg(long, env = "USER_ID")]
    pub user_id: Option<String>,

    /// Email of the signed-in user.
    #[arg(long, env = "USER_EMAIL")]
    pub user_email: Option<String>,

    /// Access token of the signed-in user, sent as the bearer token to the backend.
    #[arg(long, env = "USER_ACCESS_TOKEN")]
    pub user_access_token: Option<String>,

    // --- Assistant Args ---
    /// Webhook endpoint of the recommendation assistant.
    #[arg(long, env = "WEBHOOK_URL", default_value = "http://localhost:5678/webhook/diani-guide")]
    pub webhook_url: String,

    /// Request timeout in seconds for the assistant webhook.
    #[arg(long, env = "WEBHOOK_TIMEOUT_SECS", default_value = "30")]
    pub webhook_timeout_secs: u64,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn remote_enabled(&self) -> bool {
        self.storage_backend.eq_ignore_ascii_case("remote")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_local_file_storage() {
        let args = Args::parse_from(["diani-guide"]);
        assert_eq!(args.storage_backend, "local");
        assert_eq!(args.kv_type, "file");
        assert_eq!(args.saved_items_key, "@discover_diani_saved_items");
        assert_eq!(args.history_limit, 100);
        assert_eq!(args.supabase_timeout_secs, 30);
        assert!(!args.remote_enabled());
    }

    #[test]
    fn remote_flag_is_case_insensitive() {
        let args = Args::parse_from(["diani-guide", "--storage-backend", "REMOTE"]);
        assert!(args.remote_enabled());
    }
}
