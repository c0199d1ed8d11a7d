use super::Config;

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Environment variables win over the config file. Empty values are
    /// treated as unset.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_var("MATRIX_HOMESERVER_URL") {
            self.matrix.homeserver_url = url;
        }

        if let Some(token) = non_empty_var("MATRIX_ACCESS_TOKEN") {
            self.matrix.access_token = token;
        }

        if let Some(user_id) = non_empty_var("MATRIX_USER_ID") {
            self.matrix.user_id = user_id;
        }

        if let Some(room) = non_empty_var("MONITORED_ROOM_ID") {
            self.matrix.monitored_room_id = room;
        }

        if let Some(room) = non_empty_var("FORWARDING_ROOM_ID") {
            self.matrix.forwarding_room_id = Some(room);
        }

        if let Some(key) = non_empty_var("AI_API_KEY") {
            self.llm.api_key = Some(key);
        }

        if let Some(url) = non_empty_var("AI_API_URL") {
            self.llm.api_url = url;
        }

        if let Some(model) = non_empty_var("AI_MODEL") {
            self.llm.model = model;
        }

        if let Some(window) = non_empty_var("LINKRELAY_DEDUP_WINDOW_SECS")
            && let Ok(secs) = window.parse::<u64>()
            && secs > 0
        {
            self.links.dedup_window_secs = secs;
        }
    }
}
