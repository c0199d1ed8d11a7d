use std::sync::{LazyLock, Mutex, MutexGuard};

pub(super) static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Every variable `apply_env_overrides` reads. Tests clear all of them so a
/// developer's shell or `.env` cannot leak into assertions.
pub(super) const ALL_VARS: [&str; 9] = [
    "MATRIX_HOMESERVER_URL",
    "MATRIX_ACCESS_TOKEN",
    "MATRIX_USER_ID",
    "MONITORED_ROOM_ID",
    "FORWARDING_ROOM_ID",
    "AI_API_KEY",
    "AI_API_URL",
    "AI_MODEL",
    "LINKRELAY_DEDUP_WINDOW_SECS",
];

pub(super) fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(super) struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvVarGuard {
    pub(super) fn set(key: &'static str, value: &str) -> Self {
        let previous = std::env::var(key).ok();
        // SAFETY: Test-only helper. All tests using EnvVarGuard acquire
        // ENV_LOCK first, serializing concurrent env-var access.
        unsafe {
            std::env::set_var(key, value);
        }
        Self { key, previous }
    }

    pub(super) fn unset(key: &'static str) -> Self {
        let previous = std::env::var(key).ok();
        // SAFETY: Test-only helper. ENV_LOCK serializes access;
        // the guard restores the original value on drop.
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, previous }
    }

    pub(super) fn clear_all() -> Vec<Self> {
        ALL_VARS.iter().map(|key| Self::unset(key)).collect()
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        if let Some(value) = &self.previous {
            // SAFETY: Test-only restoration. ENV_LOCK is still held by
            // the enclosing test, so no concurrent env mutation.
            unsafe {
                std::env::set_var(self.key, value);
            }
        } else {
            // SAFETY: Test-only cleanup.
            unsafe {
                std::env::remove_var(self.key);
            }
        }
    }
}
