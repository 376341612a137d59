//! Build context with a fixed-capacity message log
//!
//! During a build session the context collects diagnostic messages into a
//! preallocated text pool. Logging can never fail and never allocates after
//! construction, so a diagnostic message cannot itself be the cause of an
//! out-of-memory failure mid-build.

/// Maximum number of messages the context can hold
pub const MAX_MESSAGES: usize = 1024;

/// Size in bytes of the preallocated message text pool
pub const MESSAGE_POOL_SIZE: usize = 65536;

/// Build-time diagnostic log backed by a fixed-size text pool
///
/// Messages are appended until either the message table or the pool is
/// exhausted, after which further calls to [`log`](BuildContext::log) are
/// silently ignored. A message that does not fit in the remaining pool
/// space is truncated. [`reset`](BuildContext::reset) empties the log in
/// O(1) without releasing the pool.
#[derive(Debug)]
pub struct BuildContext {
    /// (offset, length) of each stored message within the pool, excluding
    /// the NUL terminator
    entries: Vec<(usize, usize)>,
    pool: Box<[u8]>,
    pool_len: usize,
    log_enabled: bool,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(true)
    }
}

impl BuildContext {
    /// Creates a new build context, allocating the message pool up front
    pub fn new(log_enabled: bool) -> Self {
        Self {
            entries: Vec::with_capacity(MAX_MESSAGES),
            pool: vec![0u8; MESSAGE_POOL_SIZE].into_boxed_slice(),
            pool_len: 0,
            log_enabled,
        }
    }

    /// Whether logging is currently enabled
    pub fn log_enabled(&self) -> bool {
        self.log_enabled
    }

    /// Enables or disables logging
    pub fn set_log_enabled(&mut self, enabled: bool) {
        self.log_enabled = enabled;
    }

    /// Appends a message to the log
    ///
    /// A no-op when logging is disabled, the message is empty, the message
    /// table is full, or the pool has no usable space left. The stored copy
    /// is truncated on a character boundary to fit the remaining pool space
    /// and is always NUL-terminated within the pool.
    pub fn log(&mut self, message: &str) {
        if !self.log_enabled || message.is_empty() || self.entries.len() >= MAX_MESSAGES {
            return;
        }

        // One byte is always reserved for the NUL terminator.
        let remaining = MESSAGE_POOL_SIZE - self.pool_len;
        if remaining < 2 {
            return;
        }

        let bytes = message.as_bytes();
        let mut stored_len = bytes.len().min(remaining - 1);
        // Never cut a multi-byte character in half; the stored copy must
        // stay valid UTF-8.
        while !message.is_char_boundary(stored_len) {
            stored_len -= 1;
        }

        let start = self.pool_len;
        self.pool[start..start + stored_len].copy_from_slice(&bytes[..stored_len]);
        self.pool[start + stored_len] = 0;
        self.pool_len += stored_len + 1;
        self.entries.push((start, stored_len));
    }

    /// Number of stored messages
    pub fn message_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the message at the given index, or `None` if out of range
    pub fn message(&self, i: usize) -> Option<&str> {
        let &(start, len) = self.entries.get(i)?;
        std::str::from_utf8(&self.pool[start..start + len]).ok()
    }

    /// Iterates over all stored messages in insertion order
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter_map(|&(start, len)| std::str::from_utf8(&self.pool[start..start + len]).ok())
    }

    /// Number of pool bytes currently in use, NUL terminators included
    pub fn pool_len(&self) -> usize {
        self.pool_len
    }

    /// Empties the log without deallocating the pool
    pub fn reset(&mut self) {
        self.entries.clear();
        self.pool_len = 0;
    }
}
