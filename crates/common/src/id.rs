//! ID generation utilities.

use ulid::Ulid;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are:
    /// - Lexicographically sortable by creation time
    /// - Shorter than UUIDs when represented as strings
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate `count` ULIDs that sort in generation order.
    ///
    /// Plain ULIDs created within the same millisecond order randomly; a
    /// monotonic generator increments the random part instead, so rows
    /// inserted in one batch keep their submission order.
    #[must_use]
    pub fn generate_sequence(&self, count: usize) -> Vec<String> {
        let mut generator = ulid::Generator::new();
        (0..count)
            .map(|_| {
                generator
                    .generate()
                    .unwrap_or_else(|_| Ulid::new())
                    .to_string()
                    .to_lowercase()
            })
            .collect()
    }
}
