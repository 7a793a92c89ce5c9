//! ID and one-time code generation.

use rand::Rng;
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
    /// ULIDs sort by creation time, which keeps primary keys roughly
    /// aligned with `created_at`.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a six digit numeric one-time code.
    #[must_use]
    pub fn generate_otp(&self) -> String {
        let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        code.to_string()
    }
}
