pub mod directory;

pub use directory::{InMemoryPassportDirectory, PassportDirectory, PostgresPassportDirectory};
