/// Database configuration and connection management
pub mod database;

/// Engine settings: allowance rates, reward amounts, sweep timing
pub mod settings;
