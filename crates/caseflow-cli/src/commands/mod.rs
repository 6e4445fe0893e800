//! Command implementations.

pub mod configure;
pub mod inspect;
pub mod run;

pub use self::configure::execute_config;
pub use self::inspect::execute_inspect;
pub use self::run::execute_run;
