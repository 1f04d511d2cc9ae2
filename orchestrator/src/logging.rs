use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientError, ClientResult};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Calling this again, or after a
/// host has installed its own subscriber, leaves the existing one in place.
pub fn init(filter: &str) -> ClientResult<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| ClientError::Config(format!("invalid log filter {:?}: {}", filter, e)))?,
    };

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init("info").is_ok());
        assert!(init("debug").is_ok());
    }
}
