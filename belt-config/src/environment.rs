use std::fmt;
use std::io;
use std::str::FromStr;

/// Environment variable selecting the runtime environment.
pub const ENVIRONMENT_ENV_VAR: &str = "BELT_ENVIRONMENT";

/// Runtime environment the process is operating in.
///
/// Selects which environment-specific configuration file is loaded on top of
/// the base file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Reads the environment from `BELT_ENVIRONMENT`, defaulting to prod.
    pub fn load() -> io::Result<Self> {
        match std::env::var(ENVIRONMENT_ENV_VAR) {
            Ok(value) => value
                .parse()
                .map_err(|err: String| io::Error::new(io::ErrorKind::InvalidInput, err)),
            Err(_) => Ok(Environment::Prod),
        }
    }

    /// Pins the environment for the current process. Must run before any
    /// thread reads the environment.
    pub fn set(self) {
        unsafe { std::env::set_var(ENVIRONMENT_ENV_VAR, self.to_string()) }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Dev => f.write_str("dev"),
            Environment::Prod => f.write_str("prod"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!(
                "`{other}` is not a supported environment; use `dev` or `prod`"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        for environment in [Environment::Dev, Environment::Prod] {
            let parsed: Environment = environment.to_string().parse().unwrap();
            assert_eq!(parsed, environment);
        }
    }

    #[test]
    fn unknown_environment_is_rejected() {
        assert!("staging".parse::<Environment>().is_err());
    }
}
