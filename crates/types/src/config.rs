use url::Url;

pub const AFFIRM_ENV: &str = "AFFIRM_ENV";
pub const AFFIRM_PUBLIC_KEY_ENV: &str = "AFFIRM_PUBLIC_KEY";
pub const AFFIRM_PRIVATE_KEY_ENV: &str = "AFFIRM_PRIVATE_KEY";
pub const STRIPE_SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
pub const STRIPE_API_BASE_ENV: &str = "STRIPE_API_BASE";
pub const MERCHANT_ORIGIN_ENV: &str = "MERCHANT_ORIGIN";
pub const MERCHANT_NAME_ENV: &str = "MERCHANT_NAME";

const AFFIRM_PROD_BASE: &str = "https://api.affirm.com";
const AFFIRM_SANDBOX_BASE: &str = "https://sandbox.affirm.com";
const STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_MERCHANT_NAME: &str = "Paylane Storefront";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0} env var")]
    MissingVar(&'static str),
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Which Affirm environment the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffirmEnv {
    Sandbox,
    Production,
}

impl AffirmEnv {
    /// Unset or unrecognized values select production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => AffirmEnv::Sandbox,
            _ => AffirmEnv::Production,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            AffirmEnv::Sandbox => AFFIRM_SANDBOX_BASE,
            AffirmEnv::Production => AFFIRM_PROD_BASE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AffirmEnv::Sandbox => "sandbox",
            AffirmEnv::Production => "production",
        }
    }
}

/// Affirm API key pair; the private key never leaves the server process.
#[derive(Debug, Clone)]
pub struct AffirmKeys {
    pub public_key: String,
    pub private_key: String,
}

/// Process-wide gateway configuration, resolved once at startup and injected
/// into handlers. Nothing reads the environment at request time.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub environment: AffirmEnv,
    pub affirm_base: Url,
    /// Absent keys are reported per request, not a startup failure, so the
    /// card rail stays usable while financing is unconfigured (and vice
    /// versa).
    pub affirm_keys: Option<AffirmKeys>,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: Url,
    pub merchant_origin: Url,
    pub merchant_name: String,
}

fn non_blank(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment =
            AffirmEnv::parse(&non_blank(AFFIRM_ENV).unwrap_or_default());

        let affirm_keys = match (
            non_blank(AFFIRM_PUBLIC_KEY_ENV),
            non_blank(AFFIRM_PRIVATE_KEY_ENV),
        ) {
            (Some(public_key), Some(private_key)) => Some(AffirmKeys {
                public_key,
                private_key,
            }),
            _ => None,
        };

        let merchant_origin = non_blank(MERCHANT_ORIGIN_ENV)
            .ok_or(ConfigError::MissingVar(MERCHANT_ORIGIN_ENV))?;
        let merchant_origin = Url::parse(&merchant_origin).map_err(|source| {
            ConfigError::InvalidUrl {
                var: MERCHANT_ORIGIN_ENV,
                source,
            }
        })?;

        let stripe_api_base = match non_blank(STRIPE_API_BASE_ENV) {
            Some(base) => Url::parse(&base).map_err(|source| ConfigError::InvalidUrl {
                var: STRIPE_API_BASE_ENV,
                source,
            })?,
            None => Url::parse(STRIPE_API_BASE).expect("static URL"),
        };

        Ok(GatewayConfig {
            environment,
            affirm_base: Url::parse(environment.base_url()).expect("static URL"),
            affirm_keys,
            stripe_secret_key: non_blank(STRIPE_SECRET_KEY_ENV),
            stripe_api_base,
            merchant_origin,
            merchant_name: non_blank(MERCHANT_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_MERCHANT_NAME.to_string()),
        })
    }

    /// Force an environment after resolution (e.g. a `--sandbox` CLI flag).
    pub fn with_environment(mut self, environment: AffirmEnv) -> Self {
        self.environment = environment;
        self.affirm_base = Url::parse(environment.base_url()).expect("static URL");
        self
    }

    pub fn has_affirm_keys(&self) -> bool {
        self.affirm_keys.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_environment_selects_production() {
        assert_eq!(AffirmEnv::parse(""), AffirmEnv::Production);
        assert_eq!(AffirmEnv::parse("staging"), AffirmEnv::Production);
        assert_eq!(AffirmEnv::parse("SANDBOX"), AffirmEnv::Sandbox);
        assert_eq!(AffirmEnv::parse(" sandbox "), AffirmEnv::Sandbox);
    }

    #[test]
    fn base_urls_follow_environment() {
        assert_eq!(AffirmEnv::Sandbox.base_url(), "https://sandbox.affirm.com");
        assert_eq!(AffirmEnv::Production.base_url(), "https://api.affirm.com");
    }
}
