use std::{fmt, str::FromStr, time::Duration};

use crate::{constants::*, utils::ConfigError};

/// Settings for one invocation of the reminder job.
///
/// Built once at startup from the environment and handed to the job, nothing
/// downstream reads environment variables on its own.
#[derive(Clone, PartialEq)]
pub struct JobConfig {
    pub mongodb_uri: String,
    pub database_name: String,
    pub collection_name: String,
    pub email_connection_string: String,
    pub email_sender_address: Option<String>,
    pub mongo_min_pool_size: u32,
    pub mongo_max_pool_size: u32,
    pub mongo_conn_timeout: Duration,
    pub poll_interval: Duration,
    pub send_timeout: Duration,
    pub claim_lease: Duration,
    pub subject_template: String,
    pub body_template: String,
    pub job_interval: Option<Duration>,
}

impl JobConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    /// Values are trimmed and empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let poll_interval: u64 = parse_or(&get, ENV_POLL_INTERVAL, POLL_INTERVAL_SECS)?;
        let send_timeout: u64 = parse_or(&get, ENV_SEND_TIMEOUT, SEND_TIMEOUT_SECS)?;
        let claim_lease: u64 = parse_or(&get, ENV_CLAIM_LEASE, CLAIM_LEASE_SECS)?;
        let conn_timeout: u64 = parse_or(&get, ENV_MONGODB_CONN_TIMEOUT, MONGO_CONN_TIMEOUT)?;
        let job_interval = match get(ENV_JOB_INTERVAL) {
            Some(val) => Some(Duration::from_secs(parse_value(ENV_JOB_INTERVAL, &val)?)),
            None => None,
        };

        let config = Self {
            mongodb_uri: get(ENV_MONGODB_URI).unwrap_or_default(),
            database_name: get(ENV_DATABASE_NAME).unwrap_or_default(),
            collection_name: get(ENV_COLLECTION_NAME).unwrap_or_default(),
            email_connection_string: get(ENV_EMAIL_CONNECTION_STRING).unwrap_or_default(),
            email_sender_address: get(ENV_EMAIL_SENDER_ADDRESS),
            mongo_min_pool_size: parse_or(&get, ENV_MONGODB_MIN_POOL_SIZE, MONGO_MIN_POOL_SIZE)?,
            mongo_max_pool_size: parse_or(&get, ENV_MONGODB_MAX_POOL_SIZE, MONGO_MAX_POOL_SIZE)?,
            mongo_conn_timeout: Duration::from_secs(conn_timeout),
            poll_interval: Duration::from_secs(poll_interval),
            send_timeout: Duration::from_secs(send_timeout),
            claim_lease: Duration::from_secs(claim_lease),
            subject_template: get(ENV_SUBJECT_TEMPLATE)
                .unwrap_or_else(|| DEFAULT_SUBJECT_TEMPLATE.to_owned()),
            body_template: get(ENV_BODY_TEMPLATE)
                .unwrap_or_else(|| DEFAULT_BODY_TEMPLATE.to_owned()),
            job_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Every mandatory value must be present and non-empty.
    /// All missing keys are reported at once, in a fixed order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (ENV_MONGODB_URI, &self.mongodb_uri),
            (ENV_DATABASE_NAME, &self.database_name),
            (ENV_COLLECTION_NAME, &self.collection_name),
            (ENV_EMAIL_CONNECTION_STRING, &self.email_connection_string),
        ];
        let missing: Vec<&'static str> = required
            .into_iter()
            .filter(|(_, val)| val.trim().is_empty())
            .map(|(key, _)| key)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: ENV_POLL_INTERVAL,
                reason: "must be greater than zero".into(),
            });
        }
        if self.claim_lease.as_secs() > MAX_CLAIM_LEASE_SECS {
            return Err(ConfigError::Invalid {
                var: ENV_CLAIM_LEASE,
                reason: format!("must be at most {MAX_CLAIM_LEASE_SECS} seconds"),
            });
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(val) => parse_value(var, &val),
        None => Ok(default),
    }
}

fn parse_value<T>(var: &'static str, val: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    val.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("{val:?}: {e}"),
    })
}

// connection strings carry credentials, keep them out of the logs
impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("mongodb_uri", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("collection_name", &self.collection_name)
            .field("email_connection_string", &"<redacted>")
            .field("email_sender_address", &self.email_sender_address)
            .field("poll_interval", &self.poll_interval)
            .field("send_timeout", &self.send_timeout)
            .field("claim_lease", &self.claim_lease)
            .field("job_interval", &self.job_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_MONGODB_URI, "mongodb://localhost:27017"),
            (ENV_DATABASE_NAME, "gnosis"),
            (ENV_COLLECTION_NAME, "users"),
            (
                ENV_EMAIL_CONNECTION_STRING,
                "endpoint=https://mail.example.com/;accesskey=c2VjcmV0",
            ),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = JobConfig::from_lookup(lookup_from(&required_vars())).unwrap();
        assert_eq!(config.database_name, "gnosis");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.send_timeout, Duration::from_secs(180));
        assert_eq!(config.claim_lease, Duration::from_secs(900));
        assert_eq!(config.subject_template, DEFAULT_SUBJECT_TEMPLATE);
        assert_eq!(config.body_template, DEFAULT_BODY_TEMPLATE);
        assert!(config.email_sender_address.is_none());
        assert!(config.job_interval.is_none());
    }

    #[test]
    fn test_missing_values_reported_in_order() {
        let vars = vec![(ENV_DATABASE_NAME, "gnosis")];
        let err = JobConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                ENV_MONGODB_URI,
                ENV_COLLECTION_NAME,
                ENV_EMAIL_CONNECTION_STRING
            ])
        );
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = required_vars();
        vars[2] = (ENV_COLLECTION_NAME, "   ");
        let err = JobConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec![ENV_COLLECTION_NAME]));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let mut vars = required_vars();
        vars.push((ENV_SEND_TIMEOUT, "three minutes"));
        let err = JobConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == ENV_SEND_TIMEOUT));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut vars = required_vars();
        vars.push((ENV_POLL_INTERVAL, "0"));
        let err = JobConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == ENV_POLL_INTERVAL));
    }

    #[test]
    fn test_oversized_claim_lease_rejected() {
        let mut vars = required_vars();
        vars.push((ENV_CLAIM_LEASE, "18446744073709551615"));
        let err = JobConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == ENV_CLAIM_LEASE));
    }

    #[test]
    fn test_overrides() {
        let mut vars = required_vars();
        vars.push((ENV_POLL_INTERVAL, "2"));
        vars.push((ENV_CLAIM_LEASE, "0"));
        vars.push((ENV_JOB_INTERVAL, "86400"));
        vars.push((ENV_EMAIL_SENDER_ADDRESS, "DoNotReply@mail.example.com"));
        let config = JobConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.claim_lease.is_zero());
        assert_eq!(config.job_interval, Some(Duration::from_secs(86400)));
        assert_eq!(
            config.email_sender_address.as_deref(),
            Some("DoNotReply@mail.example.com")
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = JobConfig::from_lookup(lookup_from(&required_vars())).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("accesskey"));
        assert!(!printed.contains("localhost"));
    }
}
