use config::builder::DefaultState;
use config::{Config as ConfigLoader, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

/// Plain environment variables accepted alongside the `DASHBOARD__*` form.
const LEGACY_VARS: &[(&str, &str)] = &[
    ("GITLAB_BASE", "gitlab.url"),
    ("GITLAB_TOKEN", "gitlab.token"),
    ("GITLAB_USERNAME", "gitlab.username"),
    ("TEAMMATE_USERNAMES", "gitlab.teammates"),
    ("PORT", "server.port"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gitlab: GitLabConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitLabConfig {
    pub url: String,
    pub token: String,
    /// Identity whose assigned and review-requested MRs fill the main view.
    pub username: String,
    #[serde(default, deserialize_with = "parse_user_list")]
    pub teammates: Vec<String>,
    pub timeout_seconds: u64,
    pub per_page: u32,
    pub concurrency: usize,
    pub skip_invalid_certs: bool,
    pub refresh_seconds: u64,
}

/// Accept either a list or a comma separated string of usernames.
pub fn parse_user_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UserList {
        List(Vec<String>),
        Joined(String),
    }

    let raw = match UserList::deserialize(deserializer)? {
        UserList::List(list) => list,
        UserList::Joined(s) => s.split(',').map(str::to_string).collect(),
    };

    Ok(raw
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect())
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("DASHBOARD")
                    .prefix_separator("__")
                    .separator("__"),
            );

        Self::build(builder, |var| std::env::var(var).ok())
    }

    fn build<F>(builder: ConfigBuilder<DefaultState>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("gitlab.url", "")?
            .set_default("gitlab.token", "")?
            .set_default("gitlab.username", "")?
            .set_default("gitlab.timeout_seconds", 10)?
            .set_default("gitlab.per_page", 100)?
            .set_default("gitlab.concurrency", 8)?
            .set_default("gitlab.skip_invalid_certs", false)?
            .set_default("gitlab.refresh_seconds", 60)?;

        for (var, key) in LEGACY_VARS {
            builder = builder.set_override_option(*key, lookup(var))?;
        }

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.gitlab.url = config.gitlab.url.trim().trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Reject a config that cannot drive a single aggregation cycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("gitlab.url (GITLAB_BASE)", &self.gitlab.url),
            ("gitlab.token (GITLAB_TOKEN)", &self.gitlab.token),
            ("gitlab.username (GITLAB_USERNAME)", &self.gitlab.username),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::Message(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.gitlab.concurrency == 0 {
            return Err(ConfigError::Message(
                "gitlab.concurrency must be at least 1".to_string(),
            ));
        }
        if self.gitlab.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "gitlab.timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
