//! Error types for card-sweep.

/// A failed call against the board service.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Missing or invalid configuration. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {key} (set {env} or [{section}] {key} in the config file)")]
    Missing {
        key: &'static str,
        env: &'static str,
        section: &'static str,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
