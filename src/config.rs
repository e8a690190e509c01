//! Factory build options.

use crate::naming::{DEFAULT_CLASS_PREFIX, DEFAULT_NAMESPACE};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

/// When synthesized classes go through the structural verifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerifyMode {
    /// Verify in builds with debug assertions.
    #[default]
    Auto,
    Always,
    Never,
}

impl VerifyMode {
    pub fn enabled(self) -> bool {
        match self {
            VerifyMode::Auto => cfg!(debug_assertions),
            VerifyMode::Always => true,
            VerifyMode::Never => false,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(VerifyMode::Auto),
            "always" | "true" | "1" => Ok(VerifyMode::Always),
            "never" | "false" | "0" => Ok(VerifyMode::Never),
            other => bail!("unsupported verify mode '{}'", other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyOptions {
    #[serde(default)]
    pub verify: VerifyMode,
    /// Namespace used when no participating type forces one.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    /// Simple-name prefix; classes are named `<prefix>$<n>`.
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_class_prefix() -> String {
    DEFAULT_CLASS_PREFIX.to_string()
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            verify: VerifyMode::default(),
            default_namespace: default_namespace(),
            class_prefix: default_class_prefix(),
        }
    }
}

impl ProxyOptions {
    pub fn from_json(source: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(source).context("failed to parse proxy options JSON")?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read proxy options: {}", path.display()))?;
        Self::from_json(&source)
            .with_context(|| format!("failed to load proxy options: {}", path.display()))
    }

    /// Defaults overridden by `INDY_PROXY_VERIFY`, `INDY_PROXY_NAMESPACE` and
    /// `INDY_PROXY_PREFIX`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();
        if let Some(verify) = lookup("INDY_PROXY_VERIFY") {
            options.verify = VerifyMode::parse(&verify).context("invalid INDY_PROXY_VERIFY")?;
        }
        if let Some(namespace) = lookup("INDY_PROXY_NAMESPACE") {
            options.default_namespace = namespace;
        }
        if let Some(prefix) = lookup("INDY_PROXY_PREFIX") {
            options.class_prefix = prefix;
        }
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.class_prefix.is_empty() {
            bail!("classPrefix must not be empty");
        }
        if self.class_prefix.contains(['.', '$']) {
            bail!("classPrefix '{}' must not contain '.' or '$'", self.class_prefix);
        }
        if self.default_namespace.split('.').any(str::is_empty) {
            bail!("defaultNamespace '{}' is not a valid namespace", self.default_namespace);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
