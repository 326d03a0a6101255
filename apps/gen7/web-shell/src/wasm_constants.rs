pub(crate) const CONFIG_GLOBAL: &str = "__GEN7_SHELL_CONFIG__";
pub(crate) const LOG_LEVEL_KEY: &str = "GEN7_LOG_LEVEL";
pub(crate) const HOST_GLOBAL: &str = "pywebview";
pub(crate) const HOST_API_PROPERTY: &str = "api";
pub(crate) const DIAGNOSTICS_NOT_STARTED: &str =
    "{\"phase\":\"idle\",\"detail\":\"shell not started\"}";
