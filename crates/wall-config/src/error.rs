use thiserror::Error;

pub type Result<T, E = ConfigError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown placeholder in template: {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("unbalanced brace at byte {0} of template")]
    UnbalancedBrace(usize),
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("parse error: {0}")]
    Parse(String),
}
