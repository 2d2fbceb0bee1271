use thiserror::Error;

/// Failures that stop a single invocation of the article pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported stage category code: {0} (expected event|collab|gauntlet|colosseum|zl|ranking)")]
    UnsupportedCategory(String),

    #[error("required pattern `{pattern}` not found in generator output ({rule})")]
    MissingPattern { rule: &'static str, pattern: String },

    #[error("no value for `{{{0}}}`; pass it on the command line or set it in the config file")]
    MissingValue(&'static str),

    #[error("placeholder left unresolved in article: {0}")]
    UnresolvedPlaceholder(String),

    #[error("invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to run stage-data generator `{program}`: {source}")]
    GeneratorSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
