//! Per-run upload options and the two ways of building them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ConfigError;

/// Who can see the uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    Anyone,
    OnlyMe,
}

impl AccessPolicy {
    pub const ALL: [AccessPolicy; 2] = [AccessPolicy::Anyone, AccessPolicy::OnlyMe];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::Anyone => "anyone",
            AccessPolicy::OnlyMe => "only_me",
        }
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anyone" => Ok(AccessPolicy::Anyone),
            "only_me" => Ok(AccessPolicy::OnlyMe),
            other => Err(ConfigError::InvalidAccessPolicy(other.to_string())),
        }
    }
}

/// How every file of a run is uploaded. Built once, then shared read-only.
///
/// `None`, `false` and empty strings mean "leave the field out of the request".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOption {
    pub access_policy: Option<AccessPolicy>,
    pub metadata_is_public: bool,
    pub enable_exif: bool,
    pub referer_url: String,
    pub app: String,
    pub title: String,
    pub desc: String,
    pub created_at: Option<DateTime<Utc>>,
    pub collection_id: String,
}

/// Raw flag values as handed over by the command line. Empty means unset.
#[derive(Debug, Clone, Default)]
pub struct FlagValues {
    pub access_policy: String,
    pub metadata_is_public: bool,
    pub exif: bool,
    pub referer_url: String,
    pub app: String,
    pub title: String,
    pub desc: String,
    pub created_at: String,
    pub collection_id: String,
}

/// Answers gathered by an interactive prompt session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAnswers {
    pub access_policy: AccessPolicy,
    pub metadata_is_public: bool,
    pub enable_exif: bool,
    pub app: String,
    pub desc: String,
}

impl Default for PromptAnswers {
    fn default() -> Self {
        Self {
            access_policy: AccessPolicy::Anyone,
            metadata_is_public: false,
            enable_exif: false,
            app: "gyz".to_string(),
            desc: String::new(),
        }
    }
}

/// Something that can ask the user for upload options.
///
/// Returns `Ok(None)` when the user aborts the session.
pub trait OptionPrompt {
    fn ask(&self, defaults: &PromptAnswers) -> std::io::Result<Option<PromptAnswers>>;
}

/// Where the options of a run come from. Exactly one source per run.
pub enum OptionSource<'a> {
    Flags(FlagValues),
    Interactive(&'a dyn OptionPrompt),
}

/// Build the run's `UploadOption` from its source.
pub fn build(source: OptionSource<'_>) -> Result<UploadOption, ConfigError> {
    match source {
        OptionSource::Flags(flags) => from_flags(flags),
        OptionSource::Interactive(prompt) => from_prompt(prompt),
    }
}

fn from_flags(flags: FlagValues) -> Result<UploadOption, ConfigError> {
    let access_policy = match flags.access_policy.as_str() {
        "" => None,
        other => Some(other.parse()?),
    };

    let created_at = match flags.created_at.as_str() {
        "" => None,
        raw => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| ConfigError::InvalidCreatedAt(raw.to_string()))?
                .with_timezone(&Utc),
        ),
    };

    Ok(UploadOption {
        access_policy,
        metadata_is_public: flags.metadata_is_public,
        enable_exif: flags.exif,
        referer_url: flags.referer_url,
        app: flags.app,
        title: flags.title,
        desc: flags.desc,
        created_at,
        collection_id: flags.collection_id,
    })
}

fn from_prompt(prompt: &dyn OptionPrompt) -> Result<UploadOption, ConfigError> {
    let answers = prompt
        .ask(&PromptAnswers::default())
        .map_err(ConfigError::Prompt)?
        .ok_or(ConfigError::Cancelled)?;

    Ok(UploadOption {
        access_policy: Some(answers.access_policy),
        metadata_is_public: answers.metadata_is_public,
        enable_exif: answers.enable_exif,
        app: answers.app,
        desc: answers.desc,
        ..UploadOption::default()
    })
}
