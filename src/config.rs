use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::{Limiters, RejectionPolicy};

const API_KEY_PLACEHOLDER: &str = "your_gemini_api_key_here";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "storyforge-gateway")]
#[command(about = "Rate-limited story generation gateway in front of Gemini")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Base URL of the generation API
    #[arg(
        long,
        env = "PROVIDER_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub provider_url: String,

    #[arg(long, env = "GOOGLE_GENERATIVE_AI_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    // Model for stories, outlines, chapters and suggestions
    #[arg(long, env = "STORYFORGE_MODEL", default_value = "gemini-2.5-flash")]
    pub model: String,

    #[arg(long, env = "STORYFORGE_TITLE_MODEL", default_value = "gemini-2.0-flash-exp")]
    pub title_model: String,

    // Rate limit windows in seconds
    #[arg(long, default_value_t = 60)]
    pub api_window: u64,

    #[arg(long, default_value_t = 60)]
    pub generation_window: u64,

    #[arg(long, default_value_t = 15 * 60)]
    pub auth_window: u64,

    // Expired keys are swept once a limiter tracks more than this many
    #[arg(long, default_value_t = 500)]
    pub max_tracked_keys: usize,

    // Stop counting requests once a key is over its limit
    #[arg(long, default_value_t = false)]
    pub skip_rejected: bool,

    // Upper bound on a single generation call, in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,
}

impl Args {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() || self.api_key == API_KEY_PLACEHOLDER {
            return Err(ConfigError::Missing("GOOGLE_GENERATIVE_AI_API_KEY"));
        }
        if !(self.provider_url.starts_with("http://") || self.provider_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidUrl {
                name: "PROVIDER_URL",
                value: self.provider_url.clone(),
            });
        }
        for (name, value) in [
            ("--api-window", self.api_window),
            ("--generation-window", self.generation_window),
            ("--auth-window", self.auth_window),
            ("--request-timeout", self.request_timeout),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }

    pub fn rejection_policy(&self) -> RejectionPolicy {
        if self.skip_rejected {
            RejectionPolicy::SkipRejected
        } else {
            RejectionPolicy::CountRejected
        }
    }

    pub fn limiters(&self) -> Limiters {
        Limiters::new(
            Duration::from_secs(self.api_window),
            Duration::from_secs(self.generation_window),
            Duration::from_secs(self.auth_window),
            self.max_tracked_keys,
            self.rejection_policy(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["storyforge-gateway"];
        argv.extend_from_slice(extra);
        if !extra.contains(&"--api-key") {
            argv.extend_from_slice(&["--api-key", "test-key"]);
        }
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_three_limiters() {
        let args = parse(&[]);
        assert!(args.validate().is_ok());
        let limiters = args.limiters();
        assert_eq!(limiters.api.window(), Duration::from_secs(60));
        assert_eq!(limiters.generation.window(), Duration::from_secs(60));
        assert_eq!(limiters.auth.window(), Duration::from_secs(900));
        assert_eq!(args.rejection_policy(), RejectionPolicy::CountRejected);
    }

    #[test]
    fn placeholder_api_key_is_rejected() {
        let args = parse(&["--api-key", API_KEY_PLACEHOLDER]);
        assert!(matches!(args.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn zero_windows_and_bad_urls_are_rejected() {
        let args = parse(&["--generation-window", "0"]);
        assert!(matches!(
            args.validate(),
            Err(ConfigError::Zero("--generation-window"))
        ));

        let args = parse(&["--provider-url", "localhost:9000"]);
        assert!(matches!(args.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn skip_rejected_flag_switches_policy() {
        assert_eq!(
            parse(&["--skip-rejected"]).rejection_policy(),
            RejectionPolicy::SkipRejected
        );
    }
}
