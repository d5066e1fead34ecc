use clap::{Parser, Subcommand};

/// `Gistline` - streaming summaries from interchangeable LLM backends.
#[derive(Parser, Debug)]
#[command(name = "gistline")]
#[command(version)]
#[command(about = "Summarize text with OpenAI, Anthropic, Gemini or a local model.", long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a file, a web page, or stdin (`-`)
    Summarize {
        /// Path, http(s) URL, or `-` for stdin
        source: String,

        /// Provider to use (openai, anthropic, gemini, on-device)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use; picked from the model catalog when omitted
        #[arg(short, long)]
        model: Option<String>,

        /// Language of the summary, e.g. `en` or `pt-BR`
        #[arg(short, long)]
        language: Option<String>,

        /// Custom instruction; `{language}` is replaced with the language
        #[arg(long)]
        prompt: Option<String>,

        /// Keep the result in the saved-summary list
        #[arg(long)]
        save: bool,
    },

    /// List the models a provider offers
    Models {
        #[arg(short, long)]
        provider: Option<String>,

        /// Query the provider instead of showing the cached list
        #[arg(long)]
        refresh: bool,
    },

    /// Check whether an API key is accepted
    Validate {
        #[arg(short, long)]
        provider: Option<String>,

        /// Key to check; defaults to the configured one
        #[arg(long)]
        key: Option<String>,
    },

    /// Store an API key and refresh that provider's model list
    SetKey {
        #[arg(short, long)]
        provider: Option<String>,

        key: String,

        /// Store the key without probing the provider first
        #[arg(long)]
        no_check: bool,
    },

    /// Report whether the on-device model can run
    Availability,

    /// Show saved summaries
    Saved {
        /// Only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}
