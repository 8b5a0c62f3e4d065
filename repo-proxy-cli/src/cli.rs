use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Request storm driver for the cooperating repository proxy",
    long_about = "Fires concurrent requests for a set of paths at an upstream repository\n\
                  through the caching proxy engine, and reports how each request ended\n\
                  and how many requests actually reached the upstream.\n\
                  \n\
                  Useful to check coalescing, admission limits and timeouts against a\n\
                  real remote before rolling out new cooperation settings."
)]
pub struct CliArgs {
    /// Upstream repository base URL
    #[arg(help = "Base URL of the upstream repository (e.g. https://repo1.maven.org/maven2)")]
    pub remote_url: String,

    /// Paths to request
    #[arg(required = true, help = "Repository paths to request, spread over all clients")]
    pub paths: Vec<String>,

    /// Concurrent clients per round
    #[arg(
        short,
        long,
        default_value = "100",
        help = "Number of concurrent requests fired per round"
    )]
    pub clients: usize,

    /// Number of rounds
    #[arg(
        short,
        long,
        default_value = "1",
        help = "Number of rounds; later rounds exercise the cache"
    )]
    pub rounds: usize,

    /// Disable download cooperation
    #[arg(long, help = "Let every request fetch independently")]
    pub no_cooperation: bool,

    /// Passive timeout
    #[arg(
        long,
        default_value = "30s",
        help = "Longest a request waits on another request's fetch (s, m, h, ms). Use 0 for unbounded."
    )]
    pub passive_timeout: String,

    /// Active timeout
    #[arg(
        long,
        default_value = "5m",
        help = "Longest a fetch may run before it fails (s, m, h, ms). Use 0 for unbounded."
    )]
    pub active_timeout: String,

    /// Cooperation thread limit
    #[arg(
        long,
        default_value = "100",
        help = "Maximum number of cooperating requests. Use 0 for unlimited."
    )]
    pub thread_limit: usize,

    /// Apply the thread limit across all paths
    #[arg(long, help = "Count the thread limit across all paths instead of per path")]
    pub global_limit: bool,

    /// Maximum age of cached content
    #[arg(
        long,
        help = "Maximum age of cached content before it is revalidated (s, m, h, ms)"
    )]
    pub content_max_age: Option<String>,

    /// Overall HTTP timeout in seconds
    #[arg(
        long,
        default_value = "60",
        help = "Overall timeout in seconds for upstream HTTP requests"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Custom HTTP headers for upstream requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL for upstream requests (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type (http, https, socks5, all)
    #[arg(
        long,
        default_value = "all",
        help = "Proxy type (http, https, socks5, all)",
        value_parser = ["http", "https", "socks5", "all"]
    )]
    pub proxy_type: String,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Disable all proxy settings
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy) for upstream requests"
    )]
    pub no_proxy: bool,

    /// Also write logs to this file
    #[arg(long, help = "Write logs to this file in addition to stdout")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::parse_from(["repo-proxy-cli", "https://repo.example.com", "a.jar"]);

        assert_eq!(args.clients, 100);
        assert_eq!(args.rounds, 1);
        assert_eq!(args.passive_timeout, "30s");
        assert_eq!(args.paths, vec!["a.jar".to_string()]);
        assert!(!args.no_cooperation);
    }

    #[test]
    fn requires_a_path() {
        assert!(CliArgs::try_parse_from(["repo-proxy-cli", "https://repo.example.com"]).is_err());
    }
}
