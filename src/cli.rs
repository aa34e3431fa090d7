use clap::Parser;
use tracerouter_core::matcher::DEFAULT_CONCURRENCY;

#[derive(Debug, Parser)]
#[command(version, about = "Utility for easily debugging VMs")]
pub struct Cli {
    /// Pattern to match against VM names within the project. Can use
    /// regexp expressions; it is matched from the start of the name.
    pub match_pattern: String,

    /// Project in which to run the tracerouter. If none is specified, the
    /// default project from the gcloud configuration is used.
    #[arg(long)]
    pub project: Option<String>,

    /// List all the matching instances, instead of traceroute.
    #[arg(short, long, default_value_t = false)]
    pub print: bool,

    /// Include dig (DNS lookup) information.
    #[arg(short, long, default_value_t = false)]
    pub dig: bool,

    /// Include reverse traceroute (from VM to host).
    #[arg(
        short,
        long = "reverse_traceroute",
        visible_alias = "reverse-traceroute",
        default_value_t = false
    )]
    pub reverse_traceroute: bool,

    /// Seconds after which a traceroute, dig or ssh call is abandoned.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// How many zones are queried at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}
