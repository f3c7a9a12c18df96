use clap::Parser;

/// Renders the outputs of a reform microsimulation as a narrated HTML page.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the dashboard: data locations, chart
    /// documents and output settings. All the other options override it.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory or http(s) URL) The location of the six CSV datasets. Overrides the
    /// baseLocation of the configuration.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the HTML page. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, a JSON summary of the derived statistics
    /// is written to the given location.
    #[clap(short, long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference HTML page. If provided, impactdash checks that the rendered page
    /// matches it and prints the differences otherwise.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// The title of the page.
    #[clap(long, value_parser)]
    pub title: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on debug logging on the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
